//! Side-effecting collaborators: device, reasoning service, filesystem.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

pub mod action_executor;
pub mod annotate;
pub mod config;
pub mod device;
pub mod doc_store;
pub mod layout;
pub mod process;
pub mod prompt;
pub mod reasoning;
pub mod round_log;
pub mod similarity;

/// Write `contents` to `path` via a sibling temp file and rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
