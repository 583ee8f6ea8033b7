//! Session artifacts: JSONL round logs and the final summary.
//!
//! One line is appended per reasoning exchange, so a crashed session still
//! leaves every completed exchange on disk.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::session::{SessionReport, TokenUsage};

/// One planner exchange (`explore.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExploreLogEntry {
    pub round: u32,
    pub prompt: String,
    pub image: String,
    pub response: Value,
    pub usage: TokenUsage,
}

/// One reflector exchange (`reflect.jsonl`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectLogEntry {
    pub round: u32,
    pub prompt: String,
    pub image_before: String,
    pub image_after: String,
    pub response: Value,
    pub usage: TokenUsage,
}

pub fn append_jsonl<T: Serialize>(path: &Path, entry: &T) -> Result<()> {
    let mut line = serde_json::to_string(entry).context("serialize log entry")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))
}

/// Read every entry of a JSONL log. A missing file is an empty log.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(
            serde_json::from_str(&line)
                .with_context(|| format!("parse {} line {}", path.display(), idx + 1))?,
        );
    }
    Ok(entries)
}

pub fn write_summary(path: &Path, report: &SessionReport) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report).context("serialize summary")?;
    buf.push('\n');
    super::write_atomic(path, buf.as_bytes())
}
