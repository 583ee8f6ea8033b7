//! On-disk layout for apps and exploration sessions.
//!
//! ```text
//! <root>/apps/<app>/auto_docs/<element>.json
//! <root>/apps/<app>/demos/self_explore_<YYYY-mm-dd_HH-MM-SS>/
//!     <r>_before.png  <r>_before_labeled.png  <r>.xml
//!     <r>_after.png   <r>_after_labeled.png
//!     explore.jsonl   reflect.jsonl           summary.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, TimeZone};

const SESSION_PREFIX: &str = "self_explore_";
const SESSION_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Per-app directories that outlive a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub demos_dir: PathBuf,
}

impl AppPaths {
    /// Whitespace in `app` is removed to form the directory name.
    pub fn new(root: &Path, app: &str) -> Result<Self> {
        let name: String = app.chars().filter(|c| !c.is_whitespace()).collect();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(anyhow!("invalid app name `{app}`"));
        }
        let app_dir = root.join("apps").join(name);
        Ok(Self {
            docs_dir: app_dir.join("auto_docs"),
            demos_dir: app_dir.join("demos"),
            app_dir,
        })
    }
}

/// Paths of one exploration session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub app: AppPaths,
    pub session_dir: PathBuf,
    pub explore_log_path: PathBuf,
    pub reflect_log_path: PathBuf,
    pub summary_path: PathBuf,
}

impl SessionPaths {
    pub fn new<Tz: TimeZone>(app: AppPaths, started_at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let session_dir = app.demos_dir.join(session_dir_name(started_at));
        Self {
            explore_log_path: session_dir.join("explore.jsonl"),
            reflect_log_path: session_dir.join("reflect.jsonl"),
            summary_path: session_dir.join("summary.json"),
            session_dir,
            app,
        }
    }

    /// Create the docs and session directories.
    pub fn create(&self) -> Result<()> {
        for dir in [&self.app.docs_dir, &self.session_dir] {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }

    /// Path of the labelled copy of a capture tagged `tag`.
    pub fn labeled_path(&self, tag: &str) -> PathBuf {
        self.session_dir.join(format!("{tag}_labeled.png"))
    }
}

/// Capture tags for one round.
pub fn before_tag(round: u32) -> String {
    format!("{round}_before")
}

pub fn after_tag(round: u32) -> String {
    format!("{round}_after")
}

pub fn tree_tag(round: u32) -> String {
    round.to_string()
}

pub fn session_dir_name<Tz: TimeZone>(started_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{SESSION_PREFIX}{}", started_at.format(SESSION_TIME_FORMAT))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn session_paths_follow_layout() {
        let started = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().expect("time");
        let app = AppPaths::new(Path::new("/work"), "My Notes").expect("app");
        let paths = SessionPaths::new(app, &started);

        assert_eq!(paths.app.docs_dir, Path::new("/work/apps/MyNotes/auto_docs"));
        assert_eq!(
            paths.session_dir,
            Path::new("/work/apps/MyNotes/demos/self_explore_2024-03-09_14-05-07")
        );
        assert!(paths.explore_log_path.ends_with("explore.jsonl"));
        assert!(paths.summary_path.ends_with("summary.json"));
        assert!(paths.labeled_path(&before_tag(3)).ends_with("3_before_labeled.png"));
    }

    #[test]
    fn app_names_cannot_escape_root() {
        assert!(AppPaths::new(Path::new("/work"), "  ").is_err());
        assert!(AppPaths::new(Path::new("/work"), "../etc").is_err());
        assert!(AppPaths::new(Path::new("/work"), "..").is_err());
    }

    #[test]
    fn create_makes_docs_and_session_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let app = AppPaths::new(temp.path(), "clock").expect("app");
        let paths = SessionPaths::new(app, &Utc::now());
        paths.create().expect("create");
        assert!(paths.app.docs_dir.is_dir());
        assert!(paths.session_dir.is_dir());
    }
}
