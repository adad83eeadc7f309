//! Runtime status file used as the "tracking active" indicator
//!
//! Desktop widgets and shell prompts can watch for the file; its presence
//! means location is being recorded.

use geotrack_host_api::{ForegroundVisibility, HostResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const STATUS_FILENAME: &str = "tracking-active.json";

#[derive(Debug, Serialize)]
struct StatusFile<'a> {
    title: &'a str,
    text: &'a str,
    pid: u32,
    since_ms: i64,
}

pub struct StatusFileIndicator {
    path: PathBuf,
}

impl StatusFileIndicator {
    pub fn new(runtime_dir: impl AsRef<Path>) -> Self {
        Self {
            path: runtime_dir.as_ref().join(STATUS_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ForegroundVisibility for StatusFileIndicator {
    fn acquire(&self, title: &str, text: &str) -> HostResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let status = StatusFile {
            title,
            text,
            pid: std::process::id(),
            since_ms: geotrack_util::now_ms(),
        };
        let json = serde_json::to_string_pretty(&status).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)?;
        debug!(path = %self.path.display(), "Tracking indicator written");
        Ok(())
    }

    fn release(&self) -> HostResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Tracking indicator removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_writes_and_release_removes() {
        let dir = tempfile::tempdir().unwrap();
        let indicator = StatusFileIndicator::new(dir.path().join("run"));

        indicator.acquire("Location tracking", "Recording").unwrap();
        let content = std::fs::read_to_string(indicator.path()).unwrap();
        assert!(content.contains("Location tracking"));
        assert!(content.contains(&std::process::id().to_string()));

        indicator.release().unwrap();
        assert!(!indicator.path().exists());
        indicator.release().unwrap();
    }
}
