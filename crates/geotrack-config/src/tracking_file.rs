//! Persisted tracking configuration (`<data_dir>/tracking.toml`)

use geotrack_api::TrackingConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ConfigResult;

const TRACKING_FILENAME: &str = "tracking.toml";

/// Reads and writes the user's tracking settings so they survive restarts
#[derive(Debug, Clone)]
pub struct TrackingConfigStore {
    path: PathBuf,
}

impl TrackingConfigStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(TRACKING_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved settings; `None` if nothing has been saved yet
    pub fn load(&self) -> ConfigResult<Option<TrackingConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let config: TrackingConfig = toml::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded tracking config");
        Ok(Some(config))
    }

    /// Save atomically (write to a sibling file, then rename)
    pub fn save(&self, config: &TrackingConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string(config)?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved tracking config");
        Ok(())
    }

    /// Saved settings, or `fallback` when none exist
    pub fn load_or(&self, fallback: TrackingConfig) -> ConfigResult<TrackingConfig> {
        Ok(self.load()?.unwrap_or(fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let store = TrackingConfigStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        let fallback = TrackingConfig::default();
        assert_eq!(store.load_or(fallback.clone()).unwrap(), fallback);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = TrackingConfigStore::new(dir.path().join("nested"));

        let config = TrackingConfig {
            enabled: false,
            interval_seconds: 120,
            auto_restart_delay_seconds: 600,
            auto_start_enabled: true,
        };
        store.save(&config).unwrap();

        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = TrackingConfigStore::new(dir.path());
        std::fs::write(store.path(), "interval_seconds = \"soon\"").unwrap();
        assert!(store.load().is_err());
    }
}
