//! Default paths for geotrackd components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/geotrackd/geotrackd.sock` or `/tmp/geotrackd-$USER/geotrackd.sock`
//! - Data: `$XDG_DATA_HOME/geotrackd` or `~/.local/share/geotrackd`
//! - Config: `$XDG_CONFIG_HOME/geotrack/config.toml` or `~/.config/geotrack/config.toml`
//! - Logs: `$XDG_STATE_HOME/geotrackd` or `~/.local/state/geotrackd`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const GEOTRACK_SOCKET_ENV: &str = "GEOTRACK_SOCKET";

/// Environment variable for overriding the data directory
pub const GEOTRACK_DATA_DIR_ENV: &str = "GEOTRACK_DATA_DIR";

/// Socket filename within the runtime directory
const SOCKET_FILENAME: &str = "geotrackd.sock";

/// Application subdirectory name
const APP_DIR: &str = "geotrackd";

/// Configuration subdirectory name
const CONFIG_DIR: &str = "geotrack";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$GEOTRACK_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/geotrackd/geotrackd.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/geotrackd-$USER/geotrackd.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(GEOTRACK_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking GEOTRACK_SOCKET env var.
/// Used for default values in configs where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    runtime_dir().join(SOCKET_FILENAME)
}

/// Per-user runtime directory for the socket and the tracking status file
pub fn runtime_dir() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username))
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$GEOTRACK_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/geotrackd` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/geotrackd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(GEOTRACK_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking GEOTRACK_DATA_DIR env var.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(CONFIG_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(CONFIG_DIR).join("config.toml")
}

/// Get the default log directory.
pub fn default_log_dir() -> PathBuf {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(state_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("logs")
}
