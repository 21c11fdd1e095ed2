// src/infra/paths.rs — Config and data locations
//
// SQLBUDDY_HOME overrides everything: config and data both live under it.
// Otherwise config uses ~/.sqlbuddy/ and data uses XDG_DATA_HOME/sqlbuddy.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

fn sqlbuddy_home() -> Option<PathBuf> {
    std::env::var_os("SQLBUDDY_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $SQLBUDDY_HOME/ or ~/.sqlbuddy/
pub fn config_dir() -> PathBuf {
    if let Some(home) = sqlbuddy_home() {
        return home;
    }
    dirs_home().join(".sqlbuddy")
}

/// Data directory: $SQLBUDDY_HOME/data/ or ~/.local/share/sqlbuddy/
pub fn data_dir() -> PathBuf {
    if let Some(home) = sqlbuddy_home() {
        return home.join("data");
    }
    ProjectDirs::from("", "", "sqlbuddy")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| config_dir().join("data"))
}

/// Memory + schema index database
pub fn memory_db_path() -> PathBuf {
    data_dir().join("sqlbuddy.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure the config and data directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
