//! Platform directories for the session file, config and logs.
//!
//! Linux uses `$XDG_CONFIG_HOME/dispatch-console/` and
//! `~/.local/share/dispatch-console/`; macOS and Windows use the usual
//! per-user application folders under `com.dispatch.dispatch-console`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::constants::{APP_NAME, APP_ORGANIZATION, APP_QUALIFIER};
use crate::error::{Error, Result};

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME).ok_or_else(|| Error::Invalid {
        message: "No home directory to keep console files in".to_string(),
    })
}

fn ensure_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}

/// Directory holding `config.toml` and `session.toml`
pub fn get_or_create_config_dir() -> Result<PathBuf> {
    ensure_dir(project_dirs()?.config_dir())
}

/// Directory holding the rolling log files
pub fn get_or_create_data_dir() -> Result<PathBuf> {
    ensure_dir(project_dirs()?.data_dir())
}

/// Debug builds log more verbosely
pub fn is_development() -> bool {
    cfg!(debug_assertions)
}
