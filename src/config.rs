//! Where the shared database and onboarding documents live.
//!
//! Every agent's server process must agree on the database file, so the
//! location comes from one environment variable with a home-directory default:
//! `MINION_COMMS_DB_PATH`, else `~/.minion-comms/messages.db`. The runtime
//! directory is the database's parent.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub const DB_PATH_ENV: &str = "MINION_COMMS_DB_PATH";

const RUNTIME_DIR_NAME: &str = ".minion-comms";
const DB_FILE_NAME: &str = "messages.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
}

impl Config {
    /// Resolve from `MINION_COMMS_DB_PATH` or the home directory.
    pub fn from_env() -> std::io::Result<Self> {
        resolve(std::env::var_os(DB_PATH_ENV), dirs::home_dir())
    }

    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: path.into(),
        }
    }

    /// Holds `PROTOCOL.md` and `classes/<class>.md`.
    pub fn runtime_dir(&self) -> &Path {
        self.db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn ensure_runtime_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(self.runtime_dir())
    }
}

fn resolve(env_value: Option<OsString>, home: Option<PathBuf>) -> std::io::Result<Config> {
    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return Ok(Config::with_db_path(path));
    }
    let home = home.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        )
    })?;
    Ok(Config::with_db_path(
        home.join(RUNTIME_DIR_NAME).join(DB_FILE_NAME),
    ))
}
