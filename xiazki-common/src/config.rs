//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "XIAZKI_ROOT";

/// Name of the optional server settings file inside the root folder
pub const SETTINGS_FILE_NAME: &str = "xiazki.toml";

/// Name of the SQLite database file inside the root folder
pub const DATABASE_FILE_NAME: &str = "xiazki.db";

/// Server settings read from `<root>/xiazki.toml`
///
/// Every key is optional; missing keys fall back to [`ServerConfig::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// bcrypt work factor for new password hashes (4..=31)
    pub bcrypt_cost: u32,
    /// Lifetime of issued API session tokens
    pub session_ttl_days: i64,
    /// OpenLibrary base URL used by book autofill
    pub openlibrary_base_url: String,
    /// Google Books volumes endpoint used by book autofill
    pub googlebooks_base_url: String,
    /// Google Books API key; anonymous quota applies when unset
    pub googlebooks_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5780".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            session_ttl_days: 7,
            openlibrary_base_url: "https://openlibrary.org".to_string(),
            googlebooks_base_url: "https://www.googleapis.com/books/v1/volumes".to_string(),
            googlebooks_api_key: None,
        }
    }
}

impl ServerConfig {
    /// Load settings from the root folder, using defaults when the file is missing
    pub fn load(root_folder: &Path) -> Result<Self> {
        let path = root_folder.join(SETTINGS_FILE_NAME);
        if !path.exists() {
            tracing::info!("No {} in {}, using defaults", SETTINGS_FILE_NAME, root_folder.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate settings from TOML text
    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let config: ServerConfig = toml::from_str(content).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(format!("bcrypt_cost must be within 4..=31, got {}", self.bcrypt_cost));
        }
        if self.session_ttl_days < 1 {
            return Err(format!(
                "session_ttl_days must be positive, got {}",
                self.session_ttl_days
            ));
        }
        Ok(())
    }

    /// Session lifetime as a chrono duration
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }

    /// Timeout applied to every outbound autofill request
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}

/// Root folder resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = root_folder_from_config_file() {
        return root_folder;
    }

    default_root_folder()
}

/// Database path for a resolved root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

fn root_folder_from_config_file() -> Option<PathBuf> {
    let config_path = find_config_file()?;
    let content = std::fs::read_to_string(&config_path).ok()?;
    let config = toml::from_str::<toml::Value>(&content).ok()?;
    config
        .get("root_folder")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
}

/// Locate the user or system config file
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("xiazki").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/xiazki/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("xiazki"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/xiazki"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("xiazki"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/xiazki"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("xiazki"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\xiazki"))
    } else {
        PathBuf::from("./xiazki_data")
    }
}
