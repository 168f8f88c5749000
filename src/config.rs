//! User configuration (`~/.family-tree/config.json`).
//!
//! The endpoint URLs are injected into the remote store and sync engine
//! from here; nothing else reads them.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment override for the primary read/write endpoint.
pub const ENV_SCRIPT_URL: &str = "FAMILY_TREE_SCRIPT_URL";
/// Environment override for the published CSV mirror.
pub const ENV_CSV_URL: &str = "FAMILY_TREE_CSV_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Apps Script web-app URL serving reads and versioned writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_url: Option<String>,
    /// Published CSV export of the sheet, used when the script is unreachable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_mirror_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a sync success stays visible before the status returns to idle.
    #[serde(default = "default_success_display_secs")]
    pub success_display_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_success_display_secs() -> u64 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            script_url: None,
            csv_mirror_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            success_display_secs: default_success_display_secs(),
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn success_display(&self) -> Duration {
        Duration::from_secs(self.success_display_secs)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_blank(ENV_SCRIPT_URL) {
            self.script_url = Some(url);
        }
        if let Some(url) = non_blank(ENV_CSV_URL) {
            self.csv_mirror_url = Some(url);
        }
    }
}

/// Path to `~/.family-tree/config.json`.
pub fn config_path() -> Result<PathBuf, String> {
    let home = dirs::home_dir().ok_or("Could not find home directory")?;
    Ok(home.join(".family-tree").join("config.json"))
}

/// Load configuration from the default path plus environment overrides.
/// A missing file yields defaults.
pub fn load_config() -> Result<Config, String> {
    let mut config = load_config_from(&config_path()?)?;
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

pub fn load_config_from(path: &Path) -> Result<Config, String> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
}

/// Write configuration to the default path.
pub fn save_config(config: &Config) -> Result<(), String> {
    save_config_to(&config_path()?, config)
}

/// Write configuration atomically (temp file + rename).
pub fn save_config_to(path: &Path, config: &Config) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| format!("Failed to write config: {}", e))?;
    fs::rename(&tmp, path).map_err(|e| format!("Failed to replace config: {}", e))?;
    Ok(())
}
