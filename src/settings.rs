use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MandataError, Result};
use crate::ingest::IngestOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Read ambiguous slash dates month-first instead of the day-first
    /// default. Match this to the locale of the exporting system.
    #[serde(default)]
    pub month_first: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Mandate quota for this organization; 0 disables the check.
    #[serde(default)]
    pub max_mandates: usize,
    #[serde(default = "default_session_grace_secs")]
    pub session_grace_secs: i64,
}

fn default_batch_size() -> usize {
    40
}

fn default_batch_pause_ms() -> u64 {
    50
}

fn default_session_grace_secs() -> i64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            month_first: false,
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
            max_mandates: 0,
            session_grace_secs: default_session_grace_secs(),
        }
    }
}

impl Settings {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            batch_size: self.batch_size,
            batch_pause_ms: self.batch_pause_ms,
            month_first: self.month_first,
            max_mandates: self.max_mandates,
            session_grace_secs: self.session_grace_secs,
            ..IngestOptions::default()
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mandata")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("mandata")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| MandataError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| {
            let raw = PathBuf::from(path);
            if raw.is_absolute() {
                raw
            } else {
                std::env::current_dir().map(|cwd| cwd.join(&raw)).unwrap_or(raw)
            }
        })
        .to_string_lossy()
        .to_string()
}
