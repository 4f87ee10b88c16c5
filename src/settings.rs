use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{BookError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_fiscal_year_start")]
    pub fiscal_year_start: String,
    #[serde(default = "default_granularity")]
    pub default_granularity: String,
    #[serde(default = "default_server_bind")]
    pub server_bind: String,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_fiscal_year_start() -> String {
    "01".to_string()
}

fn default_granularity() -> String {
    "month".to_string()
}

fn default_server_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_log_filter() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user_name: String::new(),
            currency: default_currency(),
            fiscal_year_start: default_fiscal_year_start(),
            default_granularity: default_granularity(),
            server_bind: default_server_bind(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Fiscal year start month, falling back to January on garbage input.
    pub fn fiscal_start_month(&self) -> u32 {
        self.fiscal_year_start
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .unwrap_or(1)
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("pocketbook")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("pocketbook")
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
        .map_err(|e| BookError::Settings(e.to_string()))?;
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
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
