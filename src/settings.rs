use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{productivity::ProductivitySettings, timer::AccountingMode};

const DEFAULT_DB_PATH: &str = "tasktimer.sqlite3";
const DEFAULT_STREAM_INTERVAL_MS: u64 = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Cadence of the elapsed-time stream.
    pub stream_interval_ms: u64,
    pub accounting: AccountingMode,
    pub productivity: ProductivitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            stream_interval_ms: DEFAULT_STREAM_INTERVAL_MS,
            accounting: AccountingMode::default(),
            productivity: ProductivitySettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path` when it exists, then apply environment
    /// overrides. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                let parsed: Settings = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse settings in {}", path.display()))?;
                info!("Loaded settings from {}", path.display());
                parsed
            }
            _ => Settings::default(),
        };

        settings.apply_env(|key| env::var(key).ok());
        Ok(settings)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TASKTIMER_DB") {
            self.database_path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("TASKTIMER_STREAM_INTERVAL_MS") {
            match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => self.stream_interval_ms = ms,
                _ => warn!(
                    "Invalid TASKTIMER_STREAM_INTERVAL_MS value '{raw}', keeping {}",
                    self.stream_interval_ms
                ),
            }
        }

        if let Some(raw) = lookup("TASKTIMER_ACCOUNTING") {
            match raw.parse::<AccountingMode>() {
                Ok(mode) => self.accounting = mode,
                Err(err) => warn!("{err}; keeping {:?}", self.accounting),
            }
        }
    }

    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.stream_interval_ms.max(1))
    }
}
