use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the process inventory engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of per-process gathers in flight
    pub max_concurrent: usize,
    /// Overall time budget for one process gather
    pub process_timeout_ms: u64,
    /// Sub-budget for the CPU sample inside a gather
    pub cpu_timeout_ms: u64,
    /// Period of the background refresh while the view is active
    pub refresh_interval_secs: u64,
    /// More added or removed processes than this produce a full event
    pub full_refresh_threshold: usize,
    pub cpu_change_threshold: f64,
    pub memory_change_threshold: f32,
    /// Name substrings that identify a zombie without reading its status
    pub zombie_name_patterns: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 15,
            process_timeout_ms: 150,
            cpu_timeout_ms: 5,
            refresh_interval_secs: 10,
            full_refresh_threshold: 50,
            cpu_change_threshold: 1.0,
            memory_change_threshold: 0.5,
            zombie_name_patterns: vec!["<defunct>".to_string(), "(defunct)".to_string()],
        }
    }
}

impl EngineConfig {
    /// Load the config from `path`.
    ///
    /// A missing file yields the defaults. An empty or unreadable JSON document
    /// also falls back to the defaults so a broken file never blocks startup.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = serde_json::from_str::<Self>(&data).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid config file {:?}: {}", path, e);
            Self::default()
        });

        config.validate()?;
        Ok(config)
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path, data).with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("procwatch").join("config.json"))
    }

    /// Reject values that would stall or disable the refresh cycle
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            bail!("max_concurrent must be at least 1");
        }
        if self.process_timeout_ms == 0 || self.cpu_timeout_ms == 0 {
            bail!("gather timeouts must be greater than zero");
        }
        if self.refresh_interval_secs == 0 {
            bail!("refresh_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    pub fn cpu_timeout(&self) -> Duration {
        Duration::from_millis(self.cpu_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}
