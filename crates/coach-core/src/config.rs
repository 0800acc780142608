use anyhow::{Context, Result};
use coach_storage::models::AiConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the local data directory for coach.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("coach");
    Ok(path)
}

/// Tunables for the coaching loop, stored as TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Seconds between signal samples
    pub sample_interval_secs: u64,
    /// Seconds between coaching decisions
    pub decision_interval_secs: u64,
    /// Consecutive Focused snapshots that count as deep focus
    pub deep_focus_window: u32,
    /// Ignored suggestions after which the coach stays silent
    pub ignore_threshold: u32,
    pub force_break_minutes: u32,
    pub suggested_break_minutes: u32,
    pub advisory_timeout_secs: u64,
    /// Extra advisory attempts after a failure; never more than one
    pub advisory_retries: u32,
    /// Readings below this confidence may be replaced by a recent measured one
    pub min_confidence: f32,
    pub carry_forward_secs: i64,
    /// Snapshots considered when computing the fatigue trend
    pub trend_window: usize,
    /// Count a suggestion still unanswered at the next decision as ignored
    pub expire_unanswered_suggestions: bool,
    pub ai: AiConfig,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 10,
            decision_interval_secs: 30,
            deep_focus_window: 3,
            ignore_threshold: 3,
            force_break_minutes: 10,
            suggested_break_minutes: 5,
            advisory_timeout_secs: 8,
            advisory_retries: 1,
            min_confidence: 0.6,
            carry_forward_secs: 300,
            trend_window: 6,
            expire_unanswered_suggestions: true,
            ai: AiConfig::default(),
        }
    }
}

impl CoachConfig {
    /// Default location of the config file
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(get_data_dir()?.join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path, falling back to defaults when absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Write to the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write to an explicit path, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config {}", path.display()))?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }

    #[must_use]
    pub const fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    #[must_use]
    pub const fn decision_interval(&self) -> Duration {
        Duration::from_secs(self.decision_interval_secs)
    }

    #[must_use]
    pub const fn advisory_timeout(&self) -> Duration {
        Duration::from_secs(self.advisory_timeout_secs)
    }

    /// Total advisory attempts per decision (first call plus at most one retry)
    #[must_use]
    pub fn advisory_attempts(&self) -> u32 {
        1 + self.advisory_retries.min(1)
    }

    #[must_use]
    pub fn carry_forward(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.carry_forward_secs)
    }
}
