use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::{tlog_debug, Error, Result};

/// Default queue location, relative to the working directory external workers run in.
pub const DEFAULT_QUEUE_DIR: &str = ".agent-comms/task-queue";

/// Average minutes a worker spends on one queued subtask.
pub const DEFAULT_MINUTES_PER_TASK: f64 = 7.5;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub queue_dir: Option<String>,
    /// Reject batches containing a dependency cycle instead of warning.
    #[serde(default)]
    pub strict_cycles: bool,
    pub minutes_per_task: Option<f64>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub complexity: ComplexityConfig,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

/// Classifier scoring weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub keyword_weight: u32,
    pub pattern_weight: u32,
    /// Fraction of the top score a capability needs to be co-selected.
    pub multi_select_ratio: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 2,
            pattern_weight: 5,
            multi_select_ratio: 0.8,
        }
    }
}

/// Length thresholds for the complexity assessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    pub mega_length: usize,
    pub multi_length: usize,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            mega_length: 150,
            multi_length: 80,
        }
    }
}

/// A user-defined capability profile. Replaces a built-in of the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    pub tier: Option<u8>,
}

impl Config {
    pub fn taskmaster_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".taskmaster"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::taskmaster_dir()?.join("taskmaster.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::taskmaster_dir()?.join("taskmaster.log"))
    }

    pub fn effective_queue_dir(&self) -> PathBuf {
        match &self.queue_dir {
            Some(dir) => expand_tilde(dir),
            None => PathBuf::from(DEFAULT_QUEUE_DIR),
        }
    }

    pub fn effective_minutes_per_task(&self) -> f64 {
        self.minutes_per_task.unwrap_or(DEFAULT_MINUTES_PER_TASK)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            tlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tlog_debug!(
            "Config loaded: queue_dir={:?}, strict_cycles={}, profiles={}",
            config.queue_dir,
            config.strict_cycles,
            config.profiles.len()
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::taskmaster_dir()?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        let path = Self::config_path()?;
        fs::write(&path, toml::to_string_pretty(self)?)?;
        tlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    /// Check numeric settings that would make routing or estimates meaningless.
    pub fn validate(&self) -> Result<()> {
        let ratio = self.routing.multi_select_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::Validation(format!(
                "routing.multi_select_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        if self.complexity.multi_length > self.complexity.mega_length {
            return Err(Error::Validation(format!(
                "complexity.multi_length ({}) exceeds mega_length ({})",
                self.complexity.multi_length, self.complexity.mega_length
            )));
        }
        if let Some(minutes) = self.minutes_per_task {
            if minutes < 0.0 {
                return Err(Error::Validation(format!(
                    "minutes_per_task must not be negative, got {}",
                    minutes
                )));
            }
        }
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
