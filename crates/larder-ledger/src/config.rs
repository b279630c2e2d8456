//! # Ledger Configuration
//!
//! Environment variables (`LARDER_DB_PATH`, `LARDER_STATUS_POLICY`, ...)
//! override `larder.toml` in the platform config directory, which overrides
//! the defaults.
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "larder.db"
//! max_connections = 5
//!
//! [ledger]
//! status_policy = "threshold_aware"   # literal | threshold_aware
//! revision_window_days = 30
//! utc_offset_minutes = 60
//! max_conflict_retries = 3
//!
//! [reports]
//! low_stock_ratio = 0.2
//! usage_top_n = 10
//! ```

use larder_core::report::ReportSettings;
use larder_core::revision::{RevisionPolicy, DEFAULT_UTC_OFFSET_MINUTES, DEFAULT_WINDOW_DAYS};
use larder_core::rules::StatusPolicy;
use larder_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, LedgerResult};

/// Largest accepted UTC offset, in minutes.
const MAX_OFFSET_MINUTES: i32 = 18 * 60;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path. `:memory:` for a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("larder.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default)]
    pub status_policy: StatusPolicy,

    /// Days after which a transaction can no longer be revised.
    #[serde(default = "default_window_days")]
    pub revision_window_days: i64,

    /// Offset used for calendar-day math and report windows.
    #[serde(default = "default_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Retries of a unit of work that lost a version race.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn default_max_conflict_retries() -> u32 {
    3
}

impl Default for LedgerSettings {
    fn default() -> Self {
        LedgerSettings {
            status_policy: StatusPolicy::default(),
            revision_window_days: default_window_days(),
            utc_offset_minutes: default_offset_minutes(),
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

// =============================================================================
// Report Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsSettings {
    /// Equipment is low at or below this available/total ratio.
    #[serde(default = "default_low_stock_ratio")]
    pub low_stock_ratio: f64,

    /// Entries in the usage report.
    #[serde(default = "default_usage_top_n")]
    pub usage_top_n: usize,
}

fn default_low_stock_ratio() -> f64 {
    0.2
}

fn default_usage_top_n() -> usize {
    10
}

impl Default for ReportsSettings {
    fn default() -> Self {
        ReportsSettings {
            low_stock_ratio: default_low_stock_ratio(),
            usage_top_n: default_usage_top_n(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,

    #[serde(default)]
    pub reports: ReportsSettings,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`larder.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.ledger.revision_window_days <= 0 {
            return Err(LedgerError::Config(
                "revision_window_days must be greater than 0".into(),
            ));
        }

        if self.ledger.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(LedgerError::Config(format!(
                "utc_offset_minutes must be within ±{}, got {}",
                MAX_OFFSET_MINUTES, self.ledger.utc_offset_minutes
            )));
        }

        let ratio = self.reports.low_stock_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(LedgerError::Config(format!(
                "low_stock_ratio must be in (0, 1], got {}",
                ratio
            )));
        }

        if self.reports.usage_top_n == 0 {
            return Err(LedgerError::Config(
                "usage_top_n must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(LedgerError::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("LARDER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(policy) = std::env::var("LARDER_STATUS_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding status policy from environment");
                    self.ledger.status_policy = parsed;
                }
                Err(_) => warn!(policy = %policy, "Unknown status policy in environment"),
            }
        }

        if let Ok(days) = std::env::var("LARDER_REVISION_WINDOW_DAYS") {
            if let Ok(d) = days.parse::<i64>() {
                self.ledger.revision_window_days = d;
            }
        }

        if let Ok(offset) = std::env::var("LARDER_UTC_OFFSET_MINUTES") {
            if let Ok(m) = offset.parse::<i32>() {
                self.ledger.utc_offset_minutes = m;
            }
        }

        if let Ok(retries) = std::env::var("LARDER_MAX_CONFLICT_RETRIES") {
            if let Ok(r) = retries.parse::<u32>() {
                self.ledger.max_conflict_retries = r;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "larder", "larder")
            .map(|dirs| dirs.config_dir().join("larder.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Revision policy for these settings.
    pub fn revision_policy(&self) -> LedgerResult<RevisionPolicy> {
        Ok(RevisionPolicy::new(
            self.ledger.revision_window_days,
            self.ledger.utc_offset_minutes,
        )?)
    }

    /// Report thresholds for these settings.
    pub fn report_settings(&self) -> ReportSettings {
        ReportSettings {
            low_stock_ratio: self.reports.low_stock_ratio,
            usage_top_n: self.reports.usage_top_n,
        }
    }
}
