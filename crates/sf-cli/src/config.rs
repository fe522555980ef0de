//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use sf_core::{DEFAULT_SHIFT_MINUTES, MetricsConfig};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Shift length used as the denominator of workstation utilization.
    pub shift_minutes: i64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("shopfloor.db"),
            shift_minutes: DEFAULT_SHIFT_MINUTES,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // SF_DATABASE_PATH, SF_SHIFT_MINUTES
        figment = figment.merge(Env::prefixed("SF_"));

        figment.extract()
    }

    /// Settings consumed by the metrics engine.
    pub const fn metrics(&self) -> MetricsConfig {
        MetricsConfig {
            shift_minutes: self.shift_minutes,
        }
    }
}

/// Returns the platform-specific config directory for shopfloor.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("shopfloor"))
}

/// Returns the platform-specific data directory for shopfloor.
///
/// On Linux: `~/.local/share/shopfloor`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("shopfloor"))
}
