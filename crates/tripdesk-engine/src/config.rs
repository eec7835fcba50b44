//! # Engine Configuration
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults            EngineConfig::default()                         │
//! │  2. Config file         tripdesk.toml (explicit path or platform dir)   │
//! │  3. Environment         TRIPDESK_* variables                            │
//! │  4. validate()          reject before anything is wired                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! | Variable                  | Overrides                       |
//! |---------------------------|---------------------------------|
//! | `TRIPDESK_COMPANY_ID`     | `company.id`                    |
//! | `TRIPDESK_ADVANCE_PERCENT`| `pricing.advance_percent`       |
//! | `TRIPDESK_DB_PATH`        | `database.path`                 |
//! | `TRIPDESK_NOTIFICATIONS`  | `notifications.enabled`         |
//! | `TRIPDESK_LOG`            | `logging.filter`                |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tripdesk_core::currency::RateTable;
use tripdesk_core::validation::validate_currency_code;
use tripdesk_core::{Percent, DEFAULT_ADVANCE_PERCENT, DEFAULT_COMPANY_ID};
use tripdesk_db::DbConfig;

use crate::error::{ConfigError, ConfigResult};

const CONFIG_FILE: &str = "tripdesk.toml";
const DATABASE_FILE: &str = "tripdesk.db";

// =============================================================================
// Sections
// =============================================================================

/// The company issuing quotes and receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySettings {
    /// Short code used in receipt numbers (`RCPT-{id}-000001`).
    #[serde(default = "default_company_id")]
    pub id: String,

    #[serde(default = "default_company_name")]
    pub name: String,
}

fn default_company_id() -> String {
    DEFAULT_COMPANY_ID.to_string()
}

fn default_company_name() -> String {
    "TripDesk".to_string()
}

impl Default for CompanySettings {
    fn default() -> Self {
        CompanySettings {
            id: default_company_id(),
            name: default_company_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Share of the booking total due as advance, 0-100.
    #[serde(default = "default_advance_percent")]
    pub advance_percent: u32,
}

fn default_advance_percent() -> u32 {
    DEFAULT_ADVANCE_PERCENT
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            advance_percent: default_advance_percent(),
        }
    }
}

/// One `[[rates]]` entry: `1 from = rate to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Recipients for events the back office must act on (submissions,
    /// booking requests, cancellation requests).
    #[serde(default = "default_staff_recipients")]
    pub staff_recipients: Vec<String>,

    /// Prefix for deep links, e.g. `https://desk.example.com`.
    #[serde(default)]
    pub link_base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_staff_recipients() -> Vec<String> {
    vec!["staff".to_string()]
}

impl Default for NotificationSettings {
    fn default() -> Self {
        NotificationSettings {
            enabled: true,
            staff_recipients: default_staff_recipients(),
            link_base_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. `None` uses the platform data directory; `:memory:`
    /// gives a throwaway database.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive string. `RUST_LOG` wins when set.
    #[serde(default = "default_filter")]
    pub filter: String,

    #[serde(default)]
    pub with_target: bool,
}

fn default_filter() -> String {
    "info,tripdesk=debug,sqlx=warn".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_filter(),
            with_target: false,
        }
    }
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Complete engine configuration.
///
/// ## Example Config File
/// ```toml
/// [company]
/// id = "GOA"
/// name = "Goa Holidays"
///
/// [pricing]
/// advance_percent = 25
///
/// [[rates]]
/// from = "USD"
/// to = "INR"
/// rate = "83.10"
///
/// [notifications]
/// staff_recipients = ["ops-desk", "accounts"]
/// link_base_url = "https://desk.goaholidays.in"
///
/// [database]
/// path = "/var/lib/tripdesk/tripdesk.db"
///
/// [logging]
/// filter = "info,tripdesk=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub company: CompanySettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub rates: Vec<RateEntry>,

    #[serde(default)]
    pub notifications: NotificationSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Loads defaults, then the config file, then `TRIPDESK_*` variables,
    /// then validates.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_path.or_else(Self::default_config_path) {
            Some(path) if path.exists() => {
                info!(?path, "Loading engine config from file");
                Self::from_file(&path)?
            }
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, toml::to_string_pretty(self)?)?;
        info!(?path, "Engine config saved");
        Ok(())
    }

    /// Applies overrides from `lookup` (the process environment in
    /// [`EngineConfig::load`]). Unparseable values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("TRIPDESK_COMPANY_ID") {
            debug!(company_id = %id, "Overriding company id from environment");
            self.company.id = id;
        }

        if let Some(percent) = lookup("TRIPDESK_ADVANCE_PERCENT") {
            match percent.parse::<u32>() {
                Ok(p) => self.pricing.advance_percent = p,
                Err(_) => warn!(value = %percent, "Ignoring invalid TRIPDESK_ADVANCE_PERCENT"),
            }
        }

        if let Some(path) = lookup("TRIPDESK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Some(enabled) = lookup("TRIPDESK_NOTIFICATIONS") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "on" => self.notifications.enabled = true,
                "0" | "false" | "off" => self.notifications.enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid TRIPDESK_NOTIFICATIONS"),
            }
        }

        if let Some(filter) = lookup("TRIPDESK_LOG") {
            self.logging.filter = filter;
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let id = self.company.id.trim();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::invalid(format!(
                "company.id must be non-empty and alphanumeric, got '{}'",
                self.company.id
            )));
        }

        if self.pricing.advance_percent > 100 {
            return Err(ConfigError::invalid(format!(
                "pricing.advance_percent must be 0-100, got {}",
                self.pricing.advance_percent
            )));
        }

        // Also checks each rate
        self.rate_table()?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid(
                "database.max_connections must be greater than 0",
            ));
        }

        if self.notifications.enabled && self.notifications.staff_recipients.is_empty() {
            return Err(ConfigError::invalid(
                "notifications.staff_recipients must not be empty when notifications are enabled",
            ));
        }

        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tripdesk", "tripdesk")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    // =========================================================================
    // Derived Values
    // =========================================================================

    pub fn advance_percent(&self) -> Percent {
        Percent::from_whole(self.pricing.advance_percent)
    }

    /// Builds the rate snapshot from `[[rates]]`.
    pub fn rate_table(&self) -> ConfigResult<RateTable> {
        let mut table = RateTable::new();
        for entry in &self.rates {
            validate_currency_code(&entry.from)
                .and_then(|_| validate_currency_code(&entry.to))
                .and_then(|_| table.set_rate(&entry.from, &entry.to, entry.rate))
                .map_err(|e| {
                    ConfigError::invalid(format!("rate {} -> {}: {}", entry.from, entry.to, e))
                })?;
        }
        Ok(table)
    }

    /// Database settings resolved against the platform data directory.
    pub fn database_config(&self) -> ConfigResult<DbConfig> {
        let path = match &self.database.path {
            Some(path) if path.as_os_str() == ":memory:" => return Ok(DbConfig::in_memory()),
            Some(path) => path.clone(),
            None => directories::ProjectDirs::from("com", "tripdesk", "tripdesk")
                .map(|dirs| dirs.data_dir().join(DATABASE_FILE))
                .ok_or(ConfigError::NoConfigPath)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        Ok(DbConfig::new(path).max_connections(self.database.max_connections))
    }
}
