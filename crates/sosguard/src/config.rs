//! Configuration management for sosguard.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::dispatch::{ContactDirectory, EmergencyContact};
use crate::error::{Error, Result};
use crate::location::Location;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "sosguard";

/// Longest accepted countdown tick, in milliseconds.
pub const MAX_TICK_INTERVAL_MS: u64 = 60_000;

/// Most ticks accepted for any single countdown or window.
pub const MAX_TICKS: u32 = 86_400;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SOSGUARD_`, sections split on `__`)
/// 2. TOML config file at `~/.config/sosguard/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Escalation timing.
    pub escalation: EscalationConfig,
    /// Who gets alerted.
    pub contacts: ContactsConfig,
    /// Fixed location to attach to alerts, if no live provider is wired in.
    pub location: Option<LocationConfig>,
    /// Emergency log retention.
    pub history: HistoryConfig,
}

/// Escalation timing, in ticks of `tick_interval_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Length of one countdown tick in milliseconds.
    pub tick_interval_ms: u64,
    /// Ticks before the first alert is sent.
    pub arming_ticks: u32,
    /// Ticks to wait for acknowledgement after each alert.
    pub acknowledgement_ticks: u32,
    /// Ticks between an unanswered alert and the next one.
    pub retry_ticks: u32,
}

/// Emergency contacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsConfig {
    /// Emergency services.
    pub authorities: Vec<EmergencyContact>,
    /// Personal contacts.
    pub personal: Vec<EmergencyContact>,
}

/// A fixed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Optional place name.
    #[serde(default)]
    pub label: Option<String>,
}

/// Emergency log configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of log entries kept in memory.
    pub limit: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            arming_ticks: 5,
            acknowledgement_ticks: 5,
            retry_ticks: 30,
        }
    }
}

impl Default for ContactsConfig {
    fn default() -> Self {
        Self {
            authorities: default_authorities(),
            personal: Vec::new(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { limit: 50 }
    }
}

/// Default emergency services.
fn default_authorities() -> Vec<EmergencyContact> {
    vec![
        EmergencyContact::authority("Police", "100"),
        EmergencyContact::authority("Ambulance", "108"),
        EmergencyContact::authority("Fire", "101"),
    ]
}

impl EscalationConfig {
    /// Length of one countdown tick.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Wall-clock length of `ticks` ticks, saturating instead of overflowing.
    #[must_use]
    pub fn span(&self, ticks: u32) -> Duration {
        self.tick_interval().saturating_mul(ticks)
    }

    /// How long to wait for acknowledgement after each alert.
    #[must_use]
    pub fn acknowledgement_window(&self) -> Duration {
        self.span(self.acknowledgement_ticks)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment =
            Self::file_figment(&config_file).merge(Env::prefixed("SOSGUARD_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the TOML file, without the environment layer.
    fn file_figment(config_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let escalation = &self.escalation;
        for (name, value) in [
            ("tick_interval_ms", escalation.tick_interval_ms),
            ("arming_ticks", u64::from(escalation.arming_ticks)),
            (
                "acknowledgement_ticks",
                u64::from(escalation.acknowledgement_ticks),
            ),
            ("retry_ticks", u64::from(escalation.retry_ticks)),
        ] {
            if value == 0 {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be greater than 0"),
                });
            }
        }

        if escalation.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(Error::ConfigValidation {
                message: format!("tick_interval_ms must be at most {MAX_TICK_INTERVAL_MS}"),
            });
        }
        for (name, ticks) in [
            ("arming_ticks", escalation.arming_ticks),
            ("acknowledgement_ticks", escalation.acknowledgement_ticks),
            ("retry_ticks", escalation.retry_ticks),
        ] {
            if ticks > MAX_TICKS {
                return Err(Error::ConfigValidation {
                    message: format!("{name} must be at most {MAX_TICKS}"),
                });
            }
        }

        if self.history.limit == 0 {
            return Err(Error::ConfigValidation {
                message: "history.limit must be greater than 0".to_string(),
            });
        }

        if let Some(loc) = &self.location {
            Location::new(loc.latitude, loc.longitude, loc.label.clone()).map_err(|e| {
                Error::ConfigValidation {
                    message: e.to_string(),
                }
            })?;
        }

        for contact in self.contacts.authorities.iter().chain(&self.contacts.personal) {
            if contact.number.trim().is_empty() {
                return Err(Error::ConfigValidation {
                    message: format!("contact '{}' has no number", contact.name),
                });
            }
        }

        Ok(())
    }

    /// All configured contacts as a directory, authorities first.
    #[must_use]
    pub fn contact_directory(&self) -> ContactDirectory {
        ContactDirectory::new(
            self.contacts
                .authorities
                .iter()
                .chain(&self.contacts.personal)
                .cloned()
                .collect(),
        )
    }

    /// The configured fixed location, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinates are out of range.
    pub fn fixed_location(&self) -> Result<Option<Location>> {
        self.location
            .as_ref()
            .map(|loc| Location::new(loc.latitude, loc.longitude, loc.label.clone()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_escalation_config() {
        let escalation = EscalationConfig::default();
        assert_eq!(escalation.tick_interval_ms, 1_000);
        assert_eq!(escalation.arming_ticks, 5);
        assert_eq!(escalation.acknowledgement_ticks, 5);
        assert_eq!(escalation.retry_ticks, 30);
    }

    #[test]
    fn test_acknowledgement_window() {
        let escalation = EscalationConfig::default();
        assert_eq!(escalation.tick_interval(), Duration::from_secs(1));
        assert_eq!(escalation.acknowledgement_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_contacts() {
        let contacts = ContactsConfig::default();
        assert_eq!(contacts.authorities.len(), 3);
        assert!(contacts.personal.is_empty());
        assert!(contacts
            .authorities
            .iter()
            .any(|c| c.name == "Ambulance" && c.number == "108"));
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_retry_ticks() {
        let mut config = Config::default();
        config.escalation.retry_ticks = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("retry_ticks"));
    }

    #[test]
    fn test_validate_zero_tick_interval() {
        let mut config = Config::default();
        config.escalation.tick_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("tick_interval_ms"));
    }

    #[test]
    fn test_validate_oversized_timing() {
        let mut config = Config::default();
        config.escalation.tick_interval_ms = u64::MAX;
        config.escalation.arming_ticks = u32::MAX;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("tick_interval_ms"));

        config.escalation.tick_interval_ms = MAX_TICK_INTERVAL_MS;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("arming_ticks"));

        config.escalation.arming_ticks = MAX_TICKS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_span_saturates() {
        let escalation = EscalationConfig {
            tick_interval_ms: u64::MAX,
            arming_ticks: u32::MAX,
            ..EscalationConfig::default()
        };
        assert_eq!(escalation.span(escalation.arming_ticks), Duration::MAX);
        assert_eq!(EscalationConfig::default().span(30), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_zero_history_limit() {
        let mut config = Config::default();
        config.history.limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_location() {
        let mut config = Config::default();
        config.location = Some(LocationConfig {
            latitude: 120.0,
            longitude: 0.0,
            label: None,
        });

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid location"));
    }

    #[test]
    fn test_validate_empty_contact_number() {
        let mut config = Config::default();
        config
            .contacts
            .personal
            .push(EmergencyContact::personal("Asha", " ", true));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contact_directory_order() {
        let mut config = Config::default();
        config
            .contacts
            .personal
            .push(EmergencyContact::personal("Asha", "123", false));

        let directory = config.contact_directory();
        assert_eq!(directory.contacts().len(), 4);
        assert_eq!(directory.contacts()[3].name, "Asha");
    }

    #[test]
    fn test_fixed_location() {
        let mut config = Config::default();
        assert!(config.fixed_location().unwrap().is_none());

        config.location = Some(LocationConfig {
            latitude: 9.93,
            longitude: 76.26,
            label: Some("Kochi".to_string()),
        });
        let loc = config.fixed_location().unwrap().unwrap();
        assert_eq!(loc.label.as_deref(), Some("Kochi"));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("sosguard"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config: Config = Config::file_figment(Path::new("/nonexistent/config.toml"))
            .extract()
            .unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
[escalation]
retry_ticks = 10

[[contacts.personal]]
name = "Asha"
number = "+91-98470-00001"
kind = "personal"
primary = false
"#,
            )?;

            let config = Config::load_from(Some(PathBuf::from("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.escalation.retry_ticks, 10);
            assert_eq!(config.contacts.personal.len(), 1);
            assert!(!config.contacts.personal[0].primary);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[escalation]\nretry_ticks = 10\n")?;
            jail.set_env("SOSGUARD_ESCALATION__RETRY_TICKS", 12);
            jail.set_env("SOSGUARD_HISTORY__LIMIT", 7);

            let config = Config::load_from(Some(PathBuf::from("config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.escalation.retry_ticks, 12);
            assert_eq!(config.history.limit, 7);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_oversized_env_value() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("SOSGUARD_ESCALATION__TICK_INTERVAL_MS", u64::MAX);
            let result = Config::load_from(Some(PathBuf::from("missing.toml")));
            assert!(matches!(result, Err(Error::ConfigValidation { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_escalation_config_deserialize() {
        let json = r#"{"arming_ticks": 3}"#;
        let escalation: EscalationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(escalation.arming_ticks, 3);
        assert_eq!(escalation.retry_ticks, 30);
    }

    #[test]
    fn test_config_clone() {
        let config = Config::default();
        let cloned = config.clone();
        assert_eq!(config, cloned);
    }
}
