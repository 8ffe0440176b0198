//! Ledger settings loading from config.toml
//!
//! This module loads the tunables of the ledger from a TOML configuration file.
//! Every field has a default, so a missing file or a partial file is valid; only
//! unreadable or malformed files are errors.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Ledger rules
    #[serde(default)]
    pub ledger: LedgerSettings,
    /// Notification fan-out
    #[serde(default)]
    pub notifications: NotificationSettings,
}

/// Business rules of the balance ledger and refund workflow
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// Smallest balance request a reseller may submit
    #[serde(default = "default_reseller_min_demande")]
    pub reseller_min_demande: f64,
    /// Supplier tag written on codes restored by a refund
    #[serde(default = "default_return_supplier")]
    pub return_supplier: String,
}

/// Settings for the in-process notification channel
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    /// Capacity of the broadcast channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

const fn default_reseller_min_demande() -> f64 {
    150.0
}

fn default_return_supplier() -> String {
    "(Retour)".to_string()
}

const fn default_channel_capacity() -> usize {
    1024
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            reseller_min_demande: default_reseller_min_demande(),
            return_supplier: default_return_supplier(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if !settings.ledger.reseller_min_demande.is_finite()
        || settings.ledger.reseller_min_demande < 0.0
    {
        return Err(Error::Config {
            message: "reseller_min_demande must be a non-negative number".to_string(),
        });
    }
    if settings.notifications.channel_capacity == 0 {
        return Err(Error::Config {
            message: "channel_capacity must be greater than zero".to_string(),
        });
    }

    Ok(settings)
}

/// Loads settings from a TOML file, using defaults when the file does not exist.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The TOML syntax is invalid or a value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = ?path, "No settings file found, using defaults");
        return Ok(Settings::default());
    }

    debug!(path = ?path, "Loading settings");
    let contents = std::fs::read_to_string(path)?;
    parse_settings(&contents)
}

/// Loads settings from the default location (./config.toml)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("config.toml")
}
