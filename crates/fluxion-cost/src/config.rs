// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Configuration collaborators: price per kWh, daily request time and the
//! device list.
//!
//! Price and request time never fail. Every defect falls back to a documented
//! default and is reported once per [`WarningState`].

use std::collections::{BTreeMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::aggregate::round_to;
use crate::error::{CostError, Result};
use crate::types::{DeviceConfig, DeviceSettings};

/// Price used when none could be read from the configuration
pub const DEFAULT_PRICE_PER_KWH: f64 = 0.30;

/// Request time used when none could be read from the configuration
pub const DEFAULT_REQUEST_TIME: &str = "00:00";

static TIME_OF_DAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time-of-day pattern")
});

/// Source of the general cost settings
pub trait ConfigProvider: Send + Sync {
    /// Price per kWh, rounded to 3 decimals
    fn price_per_kwh(&self) -> f64;

    /// Time of day (`HH:MM`) at which reports are computed
    fn request_time(&self) -> String;
}

impl<T: ConfigProvider + ?Sized> ConfigProvider for Box<T> {
    fn price_per_kwh(&self) -> f64 {
        (**self).price_per_kwh()
    }

    fn request_time(&self) -> String {
        (**self).request_time()
    }
}

/// Kinds of configuration defects that are reported once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigDefect {
    FileNotFound,
    Unreadable,
    MissingPrice,
    InvalidPrice,
}

impl std::fmt::Display for ConfigDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigDefect::FileNotFound => "file_not_found",
            ConfigDefect::Unreadable => "unreadable",
            ConfigDefect::MissingPrice => "missing_price",
            ConfigDefect::InvalidPrice => "invalid_price",
        };
        f.write_str(name)
    }
}

/// Remembers which configuration defects were already logged
#[derive(Debug, Default)]
pub struct WarningState {
    reported: Mutex<HashSet<ConfigDefect>>,
}

impl WarningState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` unless `defect` was already reported. Returns true if logged.
    pub fn warn_once(&self, defect: ConfigDefect, message: &str) -> bool {
        let first = self.reported.lock().insert(defect);
        if first {
            warn!(defect = %defect, "{message}");
        }
        first
    }

    #[must_use]
    pub fn was_reported(&self, defect: ConfigDefect) -> bool {
        self.reported.lock().contains(&defect)
    }
}

/// Reads the `general` section of a JSON configuration file on every call
#[derive(Debug)]
pub struct JsonFileConfig {
    path: PathBuf,
    warnings: WarningState,
}

impl JsonFileConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            warnings: WarningState::new(),
        }
    }

    #[must_use]
    pub fn warnings(&self) -> &WarningState {
        &self.warnings
    }

    /// The `general` section (`Null` if absent), or `None` after reporting why
    /// the file is unavailable
    fn general_section(&self) -> Option<Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.warnings.warn_once(
                    ConfigDefect::FileNotFound,
                    &format!(
                        "Configuration file {} not found, using default values: {err}",
                        self.path.display()
                    ),
                );
                return None;
            }
            Err(err) => {
                self.warnings.warn_once(
                    ConfigDefect::Unreadable,
                    &format!(
                        "Configuration file {} could not be read, using default values: {err}",
                        self.path.display()
                    ),
                );
                return None;
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(mut data) => Some(
                data.get_mut("general")
                    .map(Value::take)
                    .unwrap_or(Value::Null),
            ),
            Err(err) => {
                self.warnings.warn_once(
                    ConfigDefect::Unreadable,
                    &format!(
                        "Configuration file {} is not valid JSON, using default values: {err}",
                        self.path.display()
                    ),
                );
                None
            }
        }
    }
}

impl ConfigProvider for JsonFileConfig {
    fn price_per_kwh(&self) -> f64 {
        let Some(general) = self.general_section() else {
            return DEFAULT_PRICE_PER_KWH;
        };

        let Some(raw) = general.get("price_kwh") else {
            self.warnings.warn_once(
                ConfigDefect::MissingPrice,
                &format!("No price_kwh configured, assuming {DEFAULT_PRICE_PER_KWH:.2} per kWh"),
            );
            return DEFAULT_PRICE_PER_KWH;
        };

        if let Some(price) = parse_price(raw) {
            round_to(price, 3)
        } else {
            self.warnings.warn_once(
                ConfigDefect::InvalidPrice,
                &format!(
                    "The price_kwh setting {raw} is not a number, assuming {DEFAULT_PRICE_PER_KWH:.2} per kWh"
                ),
            );
            DEFAULT_PRICE_PER_KWH
        }
    }

    fn request_time(&self) -> String {
        let requested = self.general_section().and_then(|general| {
            general
                .get("cost_calc_request_time")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

        match requested {
            Some(time) if TIME_OF_DAY_PATTERN.is_match(&time) => time,
            Some(time) => {
                debug!(value = %time, "Ignoring malformed cost_calc_request_time");
                DEFAULT_REQUEST_TIME.to_owned()
            }
            None => DEFAULT_REQUEST_TIME.to_owned(),
        }
    }
}

/// Fixed settings, e.g. from command line overrides
#[derive(Debug, Clone)]
pub struct StaticConfig {
    pub price_per_kwh: f64,
    pub request_time: String,
}

impl StaticConfig {
    pub fn new(price_per_kwh: f64) -> Self {
        Self {
            price_per_kwh: round_to(price_per_kwh, 3),
            request_time: DEFAULT_REQUEST_TIME.to_owned(),
        }
    }
}

impl ConfigProvider for StaticConfig {
    fn price_per_kwh(&self) -> f64 {
        self.price_per_kwh
    }

    fn request_time(&self) -> String {
        self.request_time.clone()
    }
}

/// Fixed price on top of another provider's request time
#[derive(Debug)]
pub struct PriceOverride<C> {
    price_per_kwh: f64,
    inner: C,
}

impl<C: ConfigProvider> PriceOverride<C> {
    pub fn new(price_per_kwh: f64, inner: C) -> Self {
        Self {
            price_per_kwh: round_to(price_per_kwh, 3),
            inner,
        }
    }
}

impl<C: ConfigProvider> ConfigProvider for PriceOverride<C> {
    fn price_per_kwh(&self) -> f64 {
        self.price_per_kwh
    }

    fn request_time(&self) -> String {
        self.inner.request_time()
    }
}

/// Accepts numbers and numeric strings, the latter also with a decimal comma
fn parse_price(raw: &Value) -> Option<f64> {
    let price = match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().replace(',', ".").parse::<f64>().ok(),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };
    price.filter(|value| value.is_finite())
}

#[derive(Debug, Deserialize)]
struct DevicesFile {
    #[serde(default)]
    devices: BTreeMap<String, DeviceSettings>,
}

/// Load the `devices` section of the configuration file
pub fn load_devices<P: AsRef<Path>>(path: P) -> Result<Vec<DeviceConfig>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let file: DevicesFile = serde_json::from_str(&content).map_err(|err| {
        CostError::Config(format!(
            "Failed to parse device settings in {}: {err}",
            path.display()
        ))
    })?;

    Ok(file
        .devices
        .into_iter()
        .map(|(name, settings)| DeviceConfig::new(name, settings))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn general(value: &Value) -> NamedTempFile {
        config_file(&json!({ "general": value }).to_string())
    }

    #[test]
    fn test_price_from_number() {
        let file = general(&json!({ "price_kwh": 0.31749 }));
        let config = JsonFileConfig::new(file.path());
        assert!((config.price_per_kwh() - 0.317).abs() < 1e-12);
    }

    #[test]
    fn test_price_from_string_with_decimal_comma() {
        let file = general(&json!({ "price_kwh": "0,35" }));
        let config = JsonFileConfig::new(file.path());
        assert!((config.price_per_kwh() - 0.35).abs() < 1e-12);
    }

    #[test]
    fn test_price_from_integer() {
        let file = general(&json!({ "price_kwh": 1 }));
        let config = JsonFileConfig::new(file.path());
        assert!((config.price_per_kwh() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_price_exact_half_rounds_to_even() {
        let file = general(&json!({ "price_kwh": 0.3125 }));
        let config = JsonFileConfig::new(file.path());
        assert!((config.price_per_kwh() - 0.312).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_price_defaults_and_warns_once() {
        let file = general(&json!({ "price_kwh": "cheap" }));
        let config = JsonFileConfig::new(file.path());

        assert!((config.price_per_kwh() - DEFAULT_PRICE_PER_KWH).abs() < 1e-12);
        assert!(config.warnings().was_reported(ConfigDefect::InvalidPrice));
        assert!(
            !config
                .warnings()
                .warn_once(ConfigDefect::InvalidPrice, "repeated")
        );
        assert!((config.price_per_kwh() - DEFAULT_PRICE_PER_KWH).abs() < 1e-12);
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = JsonFileConfig::new(dir.path().join("missing.json"));

        assert!((config.price_per_kwh() - DEFAULT_PRICE_PER_KWH).abs() < 1e-12);
        assert_eq!(config.request_time(), DEFAULT_REQUEST_TIME);
        assert!(config.warnings().was_reported(ConfigDefect::FileNotFound));
        assert!(!config.warnings().was_reported(ConfigDefect::InvalidPrice));
    }

    #[test]
    fn test_malformed_json_defaults() {
        let file = config_file("{ not json");
        let config = JsonFileConfig::new(file.path());

        assert!((config.price_per_kwh() - DEFAULT_PRICE_PER_KWH).abs() < 1e-12);
        assert!(config.warnings().was_reported(ConfigDefect::Unreadable));
    }

    #[test]
    fn test_missing_price_key_defaults() {
        let file = general(&json!({}));
        let config = JsonFileConfig::new(file.path());

        assert!((config.price_per_kwh() - DEFAULT_PRICE_PER_KWH).abs() < 1e-12);
        assert!(config.warnings().was_reported(ConfigDefect::MissingPrice));
    }

    #[test]
    fn test_request_time() {
        let file = general(&json!({ "cost_calc_request_time": "06:30" }));
        assert_eq!(JsonFileConfig::new(file.path()).request_time(), "06:30");

        for invalid in ["24:00", "6:30", "06:60", "noon"] {
            let file = general(&json!({ "cost_calc_request_time": invalid }));
            assert_eq!(
                JsonFileConfig::new(file.path()).request_time(),
                DEFAULT_REQUEST_TIME,
                "{invalid}"
            );
        }
    }

    #[test]
    fn test_warning_state_is_per_kind() {
        let state = WarningState::new();
        assert!(state.warn_once(ConfigDefect::FileNotFound, "first"));
        assert!(!state.warn_once(ConfigDefect::FileNotFound, "second"));
        assert!(state.warn_once(ConfigDefect::InvalidPrice, "other kind"));
    }

    #[test]
    fn test_load_devices() {
        let file = config_file(
            &json!({
                "general": { "price_kwh": 0.3 },
                "devices": {
                    "washer": { "cost_calc_day": true, "update_time": 60 },
                    "dryer": { "cost_calc_month": "31" }
                }
            })
            .to_string(),
        );

        let devices = load_devices(file.path()).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "dryer");
        assert_eq!(devices[0].settings.cost_calc_month.as_deref(), Some("31"));
        assert_eq!(devices[1].name, "washer");
        assert!(devices[1].settings.cost_calc_day);
    }

    #[test]
    fn test_load_devices_rejects_invalid_json() {
        let file = config_file("[");
        assert!(load_devices(file.path()).is_err());
    }

    #[test]
    fn test_price_override_rereads_request_time() {
        let file = general(&json!({ "price_kwh": 0.3, "cost_calc_request_time": "06:30" }));
        let config = PriceOverride::new(0.4375, JsonFileConfig::new(file.path()));

        assert!((config.price_per_kwh() - 0.438).abs() < 1e-12);
        assert_eq!(config.request_time(), "06:30");

        std::fs::write(
            file.path(),
            json!({ "general": { "cost_calc_request_time": "07:15" } }).to_string(),
        )
        .unwrap();
        assert_eq!(config.request_time(), "07:15");
        assert!((config.price_per_kwh() - 0.438).abs() < 1e-12);
    }

    #[test]
    fn test_static_config_rounds_price() {
        let config = StaticConfig::new(0.12345);
        assert!((config.price_per_kwh() - 0.123).abs() < 1e-12);
        assert_eq!(config.request_time(), DEFAULT_REQUEST_TIME);
    }
}
