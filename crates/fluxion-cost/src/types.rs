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

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::calendar::subtract_calendar_unit;

/// Fixed-width timestamp format used for store queries and emitted records
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`
#[must_use]
pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Recurrence class of a cost report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Day,
    Month,
    Year,
}

impl Cadence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Day => "day",
            Cadence::Month => "month",
            Cadence::Year => "year",
        }
    }

    /// Routing key for the result sink, e.g. `washer_month`
    #[must_use]
    pub fn sink_key(self, device_name: &str) -> String {
        format!("{device_name}_{}", self.as_str())
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw per-device settings as found in the configuration file.
///
/// Deserialisation never fails on odd value types: the cadence fields are read
/// leniently and anything unusable is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Daily report requested (truthy value)
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub cost_calc_day: bool,

    /// Monthly report day as `"DD"`
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub cost_calc_month: Option<String>,

    /// Yearly report date as `"DD.MM"`
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub cost_calc_year: Option<String>,

    /// Seconds between two expected samples
    #[serde(default, deserialize_with = "deserialize_lenient_number")]
    pub update_time: Option<f64>,
}

/// A metered device together with its settings
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub name: String,
    pub settings: DeviceSettings,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, settings: DeviceSettings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Configured sample interval, if it is usable for rate calculations
    #[must_use]
    pub fn update_interval_secs(&self) -> Option<f64> {
        self.settings
            .update_time
            .filter(|secs| secs.is_finite() && *secs > 0.0)
    }
}

/// Day and month anchor of a yearly report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyTarget {
    pub day: u32,
    pub month: u32,
}

/// Normalised cadence settings of one device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleDescriptor {
    pub daily_enabled: bool,
    /// Day of month (1-31)
    pub monthly_target_day: Option<u32>,
    pub yearly_target: Option<YearlyTarget>,
}

impl ScheduleDescriptor {
    /// True if at least one cadence is enabled
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.daily_enabled || self.monthly_target_day.is_some() || self.yearly_target.is_some()
    }
}

/// Half-open interval `[start, end)` covering exactly one cadence unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub cadence_unit: Cadence,
}

impl AggregationWindow {
    /// Window of one cadence unit ending at `end`.
    ///
    /// Returns `None` only if the start falls outside the representable date range.
    #[must_use]
    pub fn ending_at(end: NaiveDateTime, cadence_unit: Cadence) -> Option<Self> {
        let start = subtract_calendar_unit(end, cadence_unit, 1)?;
        Some(Self {
            start,
            end,
            cadence_unit,
        })
    }

    #[must_use]
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    #[must_use]
    pub fn start_str(&self) -> String {
        format_timestamp(self.start)
    }

    #[must_use]
    pub fn end_str(&self) -> String {
        format_timestamp(self.end)
    }
}

/// A single raw measurement fetched from the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSample {
    /// Energy consumed since the previous sample (Wh)
    pub energy_wh: f64,
    /// False if the device could not be read for this sample
    pub fetch_success: bool,
}

/// Aggregated cost report for one device and one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub cadence: Cadence,
    pub start_date: String,
    pub end_date: String,
    /// Energy of successful samples (kWh, 2 decimals)
    pub sum_of_energy_kwh: f64,
    /// `sum_of_energy_kwh * cost_per_kwh`
    pub total_cost: f64,
    pub cost_per_kwh: f64,
    /// Percentage of fetched samples flagged as failed
    pub error_rate_missing: f64,
    /// Percentage of the expected timeline without a successful sample.
    /// Negative when more samples arrived than expected, `None` if not applicable.
    pub error_rate_coverage: Option<f64>,
}

fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => false,
        Value::Bool(flag) => flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    })
}

fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(Some(text)),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Ok(None)
        }
    }
}

fn deserialize_lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) => Ok(text.trim().parse::<f64>().ok()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => Ok(None),
    }
}
