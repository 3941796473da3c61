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

//! Turns raw device settings into a [`ScheduleDescriptor`].
//!
//! Values with the wrong shape disable their cadence. Values with the right
//! shape but an impossible day or month keep the cadence enabled and fall back
//! to 1 for the offending component.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::types::{DeviceSettings, ScheduleDescriptor, YearlyTarget};

static DAY_OF_MONTH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}$").expect("valid day-of-month pattern"));

static DATE_OF_YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{2}\.[0-9]{2}$").expect("valid date-of-year pattern"));

/// Resolve the cadences requested by a device
#[must_use]
pub fn resolve(settings: &DeviceSettings) -> ScheduleDescriptor {
    let monthly_target_day = settings
        .cost_calc_month
        .as_deref()
        .filter(|value| DAY_OF_MONTH_PATTERN.is_match(value))
        .map(check_day_parameter);

    let yearly_target = settings
        .cost_calc_year
        .as_deref()
        .filter(|value| DATE_OF_YEAR_PATTERN.is_match(value))
        .map(check_year_parameter);

    ScheduleDescriptor {
        daily_enabled: settings.cost_calc_day,
        monthly_target_day,
        yearly_target,
    }
}

/// Day of month in 1-31, otherwise 1
#[must_use]
pub fn check_day_parameter(day: &str) -> u32 {
    match day.parse::<u32>() {
        Ok(value) if (1..=31).contains(&value) => value,
        _ => {
            debug!(value = day, "Day out of range, using 1");
            1
        }
    }
}

/// Month in 1-12, otherwise 1
#[must_use]
pub fn check_month_parameter(month: &str) -> u32 {
    match month.parse::<u32>() {
        Ok(value) if (1..=12).contains(&value) => value,
        _ => {
            debug!(value = month, "Month out of range, using 1");
            1
        }
    }
}

/// Split a `DD.MM` value and check both parts independently
#[must_use]
pub fn check_year_parameter(day_month: &str) -> YearlyTarget {
    let (day, month) = day_month.split_once('.').unwrap_or((day_month, ""));
    YearlyTarget {
        day: check_day_parameter(day),
        month: check_month_parameter(month),
    }
}
