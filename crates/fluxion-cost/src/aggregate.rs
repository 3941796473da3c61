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

//! Aggregation of raw samples into a cost record.

use crate::types::{AggregationWindow, CostRecord, DeviceConfig, MeasurementSample};

/// Round to `decimals` places, exact halves to the even neighbour
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Aggregate the samples of one window.
///
/// Returns `None` if the window contains no samples at all. Failed samples
/// contribute no energy but count towards the missing-data rate.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn aggregate(
    device: &DeviceConfig,
    window: &AggregationWindow,
    samples: &[MeasurementSample],
    price_per_kwh: f64,
) -> Option<CostRecord> {
    let (successful, failed): (Vec<&MeasurementSample>, Vec<&MeasurementSample>) =
        samples.iter().partition(|sample| sample.fetch_success);

    let fetched_count = successful.len() + failed.len();
    if fetched_count == 0 {
        return None;
    }

    let energy_wh: f64 = successful.iter().map(|sample| sample.energy_wh).sum();
    let sum_of_energy_kwh = round_to(energy_wh / 1000.0, 2);

    let error_rate_missing = failed.len() as f64 * 100.0 / fetched_count as f64;

    let error_rate_coverage = expected_sample_count(device, window)
        .map(|expected| (expected - successful.len() as f64) * 100.0 / expected);

    Some(CostRecord {
        cadence: window.cadence_unit,
        start_date: window.start_str(),
        end_date: window.end_str(),
        sum_of_energy_kwh,
        total_cost: sum_of_energy_kwh * price_per_kwh,
        cost_per_kwh: price_per_kwh,
        error_rate_missing,
        error_rate_coverage,
    })
}

/// Samples the window would hold if the device reported at its configured
/// interval without gaps.
///
/// `None` when the device has no usable interval or less than one sample fits
/// into the window.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn expected_sample_count(device: &DeviceConfig, window: &AggregationWindow) -> Option<f64> {
    let interval = device.update_interval_secs()?;
    let expected = window.duration_secs() as f64 / interval;
    (expected.is_finite() && expected >= 1.0).then_some(expected)
}
