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

//! One dispatch tick for one device: decide which cadences are due, fetch
//! their windows and hand the aggregated records to the sink.

use chrono::{NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::calendar::{day_and_month_match, day_matches};
use crate::config::ConfigProvider;
use crate::error::Result;
use crate::schedule::resolve;
use crate::sink::ResultSink;
use crate::store::MeasurementStore;
use crate::types::{AggregationWindow, Cadence, CostRecord, DeviceConfig, ScheduleDescriptor};

/// Cadences of `schedule` that are due at `now`, in day, month, year order
#[must_use]
pub fn due_cadences(schedule: &ScheduleDescriptor, now: NaiveDateTime) -> Vec<Cadence> {
    let mut due = Vec::with_capacity(3);

    if schedule.daily_enabled {
        due.push(Cadence::Day);
    }
    if let Some(target_day) = schedule.monthly_target_day
        && day_matches(&now, target_day)
    {
        due.push(Cadence::Month);
    }
    if let Some(target) = schedule.yearly_target
        && day_and_month_match(&now, target.day, target.month)
    {
        due.push(Cadence::Year);
    }

    due
}

/// Runs the cost calculation pipeline against its collaborators
#[derive(Debug)]
pub struct DispatchHandler<S, R, C> {
    store: S,
    sink: R,
    config: C,
}

impl<S, R, C> DispatchHandler<S, R, C>
where
    S: MeasurementStore,
    R: ResultSink,
    C: ConfigProvider,
{
    pub fn new(store: S, sink: R, config: C) -> Self {
        Self {
            store,
            sink,
            config,
        }
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Resolve the device's schedule and dispatch at the current UTC time
    pub fn dispatch_now(&self, device: &DeviceConfig) -> Result<Vec<CostRecord>> {
        let schedule = resolve(&device.settings);
        self.dispatch(device, &schedule, Utc::now().naive_utc())
    }

    /// Compute and emit a record for every cadence due at `now`.
    ///
    /// Windows without any samples produce no record. A failing store aborts
    /// the dispatch; a failing sink is logged and the record is still returned.
    pub fn dispatch(
        &self,
        device: &DeviceConfig,
        schedule: &ScheduleDescriptor,
        now: NaiveDateTime,
    ) -> Result<Vec<CostRecord>> {
        let mut emitted = Vec::new();

        for cadence in due_cadences(schedule, now) {
            if let Some(record) = self.calculate(device, cadence, now)? {
                emitted.push(record);
            }
        }

        Ok(emitted)
    }

    fn calculate(
        &self,
        device: &DeviceConfig,
        cadence: Cadence,
        now: NaiveDateTime,
    ) -> Result<Option<CostRecord>> {
        let Some(window) = AggregationWindow::ending_at(now, cadence) else {
            warn!(device = %device.name, %cadence, %now, "Window start out of range, skipping");
            return Ok(None);
        };

        let samples = self
            .store
            .fetch(&device.name, &window.start_str(), &window.end_str())?;

        if samples.is_empty() {
            debug!(
                device = %device.name,
                %cadence,
                start = %window.start_str(),
                "No samples in window"
            );
            return Ok(None);
        }

        let price = self.config.price_per_kwh();
        let Some(record) = aggregate(device, &window, &samples, price) else {
            return Ok(None);
        };

        let key = cadence.sink_key(&device.name);
        match self.sink.record(&key, &record) {
            Ok(()) => info!(
                key = %key,
                energy_kwh = record.sum_of_energy_kwh,
                total_cost = record.total_cost,
                "Cost calculated"
            ),
            Err(err) => warn!(key = %key, "Failed to record cost report: {err}"),
        }

        Ok(Some(record))
    }
}
