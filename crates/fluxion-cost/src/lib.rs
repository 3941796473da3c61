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

//! FluxION Cost Reports
//!
//! Periodic (daily, monthly, yearly) energy cost reports for metered devices.
//!
//! ## Pipeline
//!
//! - **Schedule**: parse a device's cadence settings ([`schedule::resolve`])
//! - **Calendar**: decide which cadences are due today, month ends included
//! - **Aggregation**: turn a window of samples into a [`CostRecord`]
//! - **Dispatch**: run the above per device and hand records to a [`ResultSink`]
//!
//! Configuration, measurement storage and result sinks are collaborators
//! behind the [`ConfigProvider`], [`MeasurementStore`] and [`ResultSink`] traits.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod schedule;
pub mod sink;
pub mod store;
pub mod types;

pub use aggregate::aggregate;
pub use calendar::{day_and_month_match, day_matches, last_day_of_month, subtract_calendar_unit};
pub use config::{
    ConfigDefect, ConfigProvider, JsonFileConfig, PriceOverride, StaticConfig,
    WarningState,
};
pub use dispatch::{DispatchHandler, due_cadences};
pub use error::{CostError, Result};
pub use sink::{JsonLinesSink, ResultSink, TracingSink};
pub use store::{MeasurementStore, SqliteMeasurementStore};
pub use types::*;
