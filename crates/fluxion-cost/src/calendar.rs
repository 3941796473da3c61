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

//! Calendar rules for deciding when a monthly or yearly report is due.
//!
//! A target day that does not exist in the current month (e.g. the 31st in
//! April or February) collapses to the last day of that month, so a "day 31"
//! schedule fires at every month end.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::types::Cadence;

/// Last calendar day (28-31) of the month containing `date`
#[must_use]
pub fn last_day_of_month<D: Datelike>(date: &D) -> u32 {
    if date.month() == 12 {
        return 31;
    }
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next_first| next_first.pred_opt())
        .map_or(31, |last| last.day())
}

/// True if `now` is the target day of the month, or the month end when the
/// target day does not exist in this month
#[must_use]
pub fn day_matches<D: Datelike>(now: &D, target_day: u32) -> bool {
    let last_day = last_day_of_month(now);
    if target_day > last_day {
        now.day() == last_day
    } else {
        now.day() == target_day
    }
}

/// Like [`day_matches`], additionally requiring `now` to be in `target_month`
#[must_use]
pub fn day_and_month_match<D: Datelike>(now: &D, target_day: u32, target_month: u32) -> bool {
    day_matches(now, target_day) && now.month() == target_month
}

/// Step `count` cadence units back from `date` using calendar arithmetic.
///
/// Month and year steps clamp to the last valid day of the resulting month,
/// so one month before March 31 is the last day of February.
#[must_use]
pub fn subtract_calendar_unit(
    date: NaiveDateTime,
    unit: Cadence,
    count: u32,
) -> Option<NaiveDateTime> {
    match unit {
        Cadence::Day => date.checked_sub_signed(Duration::days(i64::from(count))),
        Cadence::Month => date.checked_sub_months(Months::new(count)),
        Cadence::Year => date.checked_sub_months(Months::new(count.checked_mul(12)?)),
    }
}

/// Parse an `HH:MM` request time
#[must_use]
pub fn parse_request_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// True if `now` falls within the minute given by `request_time` (`HH:MM`)
#[must_use]
pub fn is_request_time(now: NaiveDateTime, request_time: &str) -> bool {
    parse_request_time(request_time)
        .is_some_and(|time| now.hour() == time.hour() && now.minute() == time.minute())
}
