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

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::types::CostRecord;

/// Destination for finished cost records, keyed by `{device}_{cadence}`
pub trait ResultSink: Send + Sync {
    fn record(&self, key: &str, record: &CostRecord) -> Result<()>;
}

impl<T: ResultSink + ?Sized> ResultSink for Box<T> {
    fn record(&self, key: &str, record: &CostRecord) -> Result<()> {
        (**self).record(key, record)
    }
}

/// Emits each record as a structured log event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn record(&self, key: &str, record: &CostRecord) -> Result<()> {
        info!(
            key,
            start = %record.start_date,
            end = %record.end_date,
            energy_kwh = record.sum_of_energy_kwh,
            total_cost = record.total_cost,
            cost_per_kwh = record.cost_per_kwh,
            error_rate_missing = record.error_rate_missing,
            error_rate_coverage = ?record.error_rate_coverage,
            "Cost report"
        );
        Ok(())
    }
}

/// One line of a [`JsonLinesSink`] file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkEntry {
    pub key: String,
    pub recorded_at: DateTime<Utc>,
    pub data: CostRecord,
}

/// Appends records to a file as JSON lines
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ResultSink for JsonLinesSink {
    fn record(&self, key: &str, record: &CostRecord) -> Result<()> {
        let entry = SinkEntry {
            key: key.to_owned(),
            recorded_at: Utc::now(),
            data: record.clone(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cadence;

    fn record(cadence: Cadence) -> CostRecord {
        CostRecord {
            cadence,
            start_date: "2024-01-01 00:00:00".to_owned(),
            end_date: "2024-01-02 00:00:00".to_owned(),
            sum_of_energy_kwh: 3.5,
            total_cost: 1.05,
            cost_per_kwh: 0.3,
            error_rate_missing: 0.0,
            error_rate_coverage: None,
        }
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("costs.jsonl");
        let sink = JsonLinesSink::new(&path);

        sink.record("washer_day", &record(Cadence::Day)).unwrap();
        sink.record("washer_month", &record(Cadence::Month)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let entries: Vec<SinkEntry> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "washer_day");
        assert_eq!(entries[1].key, "washer_month");
        assert_eq!(entries[1].data, record(Cadence::Month));
        assert!(content.contains("\"error_rate_coverage\":null"));
    }

    #[test]
    fn test_json_lines_sink_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("costs.jsonl"));
        assert!(sink.record("washer_day", &record(Cadence::Day)).is_err());
    }

    #[test]
    fn test_tracing_sink_accepts_records() {
        assert!(TracingSink.record("washer_day", &record(Cadence::Day)).is_ok());
    }
}
