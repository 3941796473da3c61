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

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::types::{MeasurementSample, format_timestamp};

/// Source of raw measurement samples.
/// Windows are half-open: `start` is included, `end` is not.
pub trait MeasurementStore: Send + Sync {
    /// Samples recorded for `device` between two `YYYY-MM-DD HH:MM:SS` timestamps
    fn fetch(&self, device: &str, start: &str, end: &str) -> Result<Vec<MeasurementSample>>;
}

/// SQLite-backed measurement store.
///
/// Timestamps are stored as fixed-width text, so string comparison orders
/// them chronologically.
#[derive(Debug, Clone)]
pub struct SqliteMeasurementStore {
    db_path: PathBuf,
}

impl SqliteMeasurementStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Create the measurements table if it does not exist yet
    pub fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS measurements (
                device TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                energy_wh REAL NOT NULL,
                fetch_success INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_measurements_device_ts
                ON measurements (device, timestamp);",
        )?;
        Ok(())
    }

    pub fn insert_sample(
        &self,
        device: &str,
        timestamp: NaiveDateTime,
        sample: MeasurementSample,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO measurements (device, timestamp, energy_wh, fetch_success)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                device,
                format_timestamp(timestamp),
                sample.energy_wh,
                sample.fetch_success
            ],
        )?;
        Ok(())
    }
}

impl MeasurementStore for SqliteMeasurementStore {
    fn fetch(&self, device: &str, start: &str, end: &str) -> Result<Vec<MeasurementSample>> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            "SELECT energy_wh, fetch_success FROM measurements
             WHERE device = ?1 AND timestamp >= ?2 AND timestamp < ?3
             ORDER BY timestamp ASC",
        )?;

        let samples = stmt
            .query_map(params![device, start, end], |row| {
                Ok(MeasurementSample {
                    energy_wh: row.get(0)?,
                    fetch_success: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(samples)
    }
}
