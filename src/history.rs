//! Realized dispatch telemetry, kept so schedule queries can serve the recent
//! past next to the planned future.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::domain::ControlMode;

/// One realized quarter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HistoricalRecord {
    pub time: DateTime<Utc>,
    pub soc_percent: Option<i64>,
    pub production_w: Option<i64>,
    pub consumption_w: Option<i64>,
    pub state: Option<ControlMode>,
    pub price: Option<f64>,
    pub ess_power_w: Option<i64>,
    pub grid_power_w: Option<i64>,
}

pub trait TelemetryStore: Send + Sync {
    /// Records a realized quarter; a second record for the same quarter
    /// replaces the first.
    fn record(&self, record: HistoricalRecord);

    /// Records in `[from, to)`, ordered by time.
    fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<HistoricalRecord>;
}

/// In-memory store bounded by a retention window.
pub struct MemoryTelemetryStore {
    retention: TimeDelta,
    records: Mutex<BTreeMap<DateTime<Utc>, HistoricalRecord>>,
}

impl MemoryTelemetryStore {
    pub fn with_retention(retention: TimeDelta) -> Self {
        Self {
            retention,
            records: Mutex::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryTelemetryStore {
    fn default() -> Self {
        Self::with_retention(TimeDelta::hours(3))
    }
}

impl TelemetryStore for MemoryTelemetryStore {
    fn record(&self, record: HistoricalRecord) {
        let mut records = self.records.lock();
        let cutoff = record.time - self.retention;
        records.insert(record.time, record);
        records.retain(|time, _| *time >= cutoff);
    }

    fn query(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<HistoricalRecord> {
        self.records
            .lock()
            .range(from..to)
            .map(|(_, r)| r.clone())
            .collect()
    }
}
