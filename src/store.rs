//! Memory-resident live store: the latest report per station.
//!
//! Writers (the feed connector) and snapshot readers (the query engine)
//! share one lock, so a snapshot never observes a partially written entry.
//! There is no deletion — entries are only ever replaced.

use crate::types::{Report, StationId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct LiveStore {
    entries: RwLock<HashMap<StationId, Report>>,
}

impl LiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for the report's station. Returns true
    /// when the station was not seen before.
    pub fn upsert(&self, report: Report) -> bool {
        self.entries
            .write()
            .insert(report.stn.clone(), report)
            .is_none()
    }

    /// Point-in-time copy of every live report. The returned vector is
    /// detached from the store; concurrent upserts do not affect it.
    pub fn snapshot(&self) -> Vec<Report> {
        self.entries.read().values().cloned().collect()
    }

    /// Latest report for one station, if any.
    pub fn get(&self, stn: &StationId) -> Option<Report> {
        self.entries.read().get(stn).cloned()
    }

    /// Number of distinct stations seen so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
