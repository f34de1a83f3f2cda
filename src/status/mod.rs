//! Read-side status reporting built purely from stored checks.

use crate::db::{CheckResult, DbError, Service, Status, Store, UptimeCheckRecord, UptimeCount};

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Trailing windows reported on the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UptimeWindow {
    Day,
    Week,
    Month,
}

impl UptimeWindow {
    pub const ALL: [UptimeWindow; 3] = [UptimeWindow::Day, UptimeWindow::Week, UptimeWindow::Month];

    pub fn hours(&self) -> u32 {
        match self {
            UptimeWindow::Day => 24,
            UptimeWindow::Week => 24 * 7,
            UptimeWindow::Month => 24 * 30,
        }
    }
}

/// Uptime percentages of one service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Uptime {
    #[serde(rename = "24h")]
    pub day: f64,
    #[serde(rename = "7d")]
    pub week: f64,
    #[serde(rename = "30d")]
    pub month: f64,
}

impl Default for Uptime {
    fn default() -> Self {
        Self {
            day: 100.0,
            week: 100.0,
            month: 100.0,
        }
    }
}

impl Uptime {
    fn set(&mut self, window: UptimeWindow, value: f64) {
        match window {
            UptimeWindow::Day => self.day = value,
            UptimeWindow::Week => self.week = value,
            UptimeWindow::Month => self.month = value,
        }
    }
}

/// Fold many statuses into one: any down wins, then any degraded.
pub fn overall(results: &[CheckResult]) -> Status {
    results
        .iter()
        .map(|r| r.status)
        .max_by_key(Status::severity)
        .unwrap_or(Status::Up)
}

pub struct StatusAggregator {
    store: Arc<Store>,
}

impl StatusAggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Latest stored result per service, in display order. Never probes.
    pub fn current_status(&self) -> Result<Vec<CheckResult>, DbError> {
        let mut current: Vec<CheckResult> = self
            .store
            .latest_all()?
            .into_iter()
            .map(CheckResult::from)
            .collect();
        current.sort_by_key(|r| r.service.display_order());
        Ok(current)
    }

    pub fn overall_status(&self) -> Result<Status, DbError> {
        Ok(overall(&self.current_status()?))
    }

    /// Percentages for every service over `windows`, one grouped read per
    /// window. Services with no checks in a window report 100.
    pub fn uptime_percentages(&self, windows: &[UptimeWindow]) -> Result<BTreeMap<Service, Uptime>, DbError> {
        let now = Utc::now();
        let mut uptime: BTreeMap<Service, Uptime> =
            Service::ALL.iter().map(|svc| (*svc, Uptime::default())).collect();

        for window in windows {
            let since = now - ChronoDuration::hours(i64::from(window.hours()));
            let counts: HashMap<Service, UptimeCount> = self.store.uptime_counts(since)?;

            for (service, entry) in uptime.iter_mut() {
                let count = counts.get(service).copied().unwrap_or_default();
                entry.set(*window, count.percentage());
            }
        }

        Ok(uptime)
    }

    /// Percentage for one service over the trailing `hours`.
    pub fn uptime_percentage(&self, service: Service, hours: u32) -> Result<f64, DbError> {
        let history = self.store.history(service, hours)?;
        let count = UptimeCount {
            total: history.len() as i64,
            up: history.iter().filter(|r| r.status == Status::Up).count() as i64,
        };
        Ok(count.percentage())
    }

    pub fn history(&self, service: Service, hours: u32) -> Result<Vec<UptimeCheckRecord>, DbError> {
        self.store.history(service, hours)
    }
}
