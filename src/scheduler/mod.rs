//! Scheduler module: runs every probe, records the batch and raises alerts.

mod retention;

pub use retention::*;

use crate::alert::{AlertDispatcher, ServiceState};
use crate::db::{CheckResult, DbError, Status, Store};
use crate::probe::{run_probe, Probe, PROBE_TIMEOUT};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Orchestration error types.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("store unavailable: {0}")]
    Store(#[from] DbError),
}

/// Per-status tally of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub up: usize,
    pub degraded: usize,
    pub down: usize,
}

impl StatusCounts {
    pub fn from_results(results: &[CheckResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            match r.status {
                Status::Up => acc.up += 1,
                Status::Degraded => acc.degraded += 1,
                Status::Down => acc.down += 1,
            }
            acc
        })
    }
}

/// The orchestrator that fans out probes and records their results.
pub struct Scheduler {
    store: Arc<Store>,
    probes: Vec<Arc<dyn Probe>>,
    dispatcher: Arc<AlertDispatcher>,
    retention_manager: Arc<RetentionManager>,
    stop_tx: broadcast::Sender<()>,
    // Serializes runs so each service's read-then-write stays ordered.
    run_lock: Mutex<()>,
}

impl Scheduler {
    /// Create a new scheduler with the given store, probes and dispatcher.
    pub fn new(store: Arc<Store>, probes: Vec<Arc<dyn Probe>>, dispatcher: Arc<AlertDispatcher>) -> Self {
        let retention_manager = Arc::new(RetentionManager::new(store.clone()));
        let (stop_tx, _) = broadcast::channel(1);

        Self {
            store,
            probes,
            dispatcher,
            retention_manager,
            stop_tx,
            run_lock: Mutex::new(()),
        }
    }

    /// Start background work: retention always, the periodic check loop
    /// when `interval` is non-zero.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        self.retention_manager.start();

        if interval.is_zero() {
            tracing::info!("Periodic checks disabled, waiting for external triggers");
            return;
        }

        tracing::info!(
            "Starting scheduler with {} probes every {:?}",
            self.probes.len(),
            interval
        );

        let scheduler = self.clone();
        let mut stop_rx = self.stop_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.run_all_checks().await {
                            tracing::error!("Scheduled check run failed: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Stop the periodic loop and the retention manager.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(());
        self.retention_manager.stop().await;
    }

    /// Run every probe concurrently, persist each result and dispatch alerts.
    ///
    /// The returned batch holds exactly one result per registered probe.
    /// Only an unreachable store fails the whole run; per-service read or
    /// write failures are logged and the result is still returned.
    /// Overlapping calls (timer and trigger) run one after the other.
    pub async fn run_all_checks(&self) -> Result<Vec<CheckResult>, MonitorError> {
        let _run = self.run_lock.lock().await;
        self.store.ping()?;

        let results = self.collect_results().await;
        let timestamp = Utc::now();

        for result in &results {
            self.record(result, timestamp).await;
        }

        let counts = StatusCounts::from_results(&results);
        tracing::info!(
            "Check run complete: {} up, {} degraded, {} down",
            counts.up,
            counts.degraded,
            counts.down
        );

        Ok(results)
    }

    async fn collect_results(&self) -> Vec<CheckResult> {
        let handles: Vec<_> = self
            .probes
            .iter()
            .map(|probe| {
                let probe = probe.clone();
                let service = probe.service();
                let handle = tokio::spawn(async move { run_probe(probe.as_ref(), PROBE_TIMEOUT).await });
                (service, handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());

        for (service, handle) in handles {
            let mut result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Probe for {} failed: {}", service, e);
                    CheckResult::down(service, 0, format!("check panicked: {}", e))
                }
            };

            if result.service != service {
                tracing::warn!("Probe for {} reported as {}", service, result.service);
                result.service = service;
            }

            results.push(result);
        }

        results
    }

    /// Read the previous status, append the new record, then alert if the
    /// transition calls for it. Reading always precedes writing per service.
    async fn record(&self, result: &CheckResult, timestamp: DateTime<Utc>) {
        let previous = match self.store.latest(result.service) {
            Ok(latest) => Some(latest.map(|r| r.status)),
            Err(e) => {
                tracing::error!("Failed to read previous status for {}: {}", result.service, e);
                None
            }
        };

        if let Err(e) = self.store.append(&result.clone().at(timestamp)) {
            tracing::error!("Failed to store check for {}: {}", result.service, e);
        }

        // Without a trustworthy previous status there is nothing to compare.
        let Some(previous) = previous else {
            return;
        };

        if ServiceState::from(previous).transition(result.status).is_some() {
            self.dispatcher
                .notify(result.service, result.status, result.message.as_deref(), previous)
                .await;
        }
    }
}
