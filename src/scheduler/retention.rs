//! Retention manager for cleaning up old check records.

use crate::db::{Store, RETENTION_DAYS};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Manager for deleting records past the retention window.
pub struct RetentionManager {
    store: Arc<Store>,
    stop: Arc<Mutex<Option<tokio::sync::broadcast::Sender<()>>>>,
}

impl RetentionManager {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the retention manager background task.
    pub fn start(&self) {
        let store = self.store.clone();
        let stop = self.stop.clone();

        tokio::spawn(async move {
            let (tx, _) = tokio::sync::broadcast::channel(1);
            {
                let mut stop_guard = stop.lock().await;
                *stop_guard = Some(tx.clone());
            }

            let mut rx = tx.subscribe();
            let mut interval = tokio::time::interval(Duration::from_secs(60));

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        process_retention(&store);
                    }
                }
            }
        });
    }

    /// Stop the retention manager.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

fn process_retention(store: &Store) {
    match store.expire() {
        Ok(0) => {}
        Ok(n) => tracing::info!(
            "RetentionManager: Deleted {} checks older than {} days",
            n,
            RETENTION_DAYS
        ),
        Err(e) => tracing::error!("RetentionManager: Failed to expire checks: {}", e),
    }
}
