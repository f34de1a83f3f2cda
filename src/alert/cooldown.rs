//! Last-alert bookkeeping used to suppress repeated notifications.

use crate::db::{Service, Status};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Key-value record of when each (service, status) pair last alerted.
///
/// The in-memory version resets on restart; a shared backend can implement
/// this for cross-instance deduplication.
#[async_trait]
pub trait CooldownStore: Send + Sync {
    async fn last_alert(&self, service: Service, status: Status) -> Option<DateTime<Utc>>;

    /// Claim the (service, status) slot at `now` unless it was claimed less
    /// than `window` ago. Check and claim happen atomically.
    async fn try_reserve(&self, service: Service, status: Status, now: DateTime<Utc>, window: Duration) -> bool;

    /// Drop a claim made at `at`, e.g. after a failed delivery. A newer claim
    /// is left alone.
    async fn release(&self, service: Service, status: Status, at: DateTime<Utc>);
}

#[derive(Default)]
pub struct InMemoryCooldowns {
    last: Mutex<HashMap<(Service, Status), DateTime<Utc>>>,
}

impl InMemoryCooldowns {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CooldownStore for InMemoryCooldowns {
    async fn last_alert(&self, service: Service, status: Status) -> Option<DateTime<Utc>> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        last.get(&(service, status)).copied()
    }

    async fn try_reserve(&self, service: Service, status: Status, now: DateTime<Utc>, window: Duration) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match last.get(&(service, status)) {
            Some(prev) if now - *prev < window => false,
            _ => {
                last.insert((service, status), now);
                true
            }
        }
    }

    async fn release(&self, service: Service, status: Status, at: DateTime<Utc>) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if last.get(&(service, status)) == Some(&at) {
            last.remove(&(service, status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keys_are_per_service_and_status() {
        let cooldowns = InMemoryCooldowns::new();
        let now = Utc::now();
        let window = Duration::minutes(5);
        assert!(cooldowns.try_reserve(Service::Redis, Status::Down, now, window).await);

        assert_eq!(cooldowns.last_alert(Service::Redis, Status::Down).await, Some(now));
        assert_eq!(cooldowns.last_alert(Service::Redis, Status::Degraded).await, None);
        assert!(cooldowns.try_reserve(Service::Website, Status::Down, now, window).await);
    }

    #[tokio::test]
    async fn test_reserve_blocks_within_window() {
        let cooldowns = InMemoryCooldowns::new();
        let t0 = Utc::now();
        let window = Duration::minutes(5);

        assert!(cooldowns.try_reserve(Service::Graphql, Status::Down, t0, window).await);
        assert!(!cooldowns.try_reserve(Service::Graphql, Status::Down, t0 + Duration::minutes(4), window).await);
        assert!(cooldowns.try_reserve(Service::Graphql, Status::Down, t0 + Duration::minutes(5), window).await);
    }

    #[tokio::test]
    async fn test_release_only_drops_matching_claim() {
        let cooldowns = InMemoryCooldowns::new();
        let t0 = Utc::now();
        let window = Duration::minutes(5);
        assert!(cooldowns.try_reserve(Service::Opensea, Status::Down, t0, window).await);

        cooldowns.release(Service::Opensea, Status::Down, t0 - Duration::seconds(1)).await;
        assert_eq!(cooldowns.last_alert(Service::Opensea, Status::Down).await, Some(t0));

        cooldowns.release(Service::Opensea, Status::Down, t0).await;
        assert_eq!(cooldowns.last_alert(Service::Opensea, Status::Down).await, None);
    }
}
