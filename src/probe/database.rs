//! Database probe: an administrative ping over the shared store connection.

use super::{elapsed_ms, Probe};
use crate::db::{CheckResult, Service, Store};

use async_trait::async_trait;
use std::time::{Duration, Instant};

const SLOW_CONNECTION: Duration = Duration::from_millis(3000);

pub struct DatabaseProbe {
    store: Store,
}

impl DatabaseProbe {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    fn service(&self) -> Service {
        Service::Database
    }

    async fn check(&self) -> CheckResult {
        let store = self.store.clone();
        let start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || store.ping()).await;
        let latency = elapsed_ms(start);

        match outcome {
            Ok(Ok(())) if latency > SLOW_CONNECTION.as_millis() as u64 => CheckResult::degraded(
                Service::Database,
                latency,
                Some("Slow connection".to_string()),
            ),
            Ok(Ok(())) => CheckResult::up(Service::Database, latency),
            Ok(Err(e)) => CheckResult::down(Service::Database, latency, e.to_string()),
            Err(e) => CheckResult::down(Service::Database, latency, format!("ping task failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Status;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_database_probe_up() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        let result = DatabaseProbe::new(store).check().await;
        assert_eq!(result.service, Service::Database);
        assert_eq!(result.status, Status::Up);
        assert!(result.message.is_none());
    }
}
