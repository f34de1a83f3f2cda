//! HTTP request handlers.

use super::AppState;
use crate::config::ServerConfig;
use crate::db::{CheckResult, DbError, Service, Status, RETENTION_DAYS};
use crate::scheduler::{MonitorError, StatusCounts};
use crate::status::{overall, Uptime, UptimeWindow};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");

const NO_STORE: &str = "no-store";
const PUBLIC_CACHE: &str = "public, max-age=60, stale-while-revalidate=30";

fn respond<T: Serialize>(code: StatusCode, cache: &str, started: Instant, body: T) -> Response {
    (
        code,
        [
            (header::CACHE_CONTROL, cache.to_string()),
            (X_RESPONSE_TIME, format!("{}ms", started.elapsed().as_millis())),
        ],
        Json(body),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

// ============================================================================
// Trigger
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub timestamp: DateTime<Utc>,
    /// Milliseconds spent running the batch
    pub duration: u64,
    pub checks: usize,
    pub status: StatusCounts,
    pub results: Vec<CheckResult>,
}

/// Accept a bearer token or `?secret=`; dev mode lets everything through.
fn is_authorized(state: &AppState, headers: &HeaderMap, query_secret: Option<&str>) -> bool {
    if state.config.dev_mode {
        return true;
    }

    let Some(secret) = state.config.cron_secret.as_deref() else {
        return false;
    };

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    bearer == Some(secret) || query_secret == Some(secret)
}

pub async fn handle_trigger(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TriggerQuery>,
) -> Response {
    let started = Instant::now();

    if !is_authorized(&state, &headers, query.secret.as_deref()) {
        tracing::warn!("Rejected unauthorized status check trigger");
        return respond(
            StatusCode::UNAUTHORIZED,
            NO_STORE,
            started,
            serde_json::json!({ "error": "Unauthorized" }),
        );
    }

    match state.scheduler.run_all_checks().await {
        Ok(results) => {
            let body = TriggerResponse {
                timestamp: Utc::now(),
                duration: started.elapsed().as_millis() as u64,
                checks: results.len(),
                status: StatusCounts::from_results(&results),
                results,
            };
            respond(StatusCode::OK, NO_STORE, started, body)
        }
        Err(e) => check_run_failed(&e, started),
    }
}

/// Log the cause and answer with a generic message; store details stay in the logs.
fn check_run_failed(error: &MonitorError, started: Instant) -> Response {
    tracing::error!("Status check run failed: {}", error);
    let body = ErrorResponse {
        error: "Status check failed".to_string(),
        message: "Failed to run status checks".to_string(),
        timestamp: Some(Utc::now()),
    };
    respond(StatusCode::INTERNAL_SERVER_ERROR, NO_STORE, started, body)
}

// ============================================================================
// Public status
// ============================================================================

const MAX_HISTORY_HOURS: u32 = 24 * RETENTION_DAYS as u32;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub history: Option<String>,
}

impl StatusQuery {
    /// Requested history hours, capped at the retention window; anything
    /// unparsable or zero means none.
    fn history_hours(&self) -> Option<u32> {
        self.history
            .as_deref()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .filter(|h| *h > 0)
            .map(|h| h.min(MAX_HISTORY_HOURS))
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    pub service: Service,
    pub status: Status,
    pub latency: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub uptime: Uptime,
}

#[derive(Debug, Serialize)]
pub struct HistoryCheck {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub latency: u64,
}

#[derive(Debug, Serialize)]
pub struct ServiceHistory {
    pub service: Service,
    pub checks: Vec<HistoryCheck>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub overall: Status,
    pub timestamp: DateTime<Utc>,
    pub services: Vec<ServiceStatusResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ServiceHistory>>,
}

pub async fn handle_status(State(state): State<AppState>, Query(query): Query<StatusQuery>) -> Response {
    let started = Instant::now();

    match build_status(&state, query.history_hours()) {
        Ok(body) => respond(StatusCode::OK, PUBLIC_CACHE, started, body),
        Err(e) => {
            tracing::error!("Status API error: {}", e);
            let body = ErrorResponse {
                error: "Failed to fetch status".to_string(),
                message: e.to_string(),
                timestamp: None,
            };
            respond(StatusCode::INTERNAL_SERVER_ERROR, NO_STORE, started, body)
        }
    }
}

fn build_status(state: &AppState, history_hours: Option<u32>) -> Result<StatusResponse, DbError> {
    let current = state.aggregator.current_status()?;
    let uptime = state.aggregator.uptime_percentages(&UptimeWindow::ALL)?;

    let history = match history_hours {
        Some(hours) => Some(
            current
                .iter()
                .map(|r| -> Result<ServiceHistory, DbError> {
                    let checks = state
                        .aggregator
                        .history(r.service, hours)?
                        .into_iter()
                        .map(|c| HistoryCheck {
                            timestamp: c.timestamp,
                            status: c.status,
                            latency: c.latency,
                        })
                        .collect();
                    Ok(ServiceHistory {
                        service: r.service,
                        checks,
                    })
                })
                .collect::<Result<Vec<_>, DbError>>()?,
        ),
        None => None,
    };

    let services = current
        .iter()
        .map(|r| ServiceStatusResponse {
            service: r.service,
            status: r.status,
            latency: r.latency,
            message: r.message.clone(),
            uptime: uptime.get(&r.service).copied().unwrap_or_default(),
        })
        .collect();

    Ok(StatusResponse {
        overall: overall(&current),
        timestamp: Utc::now(),
        services,
        history,
    })
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthChecks {
    pub database: HealthCheck,
    pub rate_limit: HealthCheck,
}

/// Which rate-limit backend the deployment would use; config only, never fails.
fn rate_limit_check(config: &ServerConfig) -> HealthCheck {
    let distributed = config.redis_url.is_some() && config.redis_token.is_some();
    HealthCheck {
        status: "ok",
        latency: None,
        message: if distributed {
            "Upstash Redis (distributed)".to_string()
        } else {
            "In-memory (per-instance)".to_string()
        },
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the server started
    pub uptime: f64,
    pub checks: HealthChecks,
}

pub async fn handle_health(State(state): State<AppState>) -> Response {
    let started = Instant::now();

    let db_start = Instant::now();
    let ping = state.store.ping();
    let latency = db_start.elapsed().as_millis() as u64;

    let (healthy, database) = match ping {
        Ok(()) => (
            true,
            HealthCheck {
                status: "ok",
                latency: Some(latency),
                message: "Database connected".to_string(),
            },
        ),
        Err(e) => (
            false,
            HealthCheck {
                status: "error",
                latency: Some(latency),
                message: e.to_string(),
            },
        ),
    };

    let body = HealthResponse {
        status: if healthy { "ok" } else { "down" },
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        uptime: state.started.elapsed().as_secs_f64(),
        checks: HealthChecks {
            database,
            rate_limit: rate_limit_check(&state.config),
        },
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    respond(code, NO_STORE, started, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDispatcher, DisabledNotifier, InMemoryCooldowns};
    use crate::db::Store;
    use crate::probe::Probe;
    use crate::scheduler::Scheduler;
    use crate::status::StatusAggregator;
    use axum::http::HeaderValue;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn state(config: ServerConfig) -> (NamedTempFile, AppState) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Arc::new(DisabledNotifier),
            Arc::new(InMemoryCooldowns::new()),
        ));
        let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(crate::probe::DatabaseProbe::new((*store).clone()))];
        let scheduler = Arc::new(Scheduler::new(store.clone(), probes, dispatcher));
        let state = AppState {
            config,
            aggregator: Arc::new(StatusAggregator::new(store.clone())),
            store,
            scheduler,
            started: Instant::now(),
        };
        (tmp, state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn secret_config() -> ServerConfig {
        ServerConfig {
            cron_secret: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_trigger_requires_secret() {
        let (_tmp, state) = state(secret_config());
        let response = handle_trigger(State(state), HeaderMap::new(), Query(TriggerQuery::default())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_trigger_with_bearer_runs_checks() {
        let (_tmp, state) = state(secret_config());
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));

        let response = handle_trigger(State(state.clone()), headers, Query(TriggerQuery::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = body_json(response).await;
        assert_eq!(body["checks"], 1);
        assert_eq!(body["status"]["up"], 1);
        assert_eq!(body["results"][0]["service"], "database");
        assert!(state.store.latest(Service::Database).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_trigger_accepts_query_secret_and_dev_mode() {
        let (_tmp, state_secret) = state(secret_config());
        let query = TriggerQuery {
            secret: Some("s3cret".to_string()),
        };
        let response = handle_trigger(State(state_secret), HeaderMap::new(), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let (_tmp, state_wrong) = state(secret_config());
        let query = TriggerQuery {
            secret: Some("nope".to_string()),
        };
        let response = handle_trigger(State(state_wrong), HeaderMap::new(), Query(query)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let dev = ServerConfig {
            dev_mode: true,
            ..Default::default()
        };
        let (_tmp, state_dev) = state(dev);
        let response = handle_trigger(State(state_dev), HeaderMap::new(), Query(TriggerQuery::default())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_reports_services_and_history() {
        let (_tmp, state) = state(ServerConfig::default());
        let now = Utc::now();
        state
            .store
            .append(&CheckResult::up(Service::Website, 50).at(now - ChronoDuration::minutes(10)))
            .unwrap();
        state
            .store
            .append(&CheckResult::down(Service::Graphql, 120, "HTTP 503").at(now))
            .unwrap();

        let query = StatusQuery {
            history: Some("1".to_string()),
        };
        let response = handle_status(State(state), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CACHE_CONTROL],
            "public, max-age=60, stale-while-revalidate=30"
        );

        let body = body_json(response).await;
        assert_eq!(body["overall"], "down");
        assert_eq!(body["services"][0]["service"], "website");
        assert_eq!(body["services"][0]["uptime"]["24h"], 100.0);
        assert!(body["services"][0].get("message").is_none());
        assert_eq!(body["services"][1]["message"], "HTTP 503");
        assert_eq!(body["services"][1]["uptime"]["30d"], 0.0);
        assert_eq!(body["history"].as_array().unwrap().len(), 2);
        assert_eq!(body["history"][0]["checks"][0]["status"], "up");
    }

    #[tokio::test]
    async fn test_status_without_history_param() {
        let (_tmp, state) = state(ServerConfig::default());
        for raw in [None, Some("abc"), Some("0")] {
            let query = StatusQuery {
                history: raw.map(str::to_string),
            };
            let body = body_json(handle_status(State(state.clone()), Query(query)).await).await;
            assert_eq!(body["overall"], "up");
            assert!(body.get("history").is_none());
        }
    }

    #[tokio::test]
    async fn test_status_with_oversized_history_is_capped() {
        let (_tmp, state) = state(ServerConfig::default());
        let now = Utc::now();
        state
            .store
            .append(&CheckResult::up(Service::Website, 40).at(now - ChronoDuration::days(45)))
            .unwrap();
        state.store.append(&CheckResult::up(Service::Website, 40).at(now)).unwrap();

        let query = StatusQuery {
            history: Some("4294967295".to_string()),
        };
        assert_eq!(query.history_hours(), Some(24 * 30));

        let response = handle_status(State(state), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["history"][0]["checks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_health_ok() {
        let (_tmp, state) = state(ServerConfig::default());
        let response = handle_health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["database"]["status"], "ok");
        assert_eq!(body["checks"]["rateLimit"]["message"], "In-memory (per-instance)");
        assert!(body["checks"]["rateLimit"].get("latency").is_none());
    }

    #[test]
    fn test_rate_limit_check_reports_redis_backend() {
        let config = ServerConfig {
            redis_url: Some("https://cache.example".to_string()),
            redis_token: Some("tok".to_string()),
            ..Default::default()
        };
        assert_eq!(rate_limit_check(&config).message, "Upstash Redis (distributed)");

        let url_only = ServerConfig {
            redis_url: Some("https://cache.example".to_string()),
            ..Default::default()
        };
        assert_eq!(rate_limit_check(&url_only).message, "In-memory (per-instance)");
    }

    #[tokio::test]
    async fn test_failed_run_hides_store_detail() {
        let error = MonitorError::Store(DbError::Migration("disk I/O error at /var/db".to_string()));
        let response = check_run_failed(&error, Instant::now());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");

        let body = body_json(response).await;
        assert_eq!(body["error"], "Status check failed");
        assert_eq!(body["message"], "Failed to run status checks");
        assert!(!body.to_string().contains("disk I/O"));
    }
}
