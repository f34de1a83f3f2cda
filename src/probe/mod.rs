//! Probe module for dependency health checks.
//!
//! Every probe returns a [`CheckResult`]; errors never escape a probe.

mod database;
mod http;

pub use database::*;
pub use http::*;

use crate::config::ServerConfig;
use crate::db::{CheckResult, Service, Status, Store};

use async_trait::async_trait;
use reqwest::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Hard upper bound for a single probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A self-contained check of one external dependency.
#[async_trait]
pub trait Probe: Send + Sync {
    fn service(&self) -> Service;

    /// Run the check. Implementations translate every failure into a
    /// `down` or `degraded` result.
    async fn check(&self) -> CheckResult;
}

/// Run a probe under `limit`, turning an overrun into a `down` result.
pub async fn run_probe(probe: &dyn Probe, limit: Duration) -> CheckResult {
    let start = Instant::now();
    let result = match tokio::time::timeout(limit, probe.check()).await {
        Ok(result) => result,
        Err(_) => CheckResult::down(
            probe.service(),
            elapsed_ms(start),
            ProbeError::Timeout(limit).to_string(),
        ),
    };

    if result.status != Status::Up {
        tracing::warn!(
            "Probe {} is {}: {}",
            result.service,
            result.status,
            result.message.as_deref().unwrap_or("-")
        );
    }

    result
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Build the full set of probes, one per [`Service`], sharing one HTTP client.
pub fn build_probes(cfg: &ServerConfig, store: &Store) -> Result<Vec<Arc<dyn Probe>>, ProbeError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("statuswatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))?;

    let site = cfg.site_url.trim_end_matches('/');

    let website = HttpCheck::new(Method::HEAD, site)
        .slow_after(Duration::from_millis(5000), "Slow response");

    let graphql = HttpCheck::new(Method::POST, &format!("{}/api/v1/graphql", site))
        .json_body(serde_json::json!({ "query": "{ __typename }" }))
        .slow_after(Duration::from_millis(5000), "Slow response");

    let crazyaces = HttpCheck::new(Method::HEAD, &cfg.crazyaces_url)
        .slow_after(Duration::from_millis(3000), "Slow response");

    let opensea = cfg.opensea_key.as_ref().map(|key| {
        HttpCheck::new(Method::GET, &cfg.opensea_api_url)
            .header("X-API-KEY", key)
            .slow_after(Duration::from_millis(3000), "Slow response")
            .degrade_on_rate_limit()
    });

    let mailerlite = cfg.mailerlite_api_key.as_ref().map(|key| {
        HttpCheck::new(Method::GET, &cfg.mailerlite_api_url).header("X-MailerLite-ApiKey", key)
    });

    let redis = match (&cfg.redis_url, &cfg.redis_token) {
        (Some(url), Some(token)) => Some(
            HttpCheck::new(Method::GET, &format!("{}/ping", url.trim_end_matches('/')))
                .header("Authorization", &format!("Bearer {}", token))
                .timeout(Duration::from_secs(5)),
        ),
        _ => None,
    };

    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(HttpProbe::new(Service::Website, client.clone(), website)),
        Arc::new(DatabaseProbe::new(store.clone())),
        Arc::new(HttpProbe::new(Service::Graphql, client.clone(), graphql)),
        Arc::new(HttpProbe::optional(
            Service::Opensea,
            client.clone(),
            opensea,
            "API key not configured",
        )),
        Arc::new(HttpProbe::optional(
            Service::Mailerlite,
            client.clone(),
            mailerlite,
            "API key not configured",
        )),
        Arc::new(HttpProbe::optional(
            Service::Redis,
            client.clone(),
            redis,
            "Not configured (using in-memory fallback)",
        )),
        Arc::new(HttpProbe::new(Service::Crazyaces, client, crazyaces)),
    ];

    Ok(probes)
}
