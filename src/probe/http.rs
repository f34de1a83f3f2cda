//! HTTP probe implementation.

use super::{elapsed_ms, Probe, ProbeError, PROBE_TIMEOUT};
use crate::db::{CheckResult, Service};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use std::time::{Duration, Instant};

/// A single HTTP request and the rules for grading its response.
#[derive(Debug, Clone)]
pub struct HttpCheck {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
    /// Responses slower than this are `degraded`
    pub slow_threshold: Option<Duration>,
    pub slow_message: Option<String>,
    /// Treat HTTP 429 as `degraded` instead of `down`
    pub rate_limit_degrades: bool,
}

impl HttpCheck {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            timeout: PROBE_TIMEOUT,
            slow_threshold: None,
            slow_message: None,
            rate_limit_degrades: false,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn slow_after(mut self, threshold: Duration, message: &str) -> Self {
        self.slow_threshold = Some(threshold);
        self.slow_message = Some(message.to_string());
        self
    }

    pub fn degrade_on_rate_limit(mut self) -> Self {
        self.rate_limit_degrades = true;
        self
    }

    /// Issue the request and grade the outcome for `service`.
    pub async fn run(&self, service: Service, client: &Client) -> CheckResult {
        let start = Instant::now();
        let outcome = self.send(client).await;
        let latency = elapsed_ms(start);

        match outcome {
            Ok(code) => self.grade(service, code, latency),
            Err(e) => CheckResult::down(service, latency, e.to_string()),
        }
    }

    /// Map a response code and latency onto a status.
    fn grade(&self, service: Service, code: StatusCode, latency: u64) -> CheckResult {
        if code == StatusCode::TOO_MANY_REQUESTS && self.rate_limit_degrades {
            return CheckResult::degraded(service, latency, Some("Rate limited".to_string()));
        }

        if !code.is_success() {
            return CheckResult::down(service, latency, format!("HTTP {}", code.as_u16()));
        }

        match self.slow_threshold {
            Some(threshold) if latency > threshold.as_millis() as u64 => {
                CheckResult::degraded(service, latency, self.slow_message.clone())
            }
            _ => CheckResult::up(service, latency),
        }
    }

    async fn send(&self, client: &Client) -> Result<StatusCode, ProbeError> {
        let mut request = client
            .request(self.method.clone(), &self.url)
            .timeout(self.timeout);

        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        if let Some(body) = &self.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

        Ok(response.status())
    }
}

/// Probe backed by an [`HttpCheck`].
///
/// Optional dependencies are built without a check when their credentials
/// are missing; they then report `degraded` rather than `down`.
pub struct HttpProbe {
    service: Service,
    client: Client,
    check: Option<HttpCheck>,
    missing_message: &'static str,
}

impl HttpProbe {
    pub fn new(service: Service, client: Client, check: HttpCheck) -> Self {
        Self {
            service,
            client,
            check: Some(check),
            missing_message: "Not configured",
        }
    }

    pub fn optional(
        service: Service,
        client: Client,
        check: Option<HttpCheck>,
        missing_message: &'static str,
    ) -> Self {
        Self {
            service,
            client,
            check,
            missing_message,
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn service(&self) -> Service {
        self.service
    }

    async fn check(&self) -> CheckResult {
        match &self.check {
            Some(check) => check.run(self.service, &self.client).await,
            None => CheckResult::degraded(self.service, 0, Some(self.missing_message.to_string())),
        }
    }
}
