//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monitored dependency. The set is closed; adding a service means
/// extending this enum and the `CHECK` constraint in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Website,
    Database,
    Graphql,
    Opensea,
    Mailerlite,
    Redis,
    Crazyaces,
}

impl Service {
    /// Every service, in registration order.
    pub const ALL: [Service; 7] = [
        Service::Website,
        Service::Database,
        Service::Graphql,
        Service::Opensea,
        Service::Mailerlite,
        Service::Redis,
        Service::Crazyaces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Website => "website",
            Service::Database => "database",
            Service::Graphql => "graphql",
            Service::Opensea => "opensea",
            Service::Mailerlite => "mailerlite",
            Service::Redis => "redis",
            Service::Crazyaces => "crazyaces",
        }
    }

    /// Human-readable name used in alert messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Service::Website => "Website",
            Service::Database => "Database",
            Service::Graphql => "GraphQL API",
            Service::Opensea => "OpenSea API",
            Service::Mailerlite => "MailerLite",
            Service::Redis => "Upstash Redis",
            Service::Crazyaces => "Crazy Aces",
        }
    }

    /// Position on the public status page.
    pub fn display_order(&self) -> usize {
        match self {
            Service::Website => 0,
            Service::Database => 1,
            Service::Mailerlite => 2,
            Service::Redis => 3,
            Service::Graphql => 4,
            Service::Opensea => 5,
            Service::Crazyaces => 6,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .into_iter()
            .find(|svc| svc.as_str() == s)
            .ok_or_else(|| format!("unknown service: {}", s))
    }
}

/// Health of a service at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Degraded,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Degraded => "degraded",
        }
    }

    /// Ordering used when folding many statuses into one: down wins over
    /// degraded, degraded wins over up.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Up => 0,
            Status::Degraded => 1,
            Status::Down => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Status::Up),
            "down" => Ok(Status::Down),
            "degraded" => Ok(Status::Degraded),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// The normalized outcome of one probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub service: Service,
    pub status: Status,
    /// Wall-clock milliseconds around the probe's IO
    pub latency: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    pub fn up(service: Service, latency: u64) -> Self {
        Self {
            service,
            status: Status::Up,
            latency,
            message: None,
        }
    }

    pub fn down(service: Service, latency: u64, message: impl Into<String>) -> Self {
        Self {
            service,
            status: Status::Down,
            latency,
            message: Some(message.into()),
        }
    }

    pub fn degraded(service: Service, latency: u64, message: Option<String>) -> Self {
        Self {
            service,
            status: Status::Degraded,
            latency,
            message,
        }
    }

    /// Attach a timestamp, producing the persisted form.
    pub fn at(self, timestamp: DateTime<Utc>) -> UptimeCheckRecord {
        UptimeCheckRecord {
            service: self.service,
            status: self.status,
            latency: self.latency,
            message: self.message,
            timestamp,
        }
    }
}

/// A persisted check. Never updated; expires after the retention window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeCheckRecord {
    pub service: Service,
    pub status: Status,
    pub latency: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<UptimeCheckRecord> for CheckResult {
    fn from(r: UptimeCheckRecord) -> Self {
        Self {
            service: r.service,
            status: r.status,
            latency: r.latency,
            message: r.message,
        }
    }
}

/// Check counts for one service inside a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UptimeCount {
    pub total: i64,
    pub up: i64,
}

impl UptimeCount {
    /// Share of `up` checks as a percentage rounded to two decimals.
    /// An empty window counts as fully available.
    pub fn percentage(&self) -> f64 {
        if self.total <= 0 {
            return 100.0;
        }
        let raw = self.up as f64 / self.total as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}
