//! statuswatch - dependency health monitoring and alerting.
//!
//! Probes the site's external dependencies, keeps 30 days of check history,
//! alerts on state transitions and serves a public status API.
//!
//! - [`probe`]: one self-contained check per monitored service
//! - [`scheduler`]: runs every probe, persists the batch, dispatches alerts
//! - [`db`]: SQLite time-series store with retention
//! - [`alert`]: transition state machine, cooldowns and delivery
//! - [`status`]: read-side current status and uptime percentages
//! - [`web`]: HTTP surface

pub mod alert;
pub mod config;
pub mod db;
pub mod probe;
pub mod scheduler;
pub mod status;
pub mod web;
