//! Configuration module for statuswatch.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Missing credentials never fail startup: probes that need them report
//! `degraded` and alerting is switched off.

use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "statuswatch.db")
    pub db_path: String,
    /// Interval of the built-in check loop; zero leaves scheduling to an
    /// external caller of the trigger endpoint (default: 300s)
    pub check_interval: Duration,
    /// Local/dev mode skips trigger authorization
    pub dev_mode: bool,
    /// Shared secret for the trigger endpoint
    pub cron_secret: Option<String>,

    pub site_url: String,
    pub crazyaces_url: String,
    pub opensea_api_url: String,
    pub opensea_key: Option<String>,
    pub mailerlite_api_url: String,
    pub mailerlite_api_key: Option<String>,
    pub redis_url: Option<String>,
    pub redis_token: Option<String>,

    pub telegram_api_base: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "statuswatch.db".to_string(),
            check_interval: Duration::from_secs(300),
            dev_mode: false,
            cron_secret: None,
            site_url: "https://dev.playingarts.com".to_string(),
            crazyaces_url: "https://play.playingarts.com".to_string(),
            opensea_api_url: "https://api.opensea.io/api/v2/collections/cryptoedition/stats".to_string(),
            opensea_key: None,
            mailerlite_api_url: "https://api.mailerlite.com/api/v2/me".to_string(),
            mailerlite_api_key: None,
            redis_url: None,
            redis_token: None,
            telegram_api_base: "https://api.telegram.org".to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATUSWATCH_HTTP_PORT`: HTTP port (default: 8080)
    /// - `STATUSWATCH_DB_PATH`: Database file path (default: "statuswatch.db")
    /// - `STATUSWATCH_CHECK_INTERVAL_SECS`: built-in check loop period, 0 disables (default: 300)
    /// - `STATUSWATCH_DEV`: "1"/"true" enables dev mode
    /// - `CRON_SECRET`: trigger endpoint secret
    /// - `SITE_URL`, `CRAZYACES_URL`, `OPENSEA_API_URL`, `MAILERLITE_API_URL`: probe targets
    /// - `OPENSEA_KEY`, `MAILERLITE_API_KEY`: third-party API keys
    /// - `UPSTASH_REDIS_REST_URL`, `UPSTASH_REDIS_REST_TOKEN`: cache REST endpoint
    /// - `TELEGRAM_API_BASE`, `TELEGRAM_BOT_TOKEN`, `TELEGRAM_CHAT_ID`: alert channel
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = var("STATUSWATCH_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(db_path) = var("STATUSWATCH_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Some(secs) = var("STATUSWATCH_CHECK_INTERVAL_SECS").and_then(|s| s.parse().ok()) {
            cfg.check_interval = Duration::from_secs(secs);
        }

        if let Some(dev) = var("STATUSWATCH_DEV") {
            cfg.dev_mode = matches!(dev.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        cfg.cron_secret = var("CRON_SECRET");

        if let Some(url) = var("SITE_URL") {
            cfg.site_url = url;
        }
        if let Some(url) = var("CRAZYACES_URL") {
            cfg.crazyaces_url = url;
        }
        if let Some(url) = var("OPENSEA_API_URL") {
            cfg.opensea_api_url = url;
        }
        if let Some(url) = var("MAILERLITE_API_URL") {
            cfg.mailerlite_api_url = url;
        }
        if let Some(base) = var("TELEGRAM_API_BASE") {
            cfg.telegram_api_base = base;
        }

        cfg.opensea_key = var("OPENSEA_KEY");
        cfg.mailerlite_api_key = var("MAILERLITE_API_KEY");
        cfg.redis_url = var("UPSTASH_REDIS_REST_URL");
        cfg.redis_token = var("UPSTASH_REDIS_REST_TOKEN");
        cfg.telegram_bot_token = var("TELEGRAM_BOT_TOKEN");
        cfg.telegram_chat_id = var("TELEGRAM_CHAT_ID");

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "statuswatch.db");
        assert_eq!(cfg.check_interval, Duration::from_secs(300));
        assert!(!cfg.dev_mode);
        assert!(cfg.cron_secret.is_none());
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let vars: HashMap<&str, &str> = [
            ("STATUSWATCH_HTTP_PORT", "9000"),
            ("STATUSWATCH_CHECK_INTERVAL_SECS", "0"),
            ("STATUSWATCH_DEV", "true"),
            ("CRON_SECRET", "s3cret"),
            ("OPENSEA_KEY", "   "),
            ("UPSTASH_REDIS_REST_URL", "https://cache.example"),
        ]
        .into_iter()
        .collect();

        let cfg = ServerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.check_interval, Duration::ZERO);
        assert!(cfg.dev_mode);
        assert_eq!(cfg.cron_secret.as_deref(), Some("s3cret"));
        assert!(cfg.opensea_key.is_none());
        assert_eq!(cfg.redis_url.as_deref(), Some("https://cache.example"));
        assert!(cfg.redis_token.is_none());
    }

    #[test]
    fn test_bad_port_keeps_default() {
        let cfg = ServerConfig::from_lookup(|k| (k == "STATUSWATCH_HTTP_PORT").then(|| "nope".to_string()));
        assert_eq!(cfg.http_port, 8080);
    }
}
