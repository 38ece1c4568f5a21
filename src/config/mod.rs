//! Configuration management for yt-indexer
//!
//! Configuration is read from a TOML or JSON file, then a small set of
//! environment variables override deployment-specific values (credentials,
//! endpoints, identity). Every field has a default, so a file only needs the
//! values that differ.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable holding a comma-separated key pool
pub const ENV_KEYS: &str = "YT_INDEXER_KEYS";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External API polling
    pub fetch: FetchConfig,

    /// Read API server
    pub server: ServerConfig,

    /// Search index connection and bulk settings
    pub search: SearchConfig,

    /// Leader election
    pub election: ElectionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// External data API polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// API key pool, rotated on quota exhaustion
    pub keys: Vec<String>,

    /// Search endpoint URL
    pub base_url: String,

    /// Fixed query parameters sent with every request
    pub query_params: BTreeMap<String, String>,

    /// Seconds between polling ticks
    pub interval_secs: u64,

    /// Timeout for one API request in seconds
    pub request_timeout_secs: u64,

    /// Initial watermark distance from process start in seconds
    pub lookback_secs: u64,
}

/// Read API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// OpenSearch endpoint URL
    pub url: String,

    /// Index name
    pub index: String,

    /// Username (optional)
    pub username: Option<String>,

    /// Password (optional)
    pub password: Option<String>,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// Concurrent bulk requests; available parallelism when unset
    pub bulk_workers: Option<usize>,

    /// Encoded bytes per bulk request
    pub bulk_flush_bytes: usize,
}

/// Which coordination backend to elect with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionBackendKind {
    Redis,
    Standalone,
}

/// Leader election configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectionConfig {
    pub backend: ElectionBackendKind,

    /// Redis connection URL
    pub redis_url: String,

    /// Key all replicas campaign on
    pub election_key: String,

    /// Identity of this replica; falls back to `HOSTNAME`
    pub candidate_id: Option<String>,

    /// Lease lifetime in seconds
    pub lease_ttl_secs: u64,

    /// Delay between lease acquisition attempts in milliseconds
    pub campaign_retry_ms: u64,

    /// How often the elector checks the lease is still held, in milliseconds
    pub lease_check_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load a file, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file; `.json` files are JSON, anything else TOML
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config file: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))
        }
    }

    /// Override file values from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(keys) = std::env::var(ENV_KEYS) {
            let keys: Vec<String> = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
            if !keys.is_empty() {
                self.fetch.keys = keys;
            }
        }

        if let Ok(url) = std::env::var("OPENSEARCH_URL") {
            self.search.url = url;
        }
        if let Ok(username) = std::env::var("OPENSEARCH_USERNAME") {
            self.search.username = Some(username);
        }
        if let Ok(password) = std::env::var("OPENSEARCH_PASSWORD") {
            self.search.password = Some(password);
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.election.redis_url = url;
        }

        if self.election.candidate_id.is_none() {
            self.election.candidate_id = std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty());
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.fetch.base_url)
            .with_context(|| format!("Invalid fetch.base_url: {}", self.fetch.base_url))?;

        if self.fetch.interval_secs == 0 {
            anyhow::bail!("fetch.interval_secs must be greater than 0");
        }

        if self.fetch.request_timeout_secs == 0 {
            anyhow::bail!("fetch.request_timeout_secs must be greater than 0");
        }

        if self.server.request_timeout_secs == 0 {
            anyhow::bail!("server.request_timeout_secs must be greater than 0");
        }

        if self.search.index.is_empty() {
            anyhow::bail!("search.index must not be empty");
        }

        if self.search.bulk_workers == Some(0) {
            anyhow::bail!("search.bulk_workers must be greater than 0");
        }

        if self.search.bulk_flush_bytes == 0 {
            anyhow::bail!("search.bulk_flush_bytes must be greater than 0");
        }

        if self.election.election_key.is_empty() {
            anyhow::bail!("election.election_key must not be empty");
        }

        if self.election.lease_ttl_secs == 0 {
            anyhow::bail!("election.lease_ttl_secs must be greater than 0");
        }

        if self.election.campaign_retry_ms == 0 {
            anyhow::bail!("election.campaign_retry_ms must be greater than 0");
        }

        if self.election.lease_check_interval_ms == 0 {
            anyhow::bail!("election.lease_check_interval_ms must be greater than 0");
        }

        match self.logging.format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("logging.format must be text or json, got {other}"),
        }

        Ok(())
    }
}

impl FetchConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }
}

impl ServerConfig {
    /// Socket address string to bind
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ElectionConfig {
    /// Candidate identity, generated when neither config nor `HOSTNAME` set one
    #[must_use]
    pub fn candidate(&self) -> String {
        self.candidate_id
            .clone()
            .unwrap_or_else(|| format!("yt-indexer-{}", uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    #[must_use]
    pub fn campaign_retry(&self) -> Duration {
        Duration::from_millis(self.campaign_retry_ms)
    }

    #[must_use]
    pub fn lease_check_interval(&self) -> Duration {
        Duration::from_millis(self.lease_check_interval_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let query_params = [
            ("part", "snippet"),
            ("type", "video"),
            ("order", "date"),
            ("maxResults", "25"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            keys: Vec::new(),
            base_url: String::from("https://www.googleapis.com/youtube/v3/search"),
            query_params,
            interval_secs: 10,
            request_timeout_secs: 25,
            lookback_secs: 3600,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8880,
            request_timeout_secs: 20,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9200"),
            index: String::from("youtube-videos"),
            username: None,
            password: None,
            request_timeout_secs: 30,
            bulk_workers: None,
            bulk_flush_bytes: crate::search::bulk::DEFAULT_FLUSH_BYTES,
        }
    }
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            backend: ElectionBackendKind::Redis,
            redis_url: String::from("redis://localhost:6379"),
            election_key: String::from("yt-indexer/leader"),
            candidate_id: None,
            lease_ttl_secs: 60,
            campaign_retry_ms: 500,
            lease_check_interval_ms: 1000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const OVERRIDE_VARS: [&str; 6] = [
        ENV_KEYS,
        "OPENSEARCH_URL",
        "OPENSEARCH_USERNAME",
        "OPENSEARCH_PASSWORD",
        "REDIS_URL",
        "HOSTNAME",
    ];

    fn clear_env() {
        for var in OVERRIDE_VARS {
            std::env::remove_var(var);
        }
    }

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8880");
        assert_eq!(config.fetch.interval(), Duration::from_secs(10));
        assert_eq!(config.fetch.request_timeout(), Duration::from_secs(25));
        assert_eq!(config.fetch.lookback(), Duration::from_secs(3600));
        assert_eq!(config.election.election_key, "yt-indexer/leader");
    }

    #[test]
    fn test_invalid_interval() {
        let mut config = Config::default();
        config.fetch.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = Config::default();
        config.fetch.base_url = "::not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "yaml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_bulk_workers_rejected() {
        let mut config = Config::default();
        config.search.bulk_workers = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lease_check_interval_rejected() {
        let mut config = Config::default();
        config.election.lease_check_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("lease_check_interval_ms"));
    }

    #[test]
    fn test_zero_server_timeout_rejected() {
        let mut config = Config::default();
        config.server.request_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.request_timeout_secs"));
    }

    #[test]
    #[serial]
    fn test_partial_toml_keeps_defaults() {
        clear_env();
        let file = write_config(
            ".toml",
            r#"
            [fetch]
            keys = ["k1", "k2"]
            interval_secs = 30

            [fetch.query_params]
            q = "rust"

            [search]
            index = "videos-test"

            [election]
            backend = "standalone"
            "#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fetch.keys, vec!["k1", "k2"]);
        assert_eq!(config.fetch.interval_secs, 30);
        assert_eq!(config.fetch.query_params.get("q").map(String::as_str), Some("rust"));
        assert_eq!(config.fetch.request_timeout_secs, 25);
        assert_eq!(config.search.index, "videos-test");
        assert_eq!(config.search.url, "http://localhost:9200");
        assert_eq!(config.election.backend, ElectionBackendKind::Standalone);
        assert_eq!(config.server.port, 8880);
    }

    #[test]
    #[serial]
    fn test_json_config() {
        clear_env();
        let file = write_config(
            ".json",
            r#"{ "fetch": { "keys": ["a"] }, "server": { "port": 9000 } }"#,
        );

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.fetch.keys, vec!["a"]);
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var(ENV_KEYS, "x, y ,z");
        std::env::set_var("OPENSEARCH_URL", "http://search:9200");
        std::env::set_var("REDIS_URL", "redis://coord:6379");
        std::env::set_var("HOSTNAME", "replica-2");

        let file = write_config(".toml", "[fetch]\nkeys = [\"file-key\"]\n");
        let config = Config::load(file.path()).unwrap();
        clear_env();

        assert_eq!(config.fetch.keys, vec!["x", "y", "z"]);
        assert_eq!(config.search.url, "http://search:9200");
        assert_eq!(config.election.redis_url, "redis://coord:6379");
        assert_eq!(config.election.candidate(), "replica-2");
    }

    #[test]
    #[serial]
    fn test_configured_candidate_wins_over_hostname() {
        clear_env();
        std::env::set_var("HOSTNAME", "from-env");

        let mut config = Config::default();
        config.election.candidate_id = Some("from-file".to_string());
        config.apply_env_overrides();
        clear_env();

        assert_eq!(config.election.candidate(), "from-file");
    }

    #[test]
    fn test_generated_candidate() {
        let config = ElectionConfig::default();
        assert!(config.candidate().starts_with("yt-indexer-"));
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::from_file(Path::new("/nonexistent/yt-indexer.toml")).is_err());
    }
}
