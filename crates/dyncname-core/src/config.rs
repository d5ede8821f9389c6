//! Configuration types for the dyncname system
//!
//! The configuration mirrors the `dynamic_dns` app options: a static domain
//! map, the remote DNS server credentials, the check interval, an advisory
//! TTL and an optional zone enabling auto-discovery from proxy routes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default reconciliation period
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Smallest accepted reconciliation period
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Largest accepted reconciliation period. The loop schedules ticks on a
/// monotonic clock, which cannot represent arbitrarily distant deadlines.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default Caddy admin endpoint
pub const DEFAULT_CADDY_ADMIN_URL: &str = "http://localhost:2019";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record names keyed by zone
    #[serde(default)]
    pub domains: HashMap<String, Vec<String>>,

    /// Reconciliation period (default: 30m)
    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub check_interval: Option<Duration>,

    /// Remote DNS authority
    #[serde(default)]
    pub dns_server: DnsServerConfig,

    /// Advisory TTL. Logged, never sent to the remote side.
    #[serde(default, with = "humantime_opt", skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Duration>,

    /// Zone receiving hostnames discovered from reverse-proxy routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cname_zone: Option<String>,

    /// Where to read the route table from when auto-discovery is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_source: Option<RouteSourceConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Add record names for a zone
    pub fn with_domains<I, S>(mut self, zone: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domains
            .entry(zone.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the check interval
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    /// Set the auto-discovery zone
    pub fn with_auto_cname_zone(mut self, zone: impl Into<String>) -> Self {
        self.auto_cname_zone = Some(zone.into());
        self
    }

    /// The check interval, falling back to [`DEFAULT_CHECK_INTERVAL`]
    pub fn effective_check_interval(&self) -> Duration {
        self.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(interval) = self.check_interval
            && interval < MIN_CHECK_INTERVAL
        {
            return Err(crate::Error::config(format!(
                "check interval must be at least 1 second, got {:?}",
                interval
            )));
        }

        if let Some(interval) = self.check_interval
            && interval > MAX_CHECK_INTERVAL
        {
            return Err(crate::Error::config(format!(
                "check interval must be at most {}, got {}",
                humantime::format_duration(MAX_CHECK_INTERVAL),
                humantime::format_duration(interval)
            )));
        }

        for zone in self.domains.keys() {
            if zone.trim().is_empty() {
                return Err(crate::Error::config("zone name cannot be empty"));
            }
        }

        if let Some(zone) = &self.auto_cname_zone
            && zone.trim().is_empty()
        {
            return Err(crate::Error::config("auto_cname_zone cannot be empty"));
        }

        self.dns_server.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Remote DNS authority configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DnsServerConfig {
    /// Remote shell implementation to use (registry key)
    #[serde(rename = "type", default = "default_shell_type")]
    pub shell_type: String,

    /// Host name or address of the DNS server
    #[serde(default)]
    pub host: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login principal
    #[serde(default)]
    pub user: String,

    /// Login credential
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: String,

    /// Expected SHA-256 host key fingerprint. Any key is accepted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_key_fingerprint: Option<String>,

    /// Bound on connect + authentication (in seconds). The command itself is not bounded.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Log commands instead of running them
    #[serde(default)]
    pub dry_run: bool,
}

impl DnsServerConfig {
    /// Create a server config for the default shell type
    pub fn new(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Validate the server configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.shell_type.is_empty() {
            return Err(crate::Error::config("dns_server.type cannot be empty"));
        }
        if self.host.is_empty() {
            return Err(crate::Error::config("dns_server.host cannot be empty"));
        }
        if self.user.is_empty() {
            return Err(crate::Error::config("dns_server.user cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("dns_server.port must be > 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(crate::Error::config(
                "dns_server.connect_timeout_secs must be > 0",
            ));
        }
        Ok(())
    }

    /// Connect + authentication timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DnsServerConfig {
    fn default() -> Self {
        Self {
            shell_type: default_shell_type(),
            host: String::new(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            host_key_fingerprint: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            dry_run: false,
        }
    }
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for DnsServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsServerConfig")
            .field("shell_type", &self.shell_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<REDACTED>")
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

fn default_shell_type() -> String {
    "ssh".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    30
}

/// Route table source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteSourceConfig {
    /// Live routes from the Caddy admin API
    CaddyAdmin {
        /// Admin endpoint base URL
        #[serde(default = "default_caddy_admin_url")]
        url: String,
    },

    /// Routes from a Caddy JSON config file
    CaddyFile {
        /// Path to the JSON config
        path: String,
    },

    /// Custom route source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RouteSourceConfig {
    /// Validate the route source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RouteSourceConfig::CaddyAdmin { url } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "Caddy admin URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            RouteSourceConfig::CaddyFile { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Caddy config path cannot be empty"));
                }
                Ok(())
            }
            RouteSourceConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom route source factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the route source type name
    pub fn type_name(&self) -> &str {
        match self {
            RouteSourceConfig::CaddyAdmin { .. } => "caddy_admin",
            RouteSourceConfig::CaddyFile { .. } => "caddy_file",
            RouteSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for RouteSourceConfig {
    fn default() -> Self {
        RouteSourceConfig::CaddyAdmin {
            url: default_caddy_admin_url(),
        }
    }
}

fn default_caddy_admin_url() -> String {
    DEFAULT_CADDY_ADMIN_URL.to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the reconciler event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// How long a graceful shutdown waits for the running pass (in seconds)
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    /// Graceful shutdown timeout
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// Human-readable durations ("30m", "1h 30m") for optional fields
mod humantime_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_str(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> DnsServerConfig {
        DnsServerConfig::new("dns.corp.local", "admin", "secret")
    }

    #[test]
    fn test_default_interval_when_unset() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_check_interval(), DEFAULT_CHECK_INTERVAL);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_check_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_sub_second_interval_rejected() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_check_interval(Duration::from_millis(999));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_interval_rejected() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_check_interval(humantime::parse_duration("500000000000y").unwrap());
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_check_interval(MAX_CHECK_INTERVAL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_one_second_interval_accepted() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_check_interval(Duration::from_secs(1));
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_check_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_host_rejected() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_auto_zone_rejected() {
        let config = AppConfig {
            dns_server: server(),
            ..AppConfig::default()
        }
        .with_auto_cname_zone("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_human_durations() {
        let json = serde_json::json!({
            "domains": { "example.com": ["@", "www"] },
            "check_interval": "5m",
            "ttl": "1h",
            "dns_server": { "host": "dns.corp.local", "user": "admin", "password": "pw" },
            "auto_cname_zone": "example.com",
            "route_source": { "type": "caddy_admin" }
        });

        let config: AppConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.check_interval, Some(Duration::from_secs(300)));
        assert_eq!(config.ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.dns_server.port, 22);
        assert_eq!(config.dns_server.shell_type, "ssh");
        assert_eq!(
            config.route_source.as_ref().map(|s| s.type_name()),
            Some("caddy_admin")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_duration_fails_to_parse() {
        let json = serde_json::json!({ "check_interval": "-5s" });
        let parsed: Result<AppConfig, _> = serde_json::from_value(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", server());
        assert!(rendered.contains("<REDACTED>"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_route_source_validation() {
        assert!(RouteSourceConfig::default().validate().is_ok());
        assert!(
            RouteSourceConfig::CaddyAdmin {
                url: "localhost:2019".to_string()
            }
            .validate()
            .is_err()
        );
        assert!(
            RouteSourceConfig::CaddyFile {
                path: String::new()
            }
            .validate()
            .is_err()
        );
    }
}
