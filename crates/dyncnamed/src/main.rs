// # dyncnamed - Dynamic CNAME Daemon
//
// This daemon is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering the remote shell and route sources
// 4. Starting the dynamic DNS app and stopping it on SIGTERM/SIGINT
//
// All reconciliation logic lives in dyncname-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Domains
// - `DYNCNAME_DOMAINS`: Zones and record names, `zone=name,name;zone2`.
//   A zone without names stands for its apex (`@`).
// - `DYNCNAME_CHECK_INTERVAL`: Time between passes, e.g. `30m`, `90s` (default 30m)
// - `DYNCNAME_TTL`: Advisory TTL, e.g. `1h` (logged only)
//
// ### DNS Server
// - `DYNCNAME_DNS_HOST`: Windows DNS server host name or address
// - `DYNCNAME_DNS_PORT`: SSH port (default 22)
// - `DYNCNAME_DNS_USER`: Login user
// - `DYNCNAME_DNS_PASSWORD`: Login password
// - `DYNCNAME_DNS_HOST_KEY`: Expected SHA-256 host key fingerprint (optional)
// - `DYNCNAME_DRY_RUN`: Log commands instead of running them (`true`/`1`)
//
// ### Auto-discovery
// - `DYNCNAME_AUTO_CNAME_ZONE`: Zone receiving reverse-proxied hostnames
// - `DYNCNAME_CADDY_ADMIN_URL`: Caddy admin endpoint (default http://localhost:2019)
// - `DYNCNAME_CADDY_CONFIG_FILE`: Read routes from a Caddy JSON file instead
//
// ### Logging
// - `DYNCNAME_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export DYNCNAME_DOMAINS="corp.example.com=intranet,wiki;example.com"
// export DYNCNAME_DNS_HOST=dc01.corp.example.com
// export DYNCNAME_DNS_USER='CORP\dnsadmin'
// export DYNCNAME_DNS_PASSWORD=secret
// export DYNCNAME_AUTO_CNAME_ZONE=corp.example.com
//
// dyncnamed
// ```

use anyhow::{Context, Result};
use dyncname_core::config::{AppConfig, DnsServerConfig, RouteSourceConfig};
use dyncname_core::executor::ShellCnameUpdater;
use dyncname_core::registry::Registry;
use dyncname_core::traits::RouteSource;
use dyncname_core::{DynamicDnsApp, ReconcilerEvent};
use std::collections::HashMap;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DyncnameExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DyncnameExitCode> for ExitCode {
    fn from(code: DyncnameExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Daemon configuration
#[derive(Debug)]
struct Config {
    app: AppConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut dns_server = DnsServerConfig::new(
            var("DYNCNAME_DNS_HOST").unwrap_or_default(),
            var("DYNCNAME_DNS_USER").unwrap_or_default(),
            // Passwords are taken verbatim
            lookup("DYNCNAME_DNS_PASSWORD").unwrap_or_default(),
        );
        if let Some(port) = var("DYNCNAME_DNS_PORT") {
            dns_server.port = port
                .parse()
                .with_context(|| format!("DYNCNAME_DNS_PORT is not a valid port: {}", port))?;
        }
        dns_server.host_key_fingerprint = var("DYNCNAME_DNS_HOST_KEY");
        dns_server.dry_run = match var("DYNCNAME_DRY_RUN") {
            Some(v) => parse_bool(&v)
                .with_context(|| format!("DYNCNAME_DRY_RUN must be true or false. Got: {}", v))?,
            None => false,
        };

        let auto_cname_zone = var("DYNCNAME_AUTO_CNAME_ZONE");

        let route_source = match (var("DYNCNAME_CADDY_CONFIG_FILE"), var("DYNCNAME_CADDY_ADMIN_URL")) {
            (Some(_), Some(_)) => anyhow::bail!(
                "DYNCNAME_CADDY_CONFIG_FILE and DYNCNAME_CADDY_ADMIN_URL are mutually exclusive"
            ),
            (Some(path), None) => Some(RouteSourceConfig::CaddyFile { path }),
            (None, Some(url)) => Some(RouteSourceConfig::CaddyAdmin { url }),
            (None, None) if auto_cname_zone.is_some() => Some(RouteSourceConfig::default()),
            (None, None) => None,
        };

        let app = AppConfig {
            domains: match var("DYNCNAME_DOMAINS") {
                Some(raw) => parse_domains(&raw)?,
                None => HashMap::new(),
            },
            check_interval: var("DYNCNAME_CHECK_INTERVAL")
                .map(|v| parse_duration("DYNCNAME_CHECK_INTERVAL", &v))
                .transpose()?,
            dns_server,
            ttl: var("DYNCNAME_TTL")
                .map(|v| parse_duration("DYNCNAME_TTL", &v))
                .transpose()?,
            auto_cname_zone,
            route_source,
            engine: Default::default(),
        };

        Ok(Self {
            app,
            log_level: var("DYNCNAME_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.app.validate()?;

        if self.app.dns_server.password.is_empty() && !self.app.dns_server.dry_run {
            anyhow::bail!(
                "DYNCNAME_DNS_PASSWORD is required. \
                Set it via: export DYNCNAME_DNS_PASSWORD=your_password"
            );
        }

        if let Some(source) = &self.app.route_source {
            source.validate()?;
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DYNCNAME_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse `zone=name,name;zone2` into the domains table
fn parse_domains(raw: &str) -> Result<HashMap<String, Vec<String>>> {
    let mut domains: HashMap<String, Vec<String>> = HashMap::new();

    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (zone, names) = entry.split_once('=').unwrap_or((entry, ""));
        let zone = zone.trim();
        if zone.is_empty() {
            anyhow::bail!("DYNCNAME_DOMAINS entry has no zone: '{}'", entry);
        }

        domains.entry(zone.to_string()).or_default().extend(
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
        );
    }

    Ok(domains)
}

fn parse_duration(key: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .with_context(|| format!("{} is not a valid duration (e.g. 30m, 90s). Got: {}", key, value))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DyncnameExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DyncnameExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyncnameExitCode::ConfigError.into();
    }

    info!("Starting dyncnamed daemon");
    info!(
        zones = config.app.domains.len(),
        check_interval = ?config.app.effective_check_interval(),
        dry_run = config.app.dns_server.dry_run,
        "Configuration loaded"
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyncnameExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DyncnameExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                let fatal = e
                    .downcast_ref::<dyncname_core::Error>()
                    .is_some_and(dyncname_core::Error::is_fatal);
                if fatal {
                    DyncnameExitCode::ConfigError
                } else {
                    DyncnameExitCode::RuntimeError
                }
            }
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let registry = Registry::new();

    #[cfg(feature = "ssh")]
    {
        info!("Registering SSH remote shell");
        dyncname_ssh::register(&registry);
    }

    #[cfg(feature = "caddy")]
    {
        info!("Registering Caddy route sources");
        dyncname_caddy::register(&registry);
    }

    let shell = registry.create_shell(&config.app.dns_server)?;
    let updater =
        Arc::new(ShellCnameUpdater::new(shell).with_dry_run(config.app.dns_server.dry_run));

    // The route table is only read when auto-discovery is enabled
    let route_source: Option<Arc<dyn RouteSource>> =
        match (&config.app.auto_cname_zone, &config.app.route_source) {
            (Some(_), Some(source_config)) => {
                info!(source = source_config.type_name(), "Using route source");
                Some(Arc::from(registry.create_route_source(source_config)?))
            }
            (None, Some(source_config)) => {
                warn!(
                    source = source_config.type_name(),
                    "Route source configured without DYNCNAME_AUTO_CNAME_ZONE, ignoring it"
                );
                None
            }
            _ => None,
        };

    let shutdown_timeout = config.app.engine.shutdown_timeout();
    let mut app = DynamicDnsApp::provision(config.app, updater, route_source)?;
    app.start().await?;

    if let Some(domains) = app.domains() {
        if domains.is_empty() {
            warn!("No CNAME records to manage; passes will be no-ops");
        }
        for target in domains.targets() {
            info!(zone = %target.zone, name = %target.name, "Managing record");
        }
    }

    if let Some(mut events) = app.take_events() {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    ReconcilerEvent::PassFinished { failed, .. } if failed > 0 => {
                        warn!(?event, "Pass finished with failures")
                    }
                    event => debug!(?event, "Reconciler event"),
                }
            }
        });
    }

    info!("Daemon initialized successfully");

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);
    info!("Shutting down daemon");

    app.shutdown(shutdown_timeout).await?;
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
