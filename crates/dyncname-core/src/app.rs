//! Lifecycle Controller
//!
//! Wires the pieces together in the order the module lifecycle expects:
//!
//! 1. [`DynamicDnsApp::provision`]: validate configuration, apply defaults
//! 2. [`DynamicDnsApp::start`]: seed the domain map, run discovery once if an
//!    auto-discovery zone is configured, freeze the map, spawn the loop
//! 3. [`DynamicDnsApp::stop`]: signal cancellation and return immediately,
//!    or [`DynamicDnsApp::shutdown`] to also wait for the loop with a bound

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::discovery;
use crate::domains::{DomainMap, FrozenDomains};
use crate::engine::{Reconciler, ReconcilerEvent};
use crate::error::{Error, Result};
use crate::traits::{CnameUpdater, RouteSource};

/// The dynamic DNS app: static domains plus discovered routes, kept in sync
pub struct DynamicDnsApp {
    config: AppConfig,

    /// Validated interval, default applied
    check_interval: Duration,

    updater: Arc<dyn CnameUpdater>,

    /// Required when `auto_cname_zone` is set
    route_source: Option<Arc<dyn RouteSource>>,

    /// Set once started
    domains: Option<FrozenDomains>,

    shutdown: CancellationToken,
    task: Option<JoinHandle<Result<()>>>,
    events: Option<mpsc::Receiver<ReconcilerEvent>>,
}

impl DynamicDnsApp {
    /// Validate configuration and prepare the app
    ///
    /// Fails with [`Error::Config`] if the check interval is under one
    /// second, or if auto-discovery is enabled without a route source.
    pub fn provision(
        config: AppConfig,
        updater: Arc<dyn CnameUpdater>,
        route_source: Option<Arc<dyn RouteSource>>,
    ) -> Result<Self> {
        config.validate()?;

        if config.auto_cname_zone.is_some() && route_source.is_none() {
            return Err(Error::config(
                "auto_cname_zone is set but no route source is available",
            ));
        }

        let check_interval = config.effective_check_interval();
        debug!(
            check_interval = ?check_interval,
            ttl = ?config.ttl,
            auto_cname_zone = ?config.auto_cname_zone,
            "Provisioned dynamic DNS app"
        );

        Ok(Self {
            config,
            check_interval,
            updater,
            route_source,
            domains: None,
            shutdown: CancellationToken::new(),
            task: None,
            events: None,
        })
    }

    /// The effective check interval
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// The configuration the app was provisioned with
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The frozen desired state, once started
    pub fn domains(&self) -> Option<&FrozenDomains> {
        self.domains.as_ref()
    }

    /// Whether the loop task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Take the reconciler event receiver (available after start)
    ///
    /// Until taken, the app holds the receiver and events queue up to
    /// `engine.event_channel_capacity`; later ones are dropped with a single
    /// warning per backlog.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ReconcilerEvent>> {
        self.events.take()
    }

    /// Build the desired state: configured domains plus discovered routes
    ///
    /// Discovery failures are returned as-is; the map is never partially
    /// augmented.
    pub async fn build_domains(&self) -> Result<DomainMap> {
        let mut domains = DomainMap::from_config(&self.config.domains);

        if let Some(zone) = &self.config.auto_cname_zone {
            let source = self.route_source.as_ref().ok_or_else(|| {
                Error::config("auto_cname_zone is set but no route source is available")
            })?;

            let table = source.snapshot().await?;
            let observations = discovery::discover(&table, zone)?;
            let added = domains.augment(observations);
            info!(
                zone = %zone,
                source = source.source_name(),
                routes = table.route_count(),
                added,
                "Added reverse proxy CNAMEs"
            );
        }

        Ok(domains)
    }

    /// Run discovery once, then launch the reconciliation loop
    ///
    /// Must be called within a tokio runtime.
    pub async fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::Other("dynamic DNS app already started".to_string()));
        }

        let domains = self
            .build_domains()
            .await
            .map_err(|e| match e {
                Error::Discovery(msg) => {
                    Error::discovery(format!("failed to add reverse proxy CNAMEs: {}", msg))
                }
                other => other,
            })?
            .freeze();

        let (reconciler, events) = Reconciler::new(
            Arc::clone(&self.updater),
            domains.clone(),
            self.check_interval,
            self.config.engine.event_channel_capacity,
        )?;

        info!(
            targets = domains.len(),
            zones = domains.zones().count(),
            "Starting reconciliation loop"
        );

        let token = self.shutdown.clone();
        self.task = Some(tokio::spawn(async move { reconciler.run(token).await }));
        self.domains = Some(domains);
        self.events = Some(events);

        Ok(())
    }

    /// Signal cancellation and return without waiting
    ///
    /// The loop notices on its own once the in-flight update, if any, returns.
    pub fn stop(&self) {
        info!("Stopping dynamic DNS app");
        self.shutdown.cancel();
    }

    /// Signal cancellation and wait for the loop to exit, at most `timeout`
    pub async fn shutdown(&mut self, timeout: Duration) -> Result<()> {
        self.stop();

        let Some(mut task) = self.task.take() else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(Error::Other(format!(
                "reconciliation task failed: {}",
                join_error
            ))),
            Err(_) => {
                warn!(timeout = ?timeout, "Reconciliation loop did not stop in time, aborting");
                task.abort();
                Err(Error::Other(format!("shutdown timeout after {:?}", timeout)))
            }
        }
    }
}

impl Drop for DynamicDnsApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
