//! Reconciliation Loop
//!
//! The Reconciler pushes the desired domain set to the remote DNS authority:
//! - Runs one pass immediately on start, so records are fresh after a restart
//! - Runs one pass per tick of the check interval afterwards
//! - Updates targets one at a time, isolating each target's failure
//! - Stops on cancellation, without starting new work
//!
//! ## Architecture
//!
//! ```text
//!   tick / cancel
//!        │
//!        ▼
//! ┌──────────────┐   targets()   ┌───────────────┐
//! │  Reconciler  │◄──────────────│ FrozenDomains │
//! └──────────────┘               └───────────────┘
//!        │
//!        ├──── update_cname(zone, name) ───► CnameUpdater ───► remote DNS
//!        │
//!        └──── ReconcilerEvent ───► monitoring / tests
//! ```
//!
//! ## States
//!
//! Idle waits on a single `select!` between the next tick and cancellation.
//! Reconciling walks the targets in resolver order. Passes never overlap:
//! the loop awaits each pass before polling the ticker again, and missed
//! ticks are delayed rather than bursted.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MAX_CHECK_INTERVAL;
use crate::domains::{FrozenDomains, ReconciliationTarget};
use crate::error::{Error, Result};
use crate::traits::CnameUpdater;

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilerEvent {
    /// Loop started
    Started {
        targets: usize,
        interval: Duration,
    },

    /// A pass began
    PassStarted {
        pass: u64,
        targets: usize,
    },

    /// One record was updated
    TargetUpdated {
        pass: u64,
        zone: String,
        name: String,
    },

    /// One record failed; the pass continues
    TargetFailed {
        pass: u64,
        zone: String,
        name: String,
        error: String,
    },

    /// A pass ended
    PassFinished {
        pass: u64,
        succeeded: usize,
        failed: usize,
        interrupted: bool,
    },

    /// Loop stopped
    Stopped {
        reason: String,
    },
}

/// Outcome of one update attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum TargetOutcome {
    Updated,
    Failed(String),
}

/// One target and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    pub target: ReconciliationTarget,
    pub outcome: TargetOutcome,
}

/// Per-target results of one pass
///
/// A pass has no overall success or failure, only these outcomes.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub pass: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<TargetReport>,
    /// Cancellation stopped the pass before every target was attempted
    pub interrupted: bool,
}

impl PassReport {
    /// Number of targets updated
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == TargetOutcome::Updated)
            .count()
    }

    /// Number of targets that failed
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Number of targets attempted
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Outcome for a given target, if it was attempted
    pub fn outcome(&self, zone: &str, name: &str) -> Option<&TargetOutcome> {
        self.results
            .iter()
            .find(|r| r.target.zone == zone && r.target.name == name)
            .map(|r| &r.outcome)
    }
}

/// Timer-driven reconciliation controller
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Start with [`Reconciler::run()`] on its own task
/// 3. Cancel the token to stop it
///
/// ## Concurrency
///
/// At most one remote update is in flight at any time. The domain snapshot is
/// immutable, so no locking is involved.
pub struct Reconciler {
    /// Updater for individual records
    updater: Arc<dyn CnameUpdater>,

    /// Desired state
    domains: FrozenDomains,

    /// Time between passes
    interval: Duration,

    /// Passes started so far
    passes: AtomicU64,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<ReconcilerEvent>,

    /// Events dropped because the channel was full
    dropped_events: AtomicU64,

    /// Set while the channel is full, so the warning is logged once per backlog
    channel_full: AtomicBool,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `updater`: CNAME updater implementation
    /// - `domains`: Frozen desired state
    /// - `interval`: Time between passes (non-zero, at most [`MAX_CHECK_INTERVAL`])
    /// - `event_channel_capacity`: Bound of the event channel
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver)
    pub fn new(
        updater: Arc<dyn CnameUpdater>,
        domains: FrozenDomains,
        interval: Duration,
        event_channel_capacity: usize,
    ) -> Result<(Self, mpsc::Receiver<ReconcilerEvent>)> {
        if interval.is_zero() {
            return Err(Error::config("reconciliation interval must be non-zero"));
        }
        if interval > MAX_CHECK_INTERVAL {
            return Err(Error::config(format!(
                "reconciliation interval must be at most {:?}, got {:?}",
                MAX_CHECK_INTERVAL, interval
            )));
        }
        if event_channel_capacity == 0 {
            return Err(Error::config("event_channel_capacity must be > 0"));
        }

        let (tx, rx) = mpsc::channel(event_channel_capacity);

        let reconciler = Self {
            updater,
            domains,
            interval,
            passes: AtomicU64::new(0),
            event_tx: tx,
            dropped_events: AtomicU64::new(0),
            channel_full: AtomicBool::new(false),
        };

        Ok((reconciler, rx))
    }

    /// The desired state this reconciler pushes
    pub fn domains(&self) -> &FrozenDomains {
        &self.domains
    }

    /// Time between passes
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Events dropped so far because nobody drained the channel
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Run the loop until `shutdown` is cancelled
    ///
    /// Cancellation is observed while idle and between targets. A remote
    /// update already in flight is allowed to finish.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            targets = self.domains.len(),
            interval = ?self.interval,
            updater = self.updater.updater_name(),
            "Reconciler started"
        );
        self.emit_event(ReconcilerEvent::Started {
            targets: self.domains.len(),
            interval: self.interval,
        });

        // No initial wait
        if !shutdown.is_cancelled() {
            self.reconcile(Some(&shutdown)).await;
        }

        let now = Instant::now();
        let first_tick = now.checked_add(self.interval).unwrap_or(now);
        let mut ticker = tokio::time::interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    self.emit_event(ReconcilerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = ticker.tick() => {
                    self.reconcile(Some(&shutdown)).await;
                }
            }
        }

        info!("Reconciler stopped");
        Ok(())
    }

    /// Run a single pass over every target
    pub async fn run_pass(&self) -> PassReport {
        self.reconcile(None).await
    }

    async fn reconcile(&self, shutdown: Option<&CancellationToken>) -> PassReport {
        let pass = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
        let targets = self.domains.targets();
        let started_at = Utc::now();

        debug!(pass, targets = targets.len(), "Beginning DNS update");
        self.emit_event(ReconcilerEvent::PassStarted {
            pass,
            targets: targets.len(),
        });

        let mut results = Vec::with_capacity(targets.len());
        let mut interrupted = false;

        for target in targets {
            if shutdown.is_some_and(CancellationToken::is_cancelled) {
                debug!(pass, "Shutdown requested, ending pass early");
                interrupted = true;
                break;
            }

            let outcome = match self.updater.update_cname(&target.zone, &target.name).await {
                Ok(()) => {
                    info!(zone = %target.zone, name = %target.name, "Updated CNAME record");
                    self.emit_event(ReconcilerEvent::TargetUpdated {
                        pass,
                        zone: target.zone.clone(),
                        name: target.name.clone(),
                    });
                    TargetOutcome::Updated
                }
                Err(e) => {
                    // Continue with other records
                    error!(zone = %target.zone, name = %target.name, error = %e, "Failed updating CNAME record");
                    self.emit_event(ReconcilerEvent::TargetFailed {
                        pass,
                        zone: target.zone.clone(),
                        name: target.name.clone(),
                        error: e.to_string(),
                    });
                    TargetOutcome::Failed(e.to_string())
                }
            };

            results.push(TargetReport { target, outcome });
        }

        let report = PassReport {
            pass,
            started_at,
            finished_at: Utc::now(),
            results,
            interrupted,
        };

        info!(
            pass,
            succeeded = report.succeeded(),
            failed = report.failed(),
            interrupted,
            "Finished updating DNS"
        );
        self.emit_event(ReconcilerEvent::PassFinished {
            pass,
            succeeded: report.succeeded(),
            failed: report.failed(),
            interrupted,
        });

        report
    }

    /// Emit a reconciler event
    fn emit_event(&self, event: ReconcilerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {
                self.channel_full.store(false, Ordering::Relaxed);
            }
            // Drop rather than grow
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                if !self.channel_full.swap(true, Ordering::Relaxed) {
                    warn!("Event channel full, dropping events. Consider increasing event_channel_capacity.");
                }
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::DomainMap;
    use async_trait::async_trait;

    struct AlwaysOk;

    #[async_trait]
    impl CnameUpdater for AlwaysOk {
        async fn update_cname(&self, _zone: &str, _name: &str) -> Result<()> {
            Ok(())
        }

        fn updater_name(&self) -> &'static str {
            "always-ok"
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Reconciler::new(
            Arc::new(AlwaysOk),
            DomainMap::new().freeze(),
            Duration::ZERO,
            10,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_huge_interval_rejected() {
        let result = Reconciler::new(
            Arc::new(AlwaysOk),
            DomainMap::new().freeze(),
            humantime::parse_duration("500000000000y").unwrap(),
            10,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_longest_interval_runs_and_stops() {
        let mut map = DomainMap::new();
        map.insert("example.com", "www");
        let (reconciler, _rx) =
            Reconciler::new(Arc::new(AlwaysOk), map.freeze(), MAX_CHECK_INTERVAL, 10).unwrap();

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let handle = tokio::spawn(async move { reconciler.run(token).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        let joined = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop stops");
        assert!(joined.expect("loop task must not panic").is_ok());
    }

    #[tokio::test]
    async fn test_full_channel_counts_drops() {
        let mut map = DomainMap::new();
        map.insert("example.com", "www");
        let (reconciler, _rx) =
            Reconciler::new(Arc::new(AlwaysOk), map.freeze(), Duration::from_secs(1), 1).unwrap();

        // PassStarted fits; TargetUpdated and PassFinished do not
        reconciler.run_pass().await;
        assert_eq!(reconciler.dropped_events(), 2);
    }

    #[tokio::test]
    async fn test_closed_channel_is_not_a_drop() {
        let mut map = DomainMap::new();
        map.insert("example.com", "www");
        let (reconciler, rx) =
            Reconciler::new(Arc::new(AlwaysOk), map.freeze(), Duration::from_secs(1), 1).unwrap();
        drop(rx);

        let report = reconciler.run_pass().await;
        assert_eq!(report.succeeded(), 1);
        assert_eq!(reconciler.dropped_events(), 0);
    }

    #[tokio::test]
    async fn test_empty_pass_is_noop() {
        let (reconciler, mut rx) = Reconciler::new(
            Arc::new(AlwaysOk),
            DomainMap::new().freeze(),
            Duration::from_secs(1),
            10,
        )
        .unwrap();

        let report = reconciler.run_pass().await;
        assert_eq!(report.attempted(), 0);
        assert!(!report.interrupted);
        assert_eq!(
            rx.recv().await,
            Some(ReconcilerEvent::PassStarted { pass: 1, targets: 0 })
        );
    }

    #[tokio::test]
    async fn test_pass_numbers_increase() {
        let mut map = DomainMap::new();
        map.insert("example.com", "www");
        let (reconciler, _rx) =
            Reconciler::new(Arc::new(AlwaysOk), map.freeze(), Duration::from_secs(1), 10).unwrap();

        assert_eq!(reconciler.run_pass().await.pass, 1);
        let second = reconciler.run_pass().await;
        assert_eq!(second.pass, 2);
        assert_eq!(second.outcome("example.com", "www"), Some(&TargetOutcome::Updated));
    }
}
