//! Test doubles and common utilities for contract tests
//!
//! These doubles record what the engine asks of them without touching the
//! network.

#![allow(dead_code)]

use async_trait::async_trait;
use dyncname_core::engine::ReconcilerEvent;
use dyncname_core::error::{Error, Result};
use dyncname_core::traits::{CnameUpdater, RemoteShell};
use dyncname_core::{AppConfig, DnsServerConfig, DomainMap, FrozenDomains};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// A CnameUpdater that records calls and fails on chosen targets
pub struct RecordingUpdater {
    /// (zone, name) of every call, in order
    calls: Mutex<Vec<(String, String)>>,
    /// Targets that return an error
    failing: HashSet<(String, String)>,
    /// Simulated latency of each update
    delay: Duration,
    /// Updates currently running
    in_flight: AtomicUsize,
    /// Highest value `in_flight` ever reached
    max_in_flight: AtomicUsize,
    /// Updates that ran to completion
    completed: AtomicUsize,
}

impl RecordingUpdater {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Fail every update of this target
    pub fn failing_on(mut self, zone: &str, name: &str) -> Self {
        self.failing.insert((zone.to_string(), name.to_string()));
        self
    }

    /// Make every update take `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, zone: &str, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(z, n)| z == zone && n == name)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CnameUpdater for RecordingUpdater {
    async fn update_cname(&self, zone: &str, name: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((zone.to_string(), name.to_string()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&(zone.to_string(), name.to_string())) {
            return Err(Error::transport(format!("unreachable while updating {}", name)));
        }
        Ok(())
    }

    fn updater_name(&self) -> &'static str {
        "recording"
    }
}

/// A RemoteShell that returns a fixed output (or transport error) per record name
pub struct ScriptedShell {
    /// Substring of the command → output to return
    replies: Vec<(String, std::result::Result<String, String>)>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `output` to commands containing `-Name <name> `
    pub fn reply(mut self, name: &str, output: &str) -> Self {
        self.replies
            .push((format!("-Name {} ", name), Ok(output.to_string())));
        self
    }

    /// Fail the transport for commands containing `-Name <name> `
    pub fn refuse(mut self, name: &str, reason: &str) -> Self {
        self.replies
            .push((format!("-Name {} ", name), Err(reason.to_string())));
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn run(&self, command: &str) -> Result<String> {
        self.commands.lock().unwrap().push(command.to_string());
        for (needle, reply) in &self.replies {
            if command.contains(needle.as_str()) {
                return match reply {
                    Ok(output) => Ok(output.clone()),
                    Err(reason) => Err(Error::transport(reason.clone())),
                };
            }
        }
        Ok(String::new())
    }

    fn shell_name(&self) -> &'static str {
        "scripted"
    }
}

/// Build a frozen domain set from literal pairs
pub fn domains(entries: &[(&str, &[&str])]) -> FrozenDomains {
    let mut map = DomainMap::new();
    for (zone, names) in entries {
        map.extend_zone(*zone, names.iter().copied());
    }
    map.freeze()
}

/// A valid server configuration
pub fn server_config() -> DnsServerConfig {
    DnsServerConfig::new("dns.corp.local", "administrator", "hunter2")
}

/// A valid app configuration with the given static domains
pub fn app_config(entries: &[(&str, &[&str])]) -> AppConfig {
    let mut config = AppConfig {
        dns_server: server_config(),
        ..AppConfig::default()
    };
    for (zone, names) in entries {
        config = config.with_domains(*zone, names.iter().copied());
    }
    config
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<ReconcilerEvent>) -> Vec<ReconcilerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count PassStarted events
pub fn passes_started(events: &[ReconcilerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ReconcilerEvent::PassStarted { .. }))
        .count()
}
