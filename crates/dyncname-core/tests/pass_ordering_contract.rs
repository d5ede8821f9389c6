//! Contract Test: Sequential Passes
//!
//! Constraints verified:
//! - Passes never overlap, even when a pass outlasts the check interval
//! - At most one remote update is in flight at any time
//! - The loop keeps ticking after the initial pass
//!
//! If this test fails, someone has introduced per-tick or per-target
//! concurrency into the reconciliation loop.

mod common;

use common::*;
use dyncname_core::{Reconciler, ReconcilerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn slow_passes_never_interleave() {
    // Each pass takes ~60ms against a 20ms interval
    let updater = Arc::new(RecordingUpdater::new().with_delay(Duration::from_millis(30)));
    let (reconciler, mut events) = Reconciler::new(
        updater.clone(),
        domains(&[("example.com", &["a", "b"])]),
        Duration::from_millis(20),
        1000,
    )
    .expect("reconciler construction succeeds");

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { reconciler.run(token).await });

    tokio::time::sleep(Duration::from_millis(400)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "loop should stop within 5 seconds");
    result.unwrap().unwrap().expect("clean stop");

    assert_eq!(updater.max_in_flight(), 1, "updates must be strictly sequential");

    let seen = drain_events(&mut events);
    assert!(passes_started(&seen) >= 2, "loop should keep ticking");

    // Every PassStarted is closed by its own PassFinished before the next one
    let mut open: Option<u64> = None;
    for event in &seen {
        match event {
            ReconcilerEvent::PassStarted { pass, .. } => {
                assert!(open.is_none(), "pass {} started while {:?} was running", pass, open);
                open = Some(*pass);
            }
            ReconcilerEvent::PassFinished { pass, .. } => {
                assert_eq!(open, Some(*pass), "pass {} finished out of order", pass);
                open = None;
            }
            ReconcilerEvent::TargetUpdated { pass, .. }
            | ReconcilerEvent::TargetFailed { pass, .. } => {
                assert_eq!(open, Some(*pass), "target reported outside its pass");
            }
            _ => {}
        }
    }
}

#[tokio::test]
async fn pass_numbers_are_consecutive() {
    let updater = Arc::new(RecordingUpdater::new());
    let (reconciler, mut events) = Reconciler::new(
        updater.clone(),
        domains(&[("example.com", &["a"])]),
        Duration::from_millis(25),
        1000,
    )
    .unwrap();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move { reconciler.run(token).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();
    handle.await.unwrap().unwrap();

    let passes: Vec<u64> = drain_events(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            ReconcilerEvent::PassStarted { pass, .. } => Some(pass),
            _ => None,
        })
        .collect();

    assert!(passes.len() >= 2);
    let expected: Vec<u64> = (1..=passes.len() as u64).collect();
    assert_eq!(passes, expected);
    assert_eq!(updater.call_count(), passes.len());
}
