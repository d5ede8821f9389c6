//! Contract Test: Provisioning & Startup
//!
//! Constraints verified:
//! - A check interval below one second refuses provisioning
//! - An accepted interval is stored as given; unset means 30 minutes
//! - A discovery failure aborts startup before the loop runs
//! - A started app runs its first pass immediately

mod common;

use common::*;
use dyncname_core::config::DEFAULT_CHECK_INTERVAL;
use dyncname_core::routes::{HttpServer, Route, RouteTable, StaticRouteSource};
use dyncname_core::{DynamicDnsApp, Error, ReconcilerEvent};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn zero_interval_refuses_provisioning() {
    let config = app_config(&[("example.com", &["www"])]).with_check_interval(Duration::ZERO);

    let result = DynamicDnsApp::provision(config, Arc::new(RecordingUpdater::new()), None);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn sub_second_interval_refuses_provisioning() {
    let config =
        app_config(&[("example.com", &["www"])]).with_check_interval(Duration::from_millis(500));

    let result = DynamicDnsApp::provision(config, Arc::new(RecordingUpdater::new()), None);
    assert!(result.is_err());
}

#[test]
fn accepted_interval_is_stored() {
    for secs in [1, 60, 3600] {
        let config = app_config(&[("example.com", &["www"])])
            .with_check_interval(Duration::from_secs(secs));

        let app = DynamicDnsApp::provision(config, Arc::new(RecordingUpdater::new()), None)
            .expect("provisioning succeeds");
        assert_eq!(app.check_interval(), Duration::from_secs(secs));
    }
}

#[test]
fn unset_interval_defaults_to_thirty_minutes() {
    let config = app_config(&[("example.com", &["www"])]);

    let app = DynamicDnsApp::provision(config, Arc::new(RecordingUpdater::new()), None)
        .expect("provisioning succeeds");
    assert_eq!(app.check_interval(), DEFAULT_CHECK_INTERVAL);
    assert_eq!(app.check_interval(), Duration::from_secs(30 * 60));
}

#[test]
fn auto_discovery_requires_route_source() {
    let config = app_config(&[]).with_auto_cname_zone("example.com");

    let result = DynamicDnsApp::provision(config, Arc::new(RecordingUpdater::new()), None);
    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn discovery_failure_aborts_startup() {
    let table = RouteTable::new().with_server(
        "srv0",
        HttpServer::new(vec![
            Route::new()
                .match_hosts(["api.example.com"])
                .handle(json!(["not", "an", "object"])),
        ]),
    );
    let updater = Arc::new(RecordingUpdater::new());
    let config = app_config(&[("example.com", &["www"])]).with_auto_cname_zone("example.com");

    let mut app = DynamicDnsApp::provision(
        config,
        updater.clone(),
        Some(Arc::new(StaticRouteSource::new(table))),
    )
    .expect("provisioning succeeds");

    let result = app.start().await;
    assert!(matches!(result, Err(Error::Discovery(_))));
    assert!(!app.is_running());
    assert!(app.domains().is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(updater.call_count(), 0, "loop must not run after failed startup");
}

#[tokio::test]
async fn start_runs_first_pass_immediately() {
    let updater = Arc::new(RecordingUpdater::new());
    let config = app_config(&[("example.com", &["www", "api"])]);

    let mut app =
        DynamicDnsApp::provision(config, updater.clone(), None).expect("provisioning succeeds");
    app.start().await.expect("start succeeds");
    let mut events = app.take_events().expect("events available after start");

    // Default interval is 30 minutes, so any pass seen now is the initial one
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(updater.call_count(), 2);
    assert_eq!(updater.calls_for("example.com", "www"), 1);
    assert_eq!(updater.calls_for("example.com", "api"), 1);

    let seen = drain_events(&mut events);
    assert!(matches!(seen.first(), Some(ReconcilerEvent::Started { targets: 2, .. })));
    assert_eq!(passes_started(&seen), 1);

    app.shutdown(Duration::from_secs(5))
        .await
        .expect("clean shutdown");
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let mut app = DynamicDnsApp::provision(
        app_config(&[("example.com", &["www"])]),
        Arc::new(RecordingUpdater::new()),
        None,
    )
    .unwrap();

    app.start().await.unwrap();
    assert!(app.start().await.is_err());
    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
