//! Health monitor behaviour against real sockets.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use tcp_balancer::config::{Algorithm, BackendConfig, HealthCheckConfig};
use tcp_balancer::health::{HealthMonitor, HealthState, ProbeOutcome};
use tcp_balancer::load_balancer::BackendPool;
use tcp_balancer::telemetry::{EventLog, TelemetryEvent};
use tcp_balancer::Shutdown;

mod common;

fn fast_checks(fall: u32, rise: u32) -> HealthCheckConfig {
    HealthCheckConfig {
        enabled: true,
        interval_secs: 0.05,
        timeout_secs: 0.5,
        fall,
        rise,
    }
}

#[tokio::test]
async fn backend_goes_offline_after_fall_failures_and_returns_after_rise() {
    let live = common::start_tagged_backend("live").await;
    let flaky = common::refused_addr().await;
    let pool = Arc::new(BackendPool::new(
        &[
            BackendConfig::named("live", live.to_string()),
            BackendConfig::named("flaky", flaky.to_string()),
        ],
        Algorithm::RoundRobin,
    ));
    let events = Arc::new(EventLog::new(16));
    let monitor = HealthMonitor::new(pool.clone(), fast_checks(2, 2), events.clone());

    // One failure is below the threshold.
    let reports = monitor.check_all().await;
    assert!(reports.iter().all(|r| r.transition.is_none()));
    assert!(pool.get(1).unwrap().is_healthy());

    let reports = monitor.check_all().await;
    let transition = reports[1].transition.unwrap();
    assert_eq!(transition.to, HealthState::Unhealthy);
    assert_eq!(transition.streak, 2);
    assert!(!pool.get(1).unwrap().is_healthy());
    assert!(pool.get(0).unwrap().is_healthy());
    assert_eq!(pool.select(&Default::default()), Some(0));
    assert_eq!(pool.select(&Default::default()), Some(0));

    // Bring the backend back on the same port.
    let _listener = TcpListener::bind(flaky).await.unwrap();
    monitor.check_all().await;
    assert!(!pool.get(1).unwrap().is_healthy());
    let reports = monitor.check_all().await;
    assert_eq!(reports[1].transition.unwrap().to, HealthState::Healthy);
    assert!(pool.get(1).unwrap().is_healthy());

    let health: Vec<_> = events
        .all()
        .into_iter()
        .filter_map(|e| match e {
            TelemetryEvent::Health { backend, state, .. } => Some((backend, state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        health,
        [
            ("flaky".to_string(), HealthState::Unhealthy),
            ("flaky".to_string(), HealthState::Healthy),
        ]
    );
}

#[tokio::test]
async fn monitor_loop_marks_dead_backend_and_stops_on_shutdown() {
    let dead = common::refused_addr().await;
    let pool = Arc::new(BackendPool::new(
        &[BackendConfig::named("dead", dead.to_string())],
        Algorithm::LeastConnections,
    ));
    let monitor = HealthMonitor::new(pool.clone(), fast_checks(2, 1), Arc::new(EventLog::new(8)));

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(monitor.run(shutdown.clone()));

    let probe_pool = pool.clone();
    assert!(
        common::wait_until(Duration::from_secs(5), || !probe_pool.get(0).unwrap().is_healthy())
            .await
    );
    assert_eq!(pool.select(&Default::default()), None);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn balancer_routes_around_backend_marked_down_by_monitor() {
    let a = common::start_tagged_backend("a").await;
    let dead = common::refused_addr().await;
    let mut config = common::test_config(Algorithm::RoundRobin, &[("dead", dead), ("a", a)]);
    config.health_check = fast_checks(1, 1);
    let lb = common::start_balancer(config).await;

    let pool = lb.pool.clone();
    assert!(
        common::wait_until(Duration::from_secs(5), || !pool.get(0).unwrap().is_healthy()).await
    );

    let (_stream, tag) = common::connect_tagged(lb.addr).await;
    assert_eq!(tag, "a");
    assert!(!lb
        .events
        .all()
        .iter()
        .any(|e| matches!(e, TelemetryEvent::End { backend, .. } if backend == "dead")));

    lb.stop().await.unwrap();
}

#[tokio::test]
async fn hung_health_checks_are_bounded_by_timeout_and_run_concurrently() {
    let live = common::start_tagged_backend("live").await;
    let (hole, _listener, _queued) = common::start_blackhole().await;
    let pool = Arc::new(BackendPool::new(
        &[
            BackendConfig::named("hole1", hole.to_string()),
            BackendConfig::named("live", live.to_string()),
            BackendConfig::named("hole2", hole.to_string()),
        ],
        Algorithm::RoundRobin,
    ));
    let mut config = fast_checks(1, 1);
    config.timeout_secs = 0.5;
    let monitor = HealthMonitor::new(pool.clone(), config, Arc::new(EventLog::new(8)));

    let started = std::time::Instant::now();
    let reports = monitor.check_all().await;
    let elapsed = started.elapsed();

    // Two hung checks in sequence would take at least a second.
    assert!(elapsed >= Duration::from_millis(450), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(950), "returned after {:?}", elapsed);

    let outcomes: Vec<_> = reports.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        [ProbeOutcome::Failure, ProbeOutcome::Success, ProbeOutcome::Failure]
    );
    assert!(!pool.get(0).unwrap().is_healthy());
    assert!(pool.get(1).unwrap().is_healthy());
    assert!(!pool.get(2).unwrap().is_healthy());
}
