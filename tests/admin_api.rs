//! Admin API over HTTP.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use tcp_balancer::config::Algorithm;

mod common;

const API_KEY: &str = "test-admin-key";

async fn admin_balancer() -> common::TestBalancer {
    let a = common::start_tagged_backend("a").await;
    let dead = common::refused_addr().await;
    let mut config = common::test_config(Algorithm::LeastConnections, &[("a", a), ("dead", dead)]);
    config.admin.enabled = true;
    config.admin.bind_address = "127.0.0.1:0".to_string();
    config.admin.api_key = API_KEY.to_string();
    config.telemetry.snapshot_interval_secs = 0.05;
    common::start_balancer(config).await
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

#[tokio::test]
async fn requests_without_key_are_rejected() {
    let lb = admin_balancer().await;
    let base = format!("http://{}", lb.admin_addr.unwrap());

    let res = client().get(format!("{}/admin/status", base)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client()
        .get(format!("{}/admin/status", base))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    lb.stop().await.unwrap();
}

#[tokio::test]
async fn status_and_backends_reflect_pool() {
    let lb = admin_balancer().await;
    let base = format!("http://{}", lb.admin_addr.unwrap());
    lb.pool.get(1).unwrap().mark_failure(1);

    let status: Value = client()
        .get(format!("{}/admin/status", base))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["algorithm"], "lc");
    assert_eq!(status["backends_total"], 2);
    assert_eq!(status["backends_healthy"], 1);

    let (_held, tag) = common::connect_tagged(lb.addr).await;
    assert_eq!(tag, "a");

    let backends: Value = client()
        .get(format!("{}/admin/backends", base))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(backends[0]["name"], "a");
    assert_eq!(backends[0]["healthy"], true);
    assert_eq!(backends[0]["active_connections"], 1);
    assert_eq!(backends[1]["healthy"], false);

    lb.stop().await.unwrap();
}

#[tokio::test]
async fn events_and_snapshot_are_served() {
    let lb = admin_balancer().await;
    let base = format!("http://{}", lb.admin_addr.unwrap());

    let (stream, _) = common::connect_tagged(lb.addr).await;
    drop(stream);
    let events = lb.events.clone();
    assert!(
        common::wait_until(Duration::from_secs(5), || events
            .all()
            .iter()
            .any(|e| e.kind() == "end"))
        .await
    );

    let recent: Value = client()
        .get(format!("{}/admin/events?limit=1", base))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let recent = recent.as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["type"], "end");
    assert_eq!(recent[0]["outcome"], "completed");

    let all: Value = client()
        .get(format!("{}/admin/events", base))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let kinds: Vec<_> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, ["accept", "connect_ok", "end"]);

    let snapshot: Value = client()
        .get(format!("{}/admin/snapshot", base))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["algo"], "lc");
    assert_eq!(snapshot["backends"].as_array().unwrap().len(), 2);

    lb.stop().await.unwrap();
}
