//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - Readings are ingested and rejected with the right status codes
//! - Alert status and reset reflect the engine state
//! - Settings changes are visible to the next reading
//! - Device-facing threshold, status and history endpoints
//! - Operator test emails reach the provider and the audit log
//! - The WebSocket stream forwards lifecycle events

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use thermowatch::{
    api::{ApiState, spawn_api_server},
    config::{ApiSettings, ChannelEndpoints},
    notify::ChannelSet,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

async fn spawn_test_api(hub: &TestHub) -> SocketAddr {
    let state = ApiState {
        ingestor: hub.ingestor.clone(),
        engine: hub.engine.clone(),
        settings: hub.settings.clone(),
        storage: hub.storage.clone(),
        dispatcher: hub.dispatcher.clone(),
        channels: hub.channels.clone(),
        events: hub.events.clone(),
    };

    let settings = ApiSettings {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: true,
    };

    spawn_api_server(&settings, state).await.unwrap()
}

async fn post_reading(client: &reqwest::Client, addr: SocketAddr, body: Value) -> reqwest::Response {
    client
        .post(format!("http://{addr}/sensor-data"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["healthy"], true);
}

#[tokio::test]
async fn test_sensor_data_is_ingested() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let response = post_reading(
        &client,
        addr,
        json!({"device_id": "D1", "ds18b20_temp": 36.5, "dht_temp": 36.0, "humidity": 30.0}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["record"]["id"], 1);
    assert_eq!(body["record"]["temperature"], 36.5);
    assert_eq!(body["evaluation"]["is_active"], true);
    assert_eq!(body["evaluation"]["cause"], "HIGH_TEMP");
    assert_eq!(body["reconciliation"]["source"], "primary");

    let latest: Vec<Value> = client
        .get(format!("http://{addr}/readings/latest?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0]["device_id"], "D1");
}

#[tokio::test]
async fn test_invalid_reading_is_rejected() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let response = post_reading(
        &client,
        addr,
        json!({"device_id": "D1", "ds18b20_temp": 200.0, "dht_temp": -85.0}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("out of range"));
    assert!(hub.storage.query_latest_readings(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_alert_status_and_reset() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": 5.0})).await;

    let status: Value = client
        .get(format!("http://{addr}/alerts/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["count"], 1);
    assert_eq!(status["alerts"][0]["alert_type"], "D1_LOW_TEMP");
    assert_eq!(status["alerts"][0]["is_alert_active"], true);
    assert_eq!(status["alerts"][0]["notified"], false);

    let reset: Value = client
        .post(format!("http://{addr}/alerts/reset"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["success"], true);
    assert_eq!(reset["cleared"], 1);

    let status: Value = client
        .get(format!("http://{addr}/alerts/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["count"], 0);
}

#[tokio::test]
async fn test_settings_update_applies_to_next_reading() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/settings"))
        .json(&json!({"max_threshold": 25.0, "email_recipients": "a@x.io, b@x.io"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let settings: Value = client
        .get(format!("http://{addr}/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(settings["alerts"]["max_threshold"], 25.0);
    assert_eq!(
        settings["notifications"]["email"]["recipients"],
        json!(["a@x.io", "b@x.io"])
    );

    let body: Value = post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": 26.0}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["evaluation"]["cause"], "HIGH_TEMP");
}

#[tokio::test]
async fn test_malformed_settings_update_is_rejected() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/settings"))
        .json(&json!({"max_threshold": "hot"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_notifications_and_stats() {
    let mut settings = test_settings();
    settings.alerts.delay_window_secs = 0;
    let hub = TestHub::new(settings, ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();
    let mut rx = hub.events.subscribe();

    for _ in 0..2 {
        post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": 40.0})).await;
    }
    notification_results(&mut rx, 3).await;

    let logs: Vec<Value> = client
        .get(format!("http://{addr}/notifications?limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["channel"], "EMAIL");
    assert_eq!(logs[0]["status"], "SENT");
    assert_eq!(logs[0]["record_id"], 2);

    let stats: Value = client
        .get(format!("http://{addr}/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["active_alerts"], 1);
    assert_eq!(stats["notifications"]["received"], 1);
    assert_eq!(stats["notifications"]["sent"], 1);
    assert_eq!(stats["notifications"]["skipped"], 2);
}

#[tokio::test]
async fn test_websocket_streams_events() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/events"))
        .await
        .unwrap();

    // the subscription is taken once the upgrade completes on the server
    tokio::time::timeout(Duration::from_secs(2), async {
        while hub.events.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    hub.ingestor.ingest(payload("D1", 36.0)).await.unwrap();

    let mut types = Vec::new();
    while types.len() < 2 {
        let message = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if let Message::Text(text) = message {
            let event: Value = serde_json::from_str(&text).unwrap();
            types.push(event["type"].as_str().unwrap().to_string());
        }
    }

    assert_eq!(types, vec!["alert_detected", "sensor_update"]);
}

async fn get_json(client: &reqwest::Client, addr: SocketAddr, uri: &str) -> Value {
    let response = client
        .get(format!("http://{addr}{uri}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_payload_with_both_field_names() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let response = post_reading(
        &client,
        addr,
        json!({
            "device_id": "D1",
            "ds18b20_temp": 21.5,
            "ds18b20_temperature": 30.0,
            "dht_temp": 21.0,
            "dht_temperature": 29.0
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["record"]["primary_temperature"], 21.5);
    assert_eq!(body["record"]["backup_temperature"], 21.0);
    assert_eq!(body["record"]["temperature"], 21.5);
}

#[tokio::test]
async fn test_device_threshold_endpoints() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let max = get_json(&client, addr, "/config/threshold").await;
    assert_eq!(max, json!({"threshold": 35.0}));
    let min = get_json(&client, addr, "/config/min-threshold").await;
    assert_eq!(min, json!({"min_threshold": 15.0}));
}

#[tokio::test]
async fn test_threshold_update() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/config/thresholds"))
        .json(&json!({"max_threshold": 30.0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"success": true, "max_threshold": 30.0, "min_threshold": 15.0})
    );

    let max = get_json(&client, addr, "/config/threshold").await;
    assert_eq!(max["threshold"], 30.0);

    let body: Value = post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": 31.0}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["evaluation"]["cause"], "HIGH_TEMP");
}

#[tokio::test]
async fn test_status_reports_latest_record() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    let status = get_json(&client, addr, "/status").await;
    assert_eq!(status["status"], "ok");
    assert_eq!(status["threshold"], 35.0);
    assert_eq!(status["min_threshold"], 15.0);
    assert_eq!(status["latest_record"], Value::Null);

    post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": 20.0})).await;
    post_reading(&client, addr, json!({"device_id": "D2", "ds18b20_temp": 22.0})).await;

    let status = get_json(&client, addr, "/status").await;
    assert_eq!(status["latest_record"]["device_id"], "D2");
    assert_eq!(status["latest_record"]["temperature"], 22.0);
}

#[tokio::test]
async fn test_data_history_paging() {
    let hub = TestHub::new(test_settings(), ChannelSet::default());
    let addr = spawn_test_api(&hub).await;
    let client = reqwest::Client::new();

    for temp in [20.0, 21.0, 22.0, 23.0, 24.0] {
        post_reading(&client, addr, json!({"device_id": "D1", "ds18b20_temp": temp})).await;
    }

    let page = get_json(&client, addr, "/data/history?limit=2&offset=1").await;
    let temps: Vec<f64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["temperature"].as_f64().unwrap())
        .collect();
    assert_eq!(temps, vec![23.0, 22.0]);

    let past_end = get_json(&client, addr, "/data/history?limit=2&offset=5").await;
    assert_eq!(past_end, json!([]));
}

#[tokio::test]
async fn test_send_email_alert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let endpoints = ChannelEndpoints {
        email: Some(format!("{}/email", server.uri())),
        ..Default::default()
    };
    let channels = ChannelSet::from_endpoints(&endpoints, Duration::from_secs(2));
    let hub = TestHub::new(test_settings(), channels);
    let addr = spawn_test_api(&hub).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/send_email_alert"))
        .json(&json!({"subject": "Drill"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["recipients"], 1);

    let logs = hub.storage.query_notification_logs(10, 0).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].recipient, "ops@example.com");
    assert_eq!(logs[0].subject.as_deref(), Some("Drill"));
    assert_eq!(logs[0].body, "This is a test alert");
    assert_eq!(logs[0].cause, None);
    assert_eq!(logs[0].record_id, None);

    // alert state is untouched
    assert!(hub.engine.snapshot_status().is_empty());
}

#[tokio::test]
async fn test_send_email_alert_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let endpoints = ChannelEndpoints {
        email: Some(format!("{}/email", server.uri())),
        ..Default::default()
    };
    let channels = ChannelSet::from_endpoints(&endpoints, Duration::from_secs(2));
    let hub = TestHub::new(test_settings(), channels);
    let addr = spawn_test_api(&hub).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/send_email_alert"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let logs = hub.storage.query_notification_logs(10, 0).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].subject.as_deref(), Some("IoT Test Alert"));
}

#[tokio::test]
async fn test_send_email_alert_without_recipients() {
    let mut settings = test_settings();
    settings.notifications.email.recipients.clear();
    let hub = TestHub::new(settings, ChannelSet::default());
    let addr = spawn_test_api(&hub).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/send_email_alert"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "No email recipients configured");
    assert!(hub.storage.query_notification_logs(10, 0).await.unwrap().is_empty());
}
