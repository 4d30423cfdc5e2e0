//! Failure tests for notification delivery
//!
//! These tests verify that:
//! - A failing provider does not block the other channels
//! - Slow providers are cut off by the channel timeout
//! - Unreachable configuration skips delivery without touching alert state

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use thermowatch::{
    alerts::{AlertEngine, AlertKey, Reading},
    config::{ChannelEndpoints, ConfigError, ConfigProvider, Settings},
    events::{DeliveryOutcome, EventBroadcaster},
    notify::{ChannelKind, ChannelSet, DispatcherHandle},
    storage::{DeliveryStatus, MemoryBackend, StorageBackend},
    thresholds::AlertCause,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn provider_endpoints(server: &MockServer) -> ChannelEndpoints {
    ChannelEndpoints {
        email: Some(format!("{}/email", server.uri())),
        sms: Some(format!("{}/sms", server.uri())),
        chat: Some(format!("{}/chat", server.uri())),
    }
}

async fn escalate(hub: &TestHub, device_id: &str) {
    // a zero window escalates on the second anomalous reading
    hub.ingestor.ingest(payload(device_id, 40.0)).await.unwrap();
    hub.ingestor.ingest(payload(device_id, 40.0)).await.unwrap();
}

#[tokio::test]
async fn test_failing_provider_does_not_block_others() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(500).set_body_string("smtp relay down"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sms"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = all_channels_settings();
    settings.alerts.delay_window_secs = 0;
    let channels =
        ChannelSet::from_endpoints(&provider_endpoints(&server), Duration::from_secs(5));
    let hub = TestHub::new(settings, channels);
    let mut rx = hub.events.subscribe();

    escalate(&hub, "D1").await;

    let results = notification_results(&mut rx, 3).await;
    assert_eq!(
        results[0],
        (ChannelKind::Chat, DeliveryOutcome::Sent { recipients: 1 })
    );
    assert_matches!(
        &results[1],
        (ChannelKind::Email, DeliveryOutcome::Failed { error }) if error.contains("500")
    );
    assert_eq!(
        results[2],
        (ChannelKind::Sms, DeliveryOutcome::Sent { recipients: 1 })
    );

    let stats = hub.dispatcher.shutdown().await.unwrap();
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.failed, 1);

    let logs = hub.storage.query_notification_logs(10, 0).await.unwrap();
    assert_eq!(logs.len(), 3);
    let email = logs
        .iter()
        .find(|log| log.channel == ChannelKind::Email)
        .unwrap();
    assert_eq!(email.status, DeliveryStatus::Failed);
    assert!(email.error.as_deref().unwrap().contains("smtp relay down"));

    let chat = logs
        .iter()
        .find(|log| log.channel == ChannelKind::Chat)
        .unwrap();
    assert_eq!(chat.recipient, "whatsapp:+15550199");
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/email"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut settings = test_settings();
    settings.alerts.delay_window_secs = 0;
    settings.notifications.timeout_secs = 1;
    let channels =
        ChannelSet::from_endpoints(&provider_endpoints(&server), Duration::from_secs(1));
    let hub = TestHub::new(settings, channels);
    let mut rx = hub.events.subscribe();

    escalate(&hub, "D1").await;

    let results = notification_results(&mut rx, 3).await;
    assert_matches!(
        &results[1],
        (ChannelKind::Email, DeliveryOutcome::Failed { error }) if error.contains("timed out")
    );

    let logs = hub.storage.query_notification_logs(10, 0).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, DeliveryStatus::Failed);
}

#[tokio::test]
async fn test_unreachable_provider_is_audited_as_failed() {
    // nothing listens on this port
    let endpoints = ChannelEndpoints {
        email: Some("http://127.0.0.1:9/email".to_string()),
        ..Default::default()
    };

    let mut settings = test_settings();
    settings.alerts.delay_window_secs = 0;
    let hub = TestHub::new(
        settings,
        ChannelSet::from_endpoints(&endpoints, Duration::from_secs(2)),
    );

    escalate(&hub, "D1").await;

    let stats = hub.dispatcher.shutdown().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 2);

    let logs = hub.storage.query_notification_logs(10, 0).await.unwrap();
    assert_eq!(logs[0].status, DeliveryStatus::Failed);
    assert!(logs[0].error.is_some());

    // the alert stays notified, a failed delivery is not retried
    let status = hub.engine.snapshot_status();
    assert!(status[&AlertKey::new("D1", AlertCause::HighTemp)].notified);
}

struct UnavailableConfig;

impl ConfigProvider for UnavailableConfig {
    fn settings(&self) -> Result<Settings, ConfigError> {
        Err(ConfigError::Unavailable("settings database is locked".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_config_skips_every_channel() {
    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
    let events = EventBroadcaster::default();
    let dispatcher = DispatcherHandle::spawn(
        Arc::new(UnavailableConfig),
        ChannelSet::default(),
        storage.clone(),
        events.clone(),
        8,
    );
    let engine = AlertEngine::new(dispatcher.clone(), events.clone());

    let reading = Reading {
        device_id: "D1".to_string(),
        location: "Lab".to_string(),
        temperature: 40.0,
        min_threshold: 15.0,
        max_threshold: 35.0,
        record_id: Some(7),
    };
    engine.evaluate(&reading, Duration::ZERO).await;
    engine.evaluate(&reading, Duration::ZERO).await;

    let stats = dispatcher.shutdown().await.unwrap();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.skipped, 3);
    assert!(storage.query_notification_logs(10, 0).await.unwrap().is_empty());

    let status = engine.snapshot_status();
    assert!(status[&AlertKey::new("D1", AlertCause::HighTemp)].notified);
}
