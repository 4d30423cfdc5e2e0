//! Concurrent ingestion against a single alert
//!
//! Readings for one device arrive on many tasks at once; the escalation must
//! still be dispatched exactly once.

use std::sync::Arc;

use futures::future::join_all;
use thermowatch::{alerts::AlertKey, notify::ChannelSet, thresholds::AlertCause};

use crate::helpers::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readings_escalate_once() {
    let mut settings = test_settings();
    settings.alerts.delay_window_secs = 0;
    let hub = Arc::new(TestHub::new(settings, ChannelSet::default()));

    // opens the occurrence, a zero window escalates on the next reading
    hub.ingestor.ingest(payload("D1", 40.0)).await.unwrap();

    let tasks = (0..32).map(|_| {
        let hub = hub.clone();
        tokio::spawn(async move { hub.ingestor.ingest(payload("D1", 40.0)).await })
    });
    for result in join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }

    let status = hub.engine.snapshot_status();
    assert!(status[&AlertKey::new("D1", AlertCause::HighTemp)].notified);

    let stats = hub.dispatcher.shutdown().await.unwrap();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.sent, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_devices_each_escalate() {
    let mut settings = test_settings();
    settings.alerts.delay_window_secs = 0;
    let hub = Arc::new(TestHub::new(settings, ChannelSet::default()));

    let devices: Vec<String> = (0..8).map(|i| format!("D{i}")).collect();

    for round in 0..2 {
        let tasks = devices.iter().map(|device| {
            let hub = hub.clone();
            let device = device.clone();
            tokio::spawn(async move { hub.ingestor.ingest(payload(&device, 5.0)).await })
        });
        for result in join_all(tasks).await {
            assert!(result.unwrap().is_ok(), "round {round} failed");
        }
    }

    assert_eq!(hub.engine.snapshot_status().len(), 8);
    assert_eq!(hub.dispatcher.shutdown().await.unwrap().received, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_during_ingestion_leaves_consistent_state() {
    let hub = Arc::new(TestHub::new(test_settings(), ChannelSet::default()));

    let ingest = {
        let hub = hub.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                hub.ingestor.ingest(payload("D1", 36.0)).await.unwrap();
            }
        })
    };
    let reset = {
        let hub = hub.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                hub.engine.reset_all();
                tokio::task::yield_now().await;
            }
        })
    };

    ingest.await.unwrap();
    reset.await.unwrap();

    // whatever interleaving happened, a window of 10s was never crossed
    for status in hub.engine.snapshot_status().values() {
        assert!(status.is_active);
        assert!(!status.notified);
    }
    assert_eq!(hub.dispatcher.shutdown().await.unwrap().received, 0);
}
