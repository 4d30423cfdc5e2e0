//! NotificationDispatcher - fans one escalation out to every channel
//!
//! ## Architecture
//!
//! The dispatcher is an actor fed by a bounded queue. The alert engine only
//! waits for queue capacity, never for a provider. For each escalation the
//! actor:
//!
//! 1. reads the current settings from the [`ConfigProvider`]
//! 2. renders one message per enabled channel
//! 3. spawns one delivery task per channel, bounded by the configured timeout
//!
//! Each delivery task writes one audit row per recipient once its outcome is
//! known. Channels never wait on each other, and a failed channel has no
//! effect on the alert state that caused the escalation.
//!
//! `shutdown` stops accepting work, then drains the queue and waits for every
//! in-flight delivery before the actor exits.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use super::channel::{ChannelError, ChannelKind, ChannelSet, OutboundMessage};
use super::message::{AlertContext, compose};
use crate::config::ConfigProvider;
use crate::events::{DeliveryOutcome, Event, EventBroadcaster};
use crate::storage::{DeliveryStatus, NotificationLogRow, StorageBackend};
use crate::thresholds::AlertCause;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Escalations taken off the queue
    pub received: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Deliveries currently waiting on a provider
    pub in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("notification dispatcher has shut down")]
    Closed,
}

#[derive(Debug)]
pub enum DispatcherCommand {
    GetStats {
        respond_to: oneshot::Sender<DispatcherStats>,
    },
    Shutdown {
        respond_to: oneshot::Sender<DispatcherStats>,
    },
}

struct Delivery {
    kind: ChannelKind,
    context: Arc<AlertContext>,
    outcome: DeliveryOutcome,
}

pub struct NotificationDispatcher {
    jobs_rx: mpsc::Receiver<AlertContext>,
    command_rx: mpsc::Receiver<DispatcherCommand>,
    config: Arc<dyn ConfigProvider>,
    channels: ChannelSet,
    storage: Arc<dyn StorageBackend>,
    events: EventBroadcaster,
    in_flight: JoinSet<Delivery>,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(
        jobs_rx: mpsc::Receiver<AlertContext>,
        command_rx: mpsc::Receiver<DispatcherCommand>,
        config: Arc<dyn ConfigProvider>,
        channels: ChannelSet,
        storage: Arc<dyn StorageBackend>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            jobs_rx,
            command_rx,
            config,
            channels,
            storage,
            events,
            in_flight: JoinSet::new(),
            stats: DispatcherStats::default(),
        }
    }

    #[instrument(skip(self), name = "notification_dispatcher")]
    pub async fn run(mut self) {
        debug!("starting notification dispatcher");

        let shutdown_reply = loop {
            tokio::select! {
                Some(context) = self.jobs_rx.recv() => {
                    self.dispatch(context);
                }

                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.complete(joined);
                }

                Some(cmd) = self.command_rx.recv() => match cmd {
                    DispatcherCommand::GetStats { respond_to } => {
                        let _ = respond_to.send(self.current_stats());
                    }
                    DispatcherCommand::Shutdown { respond_to } => {
                        break Some(respond_to);
                    }
                },

                else => {
                    debug!("all dispatcher handles dropped");
                    break None;
                }
            }
        };

        self.drain().await;

        let stats = self.current_stats();
        info!(
            "notification dispatcher stopped (sent: {}, failed: {}, skipped: {})",
            stats.sent, stats.failed, stats.skipped
        );

        if let Some(respond_to) = shutdown_reply {
            let _ = respond_to.send(stats);
        }
    }

    async fn drain(&mut self) {
        self.jobs_rx.close();
        while let Some(context) = self.jobs_rx.recv().await {
            self.dispatch(context);
        }

        if !self.in_flight.is_empty() {
            debug!("waiting for {} in-flight deliveries", self.in_flight.len());
        }
        while let Some(joined) = self.in_flight.join_next().await {
            self.complete(joined);
        }
    }

    fn current_stats(&self) -> DispatcherStats {
        DispatcherStats {
            in_flight: self.in_flight.len(),
            ..self.stats
        }
    }

    fn dispatch(&mut self, context: AlertContext) {
        self.stats.received += 1;
        let context = Arc::new(context);

        let settings = match self.config.settings() {
            Ok(settings) => settings.notifications,
            Err(e) => {
                error!(
                    "skipping notifications for {}_{}: {e}",
                    context.device_id, context.cause
                );
                for kind in ChannelKind::ALL {
                    self.record(Delivery {
                        kind,
                        context: context.clone(),
                        outcome: DeliveryOutcome::Skipped {
                            reason: e.to_string(),
                        },
                    });
                }
                return;
            }
        };

        for kind in ChannelKind::ALL {
            match compose(kind, &settings, &context) {
                Ok(message) => {
                    debug!(
                        "submitting {kind} notification to {} recipients",
                        message.recipients.len()
                    );
                    self.in_flight.spawn(deliver(
                        self.channels.clone(),
                        message,
                        settings.timeout(),
                        self.storage.clone(),
                        context.clone(),
                    ));
                }
                Err(reason) => {
                    debug!("{kind} skipped: {reason}");
                    self.record(Delivery {
                        kind,
                        context: context.clone(),
                        outcome: DeliveryOutcome::Skipped { reason },
                    });
                }
            }
        }
    }

    fn complete(&mut self, joined: Result<Delivery, tokio::task::JoinError>) {
        match joined {
            Ok(delivery) => self.record(delivery),
            Err(e) => {
                error!("notification delivery task failed: {e}");
                self.stats.failed += 1;
            }
        }
    }

    fn record(&mut self, delivery: Delivery) {
        match &delivery.outcome {
            DeliveryOutcome::Sent { .. } => self.stats.sent += 1,
            DeliveryOutcome::Failed { .. } => self.stats.failed += 1,
            DeliveryOutcome::Skipped { .. } => self.stats.skipped += 1,
        }

        self.events.publish(Event::NotificationResult {
            channel: delivery.kind,
            device_id: delivery.context.device_id.clone(),
            cause: delivery.context.cause,
            record_id: delivery.context.record_id,
            outcome: delivery.outcome,
        });
    }
}

/// Send one message and audit its outcome for every recipient.
async fn deliver(
    channels: ChannelSet,
    message: OutboundMessage,
    timeout: Duration,
    storage: Arc<dyn StorageBackend>,
    context: Arc<AlertContext>,
) -> Delivery {
    let kind = message.kind;
    let result = send_and_audit(
        &channels,
        &message,
        timeout,
        storage.as_ref(),
        context.record_id,
        Some(context.cause),
    )
    .await;

    let outcome = match result {
        Ok(()) => DeliveryOutcome::Sent {
            recipients: message.recipients.len(),
        },
        Err(e) => {
            warn!("{kind} notification for {} failed: {e}", context.device_id);
            DeliveryOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    Delivery {
        kind,
        context,
        outcome,
    }
}

/// Send `message` on its channel within `timeout` and append one audit row
/// per recipient. An audit failure is logged, never returned.
pub async fn send_and_audit(
    channels: &ChannelSet,
    message: &OutboundMessage,
    timeout: Duration,
    storage: &dyn StorageBackend,
    record_id: Option<i64>,
    cause: Option<AlertCause>,
) -> Result<(), ChannelError> {
    let kind = message.kind;
    let channel = channels.get(kind);

    let result = match tokio::time::timeout(timeout, channel.send(message)).await {
        Ok(result) => result,
        Err(_) => Err(ChannelError::Timeout(timeout)),
    };

    let (status, error) = match &result {
        Ok(()) => (DeliveryStatus::Sent, None),
        Err(e) => (DeliveryStatus::Failed, Some(e.to_string())),
    };

    let timestamp = Utc::now();
    let logs = message
        .recipients
        .iter()
        .map(|recipient| NotificationLogRow {
            id: None,
            timestamp,
            channel: kind,
            recipient: recipient.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
            status,
            error: error.clone(),
            record_id,
            cause,
        })
        .collect();

    if let Err(e) = storage.insert_notification_logs(logs).await {
        error!("failed to audit {kind} notification: {e}");
    }

    result
}

/// Cloneable handle to the dispatcher actor
#[derive(Clone)]
pub struct DispatcherHandle {
    jobs: mpsc::Sender<AlertContext>,
    commands: mpsc::Sender<DispatcherCommand>,
}

impl DispatcherHandle {
    pub fn spawn(
        config: Arc<dyn ConfigProvider>,
        channels: ChannelSet,
        storage: Arc<dyn StorageBackend>,
        events: EventBroadcaster,
        queue_capacity: usize,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(queue_capacity.max(1));
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let dispatcher =
            NotificationDispatcher::new(jobs_rx, cmd_rx, config, channels, storage, events);
        tokio::spawn(dispatcher.run());

        Self {
            jobs: jobs_tx,
            commands: cmd_tx,
        }
    }

    /// Queue one escalation, waiting for capacity if the queue is full.
    pub async fn submit(&self, context: AlertContext) -> Result<(), DispatchError> {
        self.jobs
            .send(context)
            .await
            .map_err(|_| DispatchError::Closed)
    }

    pub async fn stats(&self) -> Result<DispatcherStats, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(DispatcherCommand::GetStats { respond_to: tx })
            .await
            .map_err(|_| DispatchError::Closed)?;
        rx.await.map_err(|_| DispatchError::Closed)
    }

    /// Stop accepting escalations and wait until every queued and in-flight
    /// delivery has completed.
    pub async fn shutdown(&self) -> Result<DispatcherStats, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(DispatcherCommand::Shutdown { respond_to: tx })
            .await
            .map_err(|_| DispatchError::Closed)?;
        rx.await.map_err(|_| DispatchError::Closed)
    }
}
