//! Delivery channels
//!
//! A channel knows how to hand one [`OutboundMessage`] to a provider. It knows
//! nothing about alerts, recipients resolution or auditing; the dispatcher
//! owns those concerns.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::ChannelEndpoints;

/// Provider error bodies are cut to this length before they are logged or audited
const MAX_ERROR_BODY: usize = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelKind {
    Email,
    Sms,
    Chat,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [ChannelKind::Email, ChannelKind::Sms, ChannelKind::Chat];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "EMAIL",
            ChannelKind::Sms => "SMS",
            ChannelKind::Chat => "CHAT",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EMAIL" => Ok(ChannelKind::Email),
            "SMS" => Ok(ChannelKind::Sms),
            "CHAT" => Ok(ChannelKind::Chat),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sender {
    pub email: Option<String>,
    pub name: String,
}

/// A fully rendered message for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub kind: ChannelKind,
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Submit one message to the provider.
    ///
    /// Implementations do not retry; a failure is final for this message.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Posts a JSON envelope to a provider webhook
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    kind: ChannelKind,
    url: String,
    timeout: Duration,
    client: Client,
}

impl WebhookChannel {
    pub fn new(kind: ChannelKind, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            kind,
            url: url.into(),
            timeout,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    #[instrument(skip_all, fields(channel = %self.kind, recipients = message.recipients.len()))]
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        let payload = json!({
            "channel": self.kind,
            "recipients": message.recipients,
            "subject": message.subject,
            "body": message.body,
            "sender": message.sender,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChannelError::Timeout(self.timeout)
                } else {
                    ChannelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            info!("successfully sent {} notification", self.kind);
            return Ok(());
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }

        warn!("{} notification rejected with status: {}", self.kind, status);
        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Logs messages instead of delivering them, for channels without an endpoint
#[derive(Debug, Clone, Copy)]
pub struct LogChannel {
    kind: ChannelKind,
}

impl LogChannel {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        info!(
            "[{}] to {:?}: {}",
            self.kind,
            message.recipients,
            message.subject.as_deref().unwrap_or(&message.body)
        );
        debug!("[{}] body: {}", self.kind, message.body);
        Ok(())
    }
}

/// One client per channel kind, built once at startup
#[derive(Clone)]
pub struct ChannelSet {
    email: Arc<dyn NotificationChannel>,
    sms: Arc<dyn NotificationChannel>,
    chat: Arc<dyn NotificationChannel>,
}

impl ChannelSet {
    pub fn new(
        email: Arc<dyn NotificationChannel>,
        sms: Arc<dyn NotificationChannel>,
        chat: Arc<dyn NotificationChannel>,
    ) -> Self {
        Self { email, sms, chat }
    }

    /// Webhook channels where an endpoint is configured, log channels elsewhere.
    pub fn from_endpoints(endpoints: &ChannelEndpoints, timeout: Duration) -> Self {
        let build = |kind: ChannelKind, url: &Option<String>| -> Arc<dyn NotificationChannel> {
            match url {
                Some(url) => Arc::new(WebhookChannel::new(kind, url.clone(), timeout)),
                None => {
                    debug!("no endpoint for {kind}, notifications will only be logged");
                    Arc::new(LogChannel::new(kind))
                }
            }
        };

        Self {
            email: build(ChannelKind::Email, &endpoints.email),
            sms: build(ChannelKind::Sms, &endpoints.sms),
            chat: build(ChannelKind::Chat, &endpoints.chat),
        }
    }

    pub fn get(&self, kind: ChannelKind) -> Arc<dyn NotificationChannel> {
        match kind {
            ChannelKind::Email => self.email.clone(),
            ChannelKind::Sms => self.sms.clone(),
            ChannelKind::Chat => self.chat.clone(),
        }
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::from_endpoints(&ChannelEndpoints::default(), Duration::from_secs(5))
    }
}
