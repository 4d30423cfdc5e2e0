use chrono::{DateTime, Utc};
use serde::Serialize;

use super::channel::{ChannelKind, OutboundMessage, Sender};
use crate::config::NotificationSettings;
use crate::thresholds::AlertCause;

const CHAT_ADDRESS_PREFIX: &str = "whatsapp:";

/// Everything a notification says about one escalation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertContext {
    pub device_id: String,
    pub location: String,
    pub cause: AlertCause,
    pub temperature: f64,
    pub min_threshold: f64,
    pub max_threshold: f64,
    /// Reading that pushed the alert past its delay window
    pub record_id: Option<i64>,
    pub escalated_at: DateTime<Utc>,
}

pub struct MessageBuilder {
    kind: ChannelKind,
    recipients: Vec<String>,
    subject: Option<String>,
    body: String,
    sender: Option<Sender>,
}

impl MessageBuilder {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            recipients: Vec::new(),
            subject: None,
            body: String::new(),
            sender: None,
        }
    }

    pub fn recipient(mut self, recipient: impl ToString) -> Self {
        self.recipients.push(recipient.to_string());
        self
    }

    pub fn recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.recipients
            .extend(recipients.into_iter().map(|r| r.to_string()));
        self
    }

    pub fn subject(mut self, subject: impl ToString) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn body(mut self, body: impl ToString) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn build(self) -> OutboundMessage {
        OutboundMessage {
            kind: self.kind,
            recipients: self.recipients,
            subject: self.subject,
            body: self.body,
            sender: self.sender,
        }
    }
}

pub fn email_subject(context: &AlertContext) -> String {
    format!("IoT Alert: {} at {}", context.cause, context.location)
}

pub fn email_body(context: &AlertContext) -> String {
    let record = context
        .record_id
        .map_or_else(|| "n/a".to_string(), |id| id.to_string());

    format!(
        "<p><strong>Alert:</strong> {cause}</p>\
         <p>Device: {device}</p>\
         <p>Location: {location}</p>\
         <p>Temperature: {temperature:.1}°C</p>\
         <p>Thresholds: min {min:.1}°C, max {max:.1}°C</p>\
         <p>Record ID: {record}</p>\
         <p>Time: {time}</p>",
        cause = context.cause,
        device = context.device_id,
        location = context.location,
        temperature = context.temperature,
        min = context.min_threshold,
        max = context.max_threshold,
        time = context.escalated_at.to_rfc3339(),
    )
}

pub fn sms_text(context: &AlertContext) -> String {
    format!(
        "IoT Alert: {} at {}. Temp: {:.1}°C (min: {:.1}°C, max: {:.1}°C)",
        context.cause,
        context.location,
        context.temperature,
        context.min_threshold,
        context.max_threshold
    )
}

pub fn chat_text(context: &AlertContext) -> String {
    format!(
        "🚨 IoT Alert: {}\nLocation: {}\nTemperature: {:.1}°C\nThresholds: {:.1}°C - {:.1}°C",
        context.cause,
        context.location,
        context.temperature,
        context.min_threshold,
        context.max_threshold
    )
}

/// Chat providers address numbers with a `whatsapp:` scheme.
pub fn chat_address(number: &str) -> String {
    if number.starts_with(CHAT_ADDRESS_PREFIX) {
        number.to_string()
    } else {
        format!("{CHAT_ADDRESS_PREFIX}{number}")
    }
}

fn configured(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Render the message for one channel, or the reason it is skipped.
pub fn compose(
    kind: ChannelKind,
    settings: &NotificationSettings,
    context: &AlertContext,
) -> Result<OutboundMessage, String> {
    match kind {
        ChannelKind::Email => {
            let email = &settings.email;
            if !email.enabled {
                return Err("email notifications are disabled".to_string());
            }
            if email.recipients.is_empty() {
                return Err("no email recipients configured".to_string());
            }

            Ok(MessageBuilder::new(kind)
                .recipients(&email.recipients)
                .subject(email_subject(context))
                .body(email_body(context))
                .sender(Sender {
                    email: email.sender_email.clone(),
                    name: email.sender_name.clone(),
                })
                .build())
        }
        ChannelKind::Sms => {
            if !settings.sms.enabled {
                return Err("sms notifications are disabled".to_string());
            }
            let Some(number) = configured(&settings.sms.number) else {
                return Err("sms is enabled but no phone number is configured".to_string());
            };

            Ok(MessageBuilder::new(kind)
                .recipient(number)
                .body(sms_text(context))
                .build())
        }
        ChannelKind::Chat => {
            if !settings.chat.enabled {
                return Err("chat notifications are disabled".to_string());
            }
            let Some(number) = configured(&settings.chat.number) else {
                return Err("chat is enabled but no number is configured".to_string());
            };

            Ok(MessageBuilder::new(kind)
                .recipient(chat_address(number))
                .body(chat_text(context))
                .build())
        }
    }
}
