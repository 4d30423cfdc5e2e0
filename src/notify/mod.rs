//! Operator notifications for escalated alerts
//!
//! - [`channel`]: delivery clients behind the [`NotificationChannel`] trait
//! - [`message`]: rendering of subjects and bodies per channel
//! - [`dispatcher`]: the actor that resolves recipients, delivers and audits

pub mod channel;
pub mod dispatcher;
pub mod message;

pub use channel::{ChannelError, ChannelKind, ChannelSet, NotificationChannel, OutboundMessage};
pub use dispatcher::{DispatchError, DispatcherHandle, DispatcherStats, send_and_audit};
pub use message::AlertContext;
