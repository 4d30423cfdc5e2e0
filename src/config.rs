use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace};

/// Default debounce window before an alert escalates
pub const DEFAULT_DELAY_WINDOW_SECS: u64 = 10;

/// Default timeout for a single channel submission
pub const DEFAULT_CHANNEL_TIMEOUT_SECS: u64 = 5;

/// Default capacity of the notification queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The configuration source could not be read
    #[error("configuration unavailable: {0}")]
    Unavailable(String),

    /// The configuration was read but is not usable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./iot.db")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "crate::util::get_default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_default_bind_addr(),
            enable_cors: true,
        }
    }
}

/// Contents of the hub configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub alerts: AlertSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,

    /// Storage configuration (optional - defaults to SQLite)
    pub storage: Option<StorageConfig>,

    pub api: Option<ApiSettings>,

    /// Delivery endpoints, fixed for the lifetime of the hub
    #[serde(default)]
    pub endpoints: ChannelEndpoints,
}

/// Webhook endpoints of the delivery providers.
///
/// A channel without an endpoint only logs what it would have sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEndpoints {
    pub email: Option<String>,
    pub sms: Option<String>,
    pub chat: Option<String>,
}

impl Config {
    /// The runtime-adjustable part of the configuration
    pub fn settings(&self) -> Settings {
        Settings {
            alerts: self.alerts.clone(),
            notifications: self.notifications.clone(),
        }
    }
}

/// Settings consulted on every evaluation and every dispatch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub alerts: AlertSettings,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "crate::util::get_max_threshold")]
    pub max_threshold: f64,
    #[serde(default = "crate::util::get_min_threshold")]
    pub min_threshold: f64,
    #[serde(default = "default_delay_window_secs")]
    pub delay_window_secs: u64,
}

impl AlertSettings {
    pub fn delay_window(&self) -> Duration {
        Duration::from_secs(self.delay_window_secs)
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            max_threshold: crate::util::get_max_threshold(),
            min_threshold: crate::util::get_min_threshold(),
            delay_window_secs: DEFAULT_DELAY_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub sms: SmsSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl NotificationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email: EmailSettings::default(),
            sms: SmsSettings::default(),
            chat: ChatSettings::default(),
            timeout_secs: DEFAULT_CHANNEL_TIMEOUT_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "deserialize_recipients")]
    pub recipients: Vec<String>,
    pub sender_email: Option<String>,
    #[serde(default = "default_sender_name")]
    pub sender_name: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            recipients: Vec::new(),
            sender_email: None,
            sender_name: default_sender_name(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SmsSettings {
    #[serde(default)]
    pub enabled: bool,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub enabled: bool,
    pub number: Option<String>,
}

/// Recipients as either a JSON list or a comma-separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientList {
    List(Vec<String>),
    Csv(String),
}

impl RecipientList {
    pub fn into_vec(self) -> Vec<String> {
        let raw = match self {
            RecipientList::List(list) => list,
            RecipientList::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };

        raw.into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect()
    }
}

fn deserialize_recipients<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    RecipientList::deserialize(deserializer).map(RecipientList::into_vec)
}

fn default_true() -> bool {
    true
}

fn default_sender_name() -> String {
    String::from("IoT Alerts")
}

fn default_delay_window_secs() -> u64 {
    DEFAULT_DELAY_WINDOW_SECS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_CHANNEL_TIMEOUT_SECS
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

pub fn read_config_file(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}

/// Source of the current [`Settings`].
///
/// Implementations must return the latest snapshot on every call; callers
/// never cache thresholds or recipients across evaluations.
pub trait ConfigProvider: Send + Sync {
    fn settings(&self) -> Result<Settings, ConfigError>;
}

/// Partial update of the runtime settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub max_threshold: Option<f64>,
    pub min_threshold: Option<f64>,
    pub delay_window_secs: Option<u64>,
    pub email_enabled: Option<bool>,
    pub email_recipients: Option<RecipientList>,
    pub sender_email: Option<String>,
    pub sender_name: Option<String>,
    pub sms_enabled: Option<bool>,
    pub phone_number: Option<String>,
    pub chat_enabled: Option<bool>,
    pub chat_number: Option<String>,
}

/// In-memory settings, adjustable at runtime
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Apply a partial update and return the resulting settings.
    ///
    /// The update is rejected as a whole if any threshold is not finite.
    pub fn update(&self, update: SettingsUpdate) -> Result<Settings, ConfigError> {
        for threshold in [update.max_threshold, update.min_threshold].into_iter().flatten() {
            if !threshold.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "threshold must be a finite number, got {threshold}"
                )));
            }
        }

        let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);

        let alerts = &mut settings.alerts;
        if let Some(max) = update.max_threshold {
            alerts.max_threshold = max;
        }
        if let Some(min) = update.min_threshold {
            alerts.min_threshold = min;
        }
        if let Some(secs) = update.delay_window_secs {
            alerts.delay_window_secs = secs;
        }

        let notifications = &mut settings.notifications;
        if let Some(enabled) = update.email_enabled {
            notifications.email.enabled = enabled;
        }
        if let Some(recipients) = update.email_recipients {
            notifications.email.recipients = recipients.into_vec();
        }
        if let Some(sender_email) = update.sender_email {
            notifications.email.sender_email = Some(sender_email);
        }
        if let Some(sender_name) = update.sender_name {
            notifications.email.sender_name = sender_name;
        }
        if let Some(enabled) = update.sms_enabled {
            notifications.sms.enabled = enabled;
        }
        if let Some(number) = update.phone_number {
            notifications.sms.number = Some(number);
        }
        if let Some(enabled) = update.chat_enabled {
            notifications.chat.enabled = enabled;
        }
        if let Some(number) = update.chat_number {
            notifications.chat.number = Some(number);
        }

        debug!("settings updated: {:?}", settings.alerts);
        Ok((*settings).clone())
    }
}

impl ConfigProvider for SettingsStore {
    fn settings(&self) -> Result<Settings, ConfigError> {
        Ok(self
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
