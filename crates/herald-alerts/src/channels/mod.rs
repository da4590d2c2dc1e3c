//! Notification channels.
//!
//! A channel is stored externally as JSON tagged by `channelType`. This
//! module turns channels into routing-document receivers, validates them,
//! and sends test notifications through them.
//!
//! Chat and SMS channels are not delivered by the router directly: their
//! receivers are webhooks pointing at an alert proxy, with the provider
//! settings encoded in the query string.

mod aliyun;
mod dingding;
mod email;
mod feishu;
mod message;
mod sign;
mod webhook;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use aliyun::{AliyunSmsChannel, AliyunVoiceChannel};
pub use dingding::DingdingChannel;
pub use email::{EmailChannel, email_secret_data};
pub use feishu::FeishuChannel;
pub use message::{WebhookAlert, WebhookMessage};
pub use webhook::WebhookChannel;

use crate::config::ChannelSettings;
use crate::documents::{Receiver, WebhookConfig};
use crate::error::{AlertError, Result};
use crate::types::ChannelRef;

const REDACTED: &str = "***";

/// Behaviour shared by every channel variant.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the `channelType` tag.
    fn channel_type(&self) -> &'static str;

    /// Builds the receiver block for the routing document.
    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver;

    /// Checks required fields and provider-specific constraints.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannel` describing the first problem.
    fn check(&self) -> Result<()>;

    /// Sends `message` synchronously. Failures are reported, never retried.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::NotificationFailed` if delivery fails.
    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()>;

    /// Returns the delivery target with secrets redacted.
    fn describe(&self, settings: &ChannelSettings) -> String;
}

/// Every supported channel, tagged by `channelType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channelType")]
pub enum ChannelConfig {
    /// Generic webhook.
    #[serde(rename = "webhook")]
    Webhook(WebhookChannel),
    /// SMTP email.
    #[serde(rename = "email")]
    Email(EmailChannel),
    /// DingTalk robot.
    #[serde(rename = "dingding")]
    Dingding(DingdingChannel),
    /// Feishu robot.
    #[serde(rename = "feishu")]
    Feishu(FeishuChannel),
    /// Aliyun SMS.
    #[serde(rename = "aliyunMsg")]
    AliyunSms(AliyunSmsChannel),
    /// Aliyun voice call.
    #[serde(rename = "aliyunVoice")]
    AliyunVoice(AliyunVoiceChannel),
}

impl ChannelConfig {
    fn inner(&self) -> &dyn NotificationChannel {
        match self {
            Self::Webhook(c) => c,
            Self::Email(c) => c,
            Self::Dingding(c) => c,
            Self::Feishu(c) => c,
            Self::AliyunSms(c) => c,
            Self::AliyunVoice(c) => c,
        }
    }
}

impl NotificationChannel for ChannelConfig {
    fn channel_type(&self) -> &'static str {
        self.inner().channel_type()
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        self.inner().to_receiver(receiver_name, settings)
    }

    fn check(&self) -> Result<()> {
        self.inner().check()
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        self.check()?;
        info!(
            channel_type = self.channel_type(),
            target = %self.describe(settings),
            alerts = message.alerts.len(),
            "sending test notification"
        );
        self.inner().test(message, settings)
    }

    fn describe(&self, settings: &ChannelSettings) -> String {
        self.inner().describe(settings)
    }
}

/// A channel as kept in the external store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannel {
    /// Store id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Delivery settings.
    #[serde(rename = "channelConfig")]
    pub config: ChannelConfig,
}

impl AlertChannel {
    /// Creates a channel.
    pub fn new(id: u64, name: impl Into<String>, config: ChannelConfig) -> Self {
        Self {
            id,
            name: name.into(),
            config,
        }
    }

    /// Returns the channel every rule falls back to.
    #[must_use]
    pub fn default_channel(settings: &ChannelSettings) -> Self {
        Self::new(
            settings.default_channel_id,
            settings.default_channel_name.clone(),
            ChannelConfig::Webhook(WebhookChannel {
                url: settings.default_webhook_url.clone(),
                insecure_skip_verify: true,
            }),
        )
    }

    /// Returns the reference stored on rules.
    #[must_use]
    pub fn channel_ref(&self) -> ChannelRef {
        ChannelRef::new(self.id, self.name.clone())
    }

    /// Returns the receiver name used in routing documents.
    #[must_use]
    pub fn receiver_name(&self) -> String {
        self.channel_ref().receiver_name()
    }

    /// Builds this channel's receiver block.
    #[must_use]
    pub fn to_receiver(&self, settings: &ChannelSettings) -> Receiver {
        self.config.to_receiver(&self.receiver_name(), settings)
    }
}

/// Resolves channel ids to channels.
pub trait ChannelGetter {
    /// Returns the channel with `id`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::ChannelNotFound` if there is no such channel.
    fn get_channel(&self, id: u64) -> Result<AlertChannel>;
}

impl<F> ChannelGetter for F
where
    F: Fn(u64) -> Result<AlertChannel>,
{
    fn get_channel(&self, id: u64) -> Result<AlertChannel> {
        self(id)
    }
}

/// In-memory channel lookup.
#[derive(Debug, Clone, Default)]
pub struct ChannelMapper {
    channels: HashMap<u64, AlertChannel>,
}

impl ChannelMapper {
    /// Creates a mapper over `channels`.
    pub fn new(channels: impl IntoIterator<Item = AlertChannel>) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.id, c)).collect(),
        }
    }

    /// Creates a mapper that also knows the default channel.
    pub fn with_default(settings: &ChannelSettings, channels: impl IntoIterator<Item = AlertChannel>) -> Self {
        let mut mapper = Self::new(channels);
        let default = AlertChannel::default_channel(settings);
        mapper.channels.entry(default.id).or_insert(default);
        mapper
    }

    /// Adds or replaces a channel.
    pub fn insert(&mut self, channel: AlertChannel) {
        self.channels.insert(channel.id, channel);
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns true if there are no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl ChannelGetter for ChannelMapper {
    fn get_channel(&self, id: u64) -> Result<AlertChannel> {
        self.channels
            .get(&id)
            .cloned()
            .ok_or(AlertError::ChannelNotFound { id })
    }
}

/// Builds an alert proxy URL. Values are form-encoded.
fn proxy_url(settings: &ChannelSettings, kind: &str, params: &[(&str, String)]) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("type", kind);
    for (k, v) in params {
        query.append_pair(k, v);
    }
    format!("http://{}/?{}", settings.alert_proxy_host, query.finish())
}

/// A receiver that posts to the alert proxy.
fn proxy_receiver(receiver_name: &str, url: String) -> Receiver {
    Receiver {
        name: receiver_name.to_string(),
        webhook_configs: vec![WebhookConfig {
            url,
            send_resolved: None,
            http_config: None,
        }],
        ..Receiver::default()
    }
}

/// Checks that `raw` is an absolute http(s) URL, optionally on `host`.
fn check_url(raw: &str, host: Option<&str>) -> Result<url::Url> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AlertError::invalid_channel(format!("url {raw:?} not valid: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(AlertError::invalid_channel(format!(
            "url {raw:?} must be an absolute http(s) url"
        )));
    }
    if let Some(expected) = host {
        if parsed.host_str() != Some(expected) {
            return Err(AlertError::invalid_channel(format!(
                "url host must be {expected}, got {:?}",
                parsed.host_str().unwrap_or_default()
            )));
        }
    }
    Ok(parsed)
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AlertError::invalid_channel(format!("{field} must not be empty")));
    }
    Ok(())
}

fn http_client(settings: &ChannelSettings, insecure: bool) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(settings.test_timeout_secs))
        .danger_accept_invalid_certs(insecure)
        .build()
        .map_err(|e| AlertError::NotificationFailed {
            reason: format!("build http client: {e}"),
        })
}

/// POSTs `body` as JSON and returns the response text on 2xx.
fn post_json<T: Serialize + ?Sized>(
    settings: &ChannelSettings,
    url: &str,
    body: &T,
    insecure: bool,
) -> Result<String> {
    let failed = |reason: String| AlertError::NotificationFailed { reason };
    let response = http_client(settings, insecure)?
        .post(url)
        .json(body)
        .send()
        .map_err(|e| failed(format!("post: {e}")))?;
    let status = response.status();
    let text = response.text().unwrap_or_default();
    debug!(status = %status, "test notification response");
    if !status.is_success() {
        return Err(failed(format!("unexpected status {status}: {text}")));
    }
    Ok(text)
}
