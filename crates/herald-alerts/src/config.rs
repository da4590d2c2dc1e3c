//! Engine configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};

/// Settings used when turning channels into receivers and testing them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelSettings {
    /// Id of the channel every rule falls back to.
    pub default_channel_id: u64,
    /// Name of the default channel.
    pub default_channel_name: String,
    /// Webhook the default channel posts to.
    pub default_webhook_url: String,
    /// `host:port` of the proxy that relays chat and SMS notifications.
    pub alert_proxy_host: String,
    /// Secret object holding email passwords.
    pub email_secret_name: String,
    /// Timeout for channel test sends, in seconds.
    pub test_timeout_secs: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            default_channel_id: 1,
            default_channel_name: "kubegems-default-webhook".to_string(),
            default_webhook_url: "https://kubegems-local-agent.kubegems-local:8041/alert".to_string(),
            alert_proxy_host: "alertproxy.kubegems-monitoring:9094".to_string(),
            email_secret_name: "gemscloud-email-password".to_string(),
            test_timeout_secs: 10,
        }
    }
}

/// Top-level engine configuration, passed into every call that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Namespace whose rules may watch the whole cluster.
    pub global_namespace: String,
    /// Longest window a log rule may count over.
    #[serde(with = "crate::duration::serde_str")]
    pub max_log_window: Duration,
    /// Channel settings.
    pub channels: ChannelSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_namespace: "kubegems-monitoring".to_string(),
            max_log_window: Duration::from_secs(10 * 60),
            channels: ChannelSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from YAML (JSON is accepted too).
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::SerializationError` for malformed input and
    /// `AlertError::Config` for unusable values.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Config` if the file cannot be read.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| AlertError::Config {
            reason: format!("read {}: {e}", path.display()),
        })?;
        Self::from_yaml(&text)
    }

    /// Rejects values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Config` describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        let config_err = |reason: &str| AlertError::Config {
            reason: reason.to_string(),
        };
        if self.global_namespace.is_empty() {
            return Err(config_err("globalNamespace must not be empty"));
        }
        if self.max_log_window.is_zero() {
            return Err(config_err("maxLogWindow must be positive"));
        }
        if self.channels.default_channel_name.is_empty() {
            return Err(config_err("channels.defaultChannelName must not be empty"));
        }
        url::Url::parse(&self.channels.default_webhook_url)
            .map_err(|e| config_err(&format!("channels.defaultWebhookUrl: {e}")))?;
        Ok(())
    }
}
