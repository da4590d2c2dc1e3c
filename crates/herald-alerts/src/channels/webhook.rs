use serde::{Deserialize, Serialize};

use super::{NotificationChannel, WebhookMessage, check_url, post_json};
use crate::config::ChannelSettings;
use crate::documents::{HttpConfig, Receiver, TlsConfig, WebhookConfig};
use crate::error::Result;

/// Posts the router payload to an arbitrary URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannel {
    /// Target URL.
    pub url: String,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> &'static str {
        "webhook"
    }

    fn to_receiver(&self, receiver_name: &str, _settings: &ChannelSettings) -> Receiver {
        let http_config = self.insecure_skip_verify.then(|| HttpConfig {
            tls_config: Some(TlsConfig {
                insecure_skip_verify: true,
            }),
        });
        Receiver {
            name: receiver_name.to_string(),
            webhook_configs: vec![WebhookConfig {
                url: self.url.clone(),
                send_resolved: None,
                http_config,
            }],
            ..Receiver::default()
        }
    }

    fn check(&self) -> Result<()> {
        check_url(&self.url, None).map(|_| ())
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        post_json(settings, &self.url, message, self.insecure_skip_verify).map(|_| ())
    }

    fn describe(&self, _settings: &ChannelSettings) -> String {
        self.url.clone()
    }
}
