use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::sign::dingtalk_sign;
use super::{NotificationChannel, REDACTED, WebhookMessage, check_url, post_json, proxy_receiver, proxy_url};
use crate::config::ChannelSettings;
use crate::documents::Receiver;
use crate::error::{AlertError, Result};

const DINGTALK_HOST: &str = "oapi.dingtalk.com";

/// DingTalk group robot, relayed through the alert proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DingdingChannel {
    /// Robot webhook including its access token.
    pub url: String,
    /// Phone numbers to mention.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub at_mobiles: Vec<String>,
    /// Signing secret, empty when the robot is not signed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sign_secret: String,
}

impl DingdingChannel {
    fn params(&self, redact: bool) -> Vec<(&'static str, String)> {
        let mut params = vec![("url", self.url.clone())];
        if !self.at_mobiles.is_empty() {
            params.push(("at", self.at_mobiles.join(",")));
        }
        if !self.sign_secret.is_empty() {
            let secret = if redact { REDACTED } else { self.sign_secret.as_str() };
            params.push(("signSecret", secret.to_string()));
        }
        params
    }

    fn signed_url(&self) -> Result<String> {
        let mut url = check_url(&self.url, Some(DINGTALK_HOST))?;
        if !self.sign_secret.is_empty() {
            let timestamp = Utc::now().timestamp_millis();
            let sign = dingtalk_sign(timestamp, &self.sign_secret)?;
            url.query_pairs_mut()
                .append_pair("timestamp", &timestamp.to_string())
                .append_pair("sign", &sign);
        }
        Ok(url.into())
    }
}

impl NotificationChannel for DingdingChannel {
    fn channel_type(&self) -> &'static str {
        "dingding"
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        proxy_receiver(receiver_name, proxy_url(settings, "dingding", &self.params(false)))
    }

    fn check(&self) -> Result<()> {
        check_url(&self.url, Some(DINGTALK_HOST)).map(|_| ())
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        let body = json!({
            "msgtype": "markdown",
            "markdown": { "title": message.title(), "text": message.text() },
            "at": { "atMobiles": self.at_mobiles },
        });
        let text = post_json(settings, &self.signed_url()?, &body, false)?;
        let reply: serde_json::Value = serde_json::from_str(&text)?;
        match reply.get("errcode").and_then(serde_json::Value::as_i64) {
            Some(0) => Ok(()),
            code => Err(AlertError::NotificationFailed {
                reason: format!(
                    "dingtalk errcode {}: {}",
                    code.unwrap_or(-1),
                    reply.get("errmsg").and_then(serde_json::Value::as_str).unwrap_or_default()
                ),
            }),
        }
    }

    fn describe(&self, settings: &ChannelSettings) -> String {
        proxy_url(settings, "dingding", &self.params(true))
    }
}
