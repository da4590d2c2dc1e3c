use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::sign::feishu_sign;
use super::{NotificationChannel, REDACTED, WebhookMessage, check_url, post_json, proxy_receiver, proxy_url};
use crate::config::ChannelSettings;
use crate::documents::Receiver;
use crate::error::{AlertError, Result};

const FEISHU_HOST: &str = "open.feishu.cn";

/// Feishu group robot, relayed through the alert proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeishuChannel {
    /// Robot webhook.
    pub url: String,
    /// User ids to mention, comma separated, or `all`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub at: String,
    /// Signing secret, empty when the robot is not signed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sign_secret: String,
}

impl FeishuChannel {
    fn params(&self, redact: bool) -> Vec<(&'static str, String)> {
        let mut params = vec![("url", self.url.clone())];
        if !self.at.is_empty() {
            params.push(("at", self.at.clone()));
        }
        if !self.sign_secret.is_empty() {
            let secret = if redact { REDACTED } else { self.sign_secret.as_str() };
            params.push(("signSecret", secret.to_string()));
        }
        params
    }

    fn body(&self, message: &WebhookMessage) -> Result<Value> {
        let mut body = json!({
            "msg_type": "text",
            "content": { "text": message.text() },
        });
        if !self.sign_secret.is_empty() {
            let timestamp = Utc::now().timestamp();
            body["timestamp"] = Value::String(timestamp.to_string());
            body["sign"] = Value::String(feishu_sign(timestamp, &self.sign_secret)?);
        }
        Ok(body)
    }
}

impl NotificationChannel for FeishuChannel {
    fn channel_type(&self) -> &'static str {
        "feishu"
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        proxy_receiver(receiver_name, proxy_url(settings, "feishu", &self.params(false)))
    }

    fn check(&self) -> Result<()> {
        check_url(&self.url, Some(FEISHU_HOST)).map(|_| ())
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        let text = post_json(settings, &self.url, &self.body(message)?, false)?;
        let reply: Value = serde_json::from_str(&text)?;
        let code = reply
            .get("code")
            .or_else(|| reply.get("StatusCode"))
            .and_then(Value::as_i64);
        if code == Some(0) {
            return Ok(());
        }
        let msg = reply
            .get("msg")
            .or_else(|| reply.get("StatusMessage"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Err(AlertError::NotificationFailed {
            reason: format!("feishu code {}: {msg}", code.unwrap_or(-1)),
        })
    }

    fn describe(&self, settings: &ChannelSettings) -> String {
        proxy_url(settings, "feishu", &self.params(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> FeishuChannel {
        FeishuChannel {
            url: "https://open.feishu.cn/open-apis/bot/v2/hook/abc".to_string(),
            at: "all".to_string(),
            sign_secret: "s3cret".to_string(),
        }
    }

    #[test]
    fn receiver_points_at_proxy() {
        let receiver = channel().to_receiver("fs-id-5", &ChannelSettings::default());
        let url = &receiver.webhook_configs[0].url;
        assert!(url.contains("type=feishu"));
        assert!(url.contains("at=all"));
        assert!(url.contains("signSecret=s3cret"));
    }

    #[test]
    fn describe_redacts_secret() {
        assert!(!channel().describe(&ChannelSettings::default()).contains("s3cret"));
    }

    #[test]
    fn host_is_enforced() {
        assert!(channel().check().is_ok());
        let mut c = channel();
        c.url = "https://open.larksuite.com/open-apis/bot/v2/hook/abc".to_string();
        assert!(c.check().is_err());
    }

    #[test]
    fn signed_body() {
        let msg = WebhookMessage::sample("a", "b", "c", Utc::now());
        let body = channel().body(&msg).unwrap();
        assert_eq!(body["msg_type"], "text");
        assert!(body["sign"].is_string());
        assert!(body["timestamp"].is_string());

        let mut unsigned = channel();
        unsigned.sign_secret.clear();
        assert!(unsigned.body(&msg).unwrap().get("sign").is_none());
    }
}
