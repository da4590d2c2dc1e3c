//! Aliyun SMS and voice channels. Both are only reachable through the alert
//! proxy, which holds the provider client.

use serde::{Deserialize, Serialize};

use super::{NotificationChannel, REDACTED, WebhookMessage, post_json, proxy_receiver, proxy_url, require};
use crate::config::ChannelSettings;
use crate::documents::Receiver;
use crate::error::Result;

/// Aliyun SMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliyunSmsChannel {
    /// Access key id.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// Registered SMS signature.
    pub sign_name: String,
    /// Registered SMS template.
    pub template_code: String,
    /// Recipients, comma separated.
    pub phone_numbers: String,
}

/// Aliyun text-to-speech call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliyunVoiceChannel {
    /// Access key id.
    pub access_key_id: String,
    /// Access key secret.
    pub access_key_secret: String,
    /// Caller number shown to the callee, empty for the provider default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub call_show_number: String,
    /// Registered speech template.
    pub tts_code: String,
    /// Numbers to call, comma separated.
    pub called_numbers: String,
}

fn secret(value: &str, redact: bool) -> String {
    if redact { REDACTED.to_string() } else { value.to_string() }
}

impl AliyunSmsChannel {
    fn params(&self, redact: bool) -> Vec<(&'static str, String)> {
        vec![
            ("accessKeyId", self.access_key_id.clone()),
            ("accessKeySecret", secret(&self.access_key_secret, redact)),
            ("signName", self.sign_name.clone()),
            ("templateCode", self.template_code.clone()),
            ("phoneNumbers", self.phone_numbers.clone()),
        ]
    }
}

impl AliyunVoiceChannel {
    fn params(&self, redact: bool) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("accessKeyId", self.access_key_id.clone()),
            ("accessKeySecret", secret(&self.access_key_secret, redact)),
        ];
        if !self.call_show_number.is_empty() {
            params.push(("callShowNumber", self.call_show_number.clone()));
        }
        params.push(("ttsCode", self.tts_code.clone()));
        params.push(("calledNumbers", self.called_numbers.clone()));
        params
    }
}

impl NotificationChannel for AliyunSmsChannel {
    fn channel_type(&self) -> &'static str {
        "aliyunMsg"
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        proxy_receiver(receiver_name, proxy_url(settings, self.channel_type(), &self.params(false)))
    }

    fn check(&self) -> Result<()> {
        require("accessKeyId", &self.access_key_id)?;
        require("accessKeySecret", &self.access_key_secret)?;
        require("signName", &self.sign_name)?;
        require("templateCode", &self.template_code)?;
        require("phoneNumbers", &self.phone_numbers)
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        let url = proxy_url(settings, self.channel_type(), &self.params(false));
        post_json(settings, &url, message, false).map(|_| ())
    }

    fn describe(&self, settings: &ChannelSettings) -> String {
        proxy_url(settings, self.channel_type(), &self.params(true))
    }
}

impl NotificationChannel for AliyunVoiceChannel {
    fn channel_type(&self) -> &'static str {
        "aliyunVoice"
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        proxy_receiver(receiver_name, proxy_url(settings, self.channel_type(), &self.params(false)))
    }

    fn check(&self) -> Result<()> {
        require("accessKeyId", &self.access_key_id)?;
        require("accessKeySecret", &self.access_key_secret)?;
        require("ttsCode", &self.tts_code)?;
        require("calledNumbers", &self.called_numbers)
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        let url = proxy_url(settings, self.channel_type(), &self.params(false));
        post_json(settings, &url, message, false).map(|_| ())
    }

    fn describe(&self, settings: &ChannelSettings) -> String {
        proxy_url(settings, self.channel_type(), &self.params(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sms() -> AliyunSmsChannel {
        AliyunSmsChannel {
            access_key_id: "LTAI".to_string(),
            access_key_secret: "topsecret".to_string(),
            sign_name: "gems".to_string(),
            template_code: "SMS_1".to_string(),
            phone_numbers: "13800000000,13900000000".to_string(),
        }
    }

    fn voice() -> AliyunVoiceChannel {
        AliyunVoiceChannel {
            access_key_id: "LTAI".to_string(),
            access_key_secret: "topsecret".to_string(),
            call_show_number: "0571000000".to_string(),
            tts_code: "TTS_1".to_string(),
            called_numbers: "13800000000".to_string(),
        }
    }

    #[test]
    fn sms_receiver() {
        let receiver = sms().to_receiver("sms-id-6", &ChannelSettings::default());
        let url = &receiver.webhook_configs[0].url;
        assert!(url.contains("type=aliyunMsg"));
        assert!(url.contains("templateCode=SMS_1"));
        assert!(url.contains("phoneNumbers=13800000000%2C13900000000"));
    }

    #[test]
    fn voice_receiver() {
        let receiver = voice().to_receiver("tel-id-7", &ChannelSettings::default());
        let url = &receiver.webhook_configs[0].url;
        assert!(url.contains("type=aliyunVoice"));
        assert!(url.contains("callShowNumber=0571000000"));
    }

    #[test]
    fn secrets_redacted() {
        let settings = ChannelSettings::default();
        assert!(!sms().describe(&settings).contains("topsecret"));
        assert!(!voice().describe(&settings).contains("topsecret"));
    }

    #[test]
    fn required_fields() {
        assert!(sms().check().is_ok());
        assert!(voice().check().is_ok());
        let mut s = sms();
        s.template_code.clear();
        assert_eq!(
            s.check().unwrap_err().to_string(),
            "invalid channel: templateCode must not be empty"
        );
        let mut v = voice();
        v.called_numbers = " ".to_string();
        assert!(v.check().is_err());
    }
}
