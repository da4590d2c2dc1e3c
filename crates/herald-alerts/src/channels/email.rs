use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChannelConfig, ChannelGetter, NotificationChannel, WebhookMessage, require};
use crate::config::ChannelSettings;
use crate::documents::{EmailConfig, Receiver, SecretKeySelector};
use crate::error::{AlertError, Result};
use crate::types::AlertRule;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Delivers alerts by SMTP.
///
/// The password never appears in the routing document. Receivers reference
/// it by key in a secret object, see [`email_secret_data`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChannel {
    /// SMTP server as `host:port`.
    pub smtp_server: String,
    /// Require STARTTLS.
    #[serde(rename = "requireTLS", default)]
    pub require_tls: bool,
    /// Sender address, also the SMTP user.
    pub from: String,
    /// Recipients, comma separated.
    pub to: String,
    /// SMTP password.
    #[serde(default)]
    pub auth_password: String,
}

impl EmailChannel {
    /// Key under which this channel's password is stored for `receiver_name`.
    #[must_use]
    pub fn secret_key(&self, receiver_name: &str) -> String {
        format!("{receiver_name}-{}", self.from.replace('@', ""))
    }

    fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.split(',').map(str::trim).filter(|s| !s.is_empty())
    }

    fn host_port(&self) -> Result<(&str, u16)> {
        let (host, port) = self.smtp_server.rsplit_once(':').ok_or_else(|| {
            AlertError::invalid_channel(format!("smtp server {:?} must be host:port", self.smtp_server))
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            AlertError::invalid_channel(format!("smtp server {:?} has a bad port", self.smtp_server))
        })?;
        if host.is_empty() {
            return Err(AlertError::invalid_channel("smtp host must not be empty"));
        }
        Ok((host, port))
    }

    fn build_message(&self, message: &WebhookMessage) -> Result<Message> {
        let failed = |reason: String| AlertError::NotificationFailed { reason };
        let from: Mailbox = self
            .from
            .parse()
            .map_err(|e| failed(format!("sender {}: {e}", self.from)))?;
        let mut builder = Message::builder().from(from).subject(message.title());
        for to in self.recipients() {
            let mailbox: Mailbox = to.parse().map_err(|e| failed(format!("recipient {to}: {e}")))?;
            builder = builder.to(mailbox);
        }
        builder
            .header(ContentType::TEXT_PLAIN)
            .body(message.text())
            .map_err(|e| failed(format!("build email: {e}")))
    }

    fn transport(&self, settings: &ChannelSettings) -> Result<SmtpTransport> {
        let (host, port) = self.host_port()?;
        let failed = |e: lettre::transport::smtp::Error| AlertError::NotificationFailed {
            reason: format!("smtp {host}: {e}"),
        };
        let builder = if self.require_tls {
            SmtpTransport::starttls_relay(host).map_err(failed)?
        } else if port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(host).map_err(failed)?
        } else {
            SmtpTransport::builder_dangerous(host)
        };
        Ok(builder
            .port(port)
            .credentials(Credentials::new(self.from.clone(), self.auth_password.clone()))
            .timeout(Some(Duration::from_secs(settings.test_timeout_secs)))
            .build())
    }
}

impl NotificationChannel for EmailChannel {
    fn channel_type(&self) -> &'static str {
        "email"
    }

    fn to_receiver(&self, receiver_name: &str, settings: &ChannelSettings) -> Receiver {
        Receiver {
            name: receiver_name.to_string(),
            email_configs: vec![EmailConfig {
                send_resolved: None,
                to: self.to.clone(),
                from: self.from.clone(),
                smarthost: self.smtp_server.clone(),
                auth_username: self.from.clone(),
                auth_identity: self.from.clone(),
                auth_password: Some(SecretKeySelector {
                    name: settings.email_secret_name.clone(),
                    key: self.secret_key(receiver_name),
                }),
                require_tls: Some(self.require_tls),
            }],
            ..Receiver::default()
        }
    }

    fn check(&self) -> Result<()> {
        require("smtpServer", &self.smtp_server)?;
        self.host_port()?;
        require("from", &self.from)?;
        if !self.from.contains('@') {
            return Err(AlertError::invalid_channel(format!("from {:?} is not an address", self.from)));
        }
        if self.recipients().next().is_none() {
            return Err(AlertError::invalid_channel("to must not be empty"));
        }
        if let Some(bad) = self.recipients().find(|to| !to.contains('@')) {
            return Err(AlertError::invalid_channel(format!("to {bad:?} is not an address")));
        }
        Ok(())
    }

    fn test(&self, message: &WebhookMessage, settings: &ChannelSettings) -> Result<()> {
        let email = self.build_message(message)?;
        let response = self
            .transport(settings)?
            .send(&email)
            .map_err(|e| AlertError::NotificationFailed {
                reason: format!("send email: {e}"),
            })?;
        debug!(code = %response.code(), "smtp accepted test email");
        Ok(())
    }

    fn describe(&self, _settings: &ChannelSettings) -> String {
        format!("smtp://{}@{} -> {}", self.from, self.smtp_server, self.to)
    }
}

/// Collects the email passwords every rule's receivers need, keyed the way
/// [`EmailChannel::to_receiver`] references them.
///
/// Keys use the stored channel's receiver name. The default channel is a
/// webhook and is never looked up.
///
/// # Errors
///
/// Returns the getter's error if a referenced channel cannot be resolved.
pub fn email_secret_data(
    rules: &[AlertRule],
    getter: &dyn ChannelGetter,
    settings: &ChannelSettings,
) -> Result<BTreeMap<String, String>> {
    let mut data = BTreeMap::new();
    let mut seen = HashSet::from([settings.default_channel_id]);
    for receiver in rules.iter().flat_map(|r| &r.receivers) {
        if !seen.insert(receiver.alert_channel.id) {
            continue;
        }
        let channel = getter.get_channel(receiver.alert_channel.id)?;
        if let ChannelConfig::Email(email) = &channel.config {
            let key = email.secret_key(&channel.receiver_name());
            data.entry(key).or_insert_with(|| email.auth_password.clone());
        }
    }
    Ok(data)
}
