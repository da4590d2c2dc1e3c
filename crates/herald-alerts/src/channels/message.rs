//! Sample notification payload used by channel tests.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::labels::{ALERT_NAME_LABEL, MESSAGE_ANNOTATION, NAMESPACE_LABEL, SEVERITY_LABEL};
use crate::types::Severity;

/// Webhook payload in the notification router's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    /// Payload version.
    pub version: String,
    /// Group key.
    pub group_key: String,
    /// `firing` or `resolved`.
    pub status: String,
    /// Receiver name.
    pub receiver: String,
    /// Labels shared by every alert.
    pub common_labels: BTreeMap<String, String>,
    /// Annotations shared by every alert.
    pub common_annotations: BTreeMap<String, String>,
    /// Alerts in this notification.
    pub alerts: Vec<WebhookAlert>,
}

/// One alert within a [`WebhookMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAlert {
    /// `firing` or `resolved`.
    pub status: String,
    /// Alert labels.
    pub labels: BTreeMap<String, String>,
    /// Alert annotations.
    pub annotations: BTreeMap<String, String>,
    /// RFC 3339 start time.
    pub starts_at: String,
    /// Deduplication fingerprint.
    pub fingerprint: String,
}

impl WebhookMessage {
    /// Builds a single firing alert for a channel test.
    #[must_use]
    pub fn sample(namespace: &str, rule_name: &str, receiver: &str, now: DateTime<Utc>) -> Self {
        let labels: BTreeMap<String, String> = [
            (NAMESPACE_LABEL, namespace),
            (ALERT_NAME_LABEL, rule_name),
            (SEVERITY_LABEL, Severity::Error.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let annotations: BTreeMap<String, String> = BTreeMap::from([(
            MESSAGE_ANNOTATION.to_string(),
            format!("{rule_name}: this is a test alert"),
        )]);
        let alert = WebhookAlert {
            status: "firing".to_string(),
            labels: labels.clone(),
            annotations: annotations.clone(),
            starts_at: now.to_rfc3339(),
            fingerprint: uuid::Uuid::new_v4().simple().to_string(),
        };
        Self {
            version: "4".to_string(),
            group_key: format!("{namespace}/{rule_name}"),
            status: "firing".to_string(),
            receiver: receiver.to_string(),
            common_labels: labels,
            common_annotations: annotations,
            alerts: vec![alert],
        }
    }

    /// Short title for chat and email channels.
    #[must_use]
    pub fn title(&self) -> String {
        let name = self
            .common_labels
            .get(ALERT_NAME_LABEL)
            .map_or("alert", String::as_str);
        format!("[{}] {name}", self.status)
    }

    /// Plain text body, one line per alert.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = self.title();
        for alert in &self.alerts {
            let message = alert
                .annotations
                .get(MESSAGE_ANNOTATION)
                .map_or("", String::as_str);
            let _ = write!(out, "\n- {message} (since {})", alert.starts_at);
        }
        out
    }
}
