//! Externally consumed documents: the rule-group document read by the rule
//! engine and the routing document read by the notification router.
//!
//! Field names follow the `PrometheusRule` and `AlertmanagerConfig` resource
//! specs so both documents can be written out as-is.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::promql::MatchOp;

/// Parses a document from YAML or JSON.
///
/// # Errors
///
/// Returns `AlertError::SerializationError` for malformed input.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_yaml::from_str(text)?)
}

/// Renders a document as YAML.
///
/// # Errors
///
/// Returns `AlertError::SerializationError` if rendering fails.
pub fn to_yaml<T: Serialize>(doc: &T) -> Result<String> {
    Ok(serde_yaml::to_string(doc)?)
}

// ============ Rule groups ============

/// Ordered rule groups for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupDocument {
    /// Resource name.
    pub name: String,
    /// Resource namespace.
    pub namespace: String,
    /// Groups, one per alert rule.
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

/// A named group of member rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    /// Group name.
    pub name: String,
    /// Member rules, one per severity level.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One member rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Alert name.
    #[serde(default)]
    pub alert: String,
    /// Query including the comparison.
    pub expr: String,
    /// Pending duration.
    #[serde(rename = "for", default, skip_serializing_if = "String::is_empty")]
    pub for_duration: String,
    /// Labels attached to fired alerts.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations attached to fired alerts.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

// ============ Routing ============

/// Receivers, routing tree and inhibit rules for one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDocument {
    /// Resource name.
    pub name: String,
    /// Resource namespace.
    pub namespace: String,
    /// Root route.
    #[serde(default)]
    pub route: Route,
    /// Receivers referenced by routes.
    #[serde(default)]
    pub receivers: Vec<Receiver>,
    /// Inhibit rules.
    #[serde(default)]
    pub inhibit_rules: Vec<InhibitRule>,
}

/// One node of the routing tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Receiver name.
    #[serde(default)]
    pub receiver: String,
    /// Grouping labels.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    /// Wait before the first notification of a group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_wait: String,
    /// Wait between notifications of a changed group.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_interval: String,
    /// Wait before repeating an unchanged notification.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repeat_interval: String,
    /// Label matchers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matchers: Vec<Matcher>,
    /// Keep evaluating sibling routes after a match.
    #[serde(rename = "continue", default)]
    pub continue_matching: bool,
    /// Child routes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// A label matcher in a route or inhibit rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Matcher {
    /// Label name.
    pub name: String,
    /// Label value or pattern.
    #[serde(default)]
    pub value: String,
    /// Comparison.
    #[serde(default)]
    pub match_type: MatchOp,
}

impl Matcher {
    /// Creates an equality matcher.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            match_type: MatchOp::Equal,
        }
    }
}

/// Returns the value of the first equality matcher on `name`.
#[must_use]
pub fn matcher_value<'a>(matchers: &'a [Matcher], name: &str) -> Option<&'a str> {
    matchers
        .iter()
        .find(|m| m.name == name && m.match_type == MatchOp::Equal)
        .map(|m| m.value.as_str())
}

/// A named notification destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receiver {
    /// Receiver name.
    pub name: String,
    /// Webhook deliveries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhook_configs: Vec<WebhookConfig>,
    /// Email deliveries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_configs: Vec<EmailConfig>,
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    /// Target URL.
    pub url: String,
    /// Also notify on resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
    /// HTTP client settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpConfig>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// TLS settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

/// TLS settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Skip certificate verification.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Email delivery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    /// Also notify on resolve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_resolved: Option<bool>,
    /// Recipients, comma separated.
    pub to: String,
    /// Sender address.
    pub from: String,
    /// SMTP server `host:port`.
    pub smarthost: String,
    /// SMTP user.
    #[serde(default)]
    pub auth_username: String,
    /// SMTP identity.
    #[serde(default)]
    pub auth_identity: String,
    /// Reference to the stored SMTP password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_password: Option<SecretKeySelector>,
    /// Require STARTTLS.
    #[serde(rename = "requireTLS", default, skip_serializing_if = "Option::is_none")]
    pub require_tls: Option<bool>,
}

/// Reference to one key of a secret object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    /// Secret object name.
    pub name: String,
    /// Key within the secret.
    pub key: String,
}

/// Suppresses target alerts while a matching source alert fires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InhibitRule {
    /// Matchers selecting the suppressing alert.
    #[serde(default)]
    pub source_match: Vec<Matcher>,
    /// Matchers selecting the suppressed alert.
    #[serde(default)]
    pub target_match: Vec<Matcher>,
    /// Labels that must be equal on both alerts.
    #[serde(default)]
    pub equal: Vec<String>,
}
