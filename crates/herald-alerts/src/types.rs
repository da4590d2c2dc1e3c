//! Core types for the alert rule domain model.
//!
//! - [`Severity`]: the severity of one threshold level
//! - [`AlertKind`]: whether a rule watches metrics or logs
//! - [`AlertLevel`]: one threshold variant of a rule
//! - [`ChannelRef`] and [`AlertReceiver`]: where a rule notifies
//! - [`QueryGenerator`]: template description a query was built from
//! - [`AlertRule`]: the rule itself, with a builder

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::expr::CompareOp;
use crate::labels::{RECEIVER_ID_SEPARATOR, SCOPE_NORMAL, SCOPE_SYSTEM_ADMIN};
use crate::logql::LogqlGenerator;
use crate::promql::PromqlGenerator;

/// Rule names are DNS-1035 labels.
static RULE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-z0-9-]*[a-z0-9]$|^[a-z]$").unwrap_or_else(|_| unreachable!())
});

/// Severity of one threshold level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Lower severity; inhibited by `Critical` on the same rule.
    Error,
    /// Higher severity.
    Critical,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            other => Err(AlertError::invalid_rule(format!("unknown severity {other:?}"))),
        }
    }
}

/// Which signal a rule watches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    /// Metrics queries evaluated by the Prometheus rule engine.
    #[default]
    Monitor,
    /// Log-count queries evaluated by the log rule engine.
    Logging,
}

impl AlertKind {
    /// Returns the value of the source-type label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monitor => "monitor",
            Self::Logging => "logging",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the scope label value for a namespace.
#[must_use]
pub fn scope_for(namespace: &str, global_namespace: &str) -> &'static str {
    if namespace == global_namespace {
        SCOPE_SYSTEM_ADMIN
    } else {
        SCOPE_NORMAL
    }
}

/// One threshold variant of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertLevel {
    /// Comparison against the threshold.
    pub compare_op: CompareOp,
    /// Threshold text.
    pub compare_value: String,
    /// Severity of alerts fired by this level.
    pub severity: Severity,
}

impl AlertLevel {
    /// Creates a level.
    pub fn new(compare_op: CompareOp, compare_value: impl Into<String>, severity: Severity) -> Self {
        Self {
            compare_op,
            compare_value: compare_value.into(),
            severity,
        }
    }
}

/// Identity of a notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    /// Channel id in the external store.
    pub id: u64,
    /// Channel name.
    pub name: String,
}

impl ChannelRef {
    /// Creates a channel reference.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Returns the receiver name used in routing documents.
    #[must_use]
    pub fn receiver_name(&self) -> String {
        format!("{}{RECEIVER_ID_SEPARATOR}{}", self.name, self.id)
    }

    /// Parses a receiver name produced by [`ChannelRef::receiver_name`].
    #[must_use]
    pub fn from_receiver_name(receiver: &str) -> Option<Self> {
        let (name, id) = receiver.rsplit_once(RECEIVER_ID_SEPARATOR)?;
        let id = id.parse().ok()?;
        Some(Self::new(id, name))
    }
}

/// A rule's binding to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertReceiver {
    /// The channel notified.
    pub alert_channel: ChannelRef,
    /// Repeat interval for this channel, e.g. `1h`.
    pub interval: String,
}

impl AlertReceiver {
    /// Creates a receiver binding.
    pub fn new(alert_channel: ChannelRef, interval: impl Into<String>) -> Self {
        Self {
            alert_channel,
            interval: interval.into(),
        }
    }
}

/// Template description a rule's query was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryGenerator {
    /// Metrics template.
    Promql(PromqlGenerator),
    /// Log-count template.
    Logql(LogqlGenerator),
}

/// An alert rule: one base query with one or more threshold levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Owning namespace.
    pub namespace: String,
    /// Rule name, unique within the namespace.
    pub name: String,
    /// Which signal the rule watches.
    #[serde(default)]
    pub kind: AlertKind,
    /// Base query, without comparison.
    #[serde(default)]
    pub expr: String,
    /// How long the condition must hold before firing.
    #[serde(rename = "for", default)]
    pub for_duration: String,
    /// Notification text; generated when empty.
    #[serde(default)]
    pub message: String,
    /// Labels correlating critical and error alerts.
    #[serde(default)]
    pub inhibit_labels: Vec<String>,
    /// Threshold levels.
    #[serde(default)]
    pub levels: Vec<AlertLevel>,
    /// Channels notified.
    #[serde(default)]
    pub receivers: Vec<AlertReceiver>,
    /// False while a rule-disable silence is active.
    #[serde(default = "default_open")]
    pub is_open: bool,
    /// Template the query came from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<QueryGenerator>,
    /// Set on read when the generator's template no longer exists.
    #[serde(default)]
    pub tpl_lost: bool,
    /// YAML of the source rule group, when requested on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

const fn default_open() -> bool {
    true
}

impl AlertRule {
    /// Maximum allowed length for rule names.
    pub const MAX_NAME_LENGTH: usize = 63;

    /// Creates a new alert rule builder.
    pub fn builder(namespace: impl Into<String>, name: impl Into<String>) -> AlertRuleBuilder {
        AlertRuleBuilder::new(namespace, name)
    }

    /// Returns true for rules that only exist as routes (no levels).
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.levels.is_empty()
    }

    /// Returns the metrics generator, if any.
    #[must_use]
    pub fn promql_generator(&self) -> Option<&PromqlGenerator> {
        match &self.generator {
            Some(QueryGenerator::Promql(g)) => Some(g),
            _ => None,
        }
    }

    /// Returns the log generator, if any.
    #[must_use]
    pub fn logql_generator(&self) -> Option<&LogqlGenerator> {
        match &self.generator {
            Some(QueryGenerator::Logql(g)) => Some(g),
            _ => None,
        }
    }
}

/// Checks that `name` is a valid rule name.
///
/// # Errors
///
/// Returns `AlertError::InvalidRule` if the name is empty, too long, or not a
/// DNS-1035 label.
pub fn validate_rule_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(AlertError::invalid_rule("rule name cannot be empty"));
    }
    if name.len() > AlertRule::MAX_NAME_LENGTH {
        return Err(AlertError::invalid_rule(format!(
            "rule name exceeds maximum length of {} characters",
            AlertRule::MAX_NAME_LENGTH
        )));
    }
    if !RULE_NAME_REGEX.is_match(name) {
        return Err(AlertError::invalid_rule(format!(
            "rule name {name:?} must consist of lowercase alphanumerics and '-', start with a letter and end with an alphanumeric"
        )));
    }
    Ok(())
}

/// Builder for creating [`AlertRule`] instances.
#[derive(Debug)]
pub struct AlertRuleBuilder {
    rule: AlertRule,
}

impl AlertRuleBuilder {
    fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            rule: AlertRule {
                namespace: namespace.into(),
                name: name.into(),
                kind: AlertKind::Monitor,
                expr: String::new(),
                for_duration: "0m".to_string(),
                message: String::new(),
                inhibit_labels: Vec::new(),
                levels: Vec::new(),
                receivers: Vec::new(),
                is_open: true,
                generator: None,
                tpl_lost: false,
                origin: None,
            },
        }
    }

    /// Sets the rule kind.
    #[must_use]
    pub const fn kind(mut self, kind: AlertKind) -> Self {
        self.rule.kind = kind;
        self
    }

    /// Sets the base query.
    #[must_use]
    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.rule.expr = expr.into();
        self
    }

    /// Sets the pending duration.
    #[must_use]
    pub fn for_duration(mut self, duration: impl Into<String>) -> Self {
        self.rule.for_duration = duration.into();
        self
    }

    /// Sets the notification text.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.rule.message = message.into();
        self
    }

    /// Adds a threshold level.
    #[must_use]
    pub fn level(mut self, op: CompareOp, value: impl Into<String>, severity: Severity) -> Self {
        self.rule.levels.push(AlertLevel::new(op, value, severity));
        self
    }

    /// Adds a channel binding.
    #[must_use]
    pub fn receiver(mut self, channel: ChannelRef, interval: impl Into<String>) -> Self {
        self.rule.receivers.push(AlertReceiver::new(channel, interval));
        self
    }

    /// Adds an inhibit label.
    #[must_use]
    pub fn inhibit_label(mut self, label: impl Into<String>) -> Self {
        self.rule.inhibit_labels.push(label.into());
        self
    }

    /// Sets a metrics generator.
    #[must_use]
    pub fn promql_generator(mut self, generator: PromqlGenerator) -> Self {
        self.rule.generator = Some(QueryGenerator::Promql(generator));
        self
    }

    /// Sets a log generator.
    #[must_use]
    pub fn logql_generator(mut self, generator: LogqlGenerator) -> Self {
        self.rule.generator = Some(QueryGenerator::Logql(generator));
        self
    }

    /// Builds the [`AlertRule`].
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the name is not valid or the
    /// namespace is empty.
    pub fn build(self) -> Result<AlertRule> {
        validate_rule_name(&self.rule.name)?;
        if self.rule.namespace.is_empty() {
            return Err(AlertError::invalid_rule("namespace cannot be empty"));
        }
        Ok(self.rule)
    }
}
