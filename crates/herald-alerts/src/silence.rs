//! Silences: rule-disable and blacklist classification, and the
//! enable/disable plans built on top of them.
//!
//! Two classes of silence share the router's silence store and are told
//! apart only by their comment prefix. Rule-disable silences match on
//! namespace and rule name; blacklist silences match one alert instance by
//! its full label set and have their own lifecycle.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AlertError, Result};
use crate::labels::{ALERT_NAME_LABEL, BLACKLIST_SILENCE_PREFIX, NAMESPACE_LABEL, RULE_SILENCE_PREFIX};

/// Lifetime of a rule-disable silence; effectively forever.
const RULE_SILENCE_YEARS: i64 = 1000;

/// State reported by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SilenceState {
    /// Not yet started.
    Pending,
    /// In effect.
    Active,
    /// Ended.
    Expired,
}

/// Status block of a silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceStatus {
    /// Current state.
    pub state: SilenceState,
}

/// One label matcher of a silence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceMatcher {
    /// Label name.
    pub name: String,
    /// Value or pattern.
    pub value: String,
    /// Value is a regex.
    #[serde(default)]
    pub is_regex: bool,
    /// Match on equality rather than inequality.
    #[serde(default = "default_true")]
    pub is_equal: bool,
}

const fn default_true() -> bool {
    true
}

impl SilenceMatcher {
    /// Creates an equality matcher.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
            is_equal: true,
        }
    }
}

/// Which class a silence belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilenceClass {
    /// Disables a whole alert rule.
    RuleDisable,
    /// Suppresses one alert instance.
    Blacklist,
}

/// A silence as stored by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    /// Router-assigned id; empty for silences not yet created.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Label matchers.
    pub matchers: Vec<SilenceMatcher>,
    /// When the silence starts.
    pub starts_at: DateTime<Utc>,
    /// When the silence ends.
    pub ends_at: DateTime<Utc>,
    /// Who created the silence.
    #[serde(default)]
    pub created_by: String,
    /// Comment; its prefix decides the class.
    #[serde(default)]
    pub comment: String,
    /// State reported by the router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SilenceStatus>,
}

impl Silence {
    /// Creates a silence disabling rule `name` in `namespace`.
    #[must_use]
    pub fn for_rule(namespace: &str, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            matchers: vec![
                SilenceMatcher::equal(NAMESPACE_LABEL, namespace),
                SilenceMatcher::equal(ALERT_NAME_LABEL, name),
            ],
            starts_at: now,
            ends_at: now + Duration::days(365 * RULE_SILENCE_YEARS),
            created_by: name.to_string(),
            comment: format!("{RULE_SILENCE_PREFIX}{name}"),
            status: None,
        }
    }

    /// Creates a blacklist silence for one alert instance.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidDuration` if `ends_at` is not after `starts_at`.
    pub fn blacklist(
        fingerprint: &str,
        labels: &BTreeMap<String, String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Result<Self> {
        if ends_at <= starts_at {
            return Err(AlertError::InvalidDuration {
                reason: "silence end time must be after start time".to_string(),
            });
        }
        Ok(Self {
            id: String::new(),
            matchers: labels
                .iter()
                .map(|(k, v)| SilenceMatcher::equal(k, v))
                .collect(),
            starts_at,
            ends_at,
            created_by: created_by.into(),
            comment: format!("{BLACKLIST_SILENCE_PREFIX}{fingerprint}"),
            status: None,
        })
    }

    /// Returns the class of this silence.
    #[must_use]
    pub fn class(&self) -> SilenceClass {
        if self.comment.starts_with(BLACKLIST_SILENCE_PREFIX) {
            SilenceClass::Blacklist
        } else {
            SilenceClass::RuleDisable
        }
    }

    /// Checks if the silence is in effect at `now`.
    ///
    /// A router-reported state wins over the time window.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            Some(status) => status.state == SilenceState::Active,
            None => now >= self.starts_at && now < self.ends_at,
        }
    }

    /// Returns the value of the first equality matcher on `name`.
    #[must_use]
    pub fn matcher_value(&self, name: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| m.name == name && m.is_equal && !m.is_regex)
            .map(|m| m.value.as_str())
    }

    fn disables(&self, namespace: &str, name: &str) -> bool {
        self.class() == SilenceClass::RuleDisable
            && self.matcher_value(NAMESPACE_LABEL) == Some(namespace)
            && self.matcher_value(ALERT_NAME_LABEL) == Some(name)
    }
}

/// Returns the names of rules in `namespace` disabled by active rule-disable
/// silences.
///
/// Blacklist silences never count, even when one of their matchers happens
/// to carry the rule name.
#[must_use]
pub fn disabled_rule_names(silences: &[Silence], namespace: &str, now: DateTime<Utc>) -> HashSet<String> {
    silences
        .iter()
        .filter(|s| s.class() == SilenceClass::RuleDisable && s.is_active_at(now))
        .filter(|s| s.matcher_value(NAMESPACE_LABEL) == Some(namespace))
        .filter_map(|s| s.matcher_value(ALERT_NAME_LABEL))
        .map(str::to_string)
        .collect()
}

/// Finds the active silence disabling `name` in `namespace`.
///
/// # Errors
///
/// Returns `AlertError::AmbiguousSilence` if more than one matches.
pub fn find_rule_silence<'a>(
    silences: &'a [Silence],
    namespace: &str,
    name: &str,
    now: DateTime<Utc>,
) -> Result<Option<&'a Silence>> {
    let mut found = silences
        .iter()
        .filter(|s| s.is_active_at(now) && s.disables(namespace, name));
    let first = found.next();
    if found.next().is_some() {
        return Err(AlertError::AmbiguousSilence {
            name: name.to_string(),
        });
    }
    Ok(first)
}

/// Change to apply to the silence store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SilenceChange {
    /// Create this silence.
    Create(Silence),
    /// Expire the silence with this id.
    Expire(String),
}

/// Plans enabling (`enable = true`) or disabling a rule.
///
/// Returns `None` when the rule is already in the requested state.
///
/// # Errors
///
/// Returns `AlertError::AmbiguousSilence` if the current state is ambiguous.
pub fn plan_toggle(
    silences: &[Silence],
    namespace: &str,
    name: &str,
    enable: bool,
    now: DateTime<Utc>,
) -> Result<Option<SilenceChange>> {
    let existing = find_rule_silence(silences, namespace, name, now)?;
    let change = match (enable, existing) {
        (true, Some(silence)) => Some(SilenceChange::Expire(silence.id.clone())),
        (false, None) => Some(SilenceChange::Create(Silence::for_rule(namespace, name, now))),
        _ => None,
    };
    debug!(namespace = %namespace, rule = %name, enable, planned = change.is_some(), "planned silence toggle");
    Ok(change)
}
