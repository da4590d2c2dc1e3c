//! Read-modify-write over one namespace's alerting documents.
//!
//! [`AlertResource`] holds the current documents. Reading turns them into
//! alert rules; modifying applies one add, update or delete and rebuilds
//! both documents from the resulting rule list. Nothing is persisted here.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channels::{ChannelGetter, email_secret_data};
use crate::config::EngineConfig;
use crate::convert::{group_to_rule, rule_to_group};
use crate::documents::{RoutingDocument, RuleGroupDocument, to_yaml};
use crate::error::{AlertError, Result};
use crate::routing::{
    build_inhibit_rules, build_receivers, build_route, inhibit_labels_by_rule, receivers_by_rule, resolve_channel_refs,
};
use crate::silence::{Silence, disabled_rule_names};
use crate::template::TemplateSource;
use crate::types::{AlertKind, AlertReceiver, AlertRule};
use crate::validate::validate_rule;

/// A change to the rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Insert a new rule.
    Add,
    /// Replace an existing rule in place.
    Update,
    /// Remove an existing rule.
    Delete,
}

impl Action {
    /// Returns the action as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(AlertError::invalid_rule(format!("unknown action {other:?}"))),
        }
    }
}

/// Applies `action` for `rule` to `rules`, keyed by rule name.
///
/// # Errors
///
/// `Add` fails with `AlertError::RuleAlreadyExists` when the name is taken;
/// `Update` and `Delete` fail with `AlertError::RuleNotFound` when it is not.
pub fn modify_rules(rules: &mut Vec<AlertRule>, rule: AlertRule, action: Action) -> Result<()> {
    let index = rules.iter().position(|r| r.name == rule.name);
    match (action, index) {
        (Action::Add, Some(_)) => Err(AlertError::RuleAlreadyExists { name: rule.name }),
        (Action::Add, None) => {
            rules.push(rule);
            Ok(())
        }
        (Action::Update | Action::Delete, None) => Err(AlertError::RuleNotFound { name: rule.name }),
        (Action::Update, Some(i)) => {
            rules[i] = rule;
            Ok(())
        }
        (Action::Delete, Some(i)) => {
            rules.remove(i);
            Ok(())
        }
    }
}

/// Documents produced by one successful modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// New rule-group document.
    pub rule_groups: RuleGroupDocument,
    /// New routing document.
    pub routing: RoutingDocument,
    /// Email passwords keyed as the routing document references them.
    pub email_secrets: BTreeMap<String, String>,
}

/// The current alerting documents of one namespace for one rule kind.
#[derive(Debug, Clone)]
pub struct AlertResource {
    /// Which rule kind the rule-group document holds.
    pub kind: AlertKind,
    /// Current rule-group document.
    pub rule_groups: RuleGroupDocument,
    /// Current routing document, shared by both rule kinds.
    pub routing: RoutingDocument,
    /// Silences currently known to the notification router.
    pub silences: Vec<Silence>,
}

impl AlertResource {
    /// Creates a resource from its documents.
    #[must_use]
    pub fn new(
        kind: AlertKind,
        rule_groups: RuleGroupDocument,
        routing: RoutingDocument,
        silences: Vec<Silence>,
    ) -> Self {
        Self {
            kind,
            rule_groups,
            routing,
            silences,
        }
    }

    /// Returns the namespace the documents belong to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.rule_groups.namespace
    }

    /// Reads the documents back into alert rules.
    ///
    /// Rule groups come first, in document order, followed by route-only
    /// rules for routes that have no rule group. With `detail` set each rule
    /// carries its group's YAML as `origin`.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MalformedGroup` for a group that cannot be read,
    /// including a multi-level rule without inhibit labels.
    pub fn to_alert_rules(
        &self,
        templates: &dyn TemplateSource,
        detail: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<AlertRule>> {
        let namespace = self.namespace();
        let mut receivers = receivers_by_rule(&self.routing.route);
        let inhibits = inhibit_labels_by_rule(&self.routing.inhibit_rules);
        let disabled = disabled_rule_names(&self.silences, namespace, now);

        let mut rules = Vec::with_capacity(self.rule_groups.groups.len());
        for group in &self.rule_groups.groups {
            let mut rule = group_to_rule(group, namespace, self.kind)?;
            rule.receivers = receivers.remove(&rule.name).unwrap_or_default();
            rule.inhibit_labels = inhibits.get(&rule.name).cloned().unwrap_or_default();
            if rule.levels.len() > 1 && rule.inhibit_labels.is_empty() {
                return Err(AlertError::malformed(
                    &group.name,
                    "inhibit labels must not be empty when there are multiple levels",
                ));
            }
            rule.is_open = !disabled.contains(&rule.name);

            rule.tpl_lost = rule.promql_generator().is_some_and(|generator| {
                let lookup = templates.template(&generator.scope, &generator.resource, &generator.rule);
                if let Err(e) = &lookup {
                    warn!(
                        namespace = %namespace,
                        rule = %rule.name,
                        template = %generator.template_name(),
                        error = %e,
                        "alert rule template lost"
                    );
                }
                lookup.is_err()
            });
            if detail {
                rule.origin = Some(to_yaml(group)?);
            }
            rules.push(rule);
        }

        for (name, bound) in receivers {
            let inhibit_labels = inhibits.get(&name).cloned().unwrap_or_default();
            let is_open = !disabled.contains(&name);
            rules.push(self.extra_rule(name, bound, inhibit_labels, is_open));
        }
        debug!(namespace = %namespace, rules = rules.len(), "read alert rules");
        Ok(rules)
    }

    fn extra_rule(
        &self,
        name: String,
        receivers: Vec<AlertReceiver>,
        inhibit_labels: Vec<String>,
        is_open: bool,
    ) -> AlertRule {
        AlertRule {
            namespace: self.namespace().to_string(),
            name,
            kind: self.kind,
            expr: String::new(),
            for_duration: String::new(),
            message: String::new(),
            inhibit_labels,
            levels: Vec::new(),
            receivers,
            is_open,
            generator: None,
            tpl_lost: false,
            origin: None,
        }
    }

    /// Applies one change and rebuilds both documents from the result.
    ///
    /// Added and updated rules are prepared and validated first; nothing is
    /// produced unless every step succeeds.
    ///
    /// # Errors
    ///
    /// Returns validation, not-found and conflict errors from the change, and
    /// any error raised while reading the current documents or resolving
    /// channels.
    pub fn modify(
        &self,
        mut rule: AlertRule,
        action: Action,
        getter: &dyn ChannelGetter,
        templates: &dyn TemplateSource,
        config: &EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<Reconciled> {
        if rule.namespace != self.namespace() {
            return Err(AlertError::invalid_rule(format!(
                "rule namespace {:?} does not match {:?}",
                rule.namespace,
                self.namespace()
            )));
        }
        if action != Action::Delete {
            if rule.kind != self.kind {
                return Err(AlertError::invalid_rule(format!(
                    "rule kind {} does not match {}",
                    rule.kind, self.kind
                )));
            }
            validate_rule(&mut rule, templates, config)?;
        }

        let name = rule.name.clone();
        let mut rules = self.to_alert_rules(templates, false, now)?;
        modify_rules(&mut rules, rule, action)?;
        resolve_channel_refs(&mut rules, getter, &config.channels)?;

        let groups = rules
            .iter()
            .filter(|r| !r.is_extra())
            .map(|r| rule_to_group(r, &config.global_namespace))
            .collect::<Result<Vec<_>>>()?;
        let routing = RoutingDocument {
            name: self.routing.name.clone(),
            namespace: self.routing.namespace.clone(),
            route: build_route(&rules),
            receivers: build_receivers(&rules, getter, &config.channels)?,
            inhibit_rules: build_inhibit_rules(&rules),
        };
        let email_secrets = email_secret_data(&rules, getter, &config.channels)?;

        info!(
            namespace = %self.namespace(),
            rule = %name,
            action = %action,
            groups = groups.len(),
            receivers = routing.receivers.len(),
            "reconciled alert rules"
        );
        Ok(Reconciled {
            rule_groups: RuleGroupDocument {
                name: self.rule_groups.name.clone(),
                namespace: self.rule_groups.namespace.clone(),
                groups,
            },
            routing,
            email_secrets,
        })
    }
}
