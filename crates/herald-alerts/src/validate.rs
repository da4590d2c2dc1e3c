//! Rule preparation and validation.
//!
//! [`prepare_rule`] fills in everything derivable from a rule's generator
//! (query, unit, default message). [`check_and_modify`] then enforces the
//! structural rules and injects the default receiver. Neither touches any
//! document.

use std::collections::HashSet;
use std::fmt::Write as _;

use tracing::debug;

use crate::config::EngineConfig;
use crate::duration::parse_duration;
use crate::error::{AlertError, Result};
use crate::expr::has_compare_op;
use crate::labels::{PROMQL_NAMESPACE_KEY, VALUE_ANNOTATION_EXPR};
use crate::logql::LogqlGenerator;
use crate::promql::check_balanced;
use crate::template::{PromqlTemplate, TemplateSource};
use crate::types::{AlertKind, AlertReceiver, AlertRule, ChannelRef, QueryGenerator, validate_rule_name};
use crate::units::UnitValue;

// ============ Messages ============

fn hand_metric_message(name: &str) -> String {
    format!("{name}: [cluster:{{{{ $externalLabels.cluster }}}}] trigger alert, value: {VALUE_ANNOTATION_EXPR}")
}

fn template_metric_message(name: &str, template: &PromqlTemplate, unit: &UnitValue) -> String {
    let mut message = format!("{name}: [cluster:{{{{ $externalLabels.cluster }}}}] ");
    for label in &template.labels {
        let _ = write!(message, "[{label}:{{{{ $labels.{label} }}}}] ");
    }
    let _ = write!(
        message,
        "{} trigger alert, value: {VALUE_ANNOTATION_EXPR}{}",
        template.show_name, unit.show
    );
    message
}

fn hand_log_message(name: &str) -> String {
    format!("{name}: [cluster:{{{{ $labels.cluster }}}}] trigger alert, value: {VALUE_ANNOTATION_EXPR}")
}

fn template_log_message(name: &str, generator: &LogqlGenerator) -> String {
    let mut message = format!(
        "{name}: [cluster:{{{{ $labels.cluster }}}}] [namespace: {{{{ $labels.namespace }}}}] "
    );
    for label in generator.label_pairs.keys() {
        let _ = write!(message, "[{label}:{{{{ $labels.{label} }}}}] ");
    }
    let _ = write!(
        message,
        "log match [{}] in the last {} trigger alert, value: {VALUE_ANNOTATION_EXPR}",
        generator.pattern, generator.duration
    );
    message
}

// ============ Preparation ============

/// Derives the query and default message from the rule's generator.
///
/// Without a generator the hand-written `expr` is kept and must be
/// non-empty. The `for` duration must parse.
///
/// # Errors
///
/// Returns a validation error for a bad name, an unusable generator, a
/// generator of the wrong family for the rule kind, or a malformed query.
pub fn prepare_rule(rule: &mut AlertRule, templates: &dyn TemplateSource, config: &EngineConfig) -> Result<()> {
    validate_rule_name(&rule.name)?;
    if !rule.for_duration.is_empty() {
        parse_duration(&rule.for_duration)?;
    }

    match (rule.kind, rule.generator.as_mut()) {
        (AlertKind::Monitor, Some(QueryGenerator::Promql(generator))) => {
            let (template, unit) = generator.resolve(templates)?;
            rule.expr = generator.render(&template, &unit, &rule.namespace, &config.global_namespace)?;
            if rule.message.is_empty() {
                rule.message = template_metric_message(&rule.name, &template, &unit);
            }
        }
        (AlertKind::Logging, Some(QueryGenerator::Logql(generator))) => {
            generator.validate(config.max_log_window)?;
            rule.expr = generator.to_logql(&rule.namespace);
            if rule.message.is_empty() {
                rule.message = template_log_message(&rule.name, generator);
            }
        }
        (kind, Some(_)) => {
            return Err(AlertError::invalid_generator(format!(
                "generator does not match rule kind {kind}"
            )));
        }
        (kind, None) => {
            if rule.expr.trim().is_empty() {
                return Err(AlertError::invalid_rule("expr must not be empty"));
            }
            rule.expr = rule.expr.trim().to_string();
            if rule.message.is_empty() {
                rule.message = match kind {
                    AlertKind::Monitor => hand_metric_message(&rule.name),
                    AlertKind::Logging => hand_log_message(&rule.name),
                };
            }
        }
    }

    check_balanced(&rule.expr)?;
    debug!(namespace = %rule.namespace, rule = %rule.name, expr = %rule.expr, "prepared rule");
    Ok(())
}

// ============ Checks ============

fn references_namespace(expr: &str, namespace: &str) -> bool {
    [
        format!("{PROMQL_NAMESPACE_KEY}=\"{namespace}\""),
        format!("{PROMQL_NAMESPACE_KEY}=~\"{namespace}\""),
    ]
    .iter()
    .any(|needle| expr.contains(needle.as_str()))
}

/// Enforces the structural rules and appends the default receiver if absent.
///
/// Nothing is modified unless every check passes.
///
/// # Errors
///
/// Returns `AlertError::InvalidRule` naming the first violated rule.
pub fn check_and_modify(rule: &mut AlertRule, config: &EngineConfig) -> Result<()> {
    if has_compare_op(&rule.expr) {
        return Err(AlertError::invalid_rule(format!(
            "expr {:?} must not contain a comparison operator",
            rule.expr
        )));
    }
    if rule.namespace != config.global_namespace && !references_namespace(&rule.expr, &rule.namespace) {
        return Err(AlertError::invalid_rule(format!(
            "query must contain namespace {:?}",
            rule.namespace
        )));
    }

    if rule.receivers.is_empty() {
        return Err(AlertError::invalid_rule("receivers must not be empty"));
    }
    let mut seen = HashSet::new();
    for receiver in &rule.receivers {
        if !seen.insert(receiver.alert_channel.id) {
            return Err(AlertError::invalid_rule(format!(
                "receiver channel {} is duplicated",
                receiver.alert_channel.id
            )));
        }
    }

    if rule.levels.is_empty() {
        return Err(AlertError::invalid_rule("levels must not be empty"));
    }
    let mut severities = HashSet::new();
    for level in &rule.levels {
        if level.compare_value.trim().is_empty() {
            return Err(AlertError::invalid_rule(format!(
                "level {} has no compare value",
                level.severity
            )));
        }
        if !severities.insert(level.severity) {
            return Err(AlertError::invalid_rule(format!(
                "severity {} is duplicated",
                level.severity
            )));
        }
    }
    if rule.levels.len() > 1 && rule.inhibit_labels.is_empty() {
        return Err(AlertError::invalid_rule(
            "inhibit labels must not be empty when there are multiple levels",
        ));
    }

    let default_id = config.channels.default_channel_id;
    if !seen.contains(&default_id) {
        let interval = rule.receivers[0].interval.clone();
        rule.receivers.push(AlertReceiver::new(
            ChannelRef::new(default_id, config.channels.default_channel_name.clone()),
            interval,
        ));
    }
    Ok(())
}

/// Runs [`prepare_rule`] then [`check_and_modify`].
///
/// # Errors
///
/// Returns the first error either step reports.
pub fn validate_rule(rule: &mut AlertRule, templates: &dyn TemplateSource, config: &EngineConfig) -> Result<()> {
    prepare_rule(rule, templates, config)?;
    check_and_modify(rule, config)
}
