//! Routing tree, receiver list and inhibit rules.
//!
//! All three are rebuilt in full from the rule list on every change, and
//! read back into per-rule receivers and inhibit labels.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::channels::{AlertChannel, ChannelGetter};
use crate::config::ChannelSettings;
use crate::documents::{InhibitRule, Matcher, Receiver, Route, matcher_value};
use crate::error::Result;
use crate::labels::{ALERT_NAME_LABEL, NAMESPACE_LABEL, NULL_RECEIVER, SEVERITY_LABEL};
use crate::types::{AlertReceiver, AlertRule, ChannelRef, Severity};

/// Wait and interval for the root route.
pub const ROOT_GROUP_WAIT: &str = "30s";

// ============ Builders ============

/// Rewrites every receiver's channel reference to the stored channel's id
/// and name, so routes, receivers and secret keys share one receiver name.
///
/// The default channel resolves from `settings` without asking the getter.
///
/// # Errors
///
/// Returns the getter's error if a referenced channel cannot be resolved.
pub fn resolve_channel_refs(
    rules: &mut [AlertRule],
    getter: &dyn ChannelGetter,
    settings: &ChannelSettings,
) -> Result<()> {
    let default = AlertChannel::default_channel(settings);
    let mut resolved = HashMap::from([(default.id, default.channel_ref())]);
    for receiver in rules.iter_mut().flat_map(|r| r.receivers.iter_mut()) {
        let id = receiver.alert_channel.id;
        let canonical = match resolved.entry(id) {
            Entry::Occupied(known) => known.get().clone(),
            Entry::Vacant(slot) => slot.insert(getter.get_channel(id)?.channel_ref()).clone(),
        };
        if canonical.name != receiver.alert_channel.name {
            debug!(id, from = %receiver.alert_channel.name, to = %canonical.name, "renamed channel reference");
        }
        receiver.alert_channel = canonical;
    }
    Ok(())
}

/// Builds the receiver list: the null sink, the default channel, then every
/// channel some rule references.
///
/// Receivers are named after the stored channel, never after the name a
/// rule happens to carry.
///
/// # Errors
///
/// Returns the getter's error if a referenced channel cannot be resolved.
pub fn build_receivers(
    rules: &[AlertRule],
    getter: &dyn ChannelGetter,
    settings: &ChannelSettings,
) -> Result<Vec<Receiver>> {
    let default = AlertChannel::default_channel(settings);
    let mut receivers = vec![
        Receiver {
            name: NULL_RECEIVER.to_string(),
            ..Receiver::default()
        },
        default.to_receiver(settings),
    ];
    let mut seen = HashSet::from([default.id]);

    for receiver in rules.iter().flat_map(|r| &r.receivers) {
        let channel_ref = &receiver.alert_channel;
        if !seen.insert(channel_ref.id) {
            continue;
        }
        let channel = getter.get_channel(channel_ref.id)?;
        receivers.push(channel.to_receiver(settings));
    }
    debug!(receivers = receivers.len(), "built receivers");
    Ok(receivers)
}

/// Builds the root route with one child per (rule, receiver) pair.
///
/// Children are named from the rules' channel references; run
/// [`resolve_channel_refs`] first so they match [`build_receivers`].
#[must_use]
pub fn build_route(rules: &[AlertRule]) -> Route {
    let routes = rules
        .iter()
        .flat_map(|rule| {
            rule.receivers.iter().map(move |receiver| Route {
                receiver: receiver.alert_channel.receiver_name(),
                repeat_interval: receiver.interval.clone(),
                continue_matching: true,
                matchers: vec![
                    Matcher::equal(NAMESPACE_LABEL, &rule.namespace),
                    Matcher::equal(ALERT_NAME_LABEL, &rule.name),
                ],
                ..Route::default()
            })
        })
        .collect();

    Route {
        receiver: NULL_RECEIVER.to_string(),
        group_by: vec![NAMESPACE_LABEL.to_string(), ALERT_NAME_LABEL.to_string()],
        group_wait: ROOT_GROUP_WAIT.to_string(),
        group_interval: ROOT_GROUP_WAIT.to_string(),
        routes,
        ..Route::default()
    }
}

fn rule_matchers(rule: &AlertRule, severity: Severity) -> Vec<Matcher> {
    vec![
        Matcher::equal(NAMESPACE_LABEL, &rule.namespace),
        Matcher::equal(ALERT_NAME_LABEL, &rule.name),
        Matcher::equal(SEVERITY_LABEL, severity.as_str()),
    ]
}

fn inhibit_key(rule: &AlertRule) -> String {
    let mut parts: Vec<&str> = rule.inhibit_labels.iter().map(String::as_str).collect();
    parts.push(&rule.namespace);
    parts.push(&rule.name);
    parts.sort_unstable();
    parts.join(",")
}

/// Builds one "critical suppresses error" rule per rule with inhibit labels,
/// deduplicated by the sorted label set.
#[must_use]
pub fn build_inhibit_rules(rules: &[AlertRule]) -> Vec<InhibitRule> {
    let mut by_key = BTreeMap::new();
    for rule in rules.iter().filter(|r| !r.inhibit_labels.is_empty()) {
        by_key.entry(inhibit_key(rule)).or_insert_with(|| {
            let mut equal = rule.inhibit_labels.clone();
            equal.push(NAMESPACE_LABEL.to_string());
            equal.push(ALERT_NAME_LABEL.to_string());
            InhibitRule {
                source_match: rule_matchers(rule, Severity::Critical),
                target_match: rule_matchers(rule, Severity::Error),
                equal,
            }
        });
    }
    by_key.into_values().collect()
}

// ============ Readers ============

/// Reads each rule's receivers back from the child routes, keyed by rule name.
///
/// Routes whose receiver name carries no channel id are skipped.
#[must_use]
pub fn receivers_by_rule(route: &Route) -> BTreeMap<String, Vec<AlertReceiver>> {
    let mut out: BTreeMap<String, Vec<AlertReceiver>> = BTreeMap::new();
    for child in &route.routes {
        let Some(name) = matcher_value(&child.matchers, ALERT_NAME_LABEL) else {
            continue;
        };
        let Some(channel) = ChannelRef::from_receiver_name(&child.receiver) else {
            debug!(receiver = %child.receiver, "skipping route without channel id");
            continue;
        };
        out.entry(name.to_string())
            .or_default()
            .push(AlertReceiver::new(channel, child.repeat_interval.clone()));
    }
    out
}

/// Reads each rule's inhibit labels back, keyed by rule name.
#[must_use]
pub fn inhibit_labels_by_rule(inhibit_rules: &[InhibitRule]) -> HashMap<String, Vec<String>> {
    inhibit_rules
        .iter()
        .filter_map(|inhibit| {
            let name = matcher_value(&inhibit.source_match, ALERT_NAME_LABEL)?;
            let labels = inhibit
                .equal
                .iter()
                .filter(|l| l.as_str() != NAMESPACE_LABEL && l.as_str() != ALERT_NAME_LABEL)
                .cloned()
                .collect();
            Some((name.to_string(), labels))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::channels::{ChannelConfig, ChannelMapper, WebhookChannel};
    use crate::error::AlertError;
    use crate::expr::CompareOp;

    fn settings() -> ChannelSettings {
        ChannelSettings::default()
    }

    fn mapper() -> ChannelMapper {
        ChannelMapper::with_default(
            &settings(),
            [AlertChannel::new(
                2,
                "ops",
                ChannelConfig::Webhook(WebhookChannel {
                    url: "https://hooks.example.com/ops".to_string(),
                    insecure_skip_verify: false,
                }),
            )],
        )
    }

    fn rule(name: &str, channels: &[u64]) -> AlertRule {
        let mut builder = AlertRule::builder("team-a", name)
            .expr(r#"up{namespace="team-a"}"#)
            .level(CompareOp::Equal, "0", Severity::Error);
        for id in channels {
            let channel_name = if *id == 1 { "kubegems-default-webhook" } else { "ops" };
            builder = builder.receiver(ChannelRef::new(*id, channel_name), "1h");
        }
        builder.build().unwrap()
    }

    mod receiver_tests {
        use super::*;

        #[test]
        fn null_and_default_always_present() {
            let receivers = build_receivers(&[], &mapper(), &settings()).unwrap();
            let names: Vec<&str> = receivers.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, ["null", "kubegems-default-webhook-id-1"]);
            assert!(receivers[0].webhook_configs.is_empty());
        }

        #[test]
        fn shared_channels_appear_once() {
            let rules = [rule("a", &[2, 1]), rule("b", &[2])];
            let receivers = build_receivers(&rules, &mapper(), &settings()).unwrap();
            assert_eq!(receivers.len(), 3);
            assert_eq!(receivers[2].name, "ops-id-2");
        }

        #[test]
        fn unknown_channel_fails() {
            let mut r = rule("a", &[2]);
            r.receivers[0].alert_channel = ChannelRef::new(9, "gone");
            let err = build_receivers(&[r], &mapper(), &settings()).unwrap_err();
            assert!(matches!(err, AlertError::ChannelNotFound { id: 9 }));
        }

        #[test]
        fn receiver_named_after_stored_channel() {
            let mut r = rule("a", &[2]);
            r.receivers[0].alert_channel = ChannelRef::new(2, "ops-old");
            let receivers = build_receivers(&[r], &mapper(), &settings()).unwrap();
            assert_eq!(receivers[2].name, "ops-id-2");
        }

        #[test]
        fn unreferenced_channels_dropped() {
            let receivers = build_receivers(&[rule("a", &[1])], &mapper(), &settings()).unwrap();
            assert!(receivers.iter().all(|r| r.name != "ops-id-2"));
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn names_come_from_the_store() {
            let mut a = rule("a", &[2]);
            a.receivers[0].alert_channel = ChannelRef::new(2, "ops-old");
            let mut b = rule("b", &[2, 1]);
            b.receivers[1].alert_channel = ChannelRef::new(1, "default");
            let mut rules = [a, b];
            resolve_channel_refs(&mut rules, &mapper(), &settings()).unwrap();

            assert_eq!(rules[0].receivers[0].alert_channel, ChannelRef::new(2, "ops"));
            assert_eq!(rules[1].receivers[0].alert_channel, ChannelRef::new(2, "ops"));
            assert_eq!(
                rules[1].receivers[1].alert_channel,
                ChannelRef::new(1, "kubegems-default-webhook")
            );

            let receivers = build_receivers(&rules, &mapper(), &settings()).unwrap();
            let names: HashSet<&str> = receivers.iter().map(|r| r.name.as_str()).collect();
            for child in &build_route(&rules).routes {
                assert!(names.contains(child.receiver.as_str()), "{} has no receiver", child.receiver);
            }
        }

        #[test]
        fn default_channel_needs_no_store_entry() {
            let store = ChannelMapper::new([]);
            let mut rules = [rule("a", &[1])];
            rules[0].receivers[0].alert_channel = ChannelRef::new(1, "default");
            resolve_channel_refs(&mut rules, &store, &settings()).unwrap();
            assert_eq!(rules[0].receivers[0].alert_channel.name, "kubegems-default-webhook");
        }

        #[test]
        fn unknown_channel_fails() {
            let mut rules = [rule("a", &[9])];
            let err = resolve_channel_refs(&mut rules, &mapper(), &settings()).unwrap_err();
            assert!(matches!(err, AlertError::ChannelNotFound { id: 9 }));
        }
    }

    mod route_tests {
        use super::*;

        #[test]
        fn root_constants() {
            let route = build_route(&[]);
            assert_eq!(route.receiver, "null");
            assert_eq!(route.group_by, ["gems_namespace", "gems_alertname"]);
            assert_eq!(route.group_wait, "30s");
            assert_eq!(route.group_interval, "30s");
            assert!(route.routes.is_empty());
        }

        #[test]
        fn one_child_per_rule_receiver() {
            let route = build_route(&[rule("a", &[2, 1]), rule("b", &[2])]);
            assert_eq!(route.routes.len(), 3);
            let child = &route.routes[0];
            assert_eq!(child.receiver, "ops-id-2");
            assert_eq!(child.repeat_interval, "1h");
            assert!(child.continue_matching);
            assert_eq!(matcher_value(&child.matchers, "gems_alertname"), Some("a"));
            assert_eq!(matcher_value(&child.matchers, "gems_namespace"), Some("team-a"));
        }

        #[test]
        fn receivers_read_back() {
            let rules = [rule("a", &[2, 1]), rule("b", &[2])];
            let map = receivers_by_rule(&build_route(&rules));
            assert_eq!(map["a"], rules[0].receivers);
            assert_eq!(map["b"], rules[1].receivers);
        }

        #[test]
        fn route_without_channel_id_skipped() {
            let mut route = build_route(&[rule("a", &[2])]);
            route.routes[0].receiver = "legacy".to_string();
            assert!(receivers_by_rule(&route).is_empty());
        }
    }

    mod inhibit_tests {
        use super::*;

        fn with_labels(name: &str, labels: &[&str]) -> AlertRule {
            let mut r = rule(name, &[2]);
            r.inhibit_labels = labels.iter().map(ToString::to_string).collect();
            r
        }

        #[test]
        fn critical_suppresses_error() {
            let inhibits = build_inhibit_rules(&[with_labels("a", &["pod"])]);
            assert_eq!(inhibits.len(), 1);
            let inhibit = &inhibits[0];
            assert_eq!(matcher_value(&inhibit.source_match, "severity"), Some("critical"));
            assert_eq!(matcher_value(&inhibit.target_match, "severity"), Some("error"));
            assert_eq!(inhibit.equal, ["pod", "gems_namespace", "gems_alertname"]);
        }

        #[test]
        fn rules_without_labels_skipped() {
            assert!(build_inhibit_rules(&[rule("a", &[2])]).is_empty());
        }

        #[test]
        fn duplicates_collapse() {
            let a = with_labels("a", &["pod", "node"]);
            let again = with_labels("a", &["node", "pod"]);
            assert_eq!(build_inhibit_rules(&[a, again]).len(), 1);
        }

        #[test]
        fn labels_read_back() {
            let inhibits = build_inhibit_rules(&[with_labels("a", &["pod", "node"])]);
            let map = inhibit_labels_by_rule(&inhibits);
            assert_eq!(map["a"], ["pod", "node"]);
        }

        proptest! {
            #[test]
            fn prop_inhibit_keys_unique(
                specs in prop::collection::vec(
                    ("[a-c]", prop::collection::vec("[xyz]", 1..3)),
                    0..12,
                )
            ) {
                let rules: Vec<AlertRule> = specs
                    .iter()
                    .map(|(name, labels)| {
                        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
                        with_labels(name, &refs)
                    })
                    .collect();
                let inhibits = build_inhibit_rules(&rules);
                let mut keys = HashSet::new();
                for inhibit in &inhibits {
                    let mut key = inhibit.equal.clone();
                    key.sort();
                    let name = matcher_value(&inhibit.source_match, "gems_alertname").unwrap();
                    prop_assert!(keys.insert((name.to_string(), key)));
                }
            }
        }
    }
}
