//! Alert rule translation and reconciliation.
//!
//! `herald-alerts` keeps a per-namespace list of alert rules and translates it
//! into the two documents the monitoring stack consumes: a rule-group document
//! for the Prometheus-compatible rule engine and a routing document (receivers,
//! routing tree, inhibit rules) for the Alertmanager-compatible router.
//!
//! # Features
//!
//! - **Threshold codec**: split and join `base <op> threshold` expressions
//! - **Query generators**: render PromQL from templates and LogQL from match patterns
//! - **Channels**: webhook, email, DingTalk, Feishu and Aliyun SMS/voice receivers
//! - **Reconciliation**: add, update or delete one rule and rebuild both documents
//! - **Silences**: rule enable/disable and blacklist silence helpers
//!
//! # Example
//!
//! ```rust
//! use herald_alerts::{
//!     AlertRule, ChannelRef, CompareOp, EngineConfig, Severity, TemplateCatalog,
//!     convert::rule_to_group, validate_rule,
//! };
//!
//! let config = EngineConfig::default();
//! let catalog = TemplateCatalog::builtin().unwrap();
//!
//! let mut rule = AlertRule::builder("team-a", "pod-restarts")
//!     .expr(r#"kube_pod_container_status_restarts_total{namespace="team-a"}"#)
//!     .level(CompareOp::GreaterThan, "3", Severity::Error)
//!     .receiver(ChannelRef::new(2, "ops"), "1h")
//!     .build()
//!     .unwrap();
//!
//! // Fills in the default message and appends the default receiver.
//! validate_rule(&mut rule, &catalog, &config).unwrap();
//! assert_eq!(rule.receivers.len(), 2);
//!
//! let group = rule_to_group(&rule, &config.global_namespace).unwrap();
//! assert_eq!(
//!     group.rules[0].expr,
//!     r#"kube_pod_container_status_restarts_total{namespace="team-a"}>3"#
//! );
//! ```
//!
//! # Reconciling
//!
//! ```rust,ignore
//! let resource = AlertResource::new(AlertKind::Monitor, rule_groups, routing, silences);
//! let out = resource.modify(rule, Action::Add, &channels, &catalog, &config, Utc::now())?;
//! // persist out.rule_groups, out.routing and out.email_secrets
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod config;
pub mod convert;
pub mod documents;
pub mod duration;
pub mod error;
pub mod expr;
pub mod labels;
pub mod lock;
pub mod logql;
pub mod promql;
pub mod reconcile;
pub mod routing;
pub mod silence;
pub mod template;
pub mod types;
pub mod units;
pub mod validate;

// Re-export main types at crate root
pub use channels::{AlertChannel, ChannelConfig, ChannelGetter, ChannelMapper, NotificationChannel, WebhookMessage};
pub use config::{ChannelSettings, EngineConfig};
pub use documents::{RoutingDocument, RuleGroupDocument};
pub use error::{AlertError, ErrorKind, Result};
pub use expr::{CompareOp, QueryParts};
pub use lock::ScopeLocks;
pub use logql::LogqlGenerator;
pub use promql::PromqlGenerator;
pub use reconcile::{Action, AlertResource, Reconciled, modify_rules};
pub use silence::{Silence, SilenceChange, SilenceClass};
pub use template::{PromqlTemplate, TemplateCatalog, TemplateSource};
pub use types::{
    AlertKind, AlertLevel, AlertReceiver, AlertRule, AlertRuleBuilder, ChannelRef, QueryGenerator, Severity,
};
pub use validate::{check_and_modify, prepare_rule, validate_rule};
