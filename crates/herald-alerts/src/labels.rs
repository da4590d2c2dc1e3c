//! Label, annotation and naming constants shared by the rule-group and
//! routing documents.

/// Label carrying the owning namespace.
pub const NAMESPACE_LABEL: &str = "gems_namespace";
/// Label carrying the alert rule name.
pub const ALERT_NAME_LABEL: &str = "gems_alertname";
/// Label carrying the rule kind (`monitor` or `logging`).
pub const ALERT_FROM_LABEL: &str = "gems_alert_from";
/// Label carrying the rule scope.
pub const ALERT_SCOPE_LABEL: &str = "gems_alert_scope";
/// Label carrying the `scope.resource.rule` template name.
pub const ALERT_TEMPLATE_LABEL: &str = "gems_alert_tpl";
/// Label carrying the severity.
pub const SEVERITY_LABEL: &str = "severity";
/// External label naming the cluster.
pub const CLUSTER_LABEL: &str = "cluster";

/// Scope label value for rules in the global namespace.
pub const SCOPE_SYSTEM_ADMIN: &str = "system-admin";
/// Scope label value for every other namespace.
pub const SCOPE_NORMAL: &str = "normal";

/// Annotation holding the notification text.
pub const MESSAGE_ANNOTATION: &str = "message";
/// Annotation holding the display value.
pub const VALUE_ANNOTATION: &str = "value";
/// Annotation holding the serialized query generator.
pub const EXPR_JSON_ANNOTATION: &str = "gems_expr_json";
/// Template rendering the firing value with one decimal.
pub const VALUE_ANNOTATION_EXPR: &str = r#"{{ $value | printf "%.1f" }}"#;

/// Namespace label as it appears in queries.
pub const PROMQL_NAMESPACE_KEY: &str = "namespace";

/// Receiver that swallows everything routed to it.
pub const NULL_RECEIVER: &str = "null";

/// Comment prefix of silences that disable a rule.
pub const RULE_SILENCE_PREFIX: &str = "silence for ";
/// Comment prefix of silences that blacklist one alert instance.
pub const BLACKLIST_SILENCE_PREFIX: &str = "fingerprint-";

/// Separator between a channel name and its id in receiver names.
pub const RECEIVER_ID_SEPARATOR: &str = "-id-";
