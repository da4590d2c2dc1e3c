//! PromQL label matcher injection and template-driven query generation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::labels::PROMQL_NAMESPACE_KEY;
use crate::template::{PromqlTemplate, TemplateSource, is_valid_template_name};
use crate::units::{UnitValue, parse_unit};

const GROUPING_KEYWORDS: &[&str] = &[
    "by",
    "without",
    "on",
    "ignoring",
    "group_left",
    "group_right",
];

const OTHER_KEYWORDS: &[&str] = &[
    "and", "or", "unless", "bool", "offset", "atan2", "inf", "nan",
];

const AGGREGATIONS: &[&str] = &[
    "sum",
    "min",
    "max",
    "avg",
    "group",
    "stddev",
    "stdvar",
    "count",
    "count_values",
    "bottomk",
    "topk",
    "quantile",
];

/// How a label matcher compares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchOp {
    /// `=`
    #[default]
    #[serde(rename = "=")]
    Equal,
    /// `!=`
    #[serde(rename = "!=")]
    NotEqual,
    /// `=~`
    #[serde(rename = "=~")]
    Regex,
    /// `!~`
    #[serde(rename = "!~")]
    NotRegex,
}

impl MatchOp {
    /// Returns the operator as written in a selector.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Regex => "=~",
            Self::NotRegex => "!~",
        }
    }
}

/// A single `name op "value"` selector term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelMatcher {
    /// Label name.
    pub name: String,
    /// Comparison.
    pub op: MatchOp,
    /// Value or pattern, unquoted.
    pub value: String,
}

impl LabelMatcher {
    /// Creates an equality matcher.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Equal,
            value: value.into(),
        }
    }

    /// Creates a regex matcher.
    pub fn regex(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            op: MatchOp::Regex,
            value: value.into(),
        }
    }
}

impl fmt::Display for LabelMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}\"", self.name, self.op.as_str())?;
        for c in self.value.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                c => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")
    }
}

/// Appends `matchers` to every vector selector in `expr`.
///
/// Selectors with an existing `{...}` block get the matchers added at the
/// end of it; bare metric names get a new block. Function names, aggregation
/// operators, keywords and grouping label lists are left alone.
///
/// # Errors
///
/// Returns `AlertError::InvalidGenerator` if the query has an unterminated
/// string or selector.
pub fn add_label_matchers(expr: &str, matchers: &[LabelMatcher]) -> Result<String> {
    if matchers.is_empty() {
        return Ok(expr.to_string());
    }
    let rendered = matchers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let chars: Vec<char> = expr.chars().collect();
    let mut out = String::with_capacity(expr.len() + rendered.len() + 8);
    // true when the open paren is a label list after by/on/...
    let mut parens: Vec<bool> = Vec::new();
    let mut grouping_next = false;
    let mut bracket_depth = 0_usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' | '`' => {
                let end = skip_string(&chars, i)?;
                out.extend(&chars[i..end]);
                i = end;
            }
            '(' => {
                parens.push(grouping_next);
                grouping_next = false;
                out.push(c);
                i += 1;
            }
            ')' => {
                parens.pop();
                out.push(c);
                i += 1;
            }
            '[' => {
                bracket_depth += 1;
                out.push(c);
                i += 1;
            }
            ']' => {
                bracket_depth = bracket_depth.saturating_sub(1);
                out.push(c);
                i += 1;
            }
            '{' => {
                let end = closing_brace(&chars, i)?;
                out.push_str(&merge_block(&chars[i + 1..end], &rendered));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let end = scan_while(&chars, i, |c| c.is_ascii_alphanumeric() || c == '.');
                out.extend(&chars[i..end]);
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                let end = scan_while(&chars, i, |c| c.is_ascii_alphanumeric() || c == '_' || c == ':');
                let ident: String = chars[i..end].iter().collect();
                out.push_str(&ident);
                i = end;

                if bracket_depth > 0 || parens.last() == Some(&true) {
                    continue;
                }
                let lower = ident.to_ascii_lowercase();
                if GROUPING_KEYWORDS.contains(&lower.as_str()) {
                    grouping_next = true;
                    continue;
                }
                if OTHER_KEYWORDS.contains(&lower.as_str()) {
                    continue;
                }

                let next = skip_spaces(&chars, i);
                match chars.get(next) {
                    Some('(') => continue,
                    Some('{') => {
                        out.extend(&chars[i..next]);
                        let end = closing_brace(&chars, next)?;
                        out.push_str(&merge_block(&chars[next + 1..end], &rendered));
                        i = end + 1;
                    }
                    _ => {
                        if AGGREGATIONS.contains(&lower.as_str()) && next_word_is_grouping(&chars, next) {
                            continue;
                        }
                        out.push('{');
                        out.push_str(&rendered);
                        out.push('}');
                    }
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    Ok(out)
}

/// Checks that brackets and string literals in `expr` are balanced.
///
/// # Errors
///
/// Returns `AlertError::InvalidRule` describing the first imbalance.
pub fn check_balanced(expr: &str) -> Result<()> {
    let chars: Vec<char> = expr.chars().collect();
    let mut stack = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '"' | '\'' | '`' => {
                i = skip_string(&chars, i).map_err(|_| AlertError::invalid_rule(format!("query {expr:?} has an unterminated string")))?;
                continue;
            }
            c @ ('(' | '[' | '{') => stack.push(c),
            c @ (')' | ']' | '}') => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return Err(AlertError::invalid_rule(format!("query {expr:?} has unbalanced {c:?}")));
                }
            }
            _ => {}
        }
        i += 1;
    }
    if let Some(open) = stack.pop() {
        return Err(AlertError::invalid_rule(format!("query {expr:?} has unclosed {open:?}")));
    }
    Ok(())
}

fn skip_string(chars: &[char], start: usize) -> Result<usize> {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && quote != '`' {
            i += 2;
            continue;
        }
        if c == quote {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(AlertError::invalid_generator("invalid promql: unterminated string"))
}

fn closing_brace(chars: &[char], open: usize) -> Result<usize> {
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '"' | '\'' | '`' => i = skip_string(chars, i)?,
            '}' => return Ok(i),
            _ => i += 1,
        }
    }
    Err(AlertError::invalid_generator("invalid promql: unterminated selector"))
}

fn merge_block(inner: &[char], rendered: &str) -> String {
    let existing: String = inner.iter().collect();
    let existing = existing.trim().trim_end_matches(',').trim_end();
    if existing.is_empty() {
        format!("{{{rendered}}}")
    } else {
        format!("{{{existing}, {rendered}}}")
    }
}

fn scan_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut i = start;
    while i < chars.len() && pred(chars[i]) {
        i += 1;
    }
    i
}

fn skip_spaces(chars: &[char], start: usize) -> usize {
    scan_while(chars, start, char::is_whitespace)
}

fn next_word_is_grouping(chars: &[char], start: usize) -> bool {
    let end = scan_while(chars, start, |c| c.is_ascii_alphabetic());
    let word: String = chars[start..end].iter().collect();
    matches!(word.to_ascii_lowercase().as_str(), "by" | "without")
}

/// Structured description of a template-driven metrics query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromqlGenerator {
    /// Template scope.
    pub scope: String,
    /// Template resource.
    pub resource: String,
    /// Template rule.
    pub rule: String,
    /// Display unit; inherited from the template when empty.
    #[serde(default)]
    pub unit: String,
    /// Label filters, matched as regular expressions.
    #[serde(default)]
    pub label_pairs: BTreeMap<String, String>,
}

impl PromqlGenerator {
    /// Returns the `scope.resource.rule` name, as stored in the template label.
    #[must_use]
    pub fn template_name(&self) -> String {
        format!("{}.{}.{}", self.scope, self.resource, self.rule)
    }

    /// Looks up the template and reconciles labels and unit with it.
    ///
    /// An empty unit is filled in from the template.
    ///
    /// # Errors
    ///
    /// Fails if a name is malformed, the template does not exist, a label is
    /// not declared by the template, or the unit disagrees with it.
    pub fn resolve(&mut self, source: &dyn TemplateSource) -> Result<(PromqlTemplate, UnitValue)> {
        for part in [&self.scope, &self.resource, &self.rule] {
            if !is_valid_template_name(part) {
                return Err(AlertError::invalid_generator(format!(
                    "template name {part:?} not valid"
                )));
            }
        }

        let template = source.template(&self.scope, &self.resource, &self.rule)?;
        for label in self.label_pairs.keys() {
            if !template.labels.contains(label) {
                return Err(AlertError::invalid_generator(format!(
                    "label {label} not in template {}",
                    template.name()
                )));
            }
        }

        if self.unit.is_empty() {
            self.unit.clone_from(&template.unit);
        } else if self.unit != template.unit {
            return Err(AlertError::invalid_generator(format!(
                "unit {} does not match template unit {:?}",
                self.unit, template.unit
            )));
        }

        let unit = parse_unit(&self.unit)?;
        Ok((template, unit))
    }

    /// Renders the query for `namespace`.
    ///
    /// Outside the global namespace a `namespace="<ns>"` matcher is always
    /// added, replacing any caller-supplied namespace filter.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidGenerator` if the template query is malformed.
    pub fn render(
        &self,
        template: &PromqlTemplate,
        unit: &UnitValue,
        namespace: &str,
        global_namespace: &str,
    ) -> Result<String> {
        let mut matchers: Vec<LabelMatcher> = self
            .label_pairs
            .iter()
            .filter(|(k, _)| k.as_str() != PROMQL_NAMESPACE_KEY)
            .map(|(k, v)| LabelMatcher::regex(k, v))
            .collect();
        if !namespace.is_empty() && namespace != global_namespace {
            matchers.push(LabelMatcher::equal(PROMQL_NAMESPACE_KEY, namespace));
        }

        let query = add_label_matchers(&template.expr, &matchers)?;
        Ok(unit.apply(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateCatalog;

    mod inject_tests {
        use super::*;

        fn ns(value: &str) -> Vec<LabelMatcher> {
            vec![LabelMatcher::equal("namespace", value)]
        }

        #[test]
        fn bare_metric() {
            let out = add_label_matchers("up", &ns("a")).unwrap();
            assert_eq!(out, r#"up{namespace="a"}"#);
        }

        #[test]
        fn existing_block() {
            let out = add_label_matchers(r#"up{job="x"}"#, &ns("a")).unwrap();
            assert_eq!(out, r#"up{job="x", namespace="a"}"#);
        }

        #[test]
        fn empty_block() {
            let out = add_label_matchers("up{}", &ns("a")).unwrap();
            assert_eq!(out, r#"up{namespace="a"}"#);
        }

        #[test]
        fn functions_and_ranges() {
            let out = add_label_matchers("rate(http_requests_total[5m])", &ns("a")).unwrap();
            assert_eq!(out, r#"rate(http_requests_total{namespace="a"}[5m])"#);
        }

        #[test]
        fn aggregation_with_grouping() {
            let out = add_label_matchers(
                r#"sum by (namespace, pod) (rate(cpu{container!=""}[5m]))"#,
                &ns("a"),
            )
            .unwrap();
            assert_eq!(
                out,
                r#"sum by (namespace, pod) (rate(cpu{container!="", namespace="a"}[5m]))"#
            );
        }

        #[test]
        fn trailing_grouping() {
            let out = add_label_matchers("sum(mem) by (pod)", &ns("a")).unwrap();
            assert_eq!(out, r#"sum(mem{namespace="a"}) by (pod)"#);
        }

        #[test]
        fn binary_expression() {
            let out = add_label_matchers("a / on (pod) group_left (node) b", &ns("x")).unwrap();
            assert_eq!(
                out,
                r#"a{namespace="x"} / on (pod) group_left (node) b{namespace="x"}"#
            );
        }

        #[test]
        fn numbers_and_functions_untouched() {
            let out = add_label_matchers("cert_expiry - time() > 86400", &ns("x")).unwrap();
            assert_eq!(out, r#"cert_expiry{namespace="x"} - time() > 86400"#);
        }

        #[test]
        fn strings_are_skipped() {
            let out = add_label_matchers(r#"label_replace(up, "dst", "$1", "src", "(.*)")"#, &ns("x"))
                .unwrap();
            assert_eq!(out, r#"label_replace(up{namespace="x"}, "dst", "$1", "src", "(.*)")"#);
        }

        #[test]
        fn unterminated_selector() {
            assert!(add_label_matchers(r#"up{job="x""#, &ns("a")).is_err());
        }

        #[test]
        fn no_matchers_is_noop() {
            assert_eq!(add_label_matchers("up{", &[]).unwrap(), "up{");
        }

        #[test]
        fn matcher_escapes_value() {
            let m = LabelMatcher::regex("path", r#"a"b\c"#);
            assert_eq!(m.to_string(), r#"path=~"a\"b\\c""#);
        }
    }

    mod balance_tests {
        use super::*;

        #[test]
        fn balanced() {
            assert!(check_balanced(r#"sum(rate(x{a="}"}[5m]))"#).is_ok());
        }

        #[test]
        fn unbalanced() {
            assert!(check_balanced("sum(rate(x[5m])").is_err());
            assert!(check_balanced("x]").is_err());
            assert!(check_balanced(r#"x{a="b}"#).is_err());
        }
    }

    mod generator_tests {
        use super::*;

        fn node_condition() -> PromqlGenerator {
            PromqlGenerator {
                scope: "system".to_string(),
                resource: "node".to_string(),
                rule: "statusCondition".to_string(),
                unit: String::new(),
                label_pairs: BTreeMap::from([
                    ("condition".to_string(), "Ready".to_string()),
                    ("status".to_string(), "true".to_string()),
                ]),
            }
        }

        #[test]
        fn global_namespace_has_no_namespace_matcher() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = node_condition();
            let (tpl, unit) = generator.resolve(&catalog).unwrap();
            let query = generator
                .render(&tpl, &unit, "kubegems-monitoring", "kubegems-monitoring")
                .unwrap();
            assert_eq!(
                query,
                r#"kube_node_status_condition{condition=~"Ready", status=~"true"}"#
            );
        }

        #[test]
        fn tenant_namespace_is_forced() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = node_condition();
            generator
                .label_pairs
                .insert("namespace".to_string(), "other".to_string());
            let (tpl, unit) = generator.resolve(&catalog).unwrap();
            let query = generator
                .render(&tpl, &unit, "team-a", "kubegems-monitoring")
                .unwrap();
            assert!(query.ends_with(r#"namespace="team-a"}"#));
            assert!(!query.contains("other"));
        }

        #[test]
        fn unknown_label_rejected() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = node_condition();
            generator
                .label_pairs
                .insert("pod".to_string(), "x".to_string());
            let err = generator.resolve(&catalog).unwrap_err();
            assert!(err.to_string().contains("not in template"));
        }

        #[test]
        fn unit_inherited_and_applied() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = PromqlGenerator {
                scope: "containers".to_string(),
                resource: "container".to_string(),
                rule: "memoryUsage".to_string(),
                ..PromqlGenerator::default()
            };
            let (tpl, unit) = generator.resolve(&catalog).unwrap();
            assert_eq!(generator.unit, "mb");
            let query = generator.render(&tpl, &unit, "team-a", "kubegems-monitoring").unwrap();
            assert!(query.starts_with("(sum by (namespace, pod, container)"));
            assert!(query.contains(r#"namespace="team-a""#));
            assert!(query.ends_with("/(1024 * 1024)"));
        }

        #[test]
        fn unit_mismatch_rejected() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = PromqlGenerator {
                scope: "containers".to_string(),
                resource: "container".to_string(),
                rule: "memoryUsage".to_string(),
                unit: "gb".to_string(),
                ..PromqlGenerator::default()
            };
            assert!(generator.resolve(&catalog).is_err());
        }

        #[test]
        fn bad_template_name_rejected() {
            let catalog = TemplateCatalog::builtin().unwrap();
            let mut generator = node_condition();
            generator.rule = "status.condition".to_string();
            let err = generator.resolve(&catalog).unwrap_err();
            assert!(matches!(err, AlertError::InvalidGenerator { .. }));
        }

        #[test]
        fn serializes_camel_case() {
            let json = serde_json::to_value(node_condition()).unwrap();
            assert_eq!(json["labelPairs"]["condition"], "Ready");
            assert_eq!(json["scope"], "system");
        }
    }
}
