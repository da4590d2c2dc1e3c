//! Threshold codec for query expressions.
//!
//! A rule group member stores its threshold inline: `base <op> value`. This
//! module splits such an expression back into its parts and joins them again.
//!
//! Only operators at the top level of the expression are considered. Anything
//! inside `{...}`, `(...)`, `[...]` or a string literal is part of the base
//! query, so `up{job!="node"}` is a bare query and `(a > 1) or b` is too.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AlertError;

/// Comparison operator embedded between a base query and its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// Greater than (>).
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater than or equal (>=).
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Less than (<).
    #[serde(rename = "<")]
    LessThan,
    /// Less than or equal (<=).
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// Equal (==).
    #[serde(rename = "==")]
    Equal,
    /// Not equal (!=).
    #[serde(rename = "!=")]
    NotEqual,
}

impl CompareOp {
    /// Every operator, in the order they are offered to users.
    pub const ALL: [Self; 6] = [
        Self::GreaterThan,
        Self::GreaterThanOrEqual,
        Self::LessThan,
        Self::LessThanOrEqual,
        Self::Equal,
        Self::NotEqual,
    ];

    /// Returns the operator as a string symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

impl FromStr for CompareOp {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_symbol() == s)
            .ok_or_else(|| AlertError::invalid_rule(format!("unknown compare operator {s:?}")))
    }
}

/// A query split at its trailing comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParts {
    /// The bare query, without comparison.
    pub base: String,
    /// The comparison operator.
    pub op: CompareOp,
    /// The threshold text after the operator.
    pub threshold: String,
}

/// Splits `query` at its last top-level comparison operator.
///
/// Returns `None` when there is no such operator or nothing follows it.
/// Both halves are trimmed.
#[must_use]
pub fn split(query: &str) -> Option<QueryParts> {
    let (pos, op) = last_top_level_op(query)?;
    let base = query[..pos].trim();
    let threshold = query[pos + op.as_symbol().len()..].trim();
    if base.is_empty() || threshold.is_empty() {
        return None;
    }
    Some(QueryParts {
        base: base.to_string(),
        op,
        threshold: threshold.to_string(),
    })
}

/// Joins a base query, an operator and a threshold into one expression.
#[must_use]
pub fn join(base: &str, op: CompareOp, threshold: &str) -> String {
    format!("{base}{op}{threshold}")
}

/// Returns true if `query` carries a top-level comparison operator.
#[must_use]
pub fn has_compare_op(query: &str) -> bool {
    last_top_level_op(query).is_some()
}

fn last_top_level_op(query: &str) -> Option<(usize, CompareOp)> {
    let bytes = query.as_bytes();
    let mut depth = 0_i32;
    let mut quote: Option<u8> = None;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' && q != b'`' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'{' | b'(' | b'[' => depth += 1,
            b'}' | b')' | b']' => depth -= 1,
            b'<' | b'>' | b'=' | b'!' if depth == 0 => {
                let op = match (b, bytes.get(i + 1)) {
                    (b'<', Some(b'=')) => Some(CompareOp::LessThanOrEqual),
                    (b'>', Some(b'=')) => Some(CompareOp::GreaterThanOrEqual),
                    (b'=', Some(b'=')) => Some(CompareOp::Equal),
                    (b'!', Some(b'=')) => Some(CompareOp::NotEqual),
                    (b'<', _) => Some(CompareOp::LessThan),
                    (b'>', _) => Some(CompareOp::GreaterThan),
                    _ => None,
                };
                if let Some(op) = op {
                    found = Some((i, op));
                    i += op.as_symbol().len();
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    mod operator_tests {
        use super::*;

        #[test]
        fn operator_as_symbol() {
            assert_eq!(CompareOp::GreaterThan.as_symbol(), ">");
            assert_eq!(CompareOp::GreaterThanOrEqual.as_symbol(), ">=");
            assert_eq!(CompareOp::LessThan.as_symbol(), "<");
            assert_eq!(CompareOp::LessThanOrEqual.as_symbol(), "<=");
            assert_eq!(CompareOp::Equal.as_symbol(), "==");
            assert_eq!(CompareOp::NotEqual.as_symbol(), "!=");
        }

        #[test]
        fn operator_from_str() {
            for op in CompareOp::ALL {
                assert_eq!(op.as_symbol().parse::<CompareOp>().unwrap(), op);
            }
            assert!("=~".parse::<CompareOp>().is_err());
        }

        #[test]
        fn operator_serialization_roundtrip() {
            let json = serde_json::to_string(&CompareOp::GreaterThanOrEqual).unwrap();
            assert_eq!(json, "\">=\"");
            let parsed: CompareOp = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, CompareOp::GreaterThanOrEqual);
        }
    }

    mod split_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn split_node_condition() {
            let parts =
                split(r#"kube_node_status_condition{condition=~"Ready", status=~"true"}==0"#)
                    .unwrap();
            assert_eq!(
                parts.base,
                r#"kube_node_status_condition{condition=~"Ready", status=~"true"}"#
            );
            assert_eq!(parts.op, CompareOp::Equal);
            assert_eq!(parts.threshold, "0");
        }

        #[test_case("up>1", CompareOp::GreaterThan ; "greater")]
        #[test_case("up>=1", CompareOp::GreaterThanOrEqual ; "greater or equal")]
        #[test_case("up<1", CompareOp::LessThan ; "less")]
        #[test_case("up<=1", CompareOp::LessThanOrEqual ; "less or equal")]
        #[test_case("up==1", CompareOp::Equal ; "equal")]
        #[test_case("up!=1", CompareOp::NotEqual ; "not equal")]
        fn split_prefers_two_char_operators(query: &str, op: CompareOp) {
            let parts = split(query).unwrap();
            assert_eq!(parts.base, "up");
            assert_eq!(parts.op, op);
            assert_eq!(parts.threshold, "1");
        }

        #[test]
        fn split_trims_whitespace() {
            let parts = split("sum(rate(x[5m])) > 10").unwrap();
            assert_eq!(parts.base, "sum(rate(x[5m]))");
            assert_eq!(parts.threshold, "10");
        }

        #[test]
        fn split_ignores_matcher_operators() {
            assert!(split(r#"up{job!="node"}"#).is_none());
            assert!(!has_compare_op(r#"up{job!="node", le="<1"}"#));
        }

        #[test]
        fn split_ignores_nested_comparisons() {
            assert!(!has_compare_op("(a > 1) or b"));
            let parts = split("(a > 1) or b < 3").unwrap();
            assert_eq!(parts.base, "(a > 1) or b");
            assert_eq!(parts.op, CompareOp::LessThan);
        }

        #[test]
        fn split_ignores_string_literals() {
            let query = r#"count_over_time({app="x"} |~ `a>b` [5m])"#;
            assert!(!has_compare_op(query));
        }

        #[test]
        fn split_without_threshold() {
            assert!(split("up>").is_none());
            assert!(has_compare_op("up>"));
        }

        #[test]
        fn split_bare_query() {
            assert!(split("up").is_none());
            assert!(!has_compare_op("up"));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_split_inverts_join(
            metric in "[a-z_][a-z0-9_]{0,15}",
            matchers in proptest::collection::vec(("[a-z]{1,8}", "[=!]~?", "[a-zA-Z0-9<>=!. ]{0,10}"), 0..3),
            op in proptest::sample::select(CompareOp::ALL.to_vec()),
            value in "-?[0-9]{1,6}(\\.[0-9]{1,3})?",
        ) {
            let base = if matchers.is_empty() {
                metric
            } else {
                let inner: Vec<String> = matchers
                    .iter()
                    .map(|(k, m, v)| format!("{k}{m}\"{v}\""))
                    .collect();
                format!("{metric}{{{}}}", inner.join(", "))
            };

            let joined = join(&base, op, &value);
            let parts = split(&joined);
            prop_assert!(parts.is_some());
            let parts = parts.unwrap();
            prop_assert_eq!(parts.base, base);
            prop_assert_eq!(parts.op, op);
            prop_assert_eq!(parts.threshold, value);
        }
    }
}
