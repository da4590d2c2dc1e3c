//! LogQL generation for log-match alert rules.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{AlertError, Result};
use crate::labels::PROMQL_NAMESPACE_KEY;
use crate::promql::LabelMatcher;

/// Structured description of a log-count query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogqlGenerator {
    /// Counting window, e.g. `5m`.
    pub duration: String,
    /// Regular expression matched against log lines.
    #[serde(rename = "match")]
    pub pattern: String,
    /// Stream label filters, matched as regular expressions.
    #[serde(default)]
    pub label_pairs: BTreeMap<String, String>,
}

impl LogqlGenerator {
    /// Checks the window, pattern and label filters.
    ///
    /// # Errors
    ///
    /// Fails if the window does not parse or exceeds `max_window`, the pattern
    /// is not a valid regex, or no label filter is given.
    pub fn validate(&self, max_window: Duration) -> Result<()> {
        let window = parse_duration(&self.duration)?;
        if window > max_window {
            return Err(AlertError::invalid_generator(format!(
                "log window {} exceeds the maximum of {}",
                self.duration,
                crate::duration::format_duration(max_window)
            )));
        }
        if self.pattern.contains('`') {
            return Err(AlertError::invalid_generator("log match must not contain '`'"));
        }
        Regex::new(&self.pattern).map_err(|e| {
            AlertError::invalid_generator(format!("log match {:?} not valid: {e}", self.pattern))
        })?;
        if self.label_pairs.is_empty() {
            return Err(AlertError::invalid_generator("log label pairs must not be empty"));
        }
        Ok(())
    }

    /// Renders the query for `namespace`.
    #[must_use]
    pub fn to_logql(&self, namespace: &str) -> String {
        let mut matchers: Vec<String> = self
            .label_pairs
            .iter()
            .filter(|(k, _)| k.as_str() != PROMQL_NAMESPACE_KEY)
            .map(|(k, v)| LabelMatcher::regex(k, v).to_string())
            .collect();
        matchers.push(LabelMatcher::equal(PROMQL_NAMESPACE_KEY, namespace).to_string());

        format!(
            "sum(count_over_time({{{}}} |~ `{}` [{}]))without(fluentd_thread)",
            matchers.join(", "),
            self.pattern,
            self.duration
        )
    }
}
