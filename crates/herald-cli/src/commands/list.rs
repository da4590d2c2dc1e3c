//! Rule listing command implementation.

use std::io::Write;

use chrono::Utc;
use herald_alerts::{AlertRule, TemplateSource};
use serde::Serialize;

use crate::cli::ListArgs;
use crate::error::CliError;
use crate::files::load_resource;
use crate::output::{OutputFormat, TableDisplay, truncate};

/// Handler for `herald list`.
pub struct ListCommand<'a> {
    templates: &'a dyn TemplateSource,
}

impl<'a> ListCommand<'a> {
    /// Creates a new list command handler.
    #[must_use]
    pub fn new(templates: &'a dyn TemplateSource) -> Self {
        Self { templates }
    }

    /// Reads the documents and prints their rules.
    ///
    /// # Errors
    ///
    /// Returns error if a document cannot be loaded or read back.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &ListArgs) -> Result<(), CliError> {
        let resource = load_resource(&args.documents)?;
        let mut rules = resource.to_alert_rules(self.templates, args.detail, Utc::now())?;
        if !args.all {
            rules.retain(|rule| !rule.is_extra());
        }
        format.write(
            out,
            &RuleList {
                namespace: resource.namespace().to_string(),
                rules,
            },
        )
    }
}

/// Rules read from one namespace's documents.
#[derive(Debug, Clone, Serialize)]
pub struct RuleList {
    /// Namespace the documents belong to.
    pub namespace: String,
    /// Rules in document order.
    pub rules: Vec<AlertRule>,
}

fn levels_column(rule: &AlertRule) -> String {
    rule.levels
        .iter()
        .map(|level| format!("{}{}{}", level.severity, level.compare_op, level.compare_value))
        .collect::<Vec<_>>()
        .join(",")
}

fn state_column(rule: &AlertRule) -> &'static str {
    match (rule.is_open, rule.tpl_lost) {
        (_, true) => "tpl-lost",
        (true, false) => "open",
        (false, false) => "closed",
    }
}

impl TableDisplay for RuleList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.rules.is_empty() {
            writeln!(writer, "No alert rules in {}", self.namespace)?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<24}  {:<8}  {:<28}  {:<6}  {:>9}  {:<8}",
            "NAME", "KIND", "LEVELS", "FOR", "RECEIVERS", "STATE"
        )?;
        writeln!(writer, "{}", "─".repeat(92))?;

        for rule in &self.rules {
            let kind = if rule.is_extra() { "route" } else { rule.kind.as_str() };
            writeln!(
                writer,
                "{:<24}  {:<8}  {:<28}  {:<6}  {:>9}  {:<8}",
                truncate(&rule.name, 24),
                kind,
                truncate(&levels_column(rule), 28),
                rule.for_duration,
                rule.receivers.len(),
                state_column(rule)
            )?;
        }

        for rule in self.rules.iter().filter(|rule| rule.origin.is_some()) {
            writeln!(writer)?;
            writeln!(writer, "# {}", rule.name)?;
            write!(writer, "{}", rule.origin.as_deref().unwrap_or_default())?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} rule(s)", self.rules.len())?;
        Ok(())
    }
}
