//! Rule apply command implementation.
//!
//! Loads one namespace's documents, applies a single add, update or delete,
//! and writes the rebuilt documents to an output directory.

use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use herald_alerts::{Action, AlertChannel, AlertResource, AlertRule, ChannelMapper, EngineConfig, TemplateSource};
use serde::Serialize;
use tracing::info;

use crate::cli::ApplyArgs;
use crate::error::CliError;
use crate::files::{load_resource, read_document, write_document};
use crate::output::{OutputFormat, TableDisplay};

/// File name of the written rule-group document.
pub const RULE_GROUPS_FILE: &str = "rule-groups.yaml";
/// File name of the written routing document.
pub const ROUTING_FILE: &str = "routing.yaml";
/// File name of the written email password data.
pub const EMAIL_SECRETS_FILE: &str = "email-secrets.yaml";

/// Handler for `herald apply`.
pub struct ApplyCommand<'a> {
    config: &'a EngineConfig,
    templates: &'a dyn TemplateSource,
}

impl<'a> ApplyCommand<'a> {
    /// Creates a new apply command handler.
    #[must_use]
    pub fn new(config: &'a EngineConfig, templates: &'a dyn TemplateSource) -> Self {
        Self { config, templates }
    }

    /// Applies the change and writes the new documents.
    ///
    /// # Errors
    ///
    /// Returns error if an input cannot be loaded, the engine rejects the
    /// change, or an output cannot be written. Nothing is written on error.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &ApplyArgs) -> Result<(), CliError> {
        let resource = load_resource(&args.documents)?;
        let action = Action::from(args.action);
        let rule = target_rule(&resource, action, args)?;
        let channels: Vec<AlertChannel> = read_document(&args.channels)?;
        let getter = ChannelMapper::with_default(&self.config.channels, channels);

        let name = rule.name.clone();
        let reconciled = resource.modify(rule, action, &getter, self.templates, self.config, Utc::now())?;

        let written = vec![
            write_document(&args.out_dir, RULE_GROUPS_FILE, &reconciled.rule_groups)?,
            write_document(&args.out_dir, ROUTING_FILE, &reconciled.routing)?,
            write_document(&args.out_dir, EMAIL_SECRETS_FILE, &reconciled.email_secrets)?,
        ];
        info!(
            namespace = %resource.namespace(),
            rule = %name,
            out_dir = %args.out_dir.display(),
            "wrote alerting documents"
        );

        format.write(
            out,
            &ApplyResult {
                namespace: resource.namespace().to_string(),
                rule: name,
                action: action.to_string(),
                groups: reconciled.rule_groups.groups.len(),
                receivers: reconciled.routing.receivers.len(),
                inhibit_rules: reconciled.routing.inhibit_rules.len(),
                files: written,
            },
        )
    }
}

fn target_rule(resource: &AlertResource, action: Action, args: &ApplyArgs) -> Result<AlertRule, CliError> {
    match (&args.rule, &args.name, action) {
        (Some(path), _, _) => read_document(path),
        (None, Some(name), Action::Delete) => Ok(AlertRule::builder(resource.namespace(), name).build()?),
        (None, _, Action::Delete) => Err(CliError::InvalidArgument(
            "delete needs --rule or --name".to_string(),
        )),
        (None, _, _) => Err(CliError::InvalidArgument(format!("{action} needs --rule"))),
    }
}

/// Summary of one applied change.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    /// Namespace changed.
    pub namespace: String,
    /// Rule changed.
    pub rule: String,
    /// Action applied.
    pub action: String,
    /// Rule groups in the new document.
    pub groups: usize,
    /// Receivers in the new routing document.
    pub receivers: usize,
    /// Inhibit rules in the new routing document.
    pub inhibit_rules: usize,
    /// Files written.
    pub files: Vec<PathBuf>,
}

impl TableDisplay for ApplyResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Alert rule '{}' {} in {}", self.rule, past_tense(&self.action), self.namespace)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Rule groups:      {}", self.groups)?;
        writeln!(writer, "Receivers:        {}", self.receivers)?;
        writeln!(writer, "Inhibit rules:    {}", self.inhibit_rules)?;
        writeln!(writer)?;
        for file in &self.files {
            writeln!(writer, "  wrote {}", file.display())?;
        }
        Ok(())
    }
}

fn past_tense(action: &str) -> &'static str {
    match action {
        "add" => "added",
        "update" => "updated",
        _ => "deleted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_summarises_change() {
        let result = ApplyResult {
            namespace: "team-a".into(),
            rule: "cpu-high".into(),
            action: "add".into(),
            groups: 1,
            receivers: 3,
            inhibit_rules: 0,
            files: vec![PathBuf::from("out/rule-groups.yaml")],
        };
        let out = OutputFormat::default().to_string(&result).unwrap();
        assert!(out.starts_with("Alert rule 'cpu-high' added in team-a"));
        assert!(out.contains("Receivers:        3"));
        assert!(out.contains("wrote out/rule-groups.yaml"));
    }

    #[test]
    fn past_tense_of_actions() {
        assert_eq!(past_tense("update"), "updated");
        assert_eq!(past_tense("delete"), "deleted");
    }
}
