//! Template catalog command implementation.

use std::io::Write;

use herald_alerts::{PromqlTemplate, TemplateCatalog};
use serde::Serialize;

use crate::error::CliError;
use crate::output::{OutputFormat, TableDisplay, truncate};

/// Handler for `herald templates`.
pub struct TemplatesCommand<'a> {
    catalog: &'a TemplateCatalog,
}

impl<'a> TemplatesCommand<'a> {
    /// Creates a new templates command handler.
    #[must_use]
    pub const fn new(catalog: &'a TemplateCatalog) -> Self {
        Self { catalog }
    }

    /// Prints the admin view, or the tenant view when `tenant` is set.
    ///
    /// # Errors
    ///
    /// Returns error if writing fails.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat, tenant: bool) -> Result<(), CliError> {
        let view = if tenant { self.catalog.tenant_view() } else { self.catalog.clone() };
        let list = TemplateList {
            view: if tenant { "tenant" } else { "admin" }.to_string(),
            templates: view.templates().map(TemplateInfo::from).collect(),
        };
        format.write(out, &list)
    }
}

/// One template as printed.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateInfo {
    /// Dotted `scope.resource.rule` name.
    pub name: String,
    /// Display name.
    pub show_name: String,
    /// Base query.
    pub expr: String,
    /// Declared unit.
    pub unit: String,
    /// Labels callers may filter on.
    pub labels: Vec<String>,
    /// Whether tenants may use it.
    pub namespaced: bool,
}

impl From<PromqlTemplate> for TemplateInfo {
    fn from(template: PromqlTemplate) -> Self {
        Self {
            name: template.name(),
            show_name: template.show_name,
            expr: template.expr,
            unit: template.unit,
            labels: template.labels,
            namespaced: template.namespaced,
        }
    }
}

/// Templates in one catalog view.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateList {
    /// `admin` or `tenant`.
    pub view: String,
    /// Templates in name order.
    pub templates: Vec<TemplateInfo>,
}

impl TableDisplay for TemplateList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.templates.is_empty() {
            writeln!(writer, "No templates in {} view", self.view)?;
            return Ok(());
        }

        writeln!(writer, "{:<44}  {:<10}  {:<32}", "TEMPLATE", "UNIT", "LABELS")?;
        writeln!(writer, "{}", "─".repeat(90))?;
        for template in &self.templates {
            writeln!(
                writer,
                "{:<44}  {:<10}  {:<32}",
                truncate(&template.name, 44),
                template.unit,
                truncate(&template.labels.join(","), 32)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} template(s) ({} view)", self.templates.len(), self.view)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_view_is_subset() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let format = OutputFormat::new(crate::cli::Format::Json);

        let mut admin = Vec::new();
        TemplatesCommand::new(&catalog).execute(&mut admin, &format, false).unwrap();
        let mut tenant = Vec::new();
        TemplatesCommand::new(&catalog).execute(&mut tenant, &format, true).unwrap();

        let admin: serde_json::Value = serde_json::from_slice(&admin).unwrap();
        let tenant: serde_json::Value = serde_json::from_slice(&tenant).unwrap();
        let admin_len = admin["templates"].as_array().unwrap().len();
        let tenant_templates = tenant["templates"].as_array().unwrap();
        assert!(tenant_templates.len() < admin_len);
        assert!(tenant_templates.iter().all(|t| t["namespaced"] == true));
    }

    #[test]
    fn table_lists_restart_template() {
        let catalog = TemplateCatalog::builtin().unwrap();
        let mut out = Vec::new();
        TemplatesCommand::new(&catalog)
            .execute(&mut out, &OutputFormat::default(), false)
            .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("containers.container.restartCount"));
        assert!(out.contains("(admin view)"));
    }
}
