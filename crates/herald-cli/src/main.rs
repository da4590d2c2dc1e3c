//! Herald CLI binary entrypoint.
//!
//! This is the main entry point for the `herald` command-line tool.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use herald_alerts::Action;
use tracing_subscriber::EnvFilter;

use herald_cli::cli::{Cli, Commands};
use herald_cli::commands::{ApplyCommand, ChannelCommand, ListCommand, TemplatesCommand};
use herald_cli::files::{load_config, load_templates};
use herald_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    let config = load_config(cli.config.as_deref()).context("loading engine configuration")?;

    match cli.command {
        Commands::List(args) => {
            let templates = load_templates(cli.templates.as_deref()).context("loading templates")?;
            let cmd = ListCommand::new(&templates);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Apply(args) => {
            let templates = load_templates(cli.templates.as_deref()).context("loading templates")?;
            let cmd = ApplyCommand::new(&config, &templates);
            cmd.execute(&mut stdout, &format, &args)
                .with_context(|| format!("applying {}", Action::from(args.action)))?;
        }
        Commands::Channel { command } => {
            let cmd = ChannelCommand::new(&config.channels);
            cmd.execute(&mut stdout, &format, &command)?;
        }
        Commands::Templates { tenant } => {
            let templates = load_templates(cli.templates.as_deref()).context("loading templates")?;
            let cmd = TemplatesCommand::new(&templates);
            cmd.execute(&mut stdout, &format, tenant)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_cli::cli::Format;

    #[test]
    fn cli_parses_templates() {
        let cli = Cli::parse_from(["herald", "templates"]);
        assert!(matches!(cli.command, Commands::Templates { tenant: false }));
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["herald", "--format", "json", "templates"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn run_templates_succeeds() {
        let cli = Cli::parse_from(["herald", "templates", "--tenant"]);
        assert!(run(cli).is_ok());
    }

    #[test]
    fn run_list_without_documents_fails() {
        let cli = Cli::parse_from([
            "herald",
            "list",
            "--rules",
            "/nonexistent/rules.yaml",
            "--routing",
            "/nonexistent/routing.yaml",
        ]);
        assert!(run(cli).is_err());
    }

    #[test]
    fn run_with_missing_config_fails() {
        let cli = Cli::parse_from(["herald", "--config", "/nonexistent/herald.yaml", "templates"]);
        assert!(run(cli).is_err());
    }
}
