//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use herald_alerts::{Action, AlertKind};

/// Herald - alert rule and routing document tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "herald")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML or JSON). Defaults apply when omitted.
    #[arg(short, long, env = "HERALD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template catalog file. The built-in catalog is used when omitted.
    #[arg(short, long, env = "HERALD_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the alert rules held by a pair of documents.
    List(ListArgs),

    /// Add, update or delete one rule and write the rebuilt documents.
    Apply(ApplyArgs),

    /// Notification channel commands.
    Channel {
        /// Channel subcommand to execute.
        #[command(subcommand)]
        command: ChannelCommands,
    },

    /// Print the query template catalog.
    Templates {
        /// Show only the scopes tenants may use.
        #[arg(long)]
        tenant: bool,
    },
}

/// The documents of one namespace.
#[derive(Args, Debug, Clone)]
pub struct DocumentArgs {
    /// Rule-group document.
    #[arg(long, value_name = "FILE")]
    pub rules: PathBuf,

    /// Routing document.
    #[arg(long, value_name = "FILE")]
    pub routing: PathBuf,

    /// Silences known to the router, as a list.
    #[arg(long, value_name = "FILE")]
    pub silences: Option<PathBuf>,

    /// Which rule kind the rule-group document holds.
    #[arg(short, long, value_enum, default_value_t = KindArg::Monitor)]
    pub kind: KindArg,
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Documents to read.
    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Attach each group's YAML to the output.
    #[arg(long)]
    pub detail: bool,

    /// Include route-only rules.
    #[arg(long)]
    pub all: bool,
}

/// Arguments for the apply command.
#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Documents to modify.
    #[command(flatten)]
    pub documents: DocumentArgs,

    /// Change to apply.
    #[arg(short, long, value_enum)]
    pub action: ActionArg,

    /// Rule file (YAML or JSON). Required for add and update.
    #[arg(long, value_name = "FILE")]
    pub rule: Option<PathBuf>,

    /// Rule name. Used by delete when no rule file is given.
    #[arg(long)]
    pub name: Option<String>,

    /// Channel store: a list of channels (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub channels: PathBuf,

    /// Directory the rebuilt documents are written to.
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: PathBuf,
}

/// Channel subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ChannelCommands {
    /// Validate a channel file.
    Check {
        /// Channel file (YAML or JSON).
        file: PathBuf,
    },

    /// Show where a channel delivers, secrets redacted.
    Describe {
        /// Channel file (YAML or JSON).
        file: PathBuf,
    },

    /// Send a test notification through a channel.
    Test {
        /// Channel file (YAML or JSON).
        file: PathBuf,

        /// Namespace placed on the sample alert.
        #[arg(long, default_value = "default")]
        namespace: String,

        /// Rule name placed on the sample alert.
        #[arg(long, default_value = "herald-test")]
        rule: String,
    },
}

/// Rule kind argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum KindArg {
    /// Metrics rules.
    #[default]
    Monitor,
    /// Log-count rules.
    Logging,
}

impl From<KindArg> for AlertKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Monitor => Self::Monitor,
            KindArg::Logging => Self::Logging,
        }
    }
}

/// Action argument for apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    /// Insert a new rule.
    Add,
    /// Replace an existing rule.
    Update,
    /// Remove a rule.
    Delete,
}

impl From<ActionArg> for Action {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Add => Self::Add,
            ActionArg::Update => Self::Update,
            ActionArg::Delete => Self::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list() {
        let cli = Cli::parse_from(["herald", "list", "--rules", "r.yaml", "--routing", "a.yaml"]);
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.documents.rules, PathBuf::from("r.yaml"));
                assert_eq!(args.documents.kind, KindArg::Monitor);
                assert!(args.documents.silences.is_none());
                assert!(!args.detail);
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn parses_apply() {
        let cli = Cli::parse_from([
            "herald", "apply", "--rules", "r.yaml", "--routing", "a.yaml", "--kind", "logging", "--action",
            "delete", "--name", "cpu-high", "--channels", "c.yaml", "--out-dir", "out",
        ]);
        match cli.command {
            Commands::Apply(args) => {
                assert_eq!(args.action, ActionArg::Delete);
                assert_eq!(AlertKind::from(args.documents.kind), AlertKind::Logging);
                assert_eq!(args.name.as_deref(), Some("cpu-high"));
                assert!(args.rule.is_none());
            }
            _ => panic!("expected apply command"),
        }
    }

    #[test]
    fn parses_channel_test_defaults() {
        let cli = Cli::parse_from(["herald", "channel", "test", "ch.yaml"]);
        match cli.command {
            Commands::Channel {
                command: ChannelCommands::Test { namespace, rule, .. },
            } => {
                assert_eq!(namespace, "default");
                assert_eq!(rule, "herald-test");
            }
            _ => panic!("expected channel test command"),
        }
    }

    #[test]
    fn respects_format_flag() {
        let cli = Cli::parse_from(["herald", "--format", "json", "templates", "--tenant"]);
        assert_eq!(cli.format, Format::Json);
        assert!(matches!(cli.command, Commands::Templates { tenant: true }));
    }

    #[test]
    fn apply_requires_out_dir() {
        let result = Cli::try_parse_from([
            "herald", "apply", "--rules", "r.yaml", "--routing", "a.yaml", "--action", "add", "--channels", "c.yaml",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn action_maps_to_engine() {
        assert_eq!(Action::from(ActionArg::Add), Action::Add);
        assert_eq!(Action::from(ActionArg::Update), Action::Update);
    }
}
