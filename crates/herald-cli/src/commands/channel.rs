//! Channel command implementation.
//!
//! Handles checking, describing and test-sending a channel file.

use std::io::Write;
use std::path::Path;

use chrono::Utc;
use herald_alerts::documents::Receiver;
use herald_alerts::{AlertChannel, ChannelSettings, NotificationChannel, WebhookMessage};
use serde::Serialize;

use crate::cli::ChannelCommands;
use crate::error::CliError;
use crate::files::read_document;
use crate::output::{OutputFormat, TableDisplay};

/// Handler for `herald channel` subcommands.
pub struct ChannelCommand<'a> {
    settings: &'a ChannelSettings,
}

impl<'a> ChannelCommand<'a> {
    /// Creates a new channel command handler.
    #[must_use]
    pub const fn new(settings: &'a ChannelSettings) -> Self {
        Self { settings }
    }

    /// Executes the channel subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be loaded, the channel is invalid,
    /// or a test send fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &ChannelCommands,
    ) -> Result<(), CliError> {
        match command {
            ChannelCommands::Check { file } => {
                let channel = load_channel(file)?;
                channel.config.check()?;
                format.write(out, &self.report(&channel, "valid"))
            }
            ChannelCommands::Describe { file } => {
                let channel = load_channel(file)?;
                format.write(out, &self.report(&channel, "described"))
            }
            ChannelCommands::Test { file, namespace, rule } => {
                let channel = load_channel(file)?;
                let message = WebhookMessage::sample(namespace, rule, &channel.receiver_name(), Utc::now());
                channel.config.test(&message, self.settings)?;
                format.write(out, &self.report(&channel, "sent"))
            }
        }
    }

    fn report(&self, channel: &AlertChannel, status: &str) -> ChannelReport {
        ChannelReport {
            id: channel.id,
            name: channel.name.clone(),
            channel_type: channel.config.channel_type().to_string(),
            target: channel.config.describe(self.settings),
            status: status.to_string(),
            receiver: channel.to_receiver(self.settings),
        }
    }
}

fn load_channel(path: &Path) -> Result<AlertChannel, CliError> {
    read_document(path)
}

/// What a channel resolves to.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    /// Store id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Channel type tag.
    pub channel_type: String,
    /// Delivery target, secrets redacted.
    pub target: String,
    /// Outcome of the command.
    pub status: String,
    /// Receiver block written to routing documents.
    pub receiver: Receiver,
}

impl TableDisplay for ChannelReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Channel: {} (id {})", self.name, self.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Type:             {}", self.channel_type)?;
        writeln!(writer, "Target:           {}", self.target)?;
        writeln!(writer, "Receiver:         {}", self.receiver.name)?;
        writeln!(writer, "Status:           {}", self.status)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_alerts::ChannelConfig;
    use herald_alerts::channels::WebhookChannel;

    fn channel() -> AlertChannel {
        AlertChannel::new(
            7,
            "ops",
            ChannelConfig::Webhook(WebhookChannel {
                url: "https://hooks.example.com/ops".into(),
                insecure_skip_verify: false,
            }),
        )
    }

    #[test]
    fn report_names_receiver() {
        let settings = ChannelSettings::default();
        let report = ChannelCommand::new(&settings).report(&channel(), "valid");
        assert_eq!(report.channel_type, "webhook");
        assert_eq!(report.receiver.name, "ops-id-7");

        let out = OutputFormat::default().to_string(&report).unwrap();
        assert!(out.contains("Channel: ops (id 7)"));
        assert!(out.contains("Status:           valid"));
    }

    #[test]
    fn check_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.yaml");
        std::fs::write(&path, herald_alerts::documents::to_yaml(&channel()).unwrap()).unwrap();

        let settings = ChannelSettings::default();
        let mut out = Vec::new();
        ChannelCommand::new(&settings)
            .execute(&mut out, &OutputFormat::default(), &ChannelCommands::Check { file: path })
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("hooks.example.com"));
    }
}
