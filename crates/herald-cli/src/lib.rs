//! # herald-cli
//!
//! Command-line front end for `herald-alerts`.
//!
//! Provides commands for:
//! - Listing the rules held by a rule-group and routing document pair
//! - Applying one rule change and writing the rebuilt documents
//! - Checking, describing and test-sending notification channels
//! - Printing the query template catalog
//!
//! Every command works on local files; nothing talks to a cluster.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod files;
pub mod output;

pub use cli::{ApplyArgs, ChannelCommands, Cli, Commands, DocumentArgs, Format, ListArgs};
pub use error::CliError;
pub use output::OutputFormat;
