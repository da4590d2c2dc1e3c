//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`list`] - Read rules back from documents
//! - [`apply`] - Add, update or delete one rule
//! - [`channel`] - Check, describe and test channels
//! - [`templates`] - Print the template catalog

pub mod apply;
pub mod channel;
pub mod list;
pub mod templates;

pub use apply::ApplyCommand;
pub use channel::ChannelCommand;
pub use list::ListCommand;
pub use templates::TemplatesCommand;
