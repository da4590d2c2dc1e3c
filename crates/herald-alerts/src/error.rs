//! Error types for the herald-alerts crate.

use thiserror::Error;

/// Broad classification of an [`AlertError`], used by callers to map
/// failures onto responses without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied something malformed.
    Validation,
    /// A referenced rule, channel or template does not exist.
    NotFound,
    /// The operation collides with existing state.
    Conflict,
    /// A stored document does not have the expected shape.
    Structural,
    /// Talking to a delivery endpoint failed.
    Transport,
    /// Encoding or decoding failed.
    Serialization,
}

/// Errors that can occur in the alerting engine.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert rule.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// Invalid query generator.
    #[error("invalid query generator: {reason}")]
    InvalidGenerator {
        /// The reason the generator is invalid.
        reason: String,
    },

    /// Invalid notification channel.
    #[error("invalid channel: {reason}")]
    InvalidChannel {
        /// The reason the channel is invalid.
        reason: String,
    },

    /// Invalid duration specification.
    #[error("invalid duration: {reason}")]
    InvalidDuration {
        /// The reason the duration is invalid.
        reason: String,
    },

    /// Alert rule with the given name was not found.
    #[error("alert rule {name} does not exist")]
    RuleNotFound {
        /// The rule name that was not found.
        name: String,
    },

    /// Alert rule with the given name is already present.
    #[error("alert rule {name} already exists")]
    RuleAlreadyExists {
        /// The conflicting rule name.
        name: String,
    },

    /// Channel id could not be resolved.
    #[error("channel {id} not found")]
    ChannelNotFound {
        /// The channel id that was not found.
        id: u64,
    },

    /// Query template could not be resolved.
    #[error("template {name} not found")]
    TemplateNotFound {
        /// Dotted `scope.resource.rule` name.
        name: String,
    },

    /// A rule group or routing document is malformed.
    #[error("rule group {group}: {reason}")]
    MalformedGroup {
        /// The offending group name.
        group: String,
        /// What is wrong with it.
        reason: String,
    },

    /// More than one silence claims the same rule.
    #[error("too many silences for alert rule {name}")]
    AmbiguousSilence {
        /// The rule name.
        name: String,
    },

    /// Test notification delivery failed.
    #[error("notification failed: {reason}")]
    NotificationFailed {
        /// The reason the notification failed.
        reason: String,
    },

    /// Engine or catalog configuration is unusable.
    #[error("configuration error: {reason}")]
    Config {
        /// The reason the configuration was rejected.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl AlertError {
    /// Returns the broad classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRule { .. }
            | Self::InvalidGenerator { .. }
            | Self::InvalidChannel { .. }
            | Self::InvalidDuration { .. }
            | Self::Config { .. } => ErrorKind::Validation,
            Self::RuleNotFound { .. }
            | Self::ChannelNotFound { .. }
            | Self::TemplateNotFound { .. } => ErrorKind::NotFound,
            Self::RuleAlreadyExists { .. } | Self::AmbiguousSilence { .. } => ErrorKind::Conflict,
            Self::MalformedGroup { .. } => ErrorKind::Structural,
            Self::NotificationFailed { .. } => ErrorKind::Transport,
            Self::SerializationError(_) => ErrorKind::Serialization,
        }
    }

    pub(crate) fn invalid_rule(reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_generator(reason: impl Into<String>) -> Self {
        Self::InvalidGenerator {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_channel(reason: impl Into<String>) -> Self {
        Self::InvalidChannel {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(group: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedGroup {
            group: group.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for AlertError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
