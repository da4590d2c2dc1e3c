//! CLI error types.

use std::io;
use std::path::PathBuf;

use herald_alerts::AlertError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The engine rejected the request.
    #[error(transparent)]
    Alert(#[from] AlertError),
    /// A file could not be read or written.
    #[error("{path}: {source}")]
    File {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A document could not be parsed.
    #[error("{path}: {source}")]
    Document {
        /// Path involved.
        path: PathBuf,
        /// Underlying engine error.
        #[source]
        source: AlertError,
    },
    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),
    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_invalid_argument() {
        let err = CliError::InvalidArgument("--rule is required".into());
        assert_eq!(err.to_string(), "invalid argument: --rule is required");
    }

    #[test]
    fn alert_errors_pass_through() {
        let err = CliError::from(AlertError::RuleNotFound { name: "cpu".into() });
        assert_eq!(err.to_string(), "alert rule cpu does not exist");
    }

    #[test]
    fn file_errors_name_the_path() {
        let err = CliError::File {
            path: PathBuf::from("rules.yaml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "rules.yaml: missing");
    }
}
