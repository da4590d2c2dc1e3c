//! Loading and writing the files the CLI works on.

use std::fs;
use std::path::{Path, PathBuf};

use herald_alerts::documents::{from_yaml, to_yaml};
use herald_alerts::{AlertResource, EngineConfig, TemplateCatalog};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cli::DocumentArgs;
use crate::error::CliError;

/// Reads a whole file.
///
/// # Errors
///
/// Returns `CliError::File` if the file cannot be read.
pub fn read_text(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a YAML or JSON file.
///
/// # Errors
///
/// Returns `CliError::File` or `CliError::Document`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let text = read_text(path)?;
    from_yaml(&text).map_err(|source| CliError::Document {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes `doc` as YAML to `dir/file_name`, creating `dir` if needed.
///
/// # Errors
///
/// Returns `CliError::File` if writing fails.
pub fn write_document<T: Serialize>(dir: &Path, file_name: &str, doc: &T) -> Result<PathBuf, CliError> {
    let path = dir.join(file_name);
    let text = to_yaml(doc)?;
    fs::create_dir_all(dir)
        .and_then(|()| fs::write(&path, text))
        .map_err(|source| CliError::File {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), "wrote document");
    Ok(path)
}

/// Loads the engine configuration, or the defaults when no file is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds bad values.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_file(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Loads a template catalog, or the built-in one when no file is given.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read or is invalid.
pub fn load_templates(path: Option<&Path>) -> Result<TemplateCatalog, CliError> {
    match path {
        Some(path) => Ok(TemplateCatalog::from_file(path)?),
        None => Ok(TemplateCatalog::builtin()?),
    }
}

/// Loads the documents of one namespace.
///
/// # Errors
///
/// Returns an error if any document cannot be read or parsed.
pub fn load_resource(args: &DocumentArgs) -> Result<AlertResource, CliError> {
    let rule_groups = read_document(&args.rules)?;
    let routing = read_document(&args.routing)?;
    let silences = match &args.silences {
        Some(path) => read_document(path)?,
        None => Vec::new(),
    };
    Ok(AlertResource::new(args.kind.into(), rule_groups, routing, silences))
}
