//! Structured document loading and JSON persistence.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::error::Error;
use crate::result::{Result, ResultExt};

/// Supported on-disk document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Yaml,
    Json,
}

impl DocumentFormat {
    /// Detect the format from a file extension.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for anything other than toml, yaml, yml or json.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            other => Err(Error::unsupported_format(path, other)),
        }
    }
}

/// Read a file into a string.
///
/// # Errors
///
/// Returns `FileReadFailed` when the file cannot be read.
pub fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::file_read_failed(path, e.to_string()))
}

/// Load a TOML, YAML or JSON document, picking the parser from the extension.
///
/// # Errors
///
/// Returns a read error, an unsupported-format error, or the parse error of
/// the detected format.
pub fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = DocumentFormat::from_path(path)?;
    let content = read_to_string(path)?;
    debug!(path = %path.display(), ?format, "Loading document");

    match format {
        DocumentFormat::Toml => {
            toml::from_str(&content).map_err(|e| Error::toml_parse_failed(path, e.to_string()))
        }
        DocumentFormat::Yaml => serde_yaml::from_str(&content)
            .map_err(|e| Error::yaml_parse_failed(path, e.to_string())),
        DocumentFormat::Json => serde_json::from_str(&content)
            .map_err(|e| Error::json_parse_failed(path, e.to_string())),
    }
}

/// Load a JSON document, returning `T::default()` when the file does not exist.
///
/// # Errors
///
/// Returns a read error for anything other than a missing file, or a JSON
/// parse error.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        trace!(path = %path.display(), "Document missing, using default");
        return Ok(T::default());
    }

    let content = read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content).map_err(|e| Error::json_parse_failed(path, e.to_string()))
}

/// Write a value as pretty-printed JSON.
///
/// The document is written to a sibling temp file and renamed into place so
/// readers never observe a half-written file.
///
/// # Errors
///
/// Returns `SerializeFailed`, `DirectoryCreationFailed` or `FileWriteFailed`.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body =
        serde_json::to_string_pretty(value).map_err(|e| Error::serialize_failed(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::directory_creation_failed(parent, e.to_string()))?;
    }

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|e| Error::file_write_failed(path, e.to_string()))
        .tap_ok(|_| debug!(path = %path.display(), "Document written"))
}
