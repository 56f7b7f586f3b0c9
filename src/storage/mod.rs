//! Storage module for persisting harvested items
//!
//! This module provides the [`UpsertSink`] contract and its backends:
//! - SQLite database (`.db`)
//! - Line-delimited JSON (`.jsonl`)
//! - Excel workbook (`.xlsx`)
//!
//! The backend is chosen once at startup from the database file extension.

mod jsonl;
mod schema;
mod sqlite;
mod traits;
mod xlsx;

pub use jsonl::JsonlSink;
pub use sqlite::SqliteSink;
pub use traits::{StorageError, StorageResult, UpsertSink};
pub use xlsx::XlsxSink;

use crate::ConfigError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage backends, keyed by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sqlite,
    Jsonl,
    Xlsx,
}

impl BackendKind {
    /// Picks the backend for a database file
    ///
    /// # Returns
    ///
    /// * `Ok(BackendKind)` - The extension is `db`, `jsonl` or `xlsx` (any case)
    /// * `Err(ConfigError::UnsupportedBackend)` - Any other or no extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "db" => Ok(Self::Sqlite),
            "jsonl" => Ok(Self::Jsonl),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(ConfigError::UnsupportedBackend(format!(
                "Unsupported database file: .{}",
                other
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sqlite => "sqlite",
            Self::Jsonl => "jsonl",
            Self::Xlsx => "xlsx",
        };
        f.write_str(name)
    }
}

/// Opens the backend matching the extension of `path`
///
/// # Returns
///
/// * `Ok(Box<dyn UpsertSink>)` - Storage ready for upserts
/// * `Err(HarvestError::Config)` - The extension names no backend
/// * `Err(HarvestError::Storage)` - The file could not be opened or created
pub fn open_sink(path: &Path) -> crate::Result<Box<dyn UpsertSink>> {
    let kind = BackendKind::from_path(path)?;
    tracing::debug!("Opening {} storage at {}", kind, path.display());

    let sink: Box<dyn UpsertSink> = match kind {
        BackendKind::Sqlite => {
            ensure_parent_dir(path)?;
            Box::new(SqliteSink::new(path)?)
        }
        BackendKind::Jsonl => Box::new(JsonlSink::new(path)?),
        BackendKind::Xlsx => Box::new(XlsxSink::new(path)?),
    };
    Ok(sink)
}

pub(crate) fn ensure_parent_dir(path: &Path) -> StorageResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Sibling path used while rewriting `path`
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
