//! Storage traits and error types
//!
//! This module defines the upsert contract shared by every backend and the
//! errors they can raise.

use crate::item::{Item, ItemKey};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No stored item matches {0}")]
    NotFound(String),

    #[error("Unknown identity field '{0}'")]
    UnknownField(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read workbook {path}: {message}")]
    WorkbookRead { path: PathBuf, message: String },

    #[error("Failed to write workbook {path}: {source}")]
    WorkbookWrite {
        path: PathBuf,
        source: rust_xlsxwriter::XlsxError,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Keyed persistence of harvested items
///
/// The sync loop drives every backend the same way: `find` by identity key,
/// then `replace` when a match exists and `insert` otherwise. Implementations
/// must make each mutation atomic with respect to the whole item (attributes
/// and details together) and return details in insertion order.
pub trait UpsertSink: Send {
    /// Finds the first stored item whose fields match every pair of `key`
    fn find(&self, key: &ItemKey) -> StorageResult<Option<Item>>;

    /// Stores a new item
    ///
    /// The caller checks with [`find`](Self::find) first; inserting a key
    /// that already exists is not detected.
    fn insert(&mut self, item: Item) -> StorageResult<Item>;

    /// Replaces the item stored under `key` with `item`
    ///
    /// Attributes are overwritten and the old details are discarded, never
    /// merged.
    ///
    /// # Errors
    ///
    /// * `StorageError::NotFound` - Nothing is stored under `key`
    fn replace(&mut self, item: Item, key: &ItemKey) -> StorageResult<Item>;
}
