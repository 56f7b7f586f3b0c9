//! Crawl checkpoint and its file-backed store
//!
//! The checkpoint is the resume cursor of the pagination walker: the listing
//! page being walked and the index of the last item handed downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while persisting a checkpoint
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Failed to write checkpoint {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Failed to remove checkpoint {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Position from which a crawl resumes
///
/// `item_number` always indexes into `page_number`; moving to the next page
/// resets it to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "first_page")]
    pub page_number: u32,

    #[serde(default)]
    pub item_number: usize,
}

fn first_page() -> u32 {
    1
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            page_number: 1,
            item_number: 0,
        }
    }
}

impl Checkpoint {
    pub fn new(page_number: u32, item_number: usize) -> Self {
        Self {
            page_number: page_number.max(1),
            item_number,
        }
    }

    /// Same page, pointing at `item_number`
    pub fn at_item(self, item_number: usize) -> Self {
        Self {
            page_number: self.page_number,
            item_number,
        }
    }

    /// First item of the following page
    pub fn next_page(self) -> Self {
        Self {
            page_number: self.page_number + 1,
            item_number: 0,
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}, item {}", self.page_number, self.item_number)
    }
}

/// Durable storage for a single checkpoint
pub trait CheckpointStore: Send + Sync {
    /// Loads the persisted checkpoint, `None` when there is no usable one
    fn load_saved(&self) -> Option<Checkpoint>;

    /// Loads the persisted checkpoint
    ///
    /// A missing or unreadable checkpoint yields [`Checkpoint::default`];
    /// the first run of a crawl is not an error.
    fn load(&self) -> Checkpoint {
        self.load_saved().unwrap_or_default()
    }

    /// Replaces the persisted checkpoint
    fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    /// Deletes the persisted checkpoint; a no-op when none exists
    fn clear(&self) -> Result<(), CheckpointError>;
}

/// Checkpoint stored as a small JSON document on disk
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load_saved(&self) -> Option<Checkpoint> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(
                    "Cannot read checkpoint {}: {}, starting from the first page",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(checkpoint) => Some(Checkpoint::new(
                checkpoint.page_number,
                checkpoint.item_number,
            )),
            Err(e) => {
                tracing::warn!(
                    "Checkpoint {} is corrupt ({}), starting from the first page",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let body = serde_json::to_vec(&checkpoint)?;
        let temp = self.temp_path();

        let write = |path: &Path| -> io::Result<()> {
            let mut file = fs::File::create(path)?;
            file.write_all(&body)?;
            file.sync_all()
        };

        write(&temp)
            .and_then(|_| fs::rename(&temp, &self.path))
            .map_err(|source| CheckpointError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CheckpointError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
