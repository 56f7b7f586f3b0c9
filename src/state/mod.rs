//! State module for tracking crawl progress
//!
//! The only state that outlives a process is the [`Checkpoint`]: the listing
//! page and item index a crawl resumes from.
//!
//! # Components
//!
//! - `Checkpoint`: immutable resume cursor, replaced wholesale on every advance
//! - `CheckpointStore`: load/save/clear contract for durable checkpoints
//! - `FileCheckpointStore`: JSON file implementation with atomic replacement

mod checkpoint;

// Re-export main types
pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore, FileCheckpointStore};
