//! Configuration module for shelf-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shelf_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Storing products in: {}", config.database.file_path);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_headers, Config, DatabaseConfig, FetcherConfig, LoggingConfig, MailConfig,
    ScraperConfig, SelectorConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
