use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigResult;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use shelf_harvest::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Listing: {}", config.scraper.url);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so that runs can be matched to the settings they used.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[logging]
level = "debug"
logs-dir = "./logs"

[scraper]
url = "https://www.ikea.lt/lt/products/miegamojo-baldai/komodos"
restart-delay-secs = 30

[scraper.fetcher]
max-attempts = 3
request-delay-ms = 500

[scraper.fetcher.headers]
"User-Agent" = "TestAgent/1.0"

[database]
file-path = "./data/products.jsonl"
identity-key = ["id"]

[mail]
username = "bot@gmail.com"
app-password = "abcd efgh"
recipients = "ops@example.com"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.scraper.restart_delay_secs, 30);
        assert_eq!(config.scraper.fetcher.max_attempts, 3);
        assert_eq!(config.scraper.fetcher.retry_delay_ms, 1000);
        assert_eq!(config.scraper.fetcher.request_delay_ms, 500);
        assert_eq!(config.scraper.fetcher.headers.len(), 1);
        assert_eq!(config.database.file_path, "./data/products.jsonl");
        assert_eq!(config.mail.unwrap().smtp_server, "smtp.gmail.com");
    }

    #[test]
    fn test_defaults() {
        let config = parse_config(
            r#"
[scraper]
url = "https://example.com/products"

[database]
file-path = "products.db"
"#,
        )
        .unwrap();

        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.logs_dir, "logs");
        assert_eq!(config.scraper.fetcher.max_attempts, 5);
        assert_eq!(config.scraper.fetcher.retry_delay_ms, 1000);
        assert_eq!(config.scraper.fetcher.request_delay_ms, 2000);
        assert_eq!(config.scraper.restart_delay_secs, 10);
        assert_eq!(config.scraper.state_file, "ikea_scraper_state.json");
        assert!(config.scraper.fetcher.headers.contains_key("User-Agent"));
        assert_eq!(config.scraper.selectors.counter, "span.showing_current_max");
        assert_eq!(config.database.identity_key, vec!["id".to_string()]);
        assert!(config.mail.is_none());
    }

    #[test]
    fn test_missing_database_section() {
        let result = parse_config(
            r#"
[scraper]
url = "https://example.com/products"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[scraper]
url = "https://example.com/products"

[database]
file-path = "products.parquet"
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::UnsupportedBackend(_)
        ));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
