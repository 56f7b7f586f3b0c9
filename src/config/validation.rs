use crate::config::types::{Config, DatabaseConfig, FetcherConfig, MailConfig, ScraperConfig};
use crate::item::Item;
use crate::storage::BackendKind;
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use scraper::Selector;
use std::path::Path;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_log_level(&config.logging.level)?;
    validate_scraper_config(&config.scraper)?;
    validate_database_config(&config.database)?;
    if let Some(mail) = &config.mail {
        validate_mail_config(mail)?;
    }
    Ok(())
}

fn validate_log_level(level: &str) -> Result<(), ConfigError> {
    match level.to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "warning" | "error" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "Unknown log level '{}'",
            other
        ))),
    }
}

/// Validates the listing endpoint, fetch policy and selectors
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.url.is_empty() {
        return Err(ConfigError::Validation(
            "scraper url cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid scraper url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Scraper url '{}' must use HTTP or HTTPS",
            config.url
        )));
    }

    if !config.page_query.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "page-query must contain a {{page}} placeholder, got '{}'",
            config.page_query
        )));
    }

    if config.state_file.is_empty() {
        return Err(ConfigError::Validation(
            "state-file cannot be empty".to_string(),
        ));
    }

    validate_fetcher_config(&config.fetcher)?;

    let selectors = &config.selectors;
    for (name, css) in [
        ("item", &selectors.item),
        ("link", &selectors.link),
        ("description", &selectors.description),
        ("price", &selectors.price),
        ("counter", &selectors.counter),
        ("detail-table", &selectors.detail_table),
        ("item-code", &selectors.item_code),
    ] {
        validate_selector(name, css)?;
    }

    Ok(())
}

fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 20, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    for (name, value) in &config.headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid header name '{}'", name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    Ok(())
}

fn validate_selector(name: &str, css: &str) -> Result<(), ConfigError> {
    Selector::parse(css).map_err(|e| {
        ConfigError::InvalidSelector(format!("{} selector '{}': {:?}", name, css, e))
    })?;
    Ok(())
}

/// Validates the storage target and identity key
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.file_path.is_empty() {
        return Err(ConfigError::Validation(
            "Database file path not provided, check the [database] section".to_string(),
        ));
    }

    BackendKind::from_path(Path::new(&config.file_path))?;

    if config.identity_key.is_empty() {
        return Err(ConfigError::Validation(
            "identity-key must name at least one field".to_string(),
        ));
    }

    for field in &config.identity_key {
        if !Item::is_field(field) {
            return Err(ConfigError::Validation(format!(
                "identity-key field '{}' is not one of {:?}",
                field,
                Item::FIELDS
            )));
        }
    }

    Ok(())
}

fn validate_mail_config(config: &MailConfig) -> Result<(), ConfigError> {
    validate_email(&config.username)?;

    if config.app_password.is_empty() {
        return Err(ConfigError::Validation(
            "mail app-password cannot be empty".to_string(),
        ));
    }

    if config.smtp_server.is_empty() {
        return Err(ConfigError::Validation(
            "mail smtp-server cannot be empty".to_string(),
        ));
    }

    let recipients = crate::notify::split_addresses(&config.recipients);
    if recipients.is_empty() {
        return Err(ConfigError::Validation(
            "mail recipients cannot be empty".to_string(),
        ));
    }
    for recipient in recipients {
        validate_email(recipient)?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "email address cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
