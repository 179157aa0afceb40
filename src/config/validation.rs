use crate::config::types::{Config, FetchConfig, Settings, SourceConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_settings(&config.settings)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetch_config(&config.fetch)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates global run settings
fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.max_workers < 1 || settings.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 64, got {}",
            settings.max_workers
        )));
    }

    if settings.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    if settings.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if settings.aggregate_file.is_empty() {
        return Err(ConfigError::Validation(
            "aggregate_file cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

/// Validates timeouts and the retry policy
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.connect_timeout_ms == 0 || config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_ms and request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    if config.backoff_base_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed max_backoff_ms ({})",
            config.backoff_base_ms, config.max_backoff_ms
        )));
    }

    for status in config.retry_statuses.iter().chain(&config.fatal_statuses) {
        if !(100..=599).contains(status) {
            return Err(ConfigError::Validation(format!(
                "{} is not an HTTP status code",
                status
            )));
        }
    }

    if let Some(status) = config
        .retry_statuses
        .iter()
        .find(|s| config.fatal_statuses.contains(s))
    {
        return Err(ConfigError::Validation(format!(
            "status {} cannot be both retryable and fatal",
            status
        )));
    }

    Ok(())
}

/// Validates source entries
fn validate_sources(sources: &[SourceConfig]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] entry is required".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for source in sources {
        validate_source(source)?;

        if !names.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source name '{}' is used more than once",
                source.name
            )));
        }
    }

    Ok(())
}

/// Validates a single source entry
fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    // Names become file names, keep them boring
    if source.name.is_empty()
        || !source
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "source name must be non-empty and contain only ASCII letters, digits, '-' or '_', got '{}'",
            source.name
        )));
    }

    if source.extractor.is_empty() {
        return Err(ConfigError::Validation(format!(
            "source '{}' must name an extractor",
            source.name
        )));
    }

    let url = Url::parse(&source.url).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid start URL '{}' for source '{}': {}",
            source.url, source.name, e
        ))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start URL '{}' must use http or https",
            source.url
        )));
    }

    if source.max_pages == Some(0) {
        return Err(ConfigError::Validation(format!(
            "max_pages for source '{}' must be >= 1",
            source.name
        )));
    }

    Ok(())
}
