use crate::adapters::available_adapters;
use crate::config::types::{
    Config, CrawlerConfig, ImageConfig, OutputConfig, RetryConfig, SiteEntry, TranslationConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_image_config(&config.images)?;
    if let Some(translation) = &config.translation {
        validate_translation_config(translation)?;
    }
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.min_request_interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "min_request_interval_ms must be >= 100ms, got {}ms",
            config.min_request_interval_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_consecutive_page_failures < 1 {
        return Err(ConfigError::Validation(format!(
            "max_consecutive_page_failures must be >= 1, got {}",
            config.max_consecutive_page_failures
        )));
    }

    if config.max_concurrent_adapters < 1 || config.max_concurrent_adapters > 16 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_adapters must be between 1 and 16, got {}",
            config.max_concurrent_adapters
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
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

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_image_config(config: &ImageConfig) -> Result<(), ConfigError> {
    if config.min_count < 1 {
        return Err(ConfigError::Validation(
            "images.min_count must be >= 1".to_string(),
        ));
    }

    if config.min_width == Some(0) {
        return Err(ConfigError::Validation(
            "images.min_width must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_translation_config(config: &TranslationConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.endpoint, "translation endpoint")?;

    if config.source_language.is_empty() || config.target_language.is_empty() {
        return Err(ConfigError::Validation(
            "translation languages cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates per-site overrides against the adapter registry
fn validate_sites(sites: &[SiteEntry]) -> Result<(), ConfigError> {
    let known = available_adapters();

    for (index, site) in sites.iter().enumerate() {
        if !known.contains(&site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown site '{}' (available: {})",
                site.name,
                known.join(", ")
            )));
        }

        if sites[..index].iter().any(|other| other.name == site.name) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' is configured more than once",
                site.name
            )));
        }

        validate_http_url(&site.base_url, &site.name)?;
    }

    Ok(())
}

fn validate_http_url(raw: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} URL '{}': {}", what, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{} URL '{}' must use http or https",
            what, raw
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
