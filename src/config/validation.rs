use crate::config::types::{Config, FetchConfig, ModuleConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_modules(&config.modules)?;

    if let Some(notify) = &config.notify {
        if let Some(url) = &notify.webhook_url {
            validate_http_url(url, "webhook-url")?;
        }
    }

    Ok(())
}

/// Validates retry, delay and size settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.retry_times < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-times must be >= 1, got {}",
            config.retry_times
        )));
    }

    validate_range("retry-delay-ms", config.retry_delay_ms)?;
    validate_range("request-delay-ms", config.request_delay_ms)?;

    if config.request_delay_ms[1] == 0 {
        tracing::warn!("request-delay-ms is [0, 0]; requests will not be spaced out");
    }

    if config.max_file_size == 0 {
        return Err(ConfigError::Validation(
            "max-file-size must be greater than zero".to_string(),
        ));
    }

    if config.listing_timeout_secs == 0
        || config.detail_timeout_secs == 0
        || config.asset_timeout_secs == 0
    {
        return Err(ConfigError::Validation(
            "timeouts must be at least one second".to_string(),
        ));
    }

    if config.page_encoding.trim().is_empty() {
        return Err(ConfigError::Validation(
            "page-encoding cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_range(name: &str, range: [u64; 2]) -> Result<(), ConfigError> {
    if range[0] > range[1] {
        return Err(ConfigError::Validation(format!(
            "{} must be [min, max] with min <= max, got [{}, {}]",
            name, range[0], range[1]
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates module entries
fn validate_modules(modules: &[ModuleConfig]) -> Result<(), ConfigError> {
    if modules.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[module]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for module in modules {
        validate_module_id(&module.id)?;

        if !seen.insert(module.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate module id '{}'",
                module.id
            )));
        }

        validate_http_url(&module.listing_url, "listing-url")?;
        if let Some(base) = &module.link_base {
            validate_http_url(base, "link-base")?;
        }

        if module.stop_threshold < 1 {
            return Err(ConfigError::Validation(format!(
                "module '{}': stop-threshold must be >= 1",
                module.id
            )));
        }

        if module.max_pages == Some(0) {
            return Err(ConfigError::Validation(format!(
                "module '{}': max-pages must be >= 1 when set",
                module.id
            )));
        }
    }

    Ok(())
}

/// Module ids become directory and lock file names
fn validate_module_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "module id cannot be empty".to_string(),
        ));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "module id '{}' may only contain ASCII letters, digits, '-' and '_'",
            id
        )));
    }

    Ok(())
}

fn validate_http_url(raw: &str, field: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, raw
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_module_id() {
        assert!(validate_module_id("central").is_ok());
        assert!(validate_module_id("other_depts-2").is_ok());

        assert!(validate_module_id("").is_err());
        assert!(validate_module_id("../etc").is_err());
        assert!(validate_module_id("中央文件").is_err());
        assert!(validate_module_id("a b").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("r", [0, 0]).is_ok());
        assert!(validate_range("r", [2000, 5000]).is_ok());
        assert!(validate_range("r", [5000, 2000]).is_err());
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://www.moe.gov.cn/", "listing-url").is_ok());
        assert!(validate_http_url("https://example.org/list/", "listing-url").is_ok());

        assert!(validate_http_url("ftp://example.org/", "listing-url").is_err());
        assert!(validate_http_url("not a url", "listing-url").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
