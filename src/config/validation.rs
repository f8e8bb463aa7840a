use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, ScopeConfig, SourcesConfig, UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scope_config(&config.scope)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sources_config(&config.sources)?;
    Ok(())
}

/// Validates the crawl scope
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    validate_state_code(&config.state)?;

    if config.counties.is_empty() {
        return Err(ConfigError::Validation(
            "counties must list at least one county".to_string(),
        ));
    }

    for county in &config.counties {
        validate_county_identifier(county)?;
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_retries < 1 || config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 1 and 20, got {}",
            config.max_retries
        )));
    }

    if config.initial_backoff_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "initial_backoff_ms must be >= 1ms, got {}ms",
            config.initial_backoff_ms
        )));
    }

    if config.navigation_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "navigation_timeout_ms must be >= 1000ms, got {}ms",
            config.navigation_timeout_ms
        )));
    }

    if config.batch_size < 1 || config.batch_size > 10_000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 10000, got {}",
            config.batch_size
        )));
    }

    if config.parcel_page_size < 1 || config.parcel_page_size > 2000 {
        return Err(ConfigError::Validation(format!(
            "parcel_page_size must be between 1 and 2000, got {}",
            config.parcel_page_size
        )));
    }

    if config.max_concurrent_sessions < 1 || config.max_concurrent_sessions > 16 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_sessions must be between 1 and 16, got {}",
            config.max_concurrent_sessions
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Missing("output.database-path".to_string()));
    }

    Ok(())
}

/// Validates source base URLs
fn validate_sources_config(config: &SourcesConfig) -> Result<(), ConfigError> {
    validate_base_url("property-records-base", &config.property_records_base)?;
    validate_base_url("street-index-base", &config.street_index_base)?;
    validate_base_url("parcel-query-url", &config.parcel_query_url)?;
    Ok(())
}

fn validate_base_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            name, value
        )));
    }

    Ok(())
}

/// Validates a two-letter state code
pub fn validate_state_code(state: &str) -> Result<(), ConfigError> {
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "state must be a two-letter code, got '{}'",
            state
        )));
    }

    Ok(())
}

/// Validates a county identifier such as `morris` or `cape_may`
pub fn validate_county_identifier(county: &str) -> Result<(), ConfigError> {
    if county.is_empty() {
        return Err(ConfigError::Validation(
            "county identifier cannot be empty".to_string(),
        ));
    }

    if !county
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "county identifier '{}' may only contain letters, digits, '_' and '-'",
            county
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_state_code() {
        assert!(validate_state_code("nj").is_ok());
        assert!(validate_state_code("NY").is_ok());

        assert!(validate_state_code("").is_err());
        assert!(validate_state_code("n").is_err());
        assert!(validate_state_code("new jersey").is_err());
        assert!(validate_state_code("n1").is_err());
    }

    #[test]
    fn test_validate_county_identifier() {
        assert!(validate_county_identifier("morris").is_ok());
        assert!(validate_county_identifier("cape_may").is_ok());

        assert!(validate_county_identifier("").is_err());
        assert!(validate_county_identifier("cape may").is_err());
        assert!(validate_county_identifier("../etc").is_err());
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("x", "https://www.countyoffice.org").is_ok());
        assert!(validate_base_url("x", "http://127.0.0.1:8080").is_ok());

        assert!(validate_base_url("x", "not a url").is_err());
        assert!(validate_base_url("x", "ftp://example.com").is_err());
    }

    #[test]
    fn test_default_crawler_config_is_valid() {
        assert!(validate_crawler_config(&CrawlerConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let config = CrawlerConfig {
            max_retries: 0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());
    }

    #[test]
    fn test_parcel_page_size_bounds() {
        for size in [0, 2001] {
            let config = CrawlerConfig {
                parcel_page_size: size,
                ..CrawlerConfig::default()
            };
            assert!(validate_crawler_config(&config).is_err());
        }
    }

    #[test]
    fn test_default_sources_are_valid() {
        assert!(validate_sources_config(&SourcesConfig::default()).is_ok());
    }
}
