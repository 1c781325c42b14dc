use std::env;

use trackvault_core::storage::{PageLimits, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// DynamoDB table holding every entity (default: "trackvault")
    pub table_name: String,
    /// Page size when a listing does not ask for one (default: 20)
    pub default_page_size: u32,
    /// Largest page size a listing may ask for (default: 100)
    pub max_page_size: u32,
    /// Endpoint override for a local DynamoDB
    pub dynamodb_endpoint_url: Option<String>,
    /// Cognito user pool backing the directory
    pub cognito_user_pool_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TRACKVAULT_TABLE_NAME` - DynamoDB table name (default: "trackvault")
    /// - `TRACKVAULT_DEFAULT_PAGE_SIZE` - Default page size (default: 20)
    /// - `TRACKVAULT_MAX_PAGE_SIZE` - Maximum page size (default: 100)
    /// - `DYNAMODB_ENDPOINT_URL` - DynamoDB endpoint override (optional)
    /// - `COGNITO_USER_POOL_ID` - Cognito user pool id (optional)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            table_name: non_empty("TRACKVAULT_TABLE_NAME")
                .unwrap_or_else(|| "trackvault".to_string()),
            default_page_size: non_empty("TRACKVAULT_DEFAULT_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_page_size: non_empty("TRACKVAULT_MAX_PAGE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_PAGE_SIZE),
            dynamodb_endpoint_url: non_empty("DYNAMODB_ENDPOINT_URL"),
            cognito_user_pool_id: non_empty("COGNITO_USER_POOL_ID"),
        }
    }

    /// Page limits for the access layer.
    ///
    /// The default is capped at the maximum, and both are at least 1.
    pub fn page_limits(&self) -> PageLimits {
        let max = self.max_page_size.max(1);
        PageLimits {
            default: self.default_page_size.clamp(1, max),
            max,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = config_from(&[]);

        assert_eq!(config.table_name, "trackvault");
        assert_eq!(config.default_page_size, 20);
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.dynamodb_endpoint_url, None);
        assert_eq!(config.cognito_user_pool_id, None);
    }

    #[test]
    fn test_values_from_environment() {
        let config = config_from(&[
            ("TRACKVAULT_TABLE_NAME", "library-prod"),
            ("TRACKVAULT_DEFAULT_PAGE_SIZE", "50"),
            ("DYNAMODB_ENDPOINT_URL", "http://localhost:8000"),
            ("COGNITO_USER_POOL_ID", "eu-west-1_abc"),
        ]);

        assert_eq!(config.table_name, "library-prod");
        assert_eq!(config.default_page_size, 50);
        assert_eq!(
            config.dynamodb_endpoint_url.as_deref(),
            Some("http://localhost:8000")
        );
        assert_eq!(config.cognito_user_pool_id.as_deref(), Some("eu-west-1_abc"));
    }

    #[test]
    fn test_invalid_and_blank_values_fall_back() {
        let config = config_from(&[
            ("TRACKVAULT_TABLE_NAME", "  "),
            ("TRACKVAULT_MAX_PAGE_SIZE", "lots"),
            ("DYNAMODB_ENDPOINT_URL", ""),
        ]);

        assert_eq!(config.table_name, "trackvault");
        assert_eq!(config.max_page_size, 100);
        assert_eq!(config.dynamodb_endpoint_url, None);
    }

    #[test]
    fn test_page_limits_cap_default_at_max() {
        let config = config_from(&[
            ("TRACKVAULT_DEFAULT_PAGE_SIZE", "80"),
            ("TRACKVAULT_MAX_PAGE_SIZE", "50"),
        ]);

        let limits = config.page_limits();
        assert_eq!(limits.default, 50);
        assert_eq!(limits.max, 50);
    }
}
