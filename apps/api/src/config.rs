use std::time::Duration;

use anyhow::{Context, Result};

use crate::llm_client::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// JSON file with the default lender policies.
    pub lender_policies_path: Option<String>,
    pub llm_max_retries: u32,
    pub llm_base_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            lender_policies_path: std::env::var("LENDER_POLICIES_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            llm_max_retries: parse_env("LLM_MAX_RETRIES", 2)?,
            llm_base_delay_ms: parse_env("LLM_BASE_DELAY_MS", 5000)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.llm_max_retries,
            Duration::from_millis(self.llm_base_delay_ms),
        )
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config {
            anthropic_api_key: "key".to_string(),
            port: 8080,
            rust_log: "info".to_string(),
            lender_policies_path: None,
            llm_max_retries: 4,
            llm_base_delay_ms: 250,
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.base_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_env_default_and_error() {
        assert_eq!(parse_env::<u16>("ELIGIBILITY_TEST_UNSET_VAR", 7).unwrap(), 7);
        std::env::set_var("ELIGIBILITY_TEST_BAD_PORT", "eighty");
        assert!(parse_env::<u16>("ELIGIBILITY_TEST_BAD_PORT", 8080).is_err());
    }
}
