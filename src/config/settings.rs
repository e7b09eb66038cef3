//! Client Settings
//!
//! File schema for optional settings and the resolved client configuration.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.anyrouter.top";
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_API_KEY_ENV: &str = "ANYROUTER_API_KEY";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Settings read from a JSON file; every field is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL for the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model used for every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens per response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Timeout for non-streaming requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Timeout for establishing connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

impl Settings {
    /// Overlay `other` on top of `self`; fields set in `other` win
    pub fn merge(&mut self, other: Settings) {
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.max_tokens.is_some() {
            self.max_tokens = other.max_tokens;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.connect_timeout_secs.is_some() {
            self.connect_timeout_secs = other.connect_timeout_secs;
        }
        if other.api_key_env.is_some() {
            self.api_key_env = other.api_key_env;
        }
    }

    /// Name of the environment variable holding the API key
    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    /// Resolve into a client configuration using `api_key`
    pub fn into_client_config(self, api_key: impl Into<String>) -> Result<ClientConfig> {
        let config = ClientConfig {
            api_key: api_key.into(),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            connect_timeout: Duration::from_secs(
                self.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            ),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Resolved configuration passed explicitly to the client
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,

    /// Applied to non-streaming requests only
    pub timeout: Duration,

    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Check the values a request cannot be built without
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ChatError::Config("API key is required".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ChatError::Config("base_url must not be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ChatError::Config("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::Config(
                "max_tokens must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the messages endpoint
    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_settings() {
        let json = r#"{
            "base_url": "https://proxy.example.com",
            "model": "claude-3-haiku-20240307",
            "max_tokens": 256
        }"#;

        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("https://proxy.example.com"));
        assert_eq!(settings.max_tokens, Some(256));
        assert_eq!(settings.timeout_secs, None);
        assert_eq!(settings.api_key_env(), DEFAULT_API_KEY_ENV);
    }

    #[test]
    fn test_merge_overrides_set_fields_only() {
        let mut base = Settings {
            model: Some("a".to_string()),
            max_tokens: Some(100),
            ..Default::default()
        };
        base.merge(Settings {
            model: Some("b".to_string()),
            ..Default::default()
        });

        assert_eq!(base.model.as_deref(), Some("b"));
        assert_eq!(base.max_tokens, Some(100));
    }

    #[test]
    fn test_into_client_config_defaults() {
        let config = Settings::default().into_client_config("sk-test").unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Settings::default().into_client_config("  "),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::new("k").with_max_tokens(0).validate(),
            Err(ChatError::Config(_))
        ));
        assert!(ClientConfig::new("k").validate().is_ok());
    }

    #[test]
    fn test_messages_url() {
        let config = ClientConfig::new("k").with_base_url("http://localhost:8080/");
        assert_eq!(config.messages_url(), "http://localhost:8080/v1/messages");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig::new("sk-secret");
        assert!(!format!("{:?}", config).contains("sk-secret"));
    }
}
