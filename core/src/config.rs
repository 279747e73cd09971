//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain data so it can be built in code through
//! `ClientConfig::builder` or loaded from JSON alongside the rest of an
//! application's settings. Everything except the server prefix has a
//! default; `maximum_concurrent_requests` left unset defers to the
//! transport's own per-host connection limit.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// URL length past which a splittable multi-valued query is spread over
/// several transport calls.
pub const DEFAULT_MAXIMUM_URL_LENGTH: usize = 1024;

/// How a query parameter with several values is written into the URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValueQueryHandling {
    /// `?id=1&id=2&id=3`
    #[default]
    RepeatKey,
    /// `?id=1,2,3`
    UseComma,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prepended to every relative request path, e.g. `https://api.example.com`.
    pub server_prefix: String,
    #[serde(default)]
    pub multi_value_query_handling: MultiValueQueryHandling,
    #[serde(default = "default_maximum_url_length")]
    pub maximum_url_length: usize,
    /// Ceiling on simultaneously active requests. `None` uses the
    /// transport's per-host connection limit.
    #[serde(default)]
    pub maximum_concurrent_requests: Option<usize>,
    /// Log every request handed to the transport at `info` level.
    #[serde(default)]
    pub log_transactions: bool,
}

fn default_maximum_url_length() -> usize {
    DEFAULT_MAXIMUM_URL_LENGTH
}

impl ClientConfig {
    pub fn new(server_prefix: impl Into<String>) -> Self {
        Self {
            server_prefix: server_prefix.into(),
            multi_value_query_handling: MultiValueQueryHandling::default(),
            maximum_url_length: DEFAULT_MAXIMUM_URL_LENGTH,
            maximum_concurrent_requests: None,
            log_transactions: false,
        }
    }

    pub fn builder(server_prefix: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::new(server_prefix),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.maximum_concurrent_requests == Some(0) {
            return Err(ClientError::InvalidConfig(
                "maximum_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.maximum_url_length == 0 {
            return Err(ClientError::InvalidConfig(
                "maximum_url_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    #[must_use]
    pub fn multi_value_query_handling(mut self, handling: MultiValueQueryHandling) -> Self {
        self.config.multi_value_query_handling = handling;
        self
    }

    #[must_use]
    pub fn maximum_url_length(mut self, length: usize) -> Self {
        self.config.maximum_url_length = length;
        self
    }

    #[must_use]
    pub fn maximum_concurrent_requests(mut self, max: usize) -> Self {
        self.config.maximum_concurrent_requests = Some(max);
        self
    }

    #[must_use]
    pub fn log_transactions(mut self, enabled: bool) -> Self {
        self.config.log_transactions = enabled;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ClientError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let config =
            ClientConfig::from_json(r#"{"server_prefix":"http://localhost:3000"}"#).unwrap();
        assert_eq!(config, ClientConfig::new("http://localhost:3000"));
        assert_eq!(config.maximum_url_length, DEFAULT_MAXIMUM_URL_LENGTH);
        assert_eq!(config.maximum_concurrent_requests, None);
    }

    #[test]
    fn json_reads_every_field() {
        let config = ClientConfig::from_json(
            r#"{
                "server_prefix": "https://api.example.com",
                "multi_value_query_handling": "use_comma",
                "maximum_url_length": 256,
                "maximum_concurrent_requests": 2,
                "log_transactions": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.multi_value_query_handling, MultiValueQueryHandling::UseComma);
        assert_eq!(config.maximum_url_length, 256);
        assert_eq!(config.maximum_concurrent_requests, Some(2));
        assert!(config.log_transactions);
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let err = ClientConfig::builder("http://localhost")
            .maximum_concurrent_requests(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
    }

    #[test]
    fn missing_prefix_is_a_serialization_error() {
        let err = ClientConfig::from_json("{}").unwrap_err();
        assert!(matches!(err, ClientError::Serialization(_)));
    }
}
