//! Per-feed source configuration.
//!
//! Each feed is described by a small JSON document:
//! ```json
//! {
//!   "url": "https://agency.example/gtfs-rt/trip-updates",
//!   "feedId": "agency",
//!   "apiKey": "secret",
//!   "apiKeyHeader": "x-api-key"
//! }
//! ```
//! Only `url` is mandatory. A missing `feedId` is a legitimate configuration:
//! updates from that source are attributed to the empty feed id.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::fetch::auth::{ApiKey, UrlParam};
use crate::fetch::{BasicClient, HttpClient};

/// Errors raised while validating a source configuration document.
///
/// These are the only failures that cross the ingestion boundary; everything
/// that goes wrong after setup is absorbed into the poll outcome.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing mandatory 'url' parameter")]
    MissingUrl,
    #[error("malformed source configuration: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid API key settings: {0}")]
    ApiKey(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    url: Option<String>,
    feed_id: Option<String>,
    api_key: Option<String>,
    api_key_header: Option<String>,
    api_key_param_name: Option<String>,
}

/// How the optional API key is attached to each request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Auth {
    Header { name: String, key: String },
    QueryParam { name: String, key: String },
}

/// A validated source configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    url: String,
    feed_id: String,
    auth: Option<Auth>,
}

impl SourceConfig {
    /// Validates a structured configuration document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingUrl`] when `url` is absent or empty,
    /// [`ConfigError::Malformed`] when the document does not deserialize,
    /// [`ConfigError::ApiKey`] when the API key settings are inconsistent.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_value(value.clone())?;

        let url = match raw.url {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ConfigError::MissingUrl),
        };

        let auth = match (raw.api_key, raw.api_key_header, raw.api_key_param_name) {
            (None, None, None) => None,
            (Some(key), Some(name), None) => Some(Auth::Header { name, key }),
            (Some(key), None, Some(name)) => Some(Auth::QueryParam { name, key }),
            (Some(_), Some(_), Some(_)) => {
                return Err(ConfigError::ApiKey(
                    "'apiKeyHeader' and 'apiKeyParamName' are mutually exclusive".to_string(),
                ));
            }
            (Some(_), None, None) => {
                return Err(ConfigError::ApiKey(
                    "'apiKey' requires 'apiKeyHeader' or 'apiKeyParamName'".to_string(),
                ));
            }
            (None, _, _) => {
                return Err(ConfigError::ApiKey(
                    "'apiKeyHeader'/'apiKeyParamName' require 'apiKey'".to_string(),
                ));
            }
        };

        Ok(Self {
            url,
            feed_id: raw.feed_id.unwrap_or_default(),
            auth,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Attribution tag for updates from this feed; empty when unconfigured.
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }

    /// Wraps `base` in the auth decorator this configuration calls for.
    pub fn build_client(&self, base: BasicClient) -> Result<Box<dyn HttpClient>, ConfigError> {
        match &self.auth {
            None => Ok(Box::new(base)),
            Some(Auth::Header { name, key }) => {
                let client = ApiKey::new(base, name, key)
                    .map_err(|e| ConfigError::ApiKey(e.to_string()))?;
                Ok(Box::new(client))
            }
            Some(Auth::QueryParam { name, key }) => Ok(Box::new(UrlParam {
                inner: base,
                param_name: name.clone(),
                key: key.clone(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_url_is_a_config_error() {
        let result = SourceConfig::from_value(&json!({ "feedId": "agency" }));
        assert!(matches!(result, Err(ConfigError::MissingUrl)));
    }

    #[test]
    fn test_empty_url_is_a_config_error() {
        let result = SourceConfig::from_value(&json!({ "url": "" }));
        assert!(matches!(result, Err(ConfigError::MissingUrl)));
    }

    #[test]
    fn test_url_only_config_has_empty_feed_id() {
        let config = SourceConfig::from_value(&json!({ "url": "http://feed.test/rt" })).unwrap();
        assert_eq!(config.url(), "http://feed.test/rt");
        assert_eq!(config.feed_id(), "");
    }

    #[test]
    fn test_feed_id_is_kept_verbatim() {
        let config =
            SourceConfig::from_value(&json!({ "url": "http://feed.test/rt", "feedId": "nyct" }))
                .unwrap();
        assert_eq!(config.feed_id(), "nyct");
    }

    #[test]
    fn test_non_object_document_is_malformed() {
        let result = SourceConfig::from_value(&json!("just a string"));
        assert!(matches!(result, Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn test_api_key_header_config() {
        let config = SourceConfig::from_value(&json!({
            "url": "http://feed.test/rt",
            "apiKey": "secret",
            "apiKeyHeader": "x-api-key"
        }))
        .unwrap();
        // Building the client validates the header name.
        assert!(config.build_client(BasicClient::new()).is_ok());
    }

    #[test]
    fn test_api_key_without_placement_is_rejected() {
        let result = SourceConfig::from_value(&json!({
            "url": "http://feed.test/rt",
            "apiKey": "secret"
        }));
        assert!(matches!(result, Err(ConfigError::ApiKey(_))));
    }

    #[test]
    fn test_conflicting_api_key_placements_are_rejected() {
        let result = SourceConfig::from_value(&json!({
            "url": "http://feed.test/rt",
            "apiKey": "secret",
            "apiKeyHeader": "x-api-key",
            "apiKeyParamName": "api_key"
        }));
        assert!(matches!(result, Err(ConfigError::ApiKey(_))));
    }

    #[test]
    fn test_invalid_header_name_fails_at_build() {
        let config = SourceConfig::from_value(&json!({
            "url": "http://feed.test/rt",
            "apiKey": "secret",
            "apiKeyHeader": "not a header\n"
        }))
        .unwrap();
        let result = config.build_client(BasicClient::new());
        assert!(matches!(result, Err(ConfigError::ApiKey(_))));
    }
}
