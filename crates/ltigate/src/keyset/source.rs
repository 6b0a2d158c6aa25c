use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use reqwest::header::ACCEPT;
use tracing::debug;

use super::KeySetError;

/// Where key sets come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<JwkSet, KeySetError>;
}

/// Fetches key sets over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ltigate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeySetError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self, url: &str) -> Result<JwkSet, KeySetError> {
        debug!(url, "Fetching platform key set");
        let unreachable = |e: reqwest::Error| KeySetError::Unreachable {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(unreachable)?;
        let key_set: JwkSet =
            serde_json::from_slice(&body).map_err(|e| KeySetError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if key_set.keys.is_empty() {
            return Err(KeySetError::Malformed {
                url: url.to_string(),
                reason: "key set has no keys".to_string(),
            });
        }
        Ok(key_set)
    }
}

/// Fixed, in-process key sets. Useful for tests and for platforms whose keys
/// are provisioned out of band.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    key_sets: HashMap<String, JwkSet>,
}

impl StaticKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_key_set(mut self, url: impl Into<String>, key_set: JwkSet) -> Self {
        self.key_sets.insert(url.into(), key_set);
        self
    }
}

#[async_trait]
impl KeySetSource for StaticKeySource {
    async fn fetch(&self, url: &str) -> Result<JwkSet, KeySetError> {
        self.key_sets
            .get(url)
            .cloned()
            .ok_or_else(|| KeySetError::Unknown {
                url: url.to_string(),
            })
    }
}
