// src/services/secrets.rs

//! Secret retrieval for the source feed URL.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AppError, Result};

/// Trait for secret providers.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Resolve the source feed URL stored under `secret_name`.
    async fn feed_url(&self, secret_name: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct FeedSecret {
    #[serde(rename = "FEED_URL")]
    feed_url: String,
}

/// Extract `FEED_URL` from a JSON secret payload.
pub fn feed_url_from_secret(payload: &[u8]) -> Result<String> {
    let secret: FeedSecret = serde_json::from_slice(payload)
        .map_err(|e| AppError::secret(format!("secret payload has no usable FEED_URL: {e}")))?;
    let url = url::Url::parse(secret.feed_url.trim())?;
    Ok(url.to_string())
}

/// Fixed feed URL, used when running outside AWS.
pub struct StaticSecretProvider {
    feed_url: String,
}

impl StaticSecretProvider {
    pub fn new(feed_url: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn feed_url(&self, _secret_name: &str) -> Result<String> {
        Ok(self.feed_url.clone())
    }
}

#[cfg(feature = "aws")]
pub use self::aws::SecretsManagerProvider;

#[cfg(feature = "aws")]
mod aws {
    use async_trait::async_trait;
    use aws_sdk_secretsmanager::Client;

    use super::{SecretProvider, feed_url_from_secret};
    use crate::error::{AppError, Result};

    /// AWS Secrets Manager backed provider.
    pub struct SecretsManagerProvider {
        client: Client,
    }

    impl SecretsManagerProvider {
        pub fn new(client: Client) -> Self {
            Self { client }
        }

        pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
            Self::new(Client::new(config))
        }
    }

    #[async_trait]
    impl SecretProvider for SecretsManagerProvider {
        async fn feed_url(&self, secret_name: &str) -> Result<String> {
            if secret_name.trim().is_empty() {
                return Err(AppError::config(
                    "source.secret_name is empty (set FEED_URL_SECRET_NAME)",
                ));
            }

            let output = self
                .client
                .get_secret_value()
                .secret_id(secret_name)
                .send()
                .await
                .map_err(|e| {
                    AppError::secret(format!("{secret_name}: {}", e.into_service_error()))
                })?;

            if let Some(text) = output.secret_string() {
                feed_url_from_secret(text.as_bytes())
            } else if let Some(blob) = output.secret_binary() {
                feed_url_from_secret(blob.as_ref())
            } else {
                Err(AppError::secret(format!("{secret_name}: secret has no value")))
            }
        }
    }
}
