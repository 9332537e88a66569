//! Service layer for the relay's external inputs.
//!
//! - Source feed retrieval (`SourceFeed`)
//! - Feed URL secret lookup (`SecretProvider`)

mod secrets;
mod source;

#[cfg(feature = "aws")]
pub use secrets::SecretsManagerProvider;
pub use secrets::{SecretProvider, StaticSecretProvider, feed_url_from_secret};
pub use source::{FileSourceFeed, HttpSourceFeed, SourceFeed, parse_source};
