// src/utils/aws.rs

//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, SdkConfig};

/// Load region and credentials from the default provider chain.
pub async fn load_sdk_config() -> SdkConfig {
    aws_config::load_defaults(BehaviorVersion::latest()).await
}
