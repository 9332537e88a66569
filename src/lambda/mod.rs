// src/lambda/mod.rs

//! AWS Lambda handlers.
//!
//! `handler` runs one relay pass on a schedule; `custom_resource` seeds the
//! bucket when the stack is created or updated.

pub mod custom_resource;

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::flow::bedrock::BedrockFlows;
use crate::models::Config;
use crate::pipeline::{Collaborators, RunOutcome, run_relay};
use crate::services::{HttpSourceFeed, SecretsManagerProvider};
use crate::storage::S3BlobStore;
use crate::utils::aws::load_sdk_config;

/// Scheduled entry point. The payload is ignored.
#[instrument(skip(event), fields(request_id = %event.context.request_id))]
pub async fn handler(event: LambdaEvent<Value>) -> std::result::Result<RunOutcome, LambdaError> {
    let start = std::time::Instant::now();

    match run_from_env().await {
        Ok(outcome) => {
            info!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Relay run finished: {:?}", outcome
            );
            Ok(outcome)
        }
        Err(e) => {
            error!(category = e.category(), "Relay run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Configuration for the Lambda environment: defaults plus env overrides.
pub fn lambda_config() -> Result<Config> {
    let mut config = Config::default();
    config.apply_env();
    config.validate()?;
    Ok(config)
}

/// Build AWS collaborators from the environment and run once.
pub async fn run_from_env() -> Result<RunOutcome> {
    let config = lambda_config()?;
    let sdk = load_sdk_config().await;

    let store = S3BlobStore::from_sdk_config(&sdk, &config.storage.bucket)?;
    let secrets = SecretsManagerProvider::from_sdk_config(&sdk);
    let source = HttpSourceFeed::from_config(&config.source)?;
    let flows = BedrockFlows::from_sdk_config(&sdk, &config.pipeline);

    let deps = Collaborators {
        store: &store,
        secrets: &secrets,
        source: &source,
        registry: &flows,
        invoker: &flows,
    };
    run_relay(&config, deps).await
}
