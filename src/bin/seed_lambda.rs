//! AWS Lambda entry point for the stack seeding custom resource.

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("feed-relay seed Lambda starting...");
    lambda_runtime::run(service_fn(feed_relay::lambda::custom_resource::handler)).await
}
