//! AWS Lambda entry point for the scheduled relay run.
//!
//! Deploy with `cargo lambda build --release --features lambda`.

use lambda_runtime::{Error as LambdaError, service_fn};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("feed-relay Lambda starting...");
    lambda_runtime::run(service_fn(feed_relay::lambda::handler)).await
}
