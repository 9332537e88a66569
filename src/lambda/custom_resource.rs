// src/lambda/custom_resource.rs

//! CloudFormation custom resource that seeds the bucket.

use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::seed::seed_store;
use crate::storage::{BlobStore, S3BlobStore};
use crate::utils::aws::load_sdk_config;
use crate::utils::http;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    #[serde(default)]
    pub dest_bucket: Option<String>,
}

/// Lifecycle request sent by CloudFormation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceEvent {
    pub request_type: RequestType,
    #[serde(rename = "ResponseURL")]
    pub response_url: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body PUT back to the pre-signed response URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomResourceResponse {
    pub status: ResponseStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub data: Map<String, Value>,
}

impl CustomResourceResponse {
    pub fn new(event: &CustomResourceEvent, log_stream: &str, outcome: &Result<()>) -> Self {
        let (status, reason) = match outcome {
            Ok(()) => (
                ResponseStatus::Success,
                format!("See the details in CloudWatch Log Stream: {log_stream}"),
            ),
            Err(e) => (ResponseStatus::Failed, e.to_string()),
        };

        Self {
            status,
            reason,
            physical_resource_id: event
                .physical_resource_id
                .clone()
                .unwrap_or_else(|| log_stream.to_string()),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            data: Map::new(),
        }
    }
}

/// Carry out the request. `open` yields the store for the destination bucket.
pub async fn apply<F>(event: &CustomResourceEvent, open: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<Box<dyn BlobStore>>,
{
    match event.request_type {
        RequestType::Create | RequestType::Update => {
            let bucket = event
                .resource_properties
                .dest_bucket
                .as_deref()
                .filter(|b| !b.trim().is_empty())
                .ok_or_else(|| AppError::config("ResourceProperties.DestBucket is missing"))?;
            info!("Seeding bucket {}", bucket);
            let store = open(bucket)?;
            let written = seed_store(store.as_ref()).await?;
            info!("Seeded {} documents", written.len());
        }
        RequestType::Delete => info!("Delete request, leaving bucket contents in place"),
    }
    Ok(())
}

/// PUT the response document to CloudFormation.
pub async fn send_response(
    client: &reqwest::Client,
    url: &str,
    response: &CustomResourceResponse,
) -> Result<()> {
    client
        .put(url)
        .json(response)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

/// Client for the response PUT, falling back to reqwest defaults.
fn response_client(config: &SourceConfig) -> reqwest::Client {
    http::create_async_client(config).unwrap_or_else(|e| {
        error!("Falling back to a default HTTP client: {}", e);
        reqwest::Client::new()
    })
}

#[instrument(skip(event), fields(request_id = %event.context.request_id))]
pub async fn handler(event: LambdaEvent<CustomResourceEvent>) -> std::result::Result<(), LambdaError> {
    let (request, context) = event.into_parts();
    info!("Received {:?} request", request.request_type);
    let client = response_client(&SourceConfig::default());

    let sdk = load_sdk_config().await;
    let outcome = apply(&request, |bucket| {
        Ok(Box::new(S3BlobStore::from_sdk_config(&sdk, bucket)?) as Box<dyn BlobStore>)
    })
    .await;
    if let Err(e) = &outcome {
        error!(category = e.category(), "Seeding failed: {}", e);
    }

    let response = CustomResourceResponse::new(&request, &context.env_config.log_stream, &outcome);
    send_response(&client, &request.response_url, &response)
        .await
        .inspect_err(|e| error!("Failed to send custom resource response: {}", e))?;
    info!("Responded {:?}", response.status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBlobStore;
    use tempfile::TempDir;

    fn event(request_type: &str, bucket: Option<&str>) -> CustomResourceEvent {
        let mut json = serde_json::json!({
            "RequestType": request_type,
            "ResponseURL": "https://cloudformation-custom-resource-response.s3.amazonaws.com/x",
            "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/news/abc",
            "RequestId": "req-1",
            "LogicalResourceId": "SeedFiles",
            "ResourceType": "Custom::SeedFiles",
            "ResourceProperties": { "ServiceToken": "arn:aws:lambda:eu-west-1:123456789012:function:seed" }
        });
        if let Some(bucket) = bucket {
            json["ResourceProperties"]["DestBucket"] = bucket.into();
        }
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_response_client_survives_bad_config() {
        let config = SourceConfig {
            user_agent: "bad\nagent".into(),
            ..SourceConfig::default()
        };
        assert!(http::create_async_client(&config).is_err());
        let _client = response_client(&config);
    }

    #[tokio::test]
    async fn test_create_seeds_bucket() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let mut opened = None;

        apply(&event("Create", Some("news-bucket")), |bucket| {
            opened = Some(bucket.to_string());
            Ok(Box::new(LocalBlobStore::new(root.join(bucket))) as Box<dyn BlobStore>)
        })
        .await
        .unwrap();

        assert_eq!(opened.as_deref(), Some("news-bucket"));
        for key in ["awsnews.xml", "processed.xml", "testnews.xml"] {
            assert!(tmp.path().join("news-bucket").join(key).exists(), "{key}");
        }
    }

    #[tokio::test]
    async fn test_delete_touches_nothing() {
        let mut opened = false;
        apply(&event("Delete", Some("news-bucket")), |_| {
            opened = true;
            Err(AppError::storage("should not open"))
        })
        .await
        .unwrap();
        assert!(!opened);
    }

    #[tokio::test]
    async fn test_missing_bucket_fails() {
        let err = apply(&event("Update", None), |_| {
            Err(AppError::storage("should not open"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_response_body() {
        let ok = CustomResourceResponse::new(&event("Create", Some("b")), "2024/01/01/[$LATEST]abc", &Ok(()));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["Status"], "SUCCESS");
        assert_eq!(json["PhysicalResourceId"], "2024/01/01/[$LATEST]abc");
        assert_eq!(json["LogicalResourceId"], "SeedFiles");
        assert_eq!(json["RequestId"], "req-1");
        assert!(json["Data"].as_object().unwrap().is_empty());

        let failed = CustomResourceResponse::new(
            &event("Create", Some("b")),
            "stream",
            &Err(AppError::storage("access denied")),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["Status"], "FAILED");
        assert_eq!(json["Reason"], "Storage error: access denied");
    }
}
