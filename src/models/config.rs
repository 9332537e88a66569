//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Channel metadata written into both stored documents
    #[serde(default)]
    pub feed: FeedSettings,

    /// Object store keys and locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source feed retrieval
    #[serde(default)]
    pub source: SourceConfig,

    /// Classification/transformation flow settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override values from the Lambda environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = var("BUCKET_NAME") {
            self.storage.bucket = bucket;
        }
        if let Some(secret) = var("FEED_URL_SECRET_NAME") {
            self.source.secret_name = secret;
        }
        if let Some(role) = var("FLOW_EXECUTION_ROLE_ARN") {
            self.pipeline.execution_role_arn = role;
        }
        if let Some(model) = var("FLOW_MODEL_ID") {
            self.pipeline.model_id = model;
        }
        if let Some(timeout) = var("SOURCE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.source.timeout_secs = secs;
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.storage.public_key.trim().is_empty() {
            return Err(AppError::validation("storage.public_key is empty"));
        }
        if self.storage.processed_key.trim().is_empty() {
            return Err(AppError::validation("storage.processed_key is empty"));
        }
        if self.storage.public_key == self.storage.processed_key {
            return Err(AppError::validation(
                "storage.public_key and storage.processed_key must differ",
            ));
        }
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        self.pipeline.validate()
    }
}

/// Channel-level metadata of the stored documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "defaults::feed_title")]
    pub title: String,

    #[serde(default = "defaults::feed_link")]
    pub link: String,

    #[serde(default = "defaults::feed_description")]
    pub description: String,

    #[serde(default = "defaults::feed_language")]
    pub language: String,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            title: defaults::feed_title(),
            link: defaults::feed_link(),
            description: defaults::feed_description(),
            language: defaults::feed_language(),
        }
    }
}

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// S3 bucket holding both documents
    #[serde(default)]
    pub bucket: String,

    /// Key of the public output feed
    #[serde(default = "defaults::public_key")]
    pub public_key: String,

    /// Key of the processed-entries ledger
    #[serde(default = "defaults::processed_key")]
    pub processed_key: String,

    /// Directory used by the local store
    #[serde(default = "defaults::local_root")]
    pub local_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            public_key: defaults::public_key(),
            processed_key: defaults::processed_key(),
            local_root: defaults::local_root(),
        }
    }
}

/// Source feed retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name of the secret holding `FEED_URL`
    #[serde(default)]
    pub secret_name: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            secret_name: String::new(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Flow provisioning and prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name prefix identifying flows owned by the relay
    #[serde(default = "defaults::name_prefix")]
    pub name_prefix: String,

    /// Alias resolved on every run
    #[serde(default = "defaults::alias_name")]
    pub alias_name: String,

    #[serde(default = "defaults::flow_description")]
    pub description: String,

    /// Role the flow service assumes when running the flow
    #[serde(default)]
    pub execution_role_arn: String,

    /// Model used by both prompt nodes
    #[serde(default = "defaults::model_id")]
    pub model_id: String,

    #[serde(default = "defaults::temperature")]
    pub temperature: f32,

    /// Keywords that put an entry in scope
    #[serde(default = "defaults::scope_keywords")]
    pub scope_keywords: Vec<String>,

    /// Language of the produced title and summary
    #[serde(default = "defaults::target_language")]
    pub target_language: String,

    /// Ceiling on the summary length, in words
    #[serde(default = "defaults::max_summary_words")]
    pub max_summary_words: usize,

    /// Status polls while a new flow is being prepared
    #[serde(default = "defaults::prepare_poll_attempts")]
    pub prepare_poll_attempts: u32,

    #[serde(default = "defaults::prepare_poll_interval_ms")]
    pub prepare_poll_interval_ms: u64,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name_prefix.trim().is_empty() {
            return Err(AppError::validation("pipeline.name_prefix is empty"));
        }
        if self.alias_name.trim().is_empty() {
            return Err(AppError::validation("pipeline.alias_name is empty"));
        }
        if self.model_id.trim().is_empty() {
            return Err(AppError::validation("pipeline.model_id is empty"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(AppError::validation(
                "pipeline.temperature must be within [0, 1]",
            ));
        }
        if self.scope_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(AppError::validation("No scope keywords defined"));
        }
        if self.max_summary_words == 0 {
            return Err(AppError::validation(
                "pipeline.max_summary_words must be > 0",
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name_prefix: defaults::name_prefix(),
            alias_name: defaults::alias_name(),
            description: defaults::flow_description(),
            execution_role_arn: String::new(),
            model_id: defaults::model_id(),
            temperature: defaults::temperature(),
            scope_keywords: defaults::scope_keywords(),
            target_language: defaults::target_language(),
            max_summary_words: defaults::max_summary_words(),
            prepare_poll_attempts: defaults::prepare_poll_attempts(),
            prepare_poll_interval_ms: defaults::prepare_poll_interval_ms(),
        }
    }
}

mod defaults {
    // Feed defaults
    pub fn feed_title() -> String {
        "AWS NEWS RSS".into()
    }
    pub fn feed_link() -> String {
        "http://www.awsnews.ai".into()
    }
    pub fn feed_description() -> String {
        "RSS feed for AWS News".into()
    }
    pub fn feed_language() -> String {
        "fr-FR".into()
    }

    // Storage defaults
    pub fn public_key() -> String {
        "awsnews.xml".into()
    }
    pub fn processed_key() -> String {
        "processed.xml".into()
    }
    pub fn local_root() -> String {
        "storage".into()
    }

    // Source defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; feed-relay/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Pipeline defaults
    pub fn name_prefix() -> String {
        "AWSNews_".into()
    }
    pub fn alias_name() -> String {
        "latest".into()
    }
    pub fn flow_description() -> String {
        "A flow that creates a personalised RSS.".into()
    }
    pub fn model_id() -> String {
        "anthropic.claude-3-sonnet-20240229-v1:0".into()
    }
    pub fn temperature() -> f32 {
        0.8
    }
    pub fn scope_keywords() -> Vec<String> {
        [
            "ECS",
            "API Gateway",
            "Lambda",
            "VPC Endpoints",
            "S3",
            "Cognito",
            "ALB",
            "WAF",
            "SSM",
            "Bedrock",
            "RDS",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn target_language() -> String {
        "French".into()
    }
    pub fn max_summary_words() -> usize {
        150
    }
    pub fn prepare_poll_attempts() -> u32 {
        30
    }
    pub fn prepare_poll_interval_ms() -> u64 {
        1000
    }
}
