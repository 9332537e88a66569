// src/flow/client.rs

//! Boundary to the flow service.
//!
//! Split in two: the registry manages flow definitions, versions and aliases;
//! the invoker runs a provisioned flow on one input document.

use async_trait::async_trait;

use crate::error::Result;
use crate::flow::{FlowDefinition, FlowInvocation};
use crate::models::{AliasSummary, FlowSummary, PipelineInstance};

/// Flow, version and alias management.
#[async_trait]
pub trait FlowRegistry: Send + Sync {
    async fn list_flows(&self) -> Result<Vec<FlowSummary>>;

    async fn list_aliases(&self, flow_id: &str) -> Result<Vec<AliasSummary>>;

    /// Highest numbered (immutable) version, if the flow has any.
    async fn latest_version(&self, flow_id: &str) -> Result<Option<String>>;

    /// Register a new flow; returns its id.
    async fn create_flow(
        &self,
        name: &str,
        description: &str,
        definition: &FlowDefinition,
    ) -> Result<String>;

    /// Make the working draft runnable.
    async fn prepare_flow(&self, flow_id: &str) -> Result<()>;

    /// Snapshot the prepared draft; returns the version number.
    async fn create_version(&self, flow_id: &str) -> Result<String>;

    /// Bind `name` to `version`; returns the alias id. Fails with
    /// `AppError::AliasConflict` when the name is taken.
    async fn create_alias(&self, flow_id: &str, name: &str, version: &str) -> Result<String>;

    async fn delete_alias(&self, flow_id: &str, alias_id: &str) -> Result<()>;

    async fn delete_flow(&self, flow_id: &str) -> Result<()>;
}

/// Flow execution.
#[async_trait]
pub trait FlowInvoker: Send + Sync {
    /// Run the flow on `document` and collect its completion and outputs.
    async fn invoke(&self, instance: &PipelineInstance, document: &str) -> Result<FlowInvocation>;
}
