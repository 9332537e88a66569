//! Flow service records shared by the provisioner and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provisioned flow, resolved to the alias that gets invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineInstance {
    pub id: String,
    pub alias_id: String,
    pub name: String,
}

/// Listing entry for a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Listing entry for a flow alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSummary {
    pub id: String,
    pub name: String,
}
