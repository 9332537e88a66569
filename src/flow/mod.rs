// src/flow/mod.rs

//! The two-stage classification/transformation flow.
//!
//! - `topology`: the fixed node graph, as data
//! - `client`: registry and invoker traits at the flow service boundary
//! - `provisioner`: keeps exactly one live flow per name prefix
//! - `outcome`: maps a finished invocation onto accepted/dropped/failed
//! - `bedrock`: Amazon Bedrock Flows implementation of the boundary

#[cfg(feature = "aws")]
pub mod bedrock;
pub mod client;
pub mod outcome;
pub mod provisioner;
#[cfg(test)]
pub(crate) mod testing;
pub mod topology;

pub use client::{FlowInvoker, FlowRegistry};
pub use outcome::{
    COMPLETION_SUCCESS, Classification, FailureReason, FlowInvocation, FlowOutputDocument,
    PipelineOutcome, interpret,
};
pub use provisioner::{CleanupReport, Provisioner};
pub use topology::{FlowDefinition, pipeline_definition};
