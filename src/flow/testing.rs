// src/flow/testing.rs

//! In-memory flow service doubles.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::flow::provisioner::TEST_ALIAS_ID;
use crate::flow::{FlowDefinition, FlowInvocation, FlowInvoker, FlowRegistry};
use crate::models::{AliasSummary, FlowSummary, PipelineInstance};

struct MemoryFlow {
    id: String,
    name: String,
    updated_at: DateTime<Utc>,
    prepared: bool,
    versions: Vec<String>,
    aliases: Vec<AliasSummary>,
}

#[derive(Default)]
struct RegistryState {
    flows: Vec<MemoryFlow>,
    calls: Vec<String>,
    next_id: usize,
    race_alias: bool,
    fail_creation: bool,
    undeletable: Vec<String>,
}

impl RegistryState {
    fn flow(&mut self, id: &str) -> Result<&mut MemoryFlow> {
        self.flows
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::FlowNotFound(format!("flow {id}")))
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

/// Flow registry backed by a vector, recording every call.
#[derive(Default)]
pub struct MemoryRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryRegistry {
    /// Seed a flow; aliases are `(name, id)` pairs. Returns the flow id.
    pub fn add_flow(
        &self,
        name: &str,
        updated_secs: i64,
        versions: &[&str],
        aliases: &[(&str, &str)],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id("FLOW");
        state.flows.push(MemoryFlow {
            id: id.clone(),
            name: name.into(),
            updated_at: Utc.timestamp_opt(updated_secs, 0).unwrap(),
            prepared: false,
            versions: versions.iter().map(|v| v.to_string()).collect(),
            aliases: aliases
                .iter()
                .map(|(name, id)| AliasSummary {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        });
        id
    }

    /// The next alias creation finds the name taken by a concurrent writer.
    pub fn race_alias_creation(&self) {
        self.state.lock().unwrap().race_alias = true;
    }

    pub fn fail_creation(&self) {
        self.state.lock().unwrap().fail_creation = true;
    }

    pub fn fail_deletion_of(&self, flow_id: &str) {
        self.state.lock().unwrap().undeletable.push(flow_id.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn flow_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.flows.iter().map(|f| f.name.clone()).collect()
    }

    pub fn alias_names(&self, flow_id: &str) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let flow = state.flow(flow_id).unwrap();
        flow.aliases.iter().map(|a| a.name.clone()).collect()
    }

    pub fn versions(&self, flow_id: &str) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        state.flow(flow_id).unwrap().versions.clone()
    }
}

#[async_trait]
impl FlowRegistry for MemoryRegistry {
    async fn list_flows(&self) -> Result<Vec<FlowSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("list_flows".into());
        Ok(state
            .flows
            .iter()
            .map(|f| FlowSummary {
                id: f.id.clone(),
                name: f.name.clone(),
                updated_at: Some(f.updated_at),
            })
            .collect())
    }

    async fn list_aliases(&self, flow_id: &str) -> Result<Vec<AliasSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("list_aliases {flow_id}"));
        Ok(state.flow(flow_id)?.aliases.clone())
    }

    async fn latest_version(&self, flow_id: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("latest_version {flow_id}"));
        let flow = state.flow(flow_id)?;
        Ok(flow
            .versions
            .iter()
            .filter_map(|v| v.parse::<u32>().ok())
            .max()
            .map(|v| v.to_string()))
    }

    async fn create_flow(
        &self,
        name: &str,
        _description: &str,
        definition: &FlowDefinition,
    ) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_flow {name}"));
        if state.fail_creation {
            return Err(AppError::FlowValidation("execution role is invalid".into()));
        }
        definition.validate()?;

        let id = state.next_id("FLOW");
        state.flows.push(MemoryFlow {
            id: id.clone(),
            name: name.into(),
            updated_at: Utc::now(),
            prepared: false,
            versions: Vec::new(),
            aliases: vec![AliasSummary {
                id: TEST_ALIAS_ID.into(),
                name: TEST_ALIAS_ID.into(),
            }],
        });
        Ok(id)
    }

    async fn prepare_flow(&self, flow_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("prepare_flow {flow_id}"));
        state.flow(flow_id)?.prepared = true;
        Ok(())
    }

    async fn create_version(&self, flow_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_version {flow_id}"));
        let flow = state.flow(flow_id)?;
        if !flow.prepared {
            return Err(AppError::FlowValidation(format!("{flow_id} is not prepared")));
        }
        let next = flow
            .versions
            .iter()
            .filter_map(|v| v.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        flow.versions.push(next.to_string());
        Ok(next.to_string())
    }

    async fn create_alias(&self, flow_id: &str, name: &str, version: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create_alias {flow_id} {name} {version}"));
        let raced = std::mem::take(&mut state.race_alias);
        let alias_id = state.next_id("ALIAS");
        let flow = state.flow(flow_id)?;

        if raced {
            flow.aliases.push(AliasSummary {
                id: "RACED".into(),
                name: name.into(),
            });
        }
        if flow.aliases.iter().any(|a| a.name == name) {
            return Err(AppError::AliasConflict {
                flow_id: flow_id.into(),
            });
        }

        flow.aliases.push(AliasSummary {
            id: alias_id.clone(),
            name: name.into(),
        });
        Ok(alias_id)
    }

    async fn delete_alias(&self, flow_id: &str, alias_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_alias {flow_id} {alias_id}"));
        if alias_id == TEST_ALIAS_ID {
            return Err(AppError::FlowValidation("the test alias is reserved".into()));
        }
        state.flow(flow_id)?.aliases.retain(|a| a.id != alias_id);
        Ok(())
    }

    async fn delete_flow(&self, flow_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete_flow {flow_id}"));
        if state.undeletable.iter().any(|id| id == flow_id) {
            return Err(AppError::flow(format!("access denied deleting {flow_id}")));
        }
        state.flow(flow_id)?;
        state.flows.retain(|f| f.id != flow_id);
        Ok(())
    }
}

/// Invoker answering from a queue of canned results.
pub struct ScriptedInvoker {
    responses: Mutex<VecDeque<Result<FlowInvocation>>>,
    received: Mutex<Vec<(PipelineInstance, String)>>,
}

impl ScriptedInvoker {
    pub fn new(responses: Vec<Result<FlowInvocation>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// `(instance, document)` of every invocation so far.
    pub fn received(&self) -> Vec<(PipelineInstance, String)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowInvoker for ScriptedInvoker {
    async fn invoke(&self, instance: &PipelineInstance, document: &str) -> Result<FlowInvocation> {
        self.received
            .lock()
            .unwrap()
            .push((instance.clone(), document.to_string()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AppError::flow("no scripted response left")))
    }
}
