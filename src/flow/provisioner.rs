// src/flow/provisioner.rs

//! Idempotent provisioning of the classification flow.
//!
//! Flows are found by name prefix, never by a stored id. The common path
//! reuses the most recently updated match; creation first clears out every
//! other flow carrying the prefix so at most one stays live.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::flow::FlowRegistry;
use crate::flow::topology::pipeline_definition;
use crate::models::{FlowSummary, PipelineConfig, PipelineInstance};

/// Built-in draft alias every flow carries; it cannot be deleted.
pub const TEST_ALIAS_ID: &str = "TSTALIASID";

/// Result of a best-effort cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_aliases: Vec<String>,
    pub deleted_flows: Vec<String>,
    pub failures: Vec<String>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_failure(&mut self, what: String, err: &AppError) {
        log::warn!("Cleanup: failed to delete {what}: {err}");
        self.failures.push(format!("{what}: {err}"));
    }
}

/// Resolves or creates the single live flow instance.
pub struct Provisioner<'a> {
    registry: &'a dyn FlowRegistry,
    config: &'a PipelineConfig,
}

impl<'a> Provisioner<'a> {
    pub fn new(registry: &'a dyn FlowRegistry, config: &'a PipelineConfig) -> Self {
        Self { registry, config }
    }

    /// Return the live instance, creating it when no flow carries the prefix.
    pub async fn ensure_pipeline(&self) -> Result<PipelineInstance> {
        let candidates = self.candidates().await?;

        if let Some(flow) = candidates.first() {
            if candidates.len() > 1 {
                log::warn!(
                    "{} flows match prefix {}, using {}",
                    candidates.len(),
                    self.config.name_prefix,
                    flow.name
                );
            }
            let alias_id = self.resolve_alias(&flow.id).await?;
            log::info!("Reusing flow {} ({}) alias {}", flow.name, flow.id, alias_id);
            return Ok(PipelineInstance {
                id: flow.id.clone(),
                alias_id,
                name: flow.name.clone(),
            });
        }

        self.create(&candidates).await
    }

    /// Delete every matching flow and create a fresh one.
    pub async fn recreate(&self) -> Result<PipelineInstance> {
        let candidates = self.candidates().await?;
        self.create(&candidates).await
    }

    /// Delete the given flows, aliases first. Never fails; problems are
    /// collected in the report.
    pub async fn cleanup(&self, stale: &[FlowSummary]) -> CleanupReport {
        let mut report = CleanupReport::default();

        for flow in stale {
            let aliases = match self.registry.list_aliases(&flow.id).await {
                Ok(aliases) => aliases,
                Err(e) => {
                    report.record_failure(format!("aliases of flow {}", flow.id), &e);
                    Vec::new()
                }
            };

            for alias in aliases.iter().filter(|a| a.id != TEST_ALIAS_ID) {
                match self.registry.delete_alias(&flow.id, &alias.id).await {
                    Ok(()) => report.deleted_aliases.push(alias.id.clone()),
                    Err(e) => {
                        report.record_failure(format!("alias {} of flow {}", alias.id, flow.id), &e)
                    }
                }
            }

            match self.registry.delete_flow(&flow.id).await {
                Ok(()) => {
                    log::info!("Deleted stale flow {} ({})", flow.name, flow.id);
                    report.deleted_flows.push(flow.id.clone());
                }
                Err(e) => report.record_failure(format!("flow {}", flow.id), &e),
            }
        }

        report
    }

    /// Flows carrying the prefix, most recently updated first.
    async fn candidates(&self) -> Result<Vec<FlowSummary>> {
        let mut flows: Vec<FlowSummary> = self
            .registry
            .list_flows()
            .await?
            .into_iter()
            .filter(|f| f.name.starts_with(&self.config.name_prefix))
            .collect();
        flows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(flows)
    }

    async fn create(&self, stale: &[FlowSummary]) -> Result<PipelineInstance> {
        let definition = pipeline_definition(self.config);
        definition.validate()?;

        if !stale.is_empty() {
            let report = self.cleanup(stale).await;
            if !report.is_clean() {
                log::warn!(
                    "Cleanup left {} failures, continuing with creation",
                    report.failures.len()
                );
            }
        }

        let name = instance_name(&self.config.name_prefix, random_suffix(), Utc::now());
        let id = self
            .registry
            .create_flow(&name, &self.config.description, &definition)
            .await?;
        log::info!("Created flow {name} ({id})");

        self.registry.prepare_flow(&id).await?;
        let version = self.registry.create_version(&id).await?;
        let alias_id = self.bind_alias(&id, &version).await?;

        Ok(PipelineInstance { id, alias_id, name })
    }

    async fn resolve_alias(&self, flow_id: &str) -> Result<String> {
        if let Some(alias_id) = self.find_alias(flow_id).await? {
            return Ok(alias_id);
        }

        let version = match self.registry.latest_version(flow_id).await? {
            Some(version) => version,
            None => {
                log::info!("Flow {flow_id} has no version yet, preparing one");
                self.registry.prepare_flow(flow_id).await?;
                self.registry.create_version(flow_id).await?
            }
        };

        self.bind_alias(flow_id, &version).await
    }

    async fn bind_alias(&self, flow_id: &str, version: &str) -> Result<String> {
        let name = &self.config.alias_name;
        match self.registry.create_alias(flow_id, name, version).await {
            Ok(alias_id) => {
                log::info!("Bound alias {name} ({alias_id}) to version {version}");
                Ok(alias_id)
            }
            Err(AppError::AliasConflict { .. }) => {
                log::warn!("Alias {name} already exists on flow {flow_id}, reusing it");
                self.find_alias(flow_id).await?.ok_or_else(|| {
                    AppError::FlowNotFound(format!("alias {name} on flow {flow_id}"))
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn find_alias(&self, flow_id: &str) -> Result<Option<String>> {
        Ok(self
            .registry
            .list_aliases(flow_id)
            .await?
            .into_iter()
            .find(|a| a.name == self.config.alias_name)
            .map(|a| a.id))
    }
}

/// Four-digit suffix distinguishing instances created in the same second.
fn random_suffix() -> u16 {
    // A v4 uuid carries 122 random bits; fold them into 1000..=9999.
    four_digits(Uuid::new_v4().as_u128())
}

fn four_digits(entropy: u128) -> u16 {
    1000 + (entropy % 9000) as u16
}

fn instance_name(prefix: &str, suffix: u16, now: DateTime<Utc>) -> String {
    format!("{prefix}{suffix}_{}", now.timestamp())
}
