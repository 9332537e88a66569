// src/pipeline/orchestrator.rs

//! One relay run: fetch, dedup, offer one entry to the flow, merge.
//!
//! The ledger is persisted before the flow is touched, so an entry is never
//! offered twice even when provisioning or invocation fails afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::flow::{FailureReason, FlowInvoker, FlowRegistry, PipelineOutcome, Provisioner, interpret};
use crate::models::Config;
use crate::pipeline::{dedup, merge};
use crate::services::{SecretProvider, SourceFeed};
use crate::storage::{BlobStore, FeedStore};

/// External collaborators of a run.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub store: &'a dyn BlobStore,
    pub secrets: &'a dyn SecretProvider,
    pub source: &'a dyn SourceFeed,
    pub registry: &'a dyn FlowRegistry,
    pub invoker: &'a dyn FlowInvoker,
}

/// What happened to the entry offered this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeSummary {
    Accepted { guid: String },
    Dropped,
    Failed { reason: FailureReason },
}

/// Report of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every source entry is already in the ledger; nothing was written.
    NoNewEntries,
    /// One entry was recorded and offered to the flow.
    Processed {
        /// Source id of the offered entry
        guid: String,
        /// New entries left for later runs
        pending: usize,
        outcome: OutcomeSummary,
    },
}

/// Run once, stamping documents with the current time.
pub async fn run_relay(config: &Config, deps: Collaborators<'_>) -> Result<RunOutcome> {
    run_relay_at(config, deps, Utc::now()).await
}

/// Run once with an explicit clock.
pub async fn run_relay_at(
    config: &Config,
    deps: Collaborators<'_>,
    now: DateTime<Utc>,
) -> Result<RunOutcome> {
    let storage = &config.storage;
    let feeds = FeedStore::new(deps.store, &config.feed);

    let mut ledger = feeds.load(&storage.processed_key).await?;
    let mut public = feeds.load(&storage.public_key).await?;

    let url = deps.secrets.feed_url(&config.source.secret_name).await?;
    let entries = deps.source.fetch(&url).await?;
    let fresh = dedup::new_entries(&ledger, &entries);

    let Some((&entry, rest)) = fresh.split_first() else {
        log::info!("No new entries among {} source entries", entries.len());
        return Ok(RunOutcome::NoNewEntries);
    };
    log::info!(
        "{} new entries, offering {} ({})",
        fresh.len(),
        entry.id,
        entry.title
    );

    merge::record_offered(&mut ledger, entry, now);
    feeds.save(&storage.processed_key, &ledger).await?;

    let instance = Provisioner::new(deps.registry, &config.pipeline)
        .ensure_pipeline()
        .await
        .inspect_err(|e| log::error!("Provisioning failed [{}]: {e}", e.category()))?;

    let invocation = deps
        .invoker
        .invoke(&instance, &entry.digest())
        .await
        .inspect_err(|e| log::error!("Flow invocation failed [{}]: {e}", e.category()))?;

    let outcome = match interpret(&invocation, entry, config.pipeline.max_summary_words, now) {
        PipelineOutcome::Accepted(item) => {
            let guid = item.guid.clone();
            if merge::publish(&mut public, item, now) {
                feeds.save(&storage.public_key, &public).await?;
                log::info!("Published {guid} for source entry {}", entry.id);
                OutcomeSummary::Accepted { guid }
            } else {
                let reason =
                    FailureReason::MalformedDocument(format!("guid {guid} is already published"));
                log::warn!("Not publishing {}: {reason}", entry.id);
                OutcomeSummary::Failed { reason }
            }
        }
        PipelineOutcome::Dropped => {
            log::info!("Entry {} is out of scope, dropped", entry.id);
            OutcomeSummary::Dropped
        }
        PipelineOutcome::Failed(FailureReason::MalformedClassification(token)) => {
            log::error!("Entry {} got an unusable classification {token:?}", entry.id);
            return Err(AppError::MalformedClassification(token));
        }
        PipelineOutcome::Failed(reason) => {
            log::warn!("Entry {} not published: {reason}", entry.id);
            OutcomeSummary::Failed { reason }
        }
    };

    Ok(RunOutcome::Processed {
        guid: entry.id.clone(),
        pending: rest.len(),
        outcome,
    })
}
