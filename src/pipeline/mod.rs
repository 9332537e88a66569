//! Relay run: deduplication, merge and orchestration.
//!
//! - `dedup`: which source entries are new against the ledger
//! - `merge`: prepend-only updates of the ledger and public feed
//! - `orchestrator`: one full run, `run_relay`

pub mod dedup;
pub mod merge;
pub mod orchestrator;

pub use orchestrator::{Collaborators, OutcomeSummary, RunOutcome, run_relay, run_relay_at};
