// src/models/mod.rs

//! Domain models for the relay.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod feed;
mod pipeline;

// Re-export all public types
pub use config::{Config, FeedSettings, PipelineConfig, SourceConfig, StorageConfig};
pub use feed::{
    FeedDocument, FeedItem, RSS_DATE_FORMAT, RawSourceEntry, format_rss_date, parse_rss_date,
};
pub use pipeline::{AliasSummary, FlowSummary, PipelineInstance};
