// src/lib.rs

//! feed-relay library
//!
//! Relays a source news feed into two S3-hosted RSS documents: a ledger of
//! every entry ever offered, and a public feed of entries a two-stage LLM flow
//! classified as in scope and rewrote.

pub mod error;
pub mod flow;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod seed;
pub mod services;
pub mod storage;
pub mod utils;
