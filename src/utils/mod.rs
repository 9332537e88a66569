//! Utility functions and helpers.

#[cfg(feature = "aws")]
pub mod aws;
pub mod http;
pub mod text;
