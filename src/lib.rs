//! insightgate library
//!
//! Rate-limited caching of costly insight fetches, the formatters that turn raw
//! producer output into insights, and the pieces the CLI is built from.

pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod fetch;
pub mod format;
