// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod connections;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod retention;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::connections::{ConnectionManager, SchemaMode};
pub use crate::ingest::types::{Fetcher, Service};
pub use crate::notify::{EmailNotifier, Notifier};
pub use crate::pipeline::{run_once, RunOptions, RunSummary};
