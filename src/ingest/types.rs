// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::store::Record;

/// One external source, and the table its records land in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    News,
    Weather,
    Currency,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::News, Service::Weather, Service::Currency];

    pub fn as_str(&self) -> &'static str {
        match self {
            Service::News => "news",
            Service::Weather => "weather",
            Service::Currency => "currency",
        }
    }

    pub fn table(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces normalized records from one external source.
///
/// `Err` means the source is broken (transport, decode); `Ok(vec![])` means
/// the source answered but had nothing to report.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Record>, FetchError>;
    fn service(&self) -> Service;
    fn name(&self) -> &'static str {
        self.service().as_str()
    }
}
