// src/error.rs
//! Error taxonomy for the aggregation run.
//!
//! Every component returns its own error type so callers can tell "no data"
//! apart from "system broken". Only configuration errors that block schema
//! provisioning are allowed to abort a whole run; everything else is logged
//! and the dependent step is skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be located, read, parsed, or is incomplete.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("section '{section}' not found in config")]
    Missing { section: &'static str },

    #[error("key '{key}' missing in config section '{section}'")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    #[error("reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("'{section}.{key}' = {value} is out of range (expected {expected})")]
    OutOfRange {
        section: &'static str,
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("no config file found (set AGGREGATOR_CONFIG or add config/aggregator.toml)")]
    NotFound,
}

/// Which cached connection an error or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Database,
    Mail,
    RemoteShell,
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConnectionKind::Database => "database",
            ConnectionKind::Mail => "mail",
            ConnectionKind::RemoteShell => "remote-shell",
        })
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("creating data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("mail transport failed: {0}")]
    Mail(#[from] lettre::transport::smtp::Error),

    #[error("mail server did not accept the connection probe")]
    MailRejected,

    #[error("remote shell connection failed: {0}")]
    RemoteShell(#[from] openssh::Error),
}

/// Per-source transport or decode failure. Never propagated past the
/// pipeline; the source degrades to an empty result.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{source_name} http request failed: {error}")]
    Http {
        source_name: &'static str,
        #[source]
        error: reqwest::Error,
    },

    #[error("{source_name} response could not be decoded: {error}")]
    Decode {
        source_name: &'static str,
        #[source]
        error: serde_json::Error,
    },

    #[error("{source_name} response is missing '{field}'")]
    MissingField {
        source_name: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("no schema selected on the database handle")]
    NoSchemaSelected,

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("record {index} does not share the column set of the first record")]
    ShapeMismatch { index: usize },

    #[error("sql error: {0}")]
    Sql(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("invalid table schema '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    #[error("creating schema '{schema}': {source}")]
    CreateSchema {
        schema: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("selecting schema '{schema}': {source}")]
    SelectSchema {
        schema: String,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("creating reports directory {path}: {source}")]
    ReportsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serializing report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("reading attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("building email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("sending email: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

/// Raised by the orchestrator only when a run cannot proceed at all.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("schema provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
}
