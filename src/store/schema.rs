// src/store/schema.rs
//! Typed table descriptors and the idempotent schema provisioner.

use std::collections::HashSet;

use crate::connections::{ConnectionManager, SchemaMode};
use crate::error::{ConfigError, PersistenceError, ProvisionError};
use crate::store::handle::{is_identifier, quote_ident, DbHandle};

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing primary key.
    Identity,
    /// Variable-length string with a declared maximum.
    Text(u16),
    Float,
    Integer,
}

impl ColumnType {
    fn sql(&self) -> String {
        match self {
            ColumnType::Identity => "INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
            ColumnType::Text(n) => format!("VARCHAR({n})"),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnType,
}

/// Ordered column list for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, kind: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            kind,
        });
        self
    }

    /// Name of the identity column, if any.
    pub fn identity(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.kind == ColumnType::Identity)
            .map(|c| c.name.as_str())
    }

    /// Non-identity column names in declaration order.
    pub fn data_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.kind != ColumnType::Identity)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        let invalid = |reason: String| ProvisionError::InvalidSchema {
            table: self.name.clone(),
            reason,
        };
        if !is_identifier(&self.name) {
            return Err(invalid("table name is not a plain identifier".into()));
        }
        let identities = self
            .columns
            .iter()
            .filter(|c| c.kind == ColumnType::Identity)
            .count();
        if identities != 1 {
            return Err(invalid(format!(
                "expected exactly one identity column, found {identities}"
            )));
        }
        let mut seen = HashSet::new();
        for c in &self.columns {
            if !is_identifier(&c.name) {
                return Err(invalid(format!("column '{}' is not a plain identifier", c.name)));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(invalid(format!("duplicate column '{}'", c.name)));
            }
        }
        Ok(())
    }

    /// `CREATE TABLE IF NOT EXISTS` against the handle's active schema.
    pub fn create_sql(&self, db: &DbHandle) -> Result<String, PersistenceError> {
        let columns = self
            .columns
            .iter()
            .map(|c| Ok(format!("{} {}", quote_ident(&c.name)?, c.kind.sql())))
            .collect::<Result<Vec<_>, PersistenceError>>()?
            .join(", ");
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({columns});",
            db.qualified(&self.name)?
        ))
    }
}

/// The news / weather / currency tables the pipeline writes to.
pub fn default_tables() -> Vec<TableSchema> {
    vec![
        TableSchema::new("news")
            .column("id", ColumnType::Identity)
            .column("headline", ColumnType::Text(500))
            .column("source", ColumnType::Text(100))
            .column("url", ColumnType::Text(500))
            .column("published_at", ColumnType::Text(50))
            .column("fetched_at", ColumnType::Text(50)),
        TableSchema::new("weather")
            .column("id", ColumnType::Identity)
            .column("city", ColumnType::Text(100))
            .column("temperature", ColumnType::Float)
            .column("humidity", ColumnType::Float)
            .column("timestamp", ColumnType::Text(50)),
        TableSchema::new("currency")
            .column("id", ColumnType::Identity)
            .column("base", ColumnType::Text(10))
            .column("target", ColumnType::Text(10))
            .column("rate", ColumnType::Float)
            .column("timestamp", ColumnType::Text(50)),
    ]
}

/// Outcome of one provisioning pass.
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub schema: String,
    pub ready: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl ProvisionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn is_ready(&self, table: &str) -> bool {
        self.ready.iter().any(|t| t == table)
    }
}

/// Ensure the configured schema and every table in `tables` exist.
///
/// Never drops or alters anything. Descriptor validation, a missing schema
/// name, and connection or schema-level failures abort with an error; a
/// failure creating one table is recorded in the report and the remaining
/// tables are still attempted.
pub fn ensure_schema(
    conns: &mut ConnectionManager,
    tables: &[TableSchema],
) -> Result<ProvisionReport, ProvisionError> {
    for t in tables {
        t.validate()?;
    }

    let schema = conns
        .database_config()?
        .schema
        .clone()
        .filter(|s| !s.trim().is_empty())
        .ok_or(ConfigError::MissingKey {
            section: "database",
            key: "schema",
        })?;

    let db = conns.database(SchemaMode::Unselected)?;

    db.create_schema(&schema)
        .map_err(|source| ProvisionError::CreateSchema {
            schema: schema.clone(),
            source,
        })?;
    tracing::info!(target: "schema", schema = %schema, "schema check complete or created");

    db.select_schema(&schema)
        .map_err(|source| ProvisionError::SelectSchema {
            schema: schema.clone(),
            source,
        })?;

    let mut report = ProvisionReport {
        schema,
        ..Default::default()
    };
    for t in tables {
        let outcome = t
            .create_sql(db)
            .and_then(|sql| db.connection().execute_batch(&sql).map_err(Into::into));
        match outcome {
            Ok(()) => {
                tracing::info!(target: "schema", table = %t.name, "table ready");
                report.ready.push(t.name.clone());
            }
            Err(e) => {
                tracing::error!(target: "schema", table = %t.name, error = %e, "table creation failed");
                report.failed.push((t.name.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}
