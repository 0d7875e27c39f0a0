// src/store/mod.rs
//! Generic persistence: bulk insert and read-back keyed by table name.
//!
//! Records are field-name → scalar mappings. A batch takes its column list
//! from the first record; the remaining records must carry the same key set.

pub mod handle;
pub mod schema;

use metrics::counter;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PersistenceError;
pub use handle::DbHandle;
use handle::quote_ident;

/// One scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Real(f) => Some(*f),
            Scalar::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<Option<String>> for Scalar {
    fn from(v: Option<String>) -> Self {
        v.map(Scalar::Text).unwrap_or(Scalar::Null)
    }
}

impl From<Option<f64>> for Scalar {
    fn from(v: Option<f64>) -> Self {
        v.map(Scalar::Real).unwrap_or(Scalar::Null)
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Real(v)
    }
}

impl From<Value> for Scalar {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => Scalar::Null,
            Value::Integer(i) => Scalar::Integer(i),
            Value::Real(f) => Scalar::Real(f),
            Value::Text(s) => Scalar::Text(s),
            Value::Blob(b) => Scalar::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            Scalar::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// A normalized record produced by a fetcher, or a row read back.
pub type Record = BTreeMap<String, Scalar>;

/// Insert a batch of same-shaped records in one transaction.
/// Returns the number of rows written; an empty batch writes nothing.
pub fn insert_many(
    db: &DbHandle,
    table: &str,
    records: &[Record],
) -> Result<usize, PersistenceError> {
    let Some(first) = records.first() else {
        tracing::warn!(target: "store", table, "no records to insert");
        return Ok(0);
    };

    let columns: Vec<&String> = first.keys().collect();
    if let Some(index) = records
        .iter()
        .position(|r| r.len() != columns.len() || !columns.iter().all(|c| r.contains_key(*c)))
    {
        return Err(PersistenceError::ShapeMismatch { index });
    }

    let target = db.qualified(table)?;
    let column_sql = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("INSERT INTO {target} ({column_sql}) VALUES ({placeholders})");

    let tx = db.connection().unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for record in records {
            stmt.execute(rusqlite::params_from_iter(columns.iter().map(|c| &record[*c])))?;
        }
    }
    tx.commit()?;

    counter!("aggregator_rows_inserted_total", "table" => table.to_string())
        .increment(records.len() as u64);
    tracing::info!(target: "store", table, rows = records.len(), "records inserted");
    Ok(records.len())
}

pub fn insert_one(db: &DbHandle, table: &str, record: Record) -> Result<usize, PersistenceError> {
    insert_many(db, table, std::slice::from_ref(&record))
}

/// All rows of `table` in storage order, optionally restricted to `columns`.
pub fn fetch_all(
    db: &DbHandle,
    table: &str,
    columns: Option<&[&str]>,
) -> Result<Vec<Record>, PersistenceError> {
    let sql = format!(
        "SELECT {} FROM {}",
        select_list(columns)?,
        db.qualified(table)?
    );
    let rows = query_records(db, &sql, [])?;
    tracing::info!(target: "store", table, rows = rows.len(), "rows fetched");
    Ok(rows)
}

/// The `limit` rows with the highest `order_by` value, highest first.
pub fn fetch_recent(
    db: &DbHandle,
    table: &str,
    columns: Option<&[&str]>,
    order_by: &str,
    limit: usize,
) -> Result<Vec<Record>, PersistenceError> {
    let sql = format!(
        "SELECT {} FROM {} ORDER BY {} DESC LIMIT ?1",
        select_list(columns)?,
        db.qualified(table)?,
        quote_ident(order_by)?
    );
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = query_records(db, &sql, [limit])?;
    tracing::debug!(target: "store", table, rows = rows.len(), "recent rows fetched");
    Ok(rows)
}

fn select_list(columns: Option<&[&str]>) -> Result<String, PersistenceError> {
    match columns {
        None => Ok("*".to_string()),
        Some(cols) if cols.is_empty() => Ok("*".to_string()),
        Some(cols) => Ok(cols
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ")),
    }
}

fn query_records<P: rusqlite::Params>(
    db: &DbHandle,
    sql: &str,
    params: P,
) -> Result<Vec<Record>, PersistenceError> {
    let mut stmt = db.connection().prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let rows = stmt
        .query_map(params, |row| {
            let mut rec = Record::new();
            for (i, name) in names.iter().enumerate() {
                rec.insert(name.clone(), Scalar::from(row.get::<_, Value>(i)?));
            }
            Ok(rec)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
