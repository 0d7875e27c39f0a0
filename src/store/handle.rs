// src/store/handle.rs
//! SQLite database handle with named schemas.
//!
//! The primary connection is in-memory and carries no data. Each schema is a
//! separate database file under `data_dir`, attached under its own name, so
//! "create schema if not exists" and "select schema" map onto `ATTACH` with
//! `mode=rwc` and `mode=rw` respectively. Statements address tables through
//! [`DbHandle::qualified`], which fails until a schema has been selected.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::PersistenceError;

#[derive(Debug)]
pub struct DbHandle {
    conn: Connection,
    data_dir: PathBuf,
    active: Option<String>,
}

impl DbHandle {
    /// Open a handle with no schema selected.
    pub fn open(data_dir: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn,
            data_dir: data_dir.to_path_buf(),
            active: None,
        })
    }

    /// Open a handle and select `schema`. Fails if the schema file does not exist.
    pub fn open_with_schema(data_dir: &Path, schema: &str) -> rusqlite::Result<Self> {
        let mut handle = Self::open(data_dir)?;
        handle.select_schema(schema)?;
        Ok(handle)
    }

    pub fn schema_path(&self, schema: &str) -> PathBuf {
        self.data_dir.join(format!("{schema}.sqlite3"))
    }

    pub fn active_schema(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Liveness probe.
    pub fn ping(&self) -> rusqlite::Result<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Create the schema file if absent and attach it. Idempotent.
    pub fn create_schema(&mut self, schema: &str) -> rusqlite::Result<()> {
        if self.is_attached(schema)? {
            return Ok(());
        }
        self.attach(schema, "rwc")
    }

    /// Make `schema` the target of unqualified table names.
    pub fn select_schema(&mut self, schema: &str) -> rusqlite::Result<()> {
        if !self.is_attached(schema)? {
            self.attach(schema, "rw")?;
        }
        self.active = Some(schema.to_string());
        Ok(())
    }

    /// `"schema"."table"` for the active schema.
    pub fn qualified(&self, table: &str) -> Result<String, PersistenceError> {
        let schema = self
            .active
            .as_deref()
            .ok_or(PersistenceError::NoSchemaSelected)?;
        Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
    }

    pub fn close(self) -> Result<(), rusqlite::Error> {
        self.conn.close().map_err(|(_, e)| e)
    }

    fn attach(&mut self, schema: &str, mode: &str) -> rusqlite::Result<()> {
        let alias = quote_ident(schema).map_err(|_| {
            rusqlite::Error::InvalidParameterName(schema.to_string())
        })?;
        let uri = file_uri(&self.schema_path(schema), mode);
        self.conn
            .execute(&format!("ATTACH DATABASE ?1 AS {alias}"), [uri])?;
        Ok(())
    }

    fn is_attached(&self, schema: &str) -> rusqlite::Result<bool> {
        let mut stmt = self.conn.prepare("PRAGMA database_list")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names.iter().any(|n| n == schema))
    }
}

/// `file:` URI for `path`. `%`, `?` and `#` are escaped so they stay part
/// of the file name instead of starting the query or fragment.
fn file_uri(path: &Path, mode: &str) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '?' => escaped.push_str("%3F"),
            '#' => escaped.push_str("%23"),
            c => escaped.push(c),
        }
    }
    format!("file:{escaped}?mode={mode}")
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Double-quote an identifier after checking it is a plain name.
pub fn quote_ident(s: &str) -> Result<String, PersistenceError> {
    if is_identifier(s) {
        Ok(format!("\"{s}\""))
    } else {
        Err(PersistenceError::InvalidIdentifier(s.to_string()))
    }
}
