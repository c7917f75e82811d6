//! Narrow driver seam between the line store and the relational backend.
//!
//! The store logic only needs begin/commit/rollback, a parameterized exec,
//! a parameterized query returning rows, and a way to recognise a missing
//! relation. Anything implementing these traits can back a
//! [`SqlLineStore`](crate::db::SqlLineStore).

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// SQLSTATE for `undefined_table`.
pub const SQLSTATE_UNDEFINED_TABLE: &str = "42P01";

pub type DbResult<T> = Result<T, DbError>;

/// Driver level failure: an optional SQLSTATE plus the backend message.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct DbError {
    pub code: Option<String>,
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// True when the backend reports that the queried relation is absent.
    ///
    /// The SQLSTATE is authoritative when present; message matching only
    /// applies to drivers that do not surface one.
    pub fn is_undefined_table(&self) -> bool {
        match self.code.as_deref() {
            Some(code) => code == SQLSTATE_UNDEFINED_TABLE,
            None => undefined_table_pattern()
                .map_or(false, |pattern| pattern.is_match(&self.message)),
        }
    }
}

fn undefined_table_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r#"(?i)relation\s+"[^"]*"\s+does not exist|SQLSTATE 42P01"#).ok()
        })
        .as_ref()
}

/// Positional statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Float(f64),
}

/// Typed column access on a fetched row. Failures are scan errors.
pub trait LineRow: Send {
    fn get_f64(&self, column: &str) -> DbResult<f64>;
    fn get_text(&self, column: &str) -> DbResult<String>;
}

#[async_trait]
pub trait LineTransaction: Send {
    /// Execute a statement, returning the affected row count.
    async fn execute(&mut self, sql: &str, args: &[SqlArg]) -> DbResult<u64>;
    async fn commit(self) -> DbResult<()>;
    async fn rollback(self) -> DbResult<()>;
}

#[async_trait]
pub trait LineDatabase: Send + Sync {
    type Tx: LineTransaction;
    type Row: LineRow;

    async fn begin(&self) -> DbResult<Self::Tx>;

    /// Run a query. The outer error is a failure of the query itself; an
    /// inner error is a row that failed to materialize mid-scan.
    async fn query(&self, sql: &str, args: &[SqlArg]) -> DbResult<Vec<DbResult<Self::Row>>>;
}
