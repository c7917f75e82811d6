//! Transactional gateway over persisted sport lines.
//!
//! `store` runs a single-row upsert inside a transaction; reads take the
//! union of one filtered select per requested sport. Driver failures are
//! mapped onto the [`LineError`] taxonomy here and nowhere else.

use async_trait::async_trait;
use tracing::{debug, error, warn};

use super::driver::{DbError, LineDatabase, LineRow, LineTransaction, SqlArg};
use crate::error::LineError;
use crate::models::{SportLine, SportType};

pub const UPSERT_LINE_SQL: &str = "INSERT INTO sport_lines (sport_type, score) VALUES ($1, $2) \
     ON CONFLICT (sport_type) DO UPDATE SET score = EXCLUDED.score";

/// Read side and write side of the line storage.
#[async_trait]
pub trait LineStore: Send + Sync {
    /// Upsert one line. Either fully applied or no effect.
    async fn store(&self, line: &SportLine) -> Result<(), LineError>;

    /// Current lines for `types`, in request order. `types` must be non-empty.
    async fn get_lines_by_sport_types(
        &self,
        types: &[SportType],
    ) -> Result<Vec<SportLine>, LineError>;
}

/// Query selecting the rows for `count` sport types, one positional
/// parameter per type.
pub fn build_lines_query(count: usize) -> String {
    (1..=count)
        .map(|i| format!("SELECT score, sport_type FROM sport_lines WHERE sport_type = ${}", i))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

fn classify_query_error(err: DbError) -> LineError {
    if err.is_undefined_table() {
        warn!(error = %err, "sport_lines relation is missing");
        LineError::table_not_exist(err.message)
    } else {
        error!(error = %err, "line query failed");
        LineError::internal(format!("line query failed: {}", err))
    }
}

fn decode_row<R: LineRow>(row: &R) -> Result<SportLine, LineError> {
    let scan_err = |e: DbError| LineError::internal(format!("failed to scan line row: {}", e));

    let score = row.get_f64("score").map_err(scan_err)?;
    let sport_type = row
        .get_text("sport_type")
        .map_err(scan_err)?
        .parse::<SportType>()
        .map_err(|e| LineError::internal(format!("failed to scan line row: {}", e)))?;

    SportLine::new(sport_type, score)
        .map_err(|e| LineError::internal(format!("failed to scan line row: {}", e)))
}

/// [`LineStore`] over any [`LineDatabase`] driver.
pub struct SqlLineStore<D> {
    db: D,
}

impl<D: LineDatabase> SqlLineStore<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &D {
        &self.db
    }
}

#[async_trait]
impl<D: LineDatabase> LineStore for SqlLineStore<D> {
    async fn store(&self, line: &SportLine) -> Result<(), LineError> {
        if !line.score.is_finite() {
            return Err(LineError::invalid_argument(format!(
                "score for {} must be finite",
                line.sport_type
            )));
        }

        let mut tx = self.db.begin().await.map_err(|e| {
            error!(sport = %line.sport_type, error = %e, "failed to begin transaction");
            LineError::internal(format!("failed to begin transaction: {}", e))
        })?;

        let args = [
            SqlArg::Text(line.sport_type.as_str().to_string()),
            SqlArg::Float(line.score),
        ];

        if let Err(exec_err) = tx.execute(UPSERT_LINE_SQL, &args).await {
            error!(sport = %line.sport_type, error = %exec_err, "line upsert failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                error!(sport = %line.sport_type, error = %rollback_err, "rollback failed");
                return Err(LineError::internal(format!(
                    "rollback failed after upsert error ({}): {}",
                    exec_err, rollback_err
                )));
            }
            return Err(LineError::internal(format!(
                "failed to upsert line for {}: {}",
                line.sport_type, exec_err
            )));
        }

        tx.commit().await.map_err(|e| {
            error!(sport = %line.sport_type, error = %e, "commit failed");
            LineError::internal(format!("failed to commit line for {}: {}", line.sport_type, e))
        })?;

        debug!(sport = %line.sport_type, score = line.score, "line stored");
        Ok(())
    }

    async fn get_lines_by_sport_types(
        &self,
        types: &[SportType],
    ) -> Result<Vec<SportLine>, LineError> {
        if types.is_empty() {
            return Err(LineError::invalid_argument("sport types must not be empty"));
        }

        let sql = build_lines_query(types.len());
        let args: Vec<SqlArg> = types
            .iter()
            .map(|t| SqlArg::Text(t.as_str().to_string()))
            .collect();

        let rows = self.db.query(&sql, &args).await.map_err(classify_query_error)?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.map_err(|e| {
                error!(error = %e, "row iteration failed");
                LineError::internal(format!("row iteration failed: {}", e))
            })?;
            lines.push(decode_row(&row)?);
        }

        Ok(lines)
    }
}
