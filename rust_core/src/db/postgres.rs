//! PostgreSQL implementation of the driver seam over a sqlx pool.

use async_trait::async_trait;
use futures_util::StreamExt;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use super::driver::{DbError, DbResult, LineDatabase, LineRow, LineTransaction, SqlArg};

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => DbError {
                code: db_err.code().map(|c| c.into_owned()),
                message: db_err.message().to_string(),
            },
            _ => DbError::new(err.to_string()),
        }
    }
}

fn bind_args<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[SqlArg],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            SqlArg::Text(value) => query.bind(value.clone()),
            SqlArg::Float(value) => query.bind(*value),
        };
    }
    query
}

impl LineRow for PgRow {
    fn get_f64(&self, column: &str) -> DbResult<f64> {
        self.try_get::<f64, _>(column).map_err(DbError::from)
    }

    fn get_text(&self, column: &str) -> DbResult<String> {
        self.try_get::<String, _>(column).map_err(DbError::from)
    }
}

pub struct PgLineTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LineTransaction for PgLineTransaction {
    async fn execute(&mut self, sql: &str, args: &[SqlArg]) -> DbResult<u64> {
        let result = bind_args(sqlx::query(sql), args)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> DbResult<()> {
        self.tx.commit().await.map_err(DbError::from)
    }

    async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await.map_err(DbError::from)
    }
}

/// Line database backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgLineDatabase {
    pool: PgPool,
}

impl PgLineDatabase {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the `sport_lines` relation if it is missing.
    pub async fn ensure_schema(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sport_lines (
                sport_type TEXT PRIMARY KEY,
                score DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("sport_lines schema ready");
        Ok(())
    }
}

#[async_trait]
impl LineDatabase for PgLineDatabase {
    type Tx = PgLineTransaction;
    type Row = PgRow;

    async fn begin(&self) -> DbResult<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PgLineTransaction { tx })
    }

    async fn query(&self, sql: &str, args: &[SqlArg]) -> DbResult<Vec<DbResult<Self::Row>>> {
        let mut stream = bind_args(sqlx::query(sql), args).fetch(&self.pool);
        let mut rows = Vec::new();

        while let Some(item) = stream.next().await {
            match item {
                Ok(row) => rows.push(Ok(row)),
                // Nothing produced yet: the statement itself failed
                Err(e) if rows.is_empty() => return Err(e.into()),
                Err(e) => {
                    rows.push(Err(e.into()));
                    break;
                }
            }
        }

        debug!(rows = rows.len(), "query finished");
        Ok(rows)
    }
}
