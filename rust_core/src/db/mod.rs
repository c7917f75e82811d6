//! Line persistence: the driver seam, its Postgres implementation, the
//! transactional line store built on it, and pool setup.

pub mod driver;
pub mod line_store;
pub mod memory;
pub mod pool;
pub mod postgres;

pub use driver::{DbError, DbResult, LineDatabase, LineRow, LineTransaction, SqlArg};
pub use line_store::{build_lines_query, LineStore, SqlLineStore, UPSERT_LINE_SQL};
pub use memory::InMemoryLineStore;
pub use pool::{create_pool, DbPoolConfig};
pub use postgres::PgLineDatabase;

/// Line store over a live Postgres pool.
pub type PgLineStore = SqlLineStore<PgLineDatabase>;
