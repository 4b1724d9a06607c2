//! Transaction-scoped execute/query wrappers over a `bb8`-pooled `rusqlite`
//! connection.
//!
//! A [`TransactionExecutor`] checks out one connection per call, runs the
//! caller's [`UpdateOperation`]s inside a transaction (or a single
//! [`SelectOperation`] without one), commits or rolls back, and always returns
//! the connection to the pool.

pub mod connection;
pub mod error;
pub mod executor;
pub mod operation;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod sequence;
pub mod sqlite;
pub mod statement;
pub mod types;

pub use connection::ScopedConnection;
pub use error::SqlTxnError;
pub use executor::{PoolStatus, TransactionExecutor};
pub use operation::{SelectOperation, SelectQuery, UpdateOperation, UpdateQuery};
pub use registry::{DataSourceConfig, DataSourceRegistry};
pub use results::{CustomDbRow, ResultSet};
pub use sequence::SequenceQuery;
pub use sqlite::{SqliteOptions, SqliteOptionsBuilder};
pub use statement::{CursorRow, PreparedStatement, RowCursor};
pub use types::RowValues;
