//! Convenient imports for common functionality.

pub use crate::connection::ScopedConnection;
pub use crate::error::SqlTxnError;
pub use crate::executor::{PoolStatus, TransactionExecutor};
pub use crate::operation::{SelectOperation, SelectQuery, UpdateOperation, UpdateQuery};
pub use crate::registry::{DataSourceConfig, DataSourceRegistry};
pub use crate::results::{CustomDbRow, ResultSet};
pub use crate::sqlite::{SqliteOptions, SqliteOptionsBuilder};
pub use crate::statement::{CursorRow, PreparedStatement, RowCursor};
pub use crate::types::RowValues;
