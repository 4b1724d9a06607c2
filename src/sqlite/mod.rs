// SQLite backend: pool configuration, the bb8 connection manager, and value
// conversion between `RowValues` and rusqlite types.

pub mod config;
pub mod manager;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use manager::{SharedSqliteConnection, SqliteManager, SqlitePool};
pub use params::Params;
pub use query::sqlite_extract_value;
