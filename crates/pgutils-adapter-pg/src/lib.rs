//! # pgutils-adapter-pg
//!
//! A thin Postgres facade over sqlx. Queries are composed with
//! [`pgutils_core`] and executed one statement per transaction.
//!
//! ```rust,ignore
//! use pgutils_adapter_pg::PostgresConnection;
//! use pgutils_core::QualifiedIdentifier;
//!
//! let mut conn = PostgresConnection::connect_dsn("dbname=gis user=gis").await?;
//! let table = QualifiedIdentifier::new("tile_index", "bag_index_test")?;
//! println!("{} rows", conn.row_count(&table).await?);
//! for column in conn.describe_columns(&table).await? {
//!     println!("{}: {}", column.name, column.data_type);
//! }
//! ```

pub mod connection;
pub mod error;
pub mod functions;
pub mod introspect;
pub mod row;

pub use connection::{ConnectionSource, DEFAULT_HEAD_ROWS, PostgresConnection, connect_options};
pub use error::{AdapterError, AdapterResult};
pub use functions::{COUNT_NULLS_FUNCTION, HelperFunctions, NullCount};
pub use introspect::ColumnInfo;
pub use row::{Record, Tuple};
