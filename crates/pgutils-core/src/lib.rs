//! # pgutils-core
//!
//! Safe composition of Postgres queries from trusted templates.
//!
//! This crate provides:
//! - [`Identifier`] and [`QualifiedIdentifier`] for quoted SQL names
//! - [`Literal`] for escaped values
//! - [`inject_parameters`] to fill `{name}` placeholders in a template
//! - [`RelationMap`] to name schemas, tables and columns from configuration
//!
//! Everything here is pure and synchronous; executing the composed queries
//! is the job of `pgutils-adapter-pg`.
//!
//! ## Example
//!
//! ```
//! use pgutils_core::{inject_parameters, Params, RelationMap};
//!
//! let relations: RelationMap = serde_yaml::from_str(
//!     "schema: tile_index\ntable: bag_index_test\nfields:\n  id: unit_id\n",
//! )
//! .unwrap();
//!
//! let table = (relations.field("schema").unwrap() + relations.field("table").unwrap()).unwrap();
//! let id = relations.path("fields.id").unwrap().identifier().unwrap();
//!
//! let query = inject_parameters(
//!     "SELECT {id} FROM {table} WHERE {id} = {value}",
//!     &Params::new().with("id", id).with("table", table).with("value", 42),
//! )
//! .unwrap();
//!
//! assert_eq!(
//!     query.as_str(),
//!     r#"SELECT "unit_id" FROM "tile_index"."bag_index_test" WHERE "unit_id" = 42"#
//! );
//! ```

pub mod config;
pub mod error;
pub mod identifier;
pub mod inject;
pub mod literal;
pub mod relation;

pub use config::{ConfigError, ConnectionConfig, ConnectionParams, Dsn, PgUtilsConfig};
pub use error::{CoreError, CoreResult};
pub use identifier::{Identifier, IntoIdentifier, QualifiedIdentifier};
pub use inject::{Composed, ParameterValue, Params, inject_parameters};
pub use literal::{Literal, Scalar};
pub use relation::RelationMap;
