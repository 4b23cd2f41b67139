//! Optional server-side helper functions.
//!
//! [`HelperFunctions::install`] creates them once per database. Queries that
//! call a helper which was never installed fail with
//! [`AdapterError::FeatureUnavailable`].

use pgutils_core::{Composed, Literal, Params, QualifiedIdentifier, inject_parameters};
use serde::Serialize;
use sqlx::Row;

use crate::connection::PostgresConnection;
use crate::error::{AdapterError, AdapterResult, UNDEFINED_FUNCTION};

/// Name of the null-counting helper.
pub const COUNT_NULLS_FUNCTION: &str = "pgutils_count_nulls";

const INSTALL_HINT: &str = "install it with HelperFunctions::install (pgutils install-functions)";

const COUNT_NULLS_DEFINITION: &str = r#"
CREATE OR REPLACE FUNCTION pgutils_count_nulls(_tbl regclass)
  RETURNS TABLE (column_name text, missing_values bigint)
  LANGUAGE plpgsql STABLE PARALLEL SAFE AS
$func$
BEGIN
   RETURN QUERY EXECUTE (
   SELECT format(
   $$
   SELECT x.*
   FROM  (SELECT count(*) AS ct, %s FROM %s) t
   CROSS  JOIN LATERAL (VALUES %s) x(col, nulls)
   ORDER  BY nulls DESC, col DESC
   $$, string_agg(format('count(%1$I) AS %1$I', attname), ', ')
     , $1
     , string_agg(format('(%1$L::text, ct - %1$I)', attname), ', ')
      )
   FROM   pg_catalog.pg_attribute
   WHERE  attrelid = $1
   AND    attnum > 0
   AND    NOT attisdropped
   );
END
$func$;
"#;

/// Helper functions known to this crate, by name and definition.
const DEFINITIONS: &[(&str, &str)] = &[(COUNT_NULLS_FUNCTION, COUNT_NULLS_DEFINITION)];

/// Tracks which helper functions were created on the server.
#[derive(Debug, Clone, Default)]
pub struct HelperFunctions {
    created: Vec<&'static str>,
}

impl HelperFunctions {
    /// Create every helper function.
    ///
    /// Failures are logged and skipped; the affected helpers stay missing and
    /// queries that need them report [`AdapterError::FeatureUnavailable`].
    pub async fn install(conn: &mut PostgresConnection) -> Self {
        let mut created = Vec::with_capacity(DEFINITIONS.len());
        for (name, definition) in DEFINITIONS {
            match conn.execute(&Composed::raw(*definition)).await {
                Ok(()) => {
                    tracing::info!(function = *name, "created function");
                    created.push(*name);
                }
                Err(e) => {
                    tracing::warn!(function = *name, error = %e, "unable to create function");
                }
            }
        }
        Self { created }
    }

    /// Names of the functions created by [`install`](Self::install).
    pub fn created(&self) -> &[&'static str] {
        &self.created
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.created.iter().any(|created| *created == name)
    }
}

/// Number of NULLs in one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NullCount {
    pub column_name: String,
    pub missing_values: i64,
}

fn count_nulls_query(table: &QualifiedIdentifier) -> AdapterResult<Composed> {
    // regclass parses the rendered name, so quoted mixed-case names survive.
    Ok(inject_parameters(
        "SELECT * FROM pgutils_count_nulls({table}::regclass)",
        &Params::new().with("table", Literal::new(table.render())),
    )?)
}

impl PostgresConnection {
    /// NULL counts per column of `table`, most missing first.
    ///
    /// Requires the helper installed by [`HelperFunctions::install`].
    pub async fn count_nulls(&mut self, table: &QualifiedIdentifier) -> AdapterResult<Vec<NullCount>> {
        let query = count_nulls_query(table)?;
        let rows = match self.fetch(&query).await {
            Ok(rows) => rows,
            Err(e) if e.is_sqlstate(UNDEFINED_FUNCTION) => {
                tracing::warn!(function = COUNT_NULLS_FUNCTION, "helper function is not installed");
                return Err(AdapterError::FeatureUnavailable {
                    function: COUNT_NULLS_FUNCTION,
                    hint: INSTALL_HINT,
                });
            }
            Err(e) => return Err(e),
        };

        rows.iter()
            .map(|row| -> AdapterResult<NullCount> {
                Ok(NullCount {
                    column_name: row.try_get("column_name")?,
                    missing_values: row.try_get("missing_values")?,
                })
            })
            .collect()
    }
}
