use pgutils_core::{Literal, Params, QualifiedIdentifier, inject_parameters};
use serde::Serialize;
use sqlx::Row;

use crate::connection::PostgresConnection;
use crate::error::AdapterResult;

/// Physical, non-dropped columns of a relation, in `attnum` order.
const COLUMNS_QUERY: &str = r#"
    SELECT pg_attribute.attname AS column_name,
           pg_catalog.format_type(pg_attribute.atttypid, pg_attribute.atttypmod) AS data_type
    FROM pg_catalog.pg_attribute
    INNER JOIN pg_catalog.pg_class ON pg_class.oid = pg_attribute.attrelid
    INNER JOIN pg_catalog.pg_namespace ON pg_namespace.oid = pg_class.relnamespace
    WHERE pg_attribute.attnum > 0
      AND NOT pg_attribute.attisdropped
      AND pg_namespace.nspname = {schema}
      AND pg_class.relname = {table}
    ORDER BY pg_attribute.attnum ASC
"#;

/// A column name and its formatted type, e.g. `("geom", "geometry(Polygon,28992)")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

impl PostgresConnection {
    /// Columns of `table` ordered by physical position.
    ///
    /// An unknown table yields an empty list.
    pub async fn describe_columns(
        &mut self,
        table: &QualifiedIdentifier,
    ) -> AdapterResult<Vec<ColumnInfo>> {
        let params = Params::new()
            .with("schema", Literal::new(table.schema().as_str()))
            .with("table", Literal::new(table.relation().as_str()));
        let query = inject_parameters(COLUMNS_QUERY, &params)?;

        let rows = self.fetch(&query).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnInfo {
                name: row.try_get("column_name")?,
                data_type: row.try_get("data_type")?,
            });
        }

        tracing::debug!(table = %table, columns = columns.len(), "described columns");
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_columns_query_quotes_names_as_literals() {
        let table = QualifiedIdentifier::new("Tile Index", "bag's").unwrap();
        let params = Params::new()
            .with("schema", Literal::new(table.schema().as_str()))
            .with("table", Literal::new(table.relation().as_str()));
        let query = inject_parameters(COLUMNS_QUERY, &params).unwrap();

        assert!(query.as_str().contains("pg_namespace.nspname = 'Tile Index'"));
        assert!(query.as_str().contains("pg_class.relname = 'bag''s'"));
    }

    #[test]
    fn test_column_info_serializes() {
        let column = ColumnInfo {
            name: "geom".to_string(),
            data_type: "geometry".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&column).unwrap(),
            serde_json::json!({"name": "geom", "data_type": "geometry"})
        );
    }
}
