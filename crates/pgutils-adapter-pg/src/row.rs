//! Row decoding into JSON values.
//!
//! Rows are fetched over the simple query protocol, so every cell arrives in
//! the server's text form. Core types are decoded into typed JSON values;
//! anything else (arrays, `bytea`, `interval`, `inet`, geometric and
//! extension types) is returned as the server's text output.

use serde_json::{Map, Value, json};
use sqlx::postgres::{PgRow, PgValueFormat};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// A result row as an ordered tuple of values.
pub type Tuple = Vec<Value>;

/// A result row keyed by column name, in column order.
pub type Record = Map<String, Value>;

/// Decode every column of `row`, in order.
pub fn decode_tuple(row: &PgRow) -> Result<Tuple, sqlx::Error> {
    (0..row.len()).map(|idx| decode_value(row, idx)).collect()
}

/// Decode `row` into a column-name-keyed record.
pub fn decode_record(row: &PgRow) -> Result<Record, sqlx::Error> {
    row.columns()
        .iter()
        .map(|col| Ok((col.name().to_string(), decode_value(row, col.ordinal())?)))
        .collect()
}

/// Decode one cell by inspecting its Postgres type.
fn decode_value(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "INT2" => json!(row.try_get::<i16, _>(idx)?),
        "INT4" => json!(row.try_get::<i32, _>(idx)?),
        "INT8" => json!(row.try_get::<i64, _>(idx)?),
        "OID" => json!(row.try_get::<sqlx::postgres::types::Oid, _>(idx)?.0),
        "FLOAT4" => json!(f64::from(row.try_get::<f32, _>(idx)?)),
        "FLOAT8" => json!(row.try_get::<f64, _>(idx)?),
        "NUMERIC" => Value::String(row.try_get::<bigdecimal::BigDecimal, _>(idx)?.to_string()),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            Value::String(row.try_get::<String, _>(idx)?)
        }
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "TIMESTAMPTZ" => Value::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                .to_rfc3339(),
        ),
        "TIMESTAMP" => Value::String(row.try_get::<chrono::NaiveDateTime, _>(idx)?.to_string()),
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
        "TIME" => Value::String(row.try_get::<chrono::NaiveTime, _>(idx)?.to_string()),
        other => match raw.format() {
            PgValueFormat::Text => {
                Value::String(raw.as_str().map_err(sqlx::Error::Decode)?.to_string())
            }
            PgValueFormat::Binary => {
                return Err(sqlx::Error::Decode(
                    format!("column {idx} of type {other} has no text form to decode").into(),
                ));
            }
        },
    };

    Ok(value)
}
