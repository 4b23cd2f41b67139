//! Integration tests against a live PostgreSQL server.
//!
//! Run with:
//!   PGUTILS_TEST_DSN="host=localhost user=postgres password=postgres dbname=postgres" \
//!     cargo test -p pgutils-adapter-pg --test integration
//!
//! Every test creates its own schema and drops it afterwards. Tests are
//! skipped when `PGUTILS_TEST_DSN` is not set.

use pgutils_adapter_pg::{
    AdapterError, COUNT_NULLS_FUNCTION, HelperFunctions, PostgresConnection, connect_options,
};
use pgutils_core::{
    Composed, ConnectionConfig, Identifier, Params, QualifiedIdentifier, inject_parameters,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use sqlx::Connection;

const TEST_DSN_ENV: &str = "PGUTILS_TEST_DSN";

// =============================================================================
// FIXTURES
// =============================================================================

/// Connect to the test database, or `None` when no server is configured.
async fn connect() -> Option<PostgresConnection> {
    let Ok(dsn) = std::env::var(TEST_DSN_ENV) else {
        println!("Skipping: {TEST_DSN_ENV} is not set");
        return None;
    };
    Some(
        PostgresConnection::connect_dsn(&dsn)
            .await
            .expect("test database should be reachable"),
    )
}

/// A scratch schema holding a `Parcels` table with three columns.
struct Scratch {
    schema: Identifier,
    table: QualifiedIdentifier,
}

impl Scratch {
    async fn create(conn: &mut PostgresConnection) -> Self {
        let schema = Identifier::new(format!("pgutils_test_{}", uuid::Uuid::new_v4().simple()))
            .unwrap();
        let table = QualifiedIdentifier::from_parts(schema.clone(), Identifier::new("Parcels").unwrap());

        let ddl = inject_parameters(
            "CREATE SCHEMA {schema}; \
             CREATE TABLE {table} (id integer PRIMARY KEY, name text, area double precision)",
            &Params::new().with("schema", &schema).with("table", &table),
        )
        .unwrap();
        conn.execute(&ddl).await.unwrap();

        Self { schema, table }
    }

    async fn insert_rows(&self, conn: &mut PostgresConnection) {
        let insert = inject_parameters(
            "INSERT INTO {table} (id, name, area) VALUES \
             (1, {first}, 10.5), (2, NULL, NULL), (3, {third}, NULL)",
            &Params::new()
                .with("table", &self.table)
                .with("first", "O'Brien")
                .with("third", "plot 3"),
        )
        .unwrap();
        conn.execute(&insert).await.unwrap();
    }

    async fn drop(self, conn: &mut PostgresConnection) {
        let ddl = inject_parameters(
            "DROP SCHEMA {schema} CASCADE",
            &Params::new().with("schema", &self.schema),
        )
        .unwrap();
        conn.execute(&ddl).await.unwrap();
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn test_row_count_of_empty_table_is_zero() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;

    assert_eq!(conn.row_count(&scratch.table).await.unwrap(), 0);

    scratch.insert_rows(&mut conn).await;
    assert_eq!(conn.row_count(&scratch.table).await.unwrap(), 3);

    scratch.drop(&mut conn).await;
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_describe_columns_in_physical_order() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;

    let columns = conn.describe_columns(&scratch.table).await.unwrap();
    let pairs: Vec<(&str, &str)> = columns
        .iter()
        .map(|c| (c.name.as_str(), c.data_type.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("id", "integer"),
            ("name", "text"),
            ("area", "double precision"),
        ]
    );

    let missing = QualifiedIdentifier::new(scratch.schema.as_str(), "nope").unwrap();
    assert!(conn.describe_columns(&missing).await.unwrap().is_empty());

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_query_shapes() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;
    scratch.insert_rows(&mut conn).await;

    let query = inject_parameters(
        "SELECT id, name FROM {table} WHERE id = {id}",
        &Params::new().with("table", &scratch.table).with("id", 1),
    )
    .unwrap();

    let tuples = conn.query(&query).await.unwrap();
    assert_eq!(tuples, vec![vec![json!(1), json!("O'Brien")]]);

    let records = conn.query_as_rows(&query).await.unwrap();
    assert_eq!(records.len(), 1);
    let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name"]);
    assert_eq!(records[0]["name"], json!("O'Brien"));

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_sample_and_head() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;
    scratch.insert_rows(&mut conn).await;

    let sample = conn.sample(&scratch.table, 2).await.unwrap();
    assert_eq!(sample.len(), 2);

    let head = conn.head(&scratch.table).await.unwrap();
    assert_eq!(head.len(), 3);
    assert!(head.iter().any(|row| row["area"] == json!(10.5)));

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_failed_statement_is_rolled_back() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;

    let bad = inject_parameters(
        "INSERT INTO {table} (id) VALUES (1); INSERT INTO {table} (id) VALUES (1)",
        &Params::new().with("table", &scratch.table),
    )
    .unwrap();
    assert!(matches!(
        conn.execute(&bad).await,
        Err(AdapterError::Query(_))
    ));

    // The session is still usable and the first insert did not persist.
    assert_eq!(conn.row_count(&scratch.table).await.unwrap(), 0);

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_vacuum() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;
    scratch.insert_rows(&mut conn).await;

    conn.vacuum(&scratch.table).await.unwrap();
    assert_eq!(conn.row_count(&scratch.table).await.unwrap(), 3);

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_count_nulls_without_install_is_feature_unavailable() {
    let Some(mut conn) = connect().await else { return };
    let scratch = Scratch::create(&mut conn).await;
    scratch.insert_rows(&mut conn).await;

    // Install and removal happen in this one test so parallel tests never
    // observe the function half-way.
    conn.execute(&Composed::raw(
        "DROP FUNCTION IF EXISTS pgutils_count_nulls(regclass)",
    ))
    .await
    .unwrap();
    let err = conn.count_nulls(&scratch.table).await.unwrap_err();
    assert!(matches!(
        err,
        AdapterError::FeatureUnavailable {
            function: COUNT_NULLS_FUNCTION,
            ..
        }
    ));

    // The failed call left the session usable.
    assert_eq!(conn.row_count(&scratch.table).await.unwrap(), 3);

    let functions = HelperFunctions::install(&mut conn).await;
    assert!(functions.is_installed(COUNT_NULLS_FUNCTION));

    let counts = conn.count_nulls(&scratch.table).await.unwrap();
    let pairs: Vec<(&str, i64)> = counts
        .iter()
        .map(|c| (c.column_name.as_str(), c.missing_values))
        .collect();
    assert_eq!(pairs, vec![("area", 2), ("name", 1), ("id", 0)]);

    scratch.drop(&mut conn).await;
}

#[tokio::test]
async fn test_types_without_decoder_keep_text_form() {
    let Some(mut conn) = connect().await else { return };

    let rows = conn
        .query(&Composed::raw(
            r"SELECT '\xdeadbeef'::bytea, ARRAY[1,2,3]::int4[], '1 day'::interval,
                     '10.0.0.1'::inet, point(1,2), NULL::int4[]",
        ))
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![vec![
            json!("\\xdeadbeef"),
            json!("{1,2,3}"),
            json!("1 day"),
            json!("10.0.0.1"),
            json!("(1,2)"),
            json!(null),
        ]]
    );

    let records = conn
        .query_as_rows(&Composed::raw(
            "SELECT 7::int8 AS n, true AS b, 1.50::numeric AS d, '{\"a\": 1}'::jsonb AS j",
        ))
        .await
        .unwrap();
    assert_eq!(
        serde_json::Value::Object(records[0].clone()),
        json!({"n": 7, "b": true, "d": "1.50", "j": {"a": 1}})
    );
}

#[tokio::test]
async fn test_adopts_existing_handle() {
    let Ok(dsn) = std::env::var(TEST_DSN_ENV) else {
        println!("Skipping: {TEST_DSN_ENV} is not set");
        return;
    };
    let options = connect_options(&ConnectionConfig::from_dsn(&dsn).unwrap()).unwrap();
    let handle = sqlx::PgConnection::connect_with(&options).await.unwrap();

    let mut conn = PostgresConnection::connect(handle).await.unwrap();
    assert_eq!(conn.target(), "existing connection");
    assert_eq!(
        conn.query(&Composed::raw("SELECT 40 + 2")).await.unwrap(),
        vec![vec![json!(42)]]
    );
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_postgis_version_does_not_fail() {
    let Some(mut conn) = connect().await else { return };

    // Either a version string or None, but the session must stay usable.
    let _ = conn.postgis_version().await;
    let one = conn
        .query(&Composed::raw("SELECT 1"))
        .await
        .unwrap();
    assert_eq!(one, vec![vec![json!(1)]]);
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let result = PostgresConnection::connect_dsn(
        "host=127.0.0.1 port=1 dbname=none user=none password=hunter2",
    )
    .await;
    let Err(err) = result else {
        panic!("expected a connection error");
    };
    assert!(matches!(err, AdapterError::Connection { .. }));
    assert!(!err.to_string().contains("hunter2"));
}
