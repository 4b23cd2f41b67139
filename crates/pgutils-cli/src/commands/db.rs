//! Subcommands that talk to the database.

use anyhow::{Context, Result};
use pgutils_adapter_pg::{AdapterError, HelperFunctions, PostgresConnection};
use pgutils_core::QualifiedIdentifier;

pub async fn columns(conn: &mut PostgresConnection, table: &QualifiedIdentifier) -> Result<()> {
    let columns = conn
        .describe_columns(table)
        .await
        .with_context(|| format!("Failed to describe {table}"))?;

    if columns.is_empty() {
        anyhow::bail!("Table {table} not found or has no columns");
    }

    let width = columns.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for column in &columns {
        println!("{:width$}  {}", column.name, column.data_type);
    }
    Ok(())
}

pub async fn count(conn: &mut PostgresConnection, table: &QualifiedIdentifier) -> Result<()> {
    let count = conn
        .row_count(table)
        .await
        .with_context(|| format!("Failed to count rows of {table}"))?;
    println!("{count}");
    Ok(())
}

pub async fn head(
    conn: &mut PostgresConnection,
    table: &QualifiedIdentifier,
    limit: u32,
) -> Result<()> {
    let rows = conn
        .sample(table, limit)
        .await
        .with_context(|| format!("Failed to read rows of {table}"))?;
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

pub async fn nulls(conn: &mut PostgresConnection, table: &QualifiedIdentifier) -> Result<()> {
    let counts = match conn.count_nulls(table).await {
        Ok(counts) => counts,
        Err(e @ AdapterError::FeatureUnavailable { .. }) => {
            anyhow::bail!("{e}. Run `pgutils install-functions` first.")
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to count NULLs of {table}")),
    };

    let width = counts.iter().map(|c| c.column_name.len()).max().unwrap_or(0);
    for count in &counts {
        println!("{:width$}  {}", count.column_name, count.missing_values);
    }
    Ok(())
}

pub async fn vacuum(
    conn: &mut PostgresConnection,
    table: Option<&QualifiedIdentifier>,
) -> Result<()> {
    match table {
        Some(table) => {
            conn.vacuum(table)
                .await
                .with_context(|| format!("Failed to vacuum {table}"))?;
            println!("Vacuumed {table}");
        }
        None => {
            conn.vacuum_all().await.context("Failed to vacuum database")?;
            println!("Vacuumed database");
        }
    }
    Ok(())
}

pub async fn install_functions(conn: &mut PostgresConnection) -> Result<()> {
    let functions = HelperFunctions::install(conn).await;
    if functions.created().is_empty() {
        anyhow::bail!("No helper functions could be created; see the log for details");
    }
    for name in functions.created() {
        println!("Created {name}");
    }
    Ok(())
}

pub async fn postgis(conn: &mut PostgresConnection) -> Result<()> {
    match conn.postgis_version().await {
        Some(version) => println!("{version}"),
        None => println!("PostGIS is not installed"),
    }
    Ok(())
}
