use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pgutils_adapter_pg::{AdapterResult, DEFAULT_HEAD_ROWS, PostgresConnection};
use pgutils_core::{ConnectionConfig, PgUtilsConfig, QualifiedIdentifier};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::render::RenderArgs;

#[derive(Parser, Debug)]
#[command(name = "pgutils", version, about = "Postgres helper utilities")]
struct Cli {
    /// YAML configuration file with connection settings and relations
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// libpq DSN or postgres:// URL. Takes precedence over the config file.
    #[arg(long, env = "PGUTILS_DSN", global = true, hide_env_values = true)]
    dsn: Option<String>,

    /// Log composed queries and connection details
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inject parameters into a template and print the query (offline).
    Render(RenderArgs),

    /// List the columns of a table in physical order.
    Columns {
        /// Table as schema.table
        #[arg(value_parser = parse_table)]
        table: QualifiedIdentifier,
    },

    /// Count the rows of a table.
    Count {
        #[arg(value_parser = parse_table)]
        table: QualifiedIdentifier,
    },

    /// Print the first rows of a table as JSON.
    Head {
        #[arg(value_parser = parse_table)]
        table: QualifiedIdentifier,

        #[arg(long, default_value_t = DEFAULT_HEAD_ROWS)]
        limit: u32,
    },

    /// Count NULL values per column (requires install-functions).
    Nulls {
        #[arg(value_parser = parse_table)]
        table: QualifiedIdentifier,
    },

    /// VACUUM ANALYZE one table, or the whole database.
    Vacuum {
        #[arg(value_parser = parse_table)]
        table: Option<QualifiedIdentifier>,
    },

    /// Create the server-side helper functions.
    InstallFunctions,

    /// Print the PostGIS version, if installed.
    Postgis,
}

pub(crate) fn parse_table(s: &str) -> Result<QualifiedIdentifier, String> {
    QualifiedIdentifier::parse(s).map_err(|e| e.to_string())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PgUtilsConfig> {
    match path {
        Some(path) => PgUtilsConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(PgUtilsConfig::default()),
    }
}

/// `--dsn` (or `PGUTILS_DSN`) wins over the config file.
fn resolve_connection(
    dsn: Option<&str>,
    config: &PgUtilsConfig,
) -> anyhow::Result<ConnectionConfig> {
    if let Some(dsn) = dsn {
        return ConnectionConfig::from_dsn(dsn).context("Invalid --dsn");
    }
    config.connection.clone().ok_or_else(|| {
        anyhow::anyhow!("No connection configured. Pass --dsn, set PGUTILS_DSN or use --config.")
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    if let Command::Render(args) = &cli.cmd {
        println!("{}", commands::render::run(args, &config)?);
        return Ok(());
    }

    let connection = resolve_connection(cli.dsn.as_deref(), &config)?;
    let target = connection.redacted();
    tracing::debug!(%target, command = ?cli.cmd, "connecting");
    let mut conn = PostgresConnection::connect(connection)
        .await
        .with_context(|| format!("Failed to connect ({target})"))?;

    let result = match cli.cmd {
        Command::Render(_) => Ok(()),
        Command::Columns { table } => commands::db::columns(&mut conn, &table).await,
        Command::Count { table } => commands::db::count(&mut conn, &table).await,
        Command::Head { table, limit } => commands::db::head(&mut conn, &table, limit).await,
        Command::Nulls { table } => commands::db::nulls(&mut conn, &table).await,
        Command::Vacuum { table } => commands::db::vacuum(&mut conn, table.as_ref()).await,
        Command::InstallFunctions => commands::db::install_functions(&mut conn).await,
        Command::Postgis => commands::db::postgis(&mut conn).await,
    };

    finish(result, conn.close().await)
}

/// The subcommand's outcome wins over a failure to close the session.
fn finish(result: anyhow::Result<()>, closed: AdapterResult<()>) -> anyhow::Result<()> {
    if let Err(e) = closed {
        tracing::warn!(error = %e, "failed to close connection");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cli_parses_head() {
        let cli = Cli::try_parse_from(["pgutils", "head", "tile_index.bag", "--limit", "10"]).unwrap();
        let Command::Head { table, limit } = cli.cmd else {
            panic!("expected head");
        };
        assert_eq!(table.render(), "\"tile_index\".\"bag\"");
        assert_eq!(limit, 10);
    }

    #[test]
    fn test_cli_head_default_limit() {
        let cli = Cli::try_parse_from(["pgutils", "head", "a.b"]).unwrap();
        assert!(matches!(cli.cmd, Command::Head { limit: 5, .. }));
    }

    #[test]
    fn test_cli_rejects_unqualified_table() {
        assert!(Cli::try_parse_from(["pgutils", "count", "bag"]).is_err());
    }

    #[test]
    fn test_cli_vacuum_table_is_optional() {
        let cli = Cli::try_parse_from(["pgutils", "vacuum"]).unwrap();
        assert!(matches!(cli.cmd, Command::Vacuum { table: None }));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["pgutils", "postgis", "--dsn", "dbname=gis", "-v"]).unwrap();
        assert_eq!(cli.dsn.as_deref(), Some("dbname=gis"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_dsn_flag_wins_over_config() {
        let config = PgUtilsConfig::from_yaml("connection:\n  host: from-config\n").unwrap();
        let resolved = resolve_connection(Some("host=from-flag"), &config).unwrap();
        assert_eq!(resolved.redacted(), "host=from-flag");

        let resolved = resolve_connection(None, &config).unwrap();
        assert_eq!(resolved.redacted(), "host=from-config");
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"connection:\n  dsn: dbname=gis user=gis\n")
            .unwrap();
        let config = load_config(Some(&file.path().to_path_buf())).unwrap();
        let resolved = resolve_connection(None, &config).unwrap();
        assert_eq!(resolved.redacted(), "dbname=gis user=gis");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Some(&PathBuf::from("/no/such/pgutils.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }

    #[test]
    fn test_close_failure_does_not_mask_command_error() {
        let closed = Err(pgutils_adapter_pg::AdapterError::UnexpectedResult(
            "close failed".to_string(),
        ));
        let err = finish(Err(anyhow::anyhow!("count failed")), closed).unwrap_err();
        assert_eq!(err.to_string(), "count failed");

        let closed = Err(pgutils_adapter_pg::AdapterError::UnexpectedResult(
            "close failed".to_string(),
        ));
        assert!(finish(Ok(()), closed).is_ok());
        assert!(finish(Ok(()), Ok(())).is_ok());
    }

    #[test]
    fn test_missing_connection_is_an_error() {
        assert!(resolve_connection(None, &PgUtilsConfig::default()).is_err());
    }
}
