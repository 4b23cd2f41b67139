//! The Postgres connection facade.
//!
//! Every method builds a query with `pgutils-core` and hands it to sqlx.
//! Statements run one at a time inside their own transaction: committed on
//! success, rolled back when the transaction guard drops on any error path.
//! `VACUUM` cannot run in a transaction block and is sent in autocommit.
//!
//! Queries go over the simple query protocol, so result columns arrive in
//! text form and types without a dedicated decoder keep their server
//! representation (`{1,2,3}`, `1 day`, `\xdeadbeef`).

use pgutils_core::{
    Composed, ConnectionConfig, ConnectionParams, Dsn, Params, QualifiedIdentifier,
    inject_parameters,
};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Connection, Row};

use crate::error::{AdapterError, AdapterResult};
use crate::row::{Record, Tuple, decode_record, decode_tuple};

/// Rows returned by [`PostgresConnection::head`].
pub const DEFAULT_HEAD_ROWS: u32 = 5;

/// libpq parameters that only affect the client and have no sqlx
/// counterpart. They are ignored rather than forwarded to the server.
const CLIENT_ONLY_KEYS: &[&str] = &[
    "hostaddr",
    "connect_timeout",
    "keepalives",
    "keepalives_idle",
    "keepalives_interval",
    "keepalives_count",
    "target_session_attrs",
    "gssencmode",
    "channel_binding",
    "service",
    "passfile",
    "sslpassword",
    "sslcrl",
    "sslcompression",
    "sslsni",
];

/// What to open a connection from. Exactly one source is authoritative.
pub enum ConnectionSource {
    /// Discrete parameters or a DSN.
    Config(ConnectionConfig),
    /// An already established session.
    Handle(PgConnection),
}

impl From<ConnectionConfig> for ConnectionSource {
    fn from(config: ConnectionConfig) -> Self {
        ConnectionSource::Config(config)
    }
}

impl From<ConnectionParams> for ConnectionSource {
    fn from(params: ConnectionParams) -> Self {
        ConnectionSource::Config(ConnectionConfig::Params(params))
    }
}

impl From<Dsn> for ConnectionSource {
    fn from(dsn: Dsn) -> Self {
        ConnectionSource::Config(ConnectionConfig::Dsn(dsn))
    }
}

impl From<PgConnection> for ConnectionSource {
    fn from(conn: PgConnection) -> Self {
        ConnectionSource::Handle(conn)
    }
}

/// A single Postgres session with helpers for common query patterns.
pub struct PostgresConnection {
    conn: PgConnection,
    target: String,
}

impl PostgresConnection {
    /// Open a session, or adopt an existing one.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let dsn = Dsn::parse("dbname=gis user=gis host=localhost")?;
    /// let mut conn = PostgresConnection::connect(dsn).await?;
    /// ```
    pub async fn connect(source: impl Into<ConnectionSource>) -> AdapterResult<Self> {
        let config = match source.into() {
            ConnectionSource::Handle(conn) => {
                return Ok(Self {
                    conn,
                    target: "existing connection".to_string(),
                });
            }
            ConnectionSource::Config(config) => config,
        };

        let target = config.redacted();
        let options = connect_options(&config)?;
        match PgConnection::connect_with(&options).await {
            Ok(conn) => {
                tracing::debug!(%target, "opened connection");
                Ok(Self { conn, target })
            }
            Err(source) => {
                tracing::error!(%target, error = %source, "unable to connect to the database");
                Err(AdapterError::Connection { target, source })
            }
        }
    }

    /// Open a session from a DSN string.
    pub async fn connect_dsn(dsn: &str) -> AdapterResult<Self> {
        Self::connect(Dsn::parse(dsn)?).await
    }

    /// Redacted description of the connection target.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The underlying sqlx connection.
    pub fn connection_mut(&mut self) -> &mut PgConnection {
        &mut self.conn
    }

    /// Close the session.
    pub async fn close(self) -> AdapterResult<()> {
        self.conn.close().await?;
        tracing::debug!(target = %self.target, "closed connection");
        Ok(())
    }

    /// Run a statement that returns no rows (e.g. `CREATE`).
    pub async fn execute(&mut self, query: &Composed) -> AdapterResult<()> {
        tracing::debug!(query = %query.pretty(), "execute");
        let mut tx = self.conn.begin().await?;
        sqlx::raw_sql(query.as_str()).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Run a query and return its rows as ordered tuples.
    pub async fn query(&mut self, query: &Composed) -> AdapterResult<Vec<Tuple>> {
        let rows = self.fetch(query).await?;
        Ok(rows.iter().map(decode_tuple).collect::<Result<_, _>>()?)
    }

    /// Run a query and return its rows keyed by column name.
    pub async fn query_as_rows(&mut self, query: &Composed) -> AdapterResult<Vec<Record>> {
        let rows = self.fetch(query).await?;
        Ok(rows.iter().map(decode_record).collect::<Result<_, _>>()?)
    }

    /// `VACUUM ANALYZE` one table.
    pub async fn vacuum(&mut self, table: &QualifiedIdentifier) -> AdapterResult<()> {
        let query = inject_parameters("VACUUM ANALYZE {table}", &Params::new().with("table", table))?;
        self.execute_autocommit(&query).await
    }

    /// `VACUUM ANALYZE` the whole database.
    pub async fn vacuum_all(&mut self) -> AdapterResult<()> {
        self.execute_autocommit(&Composed::raw("VACUUM ANALYZE")).await
    }

    /// Number of rows in `table`.
    pub async fn row_count(&mut self, table: &QualifiedIdentifier) -> AdapterResult<i64> {
        let query = inject_parameters("SELECT count(*) FROM {table}", &Params::new().with("table", table))?;
        let rows = self.fetch(&query).await?;
        let row = rows
            .first()
            .ok_or_else(|| AdapterError::UnexpectedResult("count(*) returned no rows".into()))?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    /// The first `limit` rows of `table`.
    pub async fn sample(
        &mut self,
        table: &QualifiedIdentifier,
        limit: u32,
    ) -> AdapterResult<Vec<Record>> {
        let query = inject_parameters(
            "SELECT * FROM {table} LIMIT {limit}",
            &Params::new().with("table", table).with("limit", limit),
        )?;
        self.query_as_rows(&query).await
    }

    /// The first [`DEFAULT_HEAD_ROWS`] rows of `table`.
    pub async fn head(&mut self, table: &QualifiedIdentifier) -> AdapterResult<Vec<Record>> {
        self.sample(table, DEFAULT_HEAD_ROWS).await
    }

    /// PostGIS version, or `None` when PostGIS is not installed.
    pub async fn postgis_version(&mut self) -> Option<String> {
        let query = Composed::raw("SELECT PostGIS_version()");
        match self.fetch(&query).await {
            Ok(rows) => rows.first().and_then(|row| row.try_get::<String, _>(0).ok()),
            Err(e) => {
                tracing::debug!(error = %e, "PostGIS not available");
                None
            }
        }
    }

    pub(crate) async fn fetch(&mut self, query: &Composed) -> AdapterResult<Vec<PgRow>> {
        tracing::debug!(query = %query.pretty(), "fetch");
        let mut tx = self.conn.begin().await?;
        let rows = sqlx::raw_sql(query.as_str()).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn execute_autocommit(&mut self, query: &Composed) -> AdapterResult<()> {
        tracing::debug!(query = %query.pretty(), "execute (autocommit)");
        sqlx::raw_sql(query.as_str()).execute(&mut self.conn).await?;
        Ok(())
    }
}

/// Translate connection settings into sqlx options.
///
/// Useful for opening a session by hand and handing it to
/// [`PostgresConnection::connect`].
pub fn connect_options(config: &ConnectionConfig) -> AdapterResult<PgConnectOptions> {
    match config {
        ConnectionConfig::Dsn(Dsn::Url(url)) => url
            .parse::<PgConnectOptions>()
            .map_err(|e| config_error(format!("invalid connection URL: {e}"))),
        ConnectionConfig::Dsn(Dsn::KeyValue(params)) | ConnectionConfig::Params(params) => {
            options_from_params(params)
        }
    }
}

fn options_from_params(params: &ConnectionParams) -> AdapterResult<PgConnectOptions> {
    let mut options = PgConnectOptions::new();
    if let Some(host) = &params.host {
        options = options.host(host);
    }
    if let Some(port) = params.port {
        options = options.port(port);
    }
    if let Some(dbname) = &params.dbname {
        options = options.database(dbname);
    }
    if let Some(user) = &params.user {
        options = options.username(user);
    }
    if let Some(password) = params.resolved_password() {
        options = options.password(&password);
    }

    for (key, value) in &params.extra {
        options = match key.as_str() {
            "sslmode" => options.ssl_mode(
                value
                    .parse::<PgSslMode>()
                    .map_err(|e| config_error(format!("invalid sslmode \"{value}\": {e}")))?,
            ),
            "sslrootcert" => options.ssl_root_cert(value.as_str()),
            "sslcert" => options.ssl_client_cert(value.as_str()),
            "sslkey" => options.ssl_client_key(value.as_str()),
            "application_name" => options.application_name(value),
            "options" => options.options(parse_server_options(value)?),
            "statement_cache_capacity" => {
                let capacity = value.parse::<usize>().map_err(|_| {
                    config_error(format!("invalid statement_cache_capacity \"{value}\""))
                })?;
                options.statement_cache_capacity(capacity)
            }
            key if CLIENT_ONLY_KEYS.contains(&key) => {
                tracing::warn!(key, "connection parameter not supported, ignored");
                options
            }
            // Anything else is a server run-time parameter.
            key => options.options([(key, value.as_str())]),
        };
    }

    Ok(options)
}

/// Split a libpq `options` value (`-c key=value --other=value`) into
/// run-time parameter pairs. A backslash escapes the next character.
fn parse_server_options(value: &str) -> AdapterResult<Vec<(String, String)>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut pairs = Vec::new();
    let mut tokens = tokens.into_iter();
    while let Some(token) = tokens.next() {
        // `--name=value` is shorthand for `-c name=value`, with dashes in the
        // name standing for underscores.
        let (setting, long_form) = if token == "-c" {
            let setting = tokens
                .next()
                .ok_or_else(|| config_error("options: \"-c\" without a setting".to_string()))?;
            (setting, false)
        } else if let Some(setting) = token.strip_prefix("--") {
            (setting.to_string(), true)
        } else if let Some(setting) = token.strip_prefix("-c") {
            (setting.to_string(), false)
        } else {
            return Err(config_error(format!("options: unsupported switch \"{token}\"")));
        };

        let Some((key, value)) = setting.split_once('=') else {
            return Err(config_error(format!("options: expected key=value, got \"{setting}\"")));
        };
        let key = if long_form {
            key.replace('-', "_")
        } else {
            key.to_string()
        };
        pairs.push((key, value.to_string()));
    }
    Ok(pairs)
}

fn config_error(message: String) -> AdapterError {
    AdapterError::Config(pgutils_core::ConfigError::Config(message))
}
