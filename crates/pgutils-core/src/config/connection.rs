//! Connection descriptors.
//!
//! A connection is described either by discrete parameters or by a DSN
//! string, never both. Two DSN syntaxes are accepted:
//! 1. libpq key/value pairs: `dbname=gis user=me host=localhost port=5432`
//! 2. URIs: `postgresql://me@localhost:5432/gis`
//!
//! When a config supplies a `dsn` next to discrete fields, the fields are
//! discarded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Keys whose values are never written to logs.
const SECRET_KEYS: &[&str] = &["password", "sslpassword"];

/// Discrete connection parameters.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Hostname or socket directory of the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password. Takes precedence over
    /// `password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Additional key/value parameters, e.g. `sslmode` or `application_name`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ConnectionParams {
    /// Get the password, checking `password_env` first.
    pub fn resolved_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env
            && let Ok(password) = std::env::var(env_var)
        {
            return Some(password);
        }
        self.password.clone()
    }

    /// A `key=value` description without secrets, for logging.
    pub fn redacted(&self) -> String {
        let mut parts = Vec::new();
        if let Some(host) = &self.host {
            parts.push(format!("host={host}"));
        }
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if let Some(dbname) = &self.dbname {
            parts.push(format!("dbname={dbname}"));
        }
        if let Some(user) = &self.user {
            parts.push(format!("user={user}"));
        }
        for (key, value) in &self.extra {
            if !SECRET_KEYS.contains(&key.as_str()) {
                parts.push(format!("{key}={value}"));
            }
        }
        parts.join(" ")
    }

    /// Build parameters from parsed key/value pairs. Unknown keys are kept
    /// in `extra`.
    fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ConfigError> {
        let mut params = ConnectionParams::default();
        for (key, value) in pairs {
            match key.as_str() {
                "host" => params.host = Some(value),
                "hostaddr" if params.host.is_none() => params.host = Some(value),
                "port" => {
                    let port = value.parse::<u16>().map_err(|_| {
                        ConfigError::Config(format!("invalid port number: \"{value}\""))
                    })?;
                    params.port = Some(port);
                }
                "dbname" => params.dbname = Some(value),
                "user" => params.user = Some(value),
                "password" => params.password = Some(value),
                _ => {
                    params.extra.insert(key, value);
                }
            }
        }
        Ok(params)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("password_env", &self.password_env)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A parsed DSN string.
#[derive(Clone, PartialEq, Eq)]
pub enum Dsn {
    /// `postgres://` or `postgresql://` URI, kept verbatim.
    Url(String),
    /// libpq key/value pairs.
    KeyValue(ConnectionParams),
}

impl Dsn {
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let trimmed = input.trim();
        if trimmed.starts_with("postgres://") || trimmed.starts_with("postgresql://") {
            return Ok(Dsn::Url(trimmed.to_string()));
        }
        let pairs = parse_key_value_pairs(input)?;
        Ok(Dsn::KeyValue(ConnectionParams::from_pairs(pairs)?))
    }

    /// A description without secrets, for logging.
    pub fn redacted(&self) -> String {
        match self {
            Dsn::KeyValue(params) => params.redacted(),
            Dsn::Url(url) => redact_url(url),
        }
    }
}

impl FromStr for Dsn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dsn({})", self.redacted())
    }
}

/// Where to connect. Exactly one form is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnectionConfig")]
pub enum ConnectionConfig {
    Dsn(Dsn),
    Params(ConnectionParams),
}

impl ConnectionConfig {
    /// Build from a DSN string.
    pub fn from_dsn(dsn: &str) -> Result<Self, ConfigError> {
        Dsn::parse(dsn).map(ConnectionConfig::Dsn)
    }

    /// A description without secrets, for logging.
    pub fn redacted(&self) -> String {
        match self {
            ConnectionConfig::Dsn(dsn) => dsn.redacted(),
            ConnectionConfig::Params(params) => params.redacted(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig::Params(ConnectionParams::default())
    }
}

impl From<ConnectionParams> for ConnectionConfig {
    fn from(params: ConnectionParams) -> Self {
        ConnectionConfig::Params(params)
    }
}

impl From<Dsn> for ConnectionConfig {
    fn from(dsn: Dsn) -> Self {
        ConnectionConfig::Dsn(dsn)
    }
}

/// On-disk shape: a `dsn` key alongside (ignored) discrete fields.
#[derive(Deserialize)]
struct RawConnectionConfig {
    #[serde(default)]
    dsn: Option<String>,
    #[serde(flatten)]
    params: ConnectionParams,
}

impl TryFrom<RawConnectionConfig> for ConnectionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConnectionConfig) -> Result<Self, Self::Error> {
        match raw.dsn {
            Some(dsn) => {
                if raw.params != ConnectionParams::default() {
                    tracing::debug!("dsn given, discarding discrete connection fields");
                }
                ConnectionConfig::from_dsn(&dsn)
            }
            None => Ok(ConnectionConfig::Params(raw.params)),
        }
    }
}

/// Split a libpq key/value connection string into pairs.
///
/// Values may be single-quoted; inside or outside quotes a backslash
/// escapes the next character.
fn parse_key_value_pairs(input: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut pairs = Vec::new();
    let mut chars = input.char_indices().peekable();

    loop {
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        let Some(&(key_start, _)) = chars.peek() else {
            break;
        };

        let mut key = String::new();
        while let Some((_, c)) = chars.next_if(|(_, c)| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
        if chars.next_if(|(_, c)| *c == '=').is_none() {
            return Err(ConfigError::InvalidDsn {
                position: key_start,
                message: format!("missing \"=\" after \"{key}\""),
            });
        }
        if key.is_empty() {
            return Err(ConfigError::InvalidDsn {
                position: key_start,
                message: "empty parameter name".to_string(),
            });
        }
        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if let Some((quote_pos, _)) = chars.next_if(|(_, c)| *c == '\'') {
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '\'' => {
                        closed = true;
                        break;
                    }
                    other => value.push(other),
                }
            }
            if !closed {
                return Err(ConfigError::InvalidDsn {
                    position: quote_pos,
                    message: "unterminated quoted string".to_string(),
                });
            }
        } else {
            while let Some((_, c)) = chars.next_if(|(_, c)| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = url[authority_start..]
        .find('/')
        .map_or(url.len(), |i| authority_start + i);
    let authority = &url[authority_start..authority_end];
    let Some(at) = authority.rfind('@') else {
        return url.to_string();
    };
    let userinfo = &authority[..at];
    let Some(colon) = userinfo.find(':') else {
        return url.to_string();
    };
    format!(
        "{}{}:***{}",
        &url[..authority_start],
        &userinfo[..colon],
        &url[authority_start + at..]
    )
}
