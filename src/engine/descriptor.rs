// Builds the engine configuration JSON from a database URL.

use serde::{Deserialize, Serialize};
use url::Url;

const SQLITE_PREFIX: &str = "sqlite3://";

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("database url is empty")]
    EmptyUrl,
    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported database scheme: {0}")]
    UnsupportedScheme(String),
    #[error("database url {0} does not name a database")]
    MissingDatabase(String),
    #[error("failed to encode engine configuration: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Filesystem locations the engine reads at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnginePaths {
    pub config_path: String,
    pub resource_path: String,
    pub support_path: String,
}

impl Default for EnginePaths {
    fn default() -> Self {
        Self {
            config_path: "/etc/opt/senzing".to_string(),
            resource_path: "/opt/senzing/g2/resources".to_string(),
            support_path: "/opt/senzing/data".to_string(),
        }
    }
}

#[derive(Serialize)]
struct EngineConfiguration<'a> {
    #[serde(rename = "PIPELINE")]
    pipeline: Pipeline<'a>,
    #[serde(rename = "SQL")]
    sql: Sql,
}

#[derive(Serialize)]
struct Pipeline<'a> {
    #[serde(rename = "CONFIGPATH")]
    config_path: &'a str,
    #[serde(rename = "RESOURCEPATH")]
    resource_path: &'a str,
    #[serde(rename = "SUPPORTPATH")]
    support_path: &'a str,
}

#[derive(Serialize)]
struct Sql {
    #[serde(rename = "CONNECTION")]
    connection: String,
}

/// Produces `{"PIPELINE": {...}, "SQL": {"CONNECTION": ...}}` for a single
/// database given as a URL.
pub fn build_simple_system_configuration(
    database_url: &str,
    paths: &EnginePaths,
) -> Result<String, DescriptorError> {
    let connection = connection_string(database_url)?;
    let cfg = EngineConfiguration {
        pipeline: Pipeline {
            config_path: &paths.config_path,
            resource_path: &paths.resource_path,
            support_path: &paths.support_path,
        },
        sql: Sql { connection },
    };
    Ok(serde_json::to_string(&cfg)?)
}

/// Translates a database URL into the engine's connection string dialect.
pub fn connection_string(database_url: &str) -> Result<String, DescriptorError> {
    let database_url = database_url.trim();
    if database_url.is_empty() {
        return Err(DescriptorError::EmptyUrl);
    }

    // sqlite URLs carry placeholder credentials and no host, which a WHATWG
    // parser rejects.
    if let Some(rest) = database_url.strip_prefix(SQLITE_PREFIX) {
        let path = rest.rsplit_once('@').map(|(_, p)| p).unwrap_or(rest);
        if path.is_empty() {
            return Err(DescriptorError::MissingDatabase(database_url.to_string()));
        }
        return Ok(format!("{}na:na@{}", SQLITE_PREFIX, path));
    }

    let url = Url::parse(database_url)?;
    let database = url.path().trim_start_matches('/');
    let host = url.host_str().unwrap_or("localhost");
    let credentials = match url.password() {
        Some(password) => format!("{}:{}", url.username(), password),
        None => url.username().to_string(),
    };

    match url.scheme() {
        "postgresql" | "postgres" => {
            if database.is_empty() {
                return Err(DescriptorError::MissingDatabase(database_url.to_string()));
            }
            let port = url.port().unwrap_or(5432);
            Ok(format!("postgresql://{}@{}:{}:{}/", credentials, host, port, database))
        }
        "mysql" => {
            if database.is_empty() {
                return Err(DescriptorError::MissingDatabase(database_url.to_string()));
            }
            let port = url.port().unwrap_or(3306);
            Ok(format!("mysql://{}@{}:{}/?schema={}", credentials, host, port, database))
        }
        "mssql" => {
            // ODBC: the host part names the DSN.
            Ok(format!("mssql://{}@{}", credentials, host))
        }
        other => Err(DescriptorError::UnsupportedScheme(other.to_string())),
    }
}
