use crate::core::db::{SqliteServer, WriteOptions};
use crate::core::{AdminError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the data directory used when `[sqlite] data_dir` is not set.
pub const DEFAULT_DATA_DIR_NAME: &str = "dbadmin";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub client: WriteOptions,
    pub sqlite: Option<SqliteConfig>,
    pub postgres: Option<PostgresConfig>,
}

/// Which driver to talk to the server with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[default]
    Sqlite,
    Postgres,
}

/// Server coordinates.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub driver: DriverKind,
    pub host: String,
    pub port: u16,
    /// Database selected right after connecting
    pub database: Option<String>,
}

/// SQLite server settings.
#[derive(Debug, Deserialize)]
pub struct SqliteConfig {
    pub data_dir: Option<PathBuf>,
}

/// PostgreSQL credentials.
#[derive(Debug, Deserialize)]
pub struct PostgresConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AdminError::Config(e.to_string()))
    }

    /// Data directory for the SQLite server: the configured one, or
    /// `dbadmin` under the platform data directory.
    pub fn sqlite_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = self.sqlite.as_ref().and_then(|s| s.data_dir.clone()) {
            return Ok(dir);
        }
        dirs::data_dir()
            .map(|d| d.join(DEFAULT_DATA_DIR_NAME))
            .ok_or_else(|| AdminError::Config("no data directory configured or available".to_string()))
    }

    /// SQLite server answering at the configured address.
    pub fn sqlite_server(&self) -> Result<SqliteServer> {
        Ok(SqliteServer::new(self.sqlite_data_dir()?).listening_on(&self.server.host, self.server.port))
    }

    #[cfg(feature = "postgres")]
    pub fn postgres_driver(&self) -> crate::core::db::PostgresDriver {
        let mut driver = crate::core::db::PostgresDriver::new();
        if let Some(pg) = &self.postgres {
            if let Some(user) = &pg.user {
                driver = driver.user(user);
            }
            if let Some(password) = &pg.password {
                driver = driver.password(password);
            }
        }
        driver
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
///
/// # Example
///
/// ```no_run
/// let config = dbadmin::config::load_config("dbadmin.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}
