/// Driver Module
///
/// The seam between the client and whatever engine sits behind it. A
/// [`Driver`] knows how to open a [`Connection`] for a
/// [`ConnectionDescriptor`]; a connection executes statements cursor-style
/// and is closed by its owner once the logical operation is done.

use crate::core::Result;
use std::fmt;

use super::value::Value;

/// Network coordinates of a server, optionally narrowed to one database.
///
/// Descriptors are values: selecting another database builds a new one with
/// [`ConnectionDescriptor::for_database`] rather than editing an old one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    host: String,
    port: u16,
    database: Option<String>,
}

impl ConnectionDescriptor {
    /// Creates a server-scope descriptor.
    pub fn server(host: impl Into<String>, port: u16) -> Self {
        ConnectionDescriptor {
            host: host.into(),
            port,
            database: None,
        }
    }

    /// Builds a database-scope descriptor on the same host and port.
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        ConnectionDescriptor {
            host: self.host.clone(),
            port: self.port,
            database: Some(database.into()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn is_server_scope(&self) -> bool {
        self.database.is_none()
    }
}

impl fmt::Display for ConnectionDescriptor {
    /// libpq keyword/value form, e.g. `host='db' dbname='app' port='5432'`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host='{}'", self.host)?;
        if let Some(database) = &self.database {
            write!(f, " dbname='{}'", database)?;
        }
        write!(f, " port='{}'", self.port)
    }
}

/// SQL flavour spoken by a driver.
///
/// Catalog statements differ per engine; everything else the client issues
/// (`SELECT * ... LIMIT 1`, `INSERT INTO ... VALUES`) is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Lists database names on the server.
    pub fn list_databases_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => "SELECT datname FROM pg_database",
            Dialect::Sqlite => "SELECT datname FROM databases",
        }
    }

    /// Lists public table names of the connected database, lexicographically.
    pub fn public_tables_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'public' ORDER BY table_name"
            }
            Dialect::Sqlite => {
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
            }
        }
    }

    pub fn create_database_sql(&self, name: &str) -> String {
        match self {
            Dialect::Postgres => format!("CREATE DATABASE {}", name),
            Dialect::Sqlite => format!("SELECT create_database('{}')", name),
        }
    }

    pub fn drop_database_sql(&self, name: &str) -> String {
        match self {
            Dialect::Postgres => format!("DROP DATABASE {}", name),
            Dialect::Sqlite => format!("SELECT drop_database('{}')", name),
        }
    }

    /// Positional parameter marker, 1-based.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => format!("?{}", index),
        }
    }

    pub fn bytes_literal(&self, bytes: &[u8]) -> String {
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        match self {
            Dialect::Postgres => format!("'\\x{}'::bytea", hex),
            Dialect::Sqlite => format!("X'{}'", hex),
        }
    }
}

/// Opens connections against a server.
pub trait Driver {
    type Connection: Connection;

    /// Opens a connection for the descriptor.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UnreachableServer` when the server or the
    /// requested database cannot be reached.
    fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Connection>;

    fn dialect(&self) -> Dialect;
}

/// A live connection, used cursor-style.
///
/// Connections start outside autocommit: the first statement implicitly opens
/// a transaction that lasts until [`Connection::commit`] or
/// [`Connection::rollback`]. Closing with a transaction still open discards it.
pub trait Connection {
    /// Executes a statement, replacing any previously buffered result set.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Executes a statement with positional parameters.
    fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    /// Takes every buffered row of the last result set.
    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>>;

    /// Column names of the last result set, in result order.
    fn columns(&self) -> Vec<String>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn set_autocommit(&mut self, autocommit: bool) -> Result<()>;

    fn close(self) -> Result<()>;
}
