/// Error Module
///
/// This module defines the error taxonomy for the administration client.
/// Every fallible operation returns [`AdminError`] through the crate-wide
/// [`Result`] alias, so callers see one error type regardless of which
/// driver sits underneath.
use thiserror::Error;

/// Boxed driver error carried verbatim inside [`AdminError::QueryExecution`].
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for the administration client.
///
/// The variants map onto the failure points of the two-tier connection model:
/// - opening connections (server unreachable, no database selected)
/// - validating writes (table probe, row arity, identifiers)
/// - executing statements (driver failures, passed through untouched)
/// - ambient concerns (configuration, I/O, JSON export)
#[derive(Error, Debug)]
pub enum AdminError {
    /// A connection could not be opened for the given descriptor.
    ///
    /// Fatal when raised while constructing a client.
    #[error("Server unreachable ({descriptor}): {reason}")]
    UnreachableServer { descriptor: String, reason: String },

    /// A database-scoped operation ran before any database was selected.
    #[error("No database selected - select a database before running table operations")]
    NoDatabaseSelected,

    /// The requested database is not present on the server.
    ///
    /// Non-fatal: the previous selection stays in place.
    #[error("Unknown database: '{0}' is not present on the server")]
    UnknownDatabase(String),

    /// The arity probe against the target table failed.
    #[error("Table probe failed for '{table}': {reason}")]
    TableProbeFailed { table: String, reason: String },

    /// A row does not have as many values as the table has columns.
    #[error("Arity mismatch for table '{table}': expected {expected} values, got {actual}")]
    ArityMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },

    /// An identifier was rejected by the parameterized write path.
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A statement failed inside the driver.
    #[error("Query execution failed: {0}")]
    QueryExecution(#[source] DriverError),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON export errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdminError {
    /// Wraps any driver-level failure as [`AdminError::QueryExecution`].
    pub fn query<E>(err: E) -> Self
    where
        E: Into<DriverError>,
    {
        AdminError::QueryExecution(err.into())
    }
}

impl From<rusqlite::Error> for AdminError {
    fn from(err: rusqlite::Error) -> Self {
        AdminError::QueryExecution(Box::new(err))
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for AdminError {
    fn from(err: postgres::Error) -> Self {
        AdminError::QueryExecution(Box::new(err))
    }
}

/// Type alias for Result using [`AdminError`] as the error type.
pub type Result<T> = std::result::Result<T, AdminError>;
