/// Connection Management Module
///
/// This module owns the two connection tiers of a client:
/// - the server descriptor, fixed at construction, used for catalog work
/// - the database descriptor, present once a database has been selected and
///   replaced wholesale on every successful selection
///
/// No connection outlives the operation that opened it. Components borrow one
/// through the scoped `with_*_connection` helpers, which always close it.

use crate::core::{AdminError, Result};
use tracing::{debug, info, warn};

use super::driver::{Connection, ConnectionDescriptor, Dialect, Driver};
use super::schema::list_databases_on;

/// Broker for every connection a client opens.
#[derive(Debug)]
pub struct ConnectionManager<D: Driver> {
    driver: D,
    server: ConnectionDescriptor,
    database: Option<ConnectionDescriptor>,
}

impl<D: Driver> ConnectionManager<D> {
    /// Creates a manager for `host:port` and checks the server is reachable.
    ///
    /// A connection is opened against the server descriptor and closed right
    /// away; nothing is kept.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UnreachableServer` when that connection cannot be
    /// opened. No manager is produced in that case.
    pub fn new(driver: D, host: impl Into<String>, port: u16) -> Result<Self> {
        let server = ConnectionDescriptor::server(host, port);
        let probe = driver.open(&server)?;
        probe.close().map_err(|e| AdminError::UnreachableServer {
            descriptor: server.to_string(),
            reason: e.to_string(),
        })?;
        info!("Server reachable at {}", server);

        Ok(ConnectionManager {
            driver,
            server,
            database: None,
        })
    }

    pub fn host(&self) -> &str {
        self.server.host()
    }

    pub fn port(&self) -> u16 {
        self.server.port()
    }

    /// Name of the currently selected database, if any.
    pub fn database(&self) -> Option<&str> {
        self.database.as_ref().and_then(|d| d.database())
    }

    pub fn server_descriptor(&self) -> &ConnectionDescriptor {
        &self.server
    }

    pub fn database_descriptor(&self) -> Option<&ConnectionDescriptor> {
        self.database.as_ref()
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    /// Selects the database that table operations run against.
    ///
    /// The name must be present in the server's database list at the time of
    /// the call. On success the database descriptor is rebuilt from host,
    /// name and port.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UnknownDatabase` when the name is not on the
    /// server; the previous selection is kept as it was.
    pub fn select_database(&mut self, name: &str) -> Result<()> {
        let databases = self.with_server_connection(|conn| list_databases_on(conn, self.dialect()))?;

        if !databases.iter().any(|d| d == name) {
            warn!(
                "Database '{}' not found on {}; keeping current selection {:?}",
                name,
                self.server,
                self.database()
            );
            return Err(AdminError::UnknownDatabase(name.to_string()));
        }

        let descriptor = self.server.for_database(name);
        info!("Selected database: {}", descriptor);
        self.database = Some(descriptor);
        Ok(())
    }

    /// Runs `f` on a fresh server-scope connection.
    pub fn with_server_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut D::Connection) -> Result<T>,
    {
        self.with_connection(&self.server, f)
    }

    /// Runs `f` on a fresh connection to the selected database.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::NoDatabaseSelected` before opening anything when
    /// no database has been selected.
    pub fn with_database_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut D::Connection) -> Result<T>,
    {
        let descriptor = self.database.as_ref().ok_or(AdminError::NoDatabaseSelected)?;
        self.with_connection(descriptor, f)
    }

    /// Opens a connection for `descriptor`, runs `f` and closes the
    /// connection whatever `f` returned.
    ///
    /// When both `f` and the close fail, the error from `f` is returned.
    pub fn with_connection<T, F>(&self, descriptor: &ConnectionDescriptor, f: F) -> Result<T>
    where
        F: FnOnce(&mut D::Connection) -> Result<T>,
    {
        let mut conn = self.driver.open(descriptor)?;
        let result = f(&mut conn);
        let closed = conn.close();
        debug!("Closed connection: {}", descriptor);

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!("Failed to close connection {} after error: {}", descriptor, close_err);
                Err(err)
            }
        }
    }
}
