//! Administration client
//!
//! [`Client`] is the public surface: one value per server, carrying the
//! server coordinates, the currently selected database and the write
//! settings. Every method opens the connections it needs and closes them
//! before returning.

use crate::core::db::query::{query, query_with};
use crate::core::db::{
    ConnectionDescriptor, ConnectionManager, Driver, MetadataCatalog, ResultTable, SchemaMap,
    Value, WriteOptions, WriteValidator,
};
use crate::core::Result;

/// Client for one database server.
///
/// ```no_run
/// use dbadmin::{Client, SqliteServer};
///
/// let mut client = Client::connect(SqliteServer::new("/var/lib/dbadmin"), "localhost", 5432)?;
/// client.create_database("sales")?;
/// client.select_database("sales")?;
/// client.update("CREATE TABLE orders (id INTEGER, item TEXT)")?;
/// client.update("INSERT INTO orders VALUES (1, 'seed')")?;
/// client.insert_one("orders", &[2.into(), "lamp".into()])?;
/// let orders = client.query("SELECT * FROM orders")?;
/// println!("{}", orders);
/// # Ok::<(), dbadmin::AdminError>(())
/// ```
#[derive(Debug)]
pub struct Client<D: Driver> {
    connections: ConnectionManager<D>,
    options: WriteOptions,
}

impl<D: Driver> Client<D> {
    /// Connects to `host:port`, failing with `UnreachableServer` if the server
    /// does not answer.
    pub fn connect(driver: D, host: impl Into<String>, port: u16) -> Result<Self> {
        Ok(Client {
            connections: ConnectionManager::new(driver, host, port)?,
            options: WriteOptions::default(),
        })
    }

    /// Replaces the write settings.
    pub fn with_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    pub fn set_options(&mut self, options: WriteOptions) {
        self.options = options;
    }

    pub fn host(&self) -> &str {
        self.connections.host()
    }

    pub fn port(&self) -> u16 {
        self.connections.port()
    }

    /// Currently selected database, if any.
    pub fn database(&self) -> Option<&str> {
        self.connections.database()
    }

    pub fn server_descriptor(&self) -> &ConnectionDescriptor {
        self.connections.server_descriptor()
    }

    pub fn database_descriptor(&self) -> Option<&ConnectionDescriptor> {
        self.connections.database_descriptor()
    }

    /// Selects the database for table operations.
    ///
    /// An unknown name yields `UnknownDatabase` and leaves the previous
    /// selection in place.
    pub fn select_database(&mut self, name: &str) -> Result<()> {
        self.connections.select_database(name)
    }

    pub fn list_databases(&self) -> Result<Vec<String>> {
        self.catalog().list_databases()
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        self.catalog().create_database(name)
    }

    pub fn delete_database(&self, name: &str) -> Result<()> {
        self.catalog().delete_database(name)
    }

    /// Public tables of every database; unreadable databases map to `None`.
    pub fn schema_map(&self) -> Result<SchemaMap> {
        self.catalog().schema_map()
    }

    /// Runs an arbitrary statement against the selected database and commits.
    pub fn update(&self, sql: &str) -> Result<()> {
        self.writer().update(sql)
    }

    pub fn insert_one(&self, table: &str, values: &[Value]) -> Result<()> {
        self.writer().insert_one(table, values)
    }

    /// Inserts all rows or, on any arity mismatch, none. Returns rows written.
    pub fn insert_many<R: AsRef<[Value]>>(&self, table: &str, rows: &[R]) -> Result<usize> {
        self.writer().insert_many(table, rows)
    }

    pub fn query(&self, sql: &str) -> Result<ResultTable> {
        query(&self.connections, sql)
    }

    pub fn query_with(&self, sql: &str, params: &[Value]) -> Result<ResultTable> {
        query_with(&self.connections, sql, params)
    }

    fn catalog(&self) -> MetadataCatalog<'_, D> {
        MetadataCatalog::new(&self.connections)
    }

    fn writer(&self) -> WriteValidator<'_, D> {
        WriteValidator::new(&self.connections, self.options)
    }
}
