/// SQLite Server Driver
///
/// Exposes a directory of SQLite files as a database server. Every
/// `<name>.db` file inside the data directory is one database; the server
/// answers at a single host/port address so descriptors are checked the same
/// way a network driver would check them.
///
/// Server-scope connections are in-memory SQLite connections carrying:
/// - a `databases(datname)` table, a sorted snapshot of the data directory
///   taken when the connection opens
/// - `create_database(name)` and `drop_database(name)` SQL functions
///
/// Database-scope connections open the database file read-write and never
/// create it.

use crate::core::{AdminError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::OpenFlags;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::driver::{Connection, ConnectionDescriptor, Dialect, Driver};
use super::value::Value;

/// File extension of database files inside the data directory.
pub const DATABASE_EXTENSION: &str = "db";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;

static DATABASE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("database name pattern is valid")
});

/// A directory of SQLite databases served at `host:port`.
#[derive(Debug, Clone)]
pub struct SqliteServer {
    data_dir: PathBuf,
    host: String,
    port: u16,
}

impl SqliteServer {
    /// Creates a server over `data_dir`, listening on the default address.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        SqliteServer {
            data_dir: data_dir.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }

    /// Moves the server to another address.
    pub fn listening_on(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path of the file backing `name`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        database_path(&self.data_dir, name)
    }

    /// Database names present in the data directory, sorted.
    pub fn scan_databases(&self) -> std::io::Result<Vec<String>> {
        scan_databases(&self.data_dir)
    }

    fn unreachable(&self, descriptor: &ConnectionDescriptor, reason: impl Into<String>) -> AdminError {
        AdminError::UnreachableServer {
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }

    fn open_server_scope(&self, descriptor: &ConnectionDescriptor) -> Result<rusqlite::Connection> {
        let databases = self
            .scan_databases()
            .map_err(|e| self.unreachable(descriptor, e.to_string()))?;

        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| self.unreachable(descriptor, e.to_string()))?;
        conn.execute_batch("CREATE TABLE databases (datname TEXT NOT NULL)")?;
        {
            let mut insert = conn.prepare("INSERT INTO databases (datname) VALUES (?1)")?;
            for name in &databases {
                insert.execute([name])?;
            }
        }

        let dir = self.data_dir.clone();
        conn.create_scalar_function(
            "create_database",
            1,
            FunctionFlags::SQLITE_UTF8,
            move |ctx| {
                let name = ctx.get::<String>(0)?;
                create_database_file(&dir, &name)
                    .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                Ok(name)
            },
        )?;

        let dir = self.data_dir.clone();
        conn.create_scalar_function(
            "drop_database",
            1,
            FunctionFlags::SQLITE_UTF8,
            move |ctx| {
                let name = ctx.get::<String>(0)?;
                drop_database_file(&dir, &name)
                    .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
                Ok(name)
            },
        )?;

        Ok(conn)
    }

    fn open_database_scope(
        &self,
        descriptor: &ConnectionDescriptor,
        name: &str,
    ) -> Result<rusqlite::Connection> {
        if !DATABASE_NAME.is_match(name) {
            return Err(self.unreachable(descriptor, format!("invalid database name '{}'", name)));
        }
        let path = self.database_path(name);
        if !path.is_file() {
            return Err(self.unreachable(descriptor, format!("database '{}' does not exist", name)));
        }
        rusqlite::Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|e| self.unreachable(descriptor, e.to_string()))
    }
}

impl Driver for SqliteServer {
    type Connection = SqliteConnection;

    fn open(&self, descriptor: &ConnectionDescriptor) -> Result<SqliteConnection> {
        if descriptor.host() != self.host || descriptor.port() != self.port {
            return Err(self.unreachable(
                descriptor,
                format!("no server listening at {}:{}", descriptor.host(), descriptor.port()),
            ));
        }
        if !self.data_dir.is_dir() {
            return Err(self.unreachable(
                descriptor,
                format!("data directory {} is missing", self.data_dir.display()),
            ));
        }

        let conn = match descriptor.database() {
            None => self.open_server_scope(descriptor)?,
            Some(name) => self.open_database_scope(descriptor, name)?,
        };
        debug!("Opened sqlite connection: {}", descriptor);
        Ok(SqliteConnection::new(conn))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

fn database_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, DATABASE_EXTENSION))
}

fn scan_databases(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(DATABASE_EXTENSION) {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if DATABASE_NAME.is_match(stem) {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn create_database_file(dir: &Path, name: &str) -> std::result::Result<(), String> {
    if !DATABASE_NAME.is_match(name) {
        return Err(format!("invalid database name '{}'", name));
    }
    // An empty file is a valid, empty SQLite database.
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(database_path(dir, name))
        .map(|_| ())
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => format!("database '{}' already exists", name),
            _ => e.to_string(),
        })
}

fn drop_database_file(dir: &Path, name: &str) -> std::result::Result<(), String> {
    if !DATABASE_NAME.is_match(name) {
        return Err(format!("invalid database name '{}'", name));
    }
    fs::remove_file(database_path(dir, name)).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => format!("database '{}' does not exist", name),
        _ => e.to_string(),
    })
}

/// A connection to one [`SqliteServer`] scope.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    autocommit: bool,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl SqliteConnection {
    fn new(conn: rusqlite::Connection) -> Self {
        SqliteConnection {
            conn,
            autocommit: false,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Whether a transaction is currently open.
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if !self.autocommit && !self.in_transaction() {
            self.conn.execute_batch("BEGIN")?;
        }

        // Every statement in `sql` runs; the last one's result set is kept.
        let mut batch = rusqlite::Batch::new(&self.conn, sql);
        let mut executed = 0;
        let mut columns = Vec::new();
        let mut rows = Vec::new();
        while let Some(mut stmt) = batch.next()? {
            if executed > 0 && !params.is_empty() {
                return Err(AdminError::query("bound parameters require a single statement"));
            }
            columns = stmt.column_names().into_iter().map(String::from).collect();
            rows = read_rows(&mut stmt, params)?;
            executed += 1;
        }

        self.columns = columns;
        self.rows = rows;
        Ok(())
    }
}

fn read_rows(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<Vec<Vec<Value>>> {
    let column_count = stmt.column_count();
    let mut rows = Vec::new();
    let mut cursor = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            values.push(Value::from(row.get_ref(i)?));
        }
        rows.push(values);
    }
    Ok(rows)
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.run(sql, &[])
    }

    fn execute_with(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        self.run(sql, params)
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        if autocommit && self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| AdminError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server() -> (TempDir, SqliteServer) {
        let dir = TempDir::new().unwrap();
        let server = SqliteServer::new(dir.path());
        (dir, server)
    }

    fn root(server: &SqliteServer) -> ConnectionDescriptor {
        ConnectionDescriptor::server(server.host(), server.port())
    }

    #[test]
    fn test_server_scope_lists_database_files() {
        let (dir, server) = server();
        fs::write(dir.path().join("beta.db"), b"").unwrap();
        fs::write(dir.path().join("alpha.db"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let mut conn = server.open(&root(&server)).unwrap();
        conn.execute(Dialect::Sqlite.list_databases_sql()).unwrap();
        assert_eq!(conn.columns(), vec!["datname"]);
        let rows = conn.fetch_all().unwrap();
        assert_eq!(
            rows,
            vec![vec![Value::from("alpha")], vec![Value::from("beta")]]
        );
        conn.close().unwrap();
    }

    #[test]
    fn test_create_and_drop_database_functions() {
        let (dir, server) = server();

        let mut conn = server.open(&root(&server)).unwrap();
        conn.set_autocommit(true).unwrap();
        conn.execute(&Dialect::Sqlite.create_database_sql("sales")).unwrap();
        assert!(dir.path().join("sales.db").is_file());

        // Creating twice fails inside the function
        assert!(conn.execute(&Dialect::Sqlite.create_database_sql("sales")).is_err());

        conn.execute(&Dialect::Sqlite.drop_database_sql("sales")).unwrap();
        assert!(!dir.path().join("sales.db").exists());
        conn.close().unwrap();
    }

    #[test]
    fn test_create_database_rejects_path_names() {
        let (_dir, server) = server();
        let mut conn = server.open(&root(&server)).unwrap();
        let result = conn.execute(&Dialect::Sqlite.create_database_sql("../escape"));
        match result {
            Err(AdminError::QueryExecution(e)) => assert!(e.to_string().contains("invalid database name")),
            _ => panic!("Expected QueryExecution error"),
        }
    }

    #[test]
    fn test_wrong_address_is_unreachable() {
        let (_dir, server) = server();
        let result = server.open(&ConnectionDescriptor::server("elsewhere", 5432));
        match result {
            Err(AdminError::UnreachableServer { reason, .. }) => {
                assert!(reason.contains("no server listening"))
            }
            _ => panic!("Expected UnreachableServer error"),
        }
        assert!(server
            .open(&ConnectionDescriptor::server(DEFAULT_HOST, 1))
            .is_err());
    }

    #[test]
    fn test_missing_database_is_unreachable() {
        let (_dir, server) = server();
        let result = server.open(&root(&server).for_database("ghost"));
        assert!(matches!(result, Err(AdminError::UnreachableServer { .. })));
    }

    #[test]
    fn test_uncommitted_work_is_discarded_on_close() {
        let (dir, server) = server();
        fs::write(dir.path().join("app.db"), b"").unwrap();
        let app = root(&server).for_database("app");

        let mut conn = server.open(&app).unwrap();
        conn.set_autocommit(true).unwrap();
        conn.execute("CREATE TABLE t (id INTEGER)").unwrap();
        conn.close().unwrap();

        let mut conn = server.open(&app).unwrap();
        conn.execute("INSERT INTO t VALUES (1)").unwrap();
        assert!(conn.in_transaction());
        conn.close().unwrap();

        let mut conn = server.open(&app).unwrap();
        conn.execute("INSERT INTO t VALUES (2)").unwrap();
        conn.commit().unwrap();
        conn.execute("SELECT id FROM t").unwrap();
        assert_eq!(conn.fetch_all().unwrap(), vec![vec![Value::Integer(2)]]);
        conn.close().unwrap();
    }

    #[test]
    fn test_execute_with_parameters() {
        let (dir, server) = server();
        fs::write(dir.path().join("app.db"), b"").unwrap();

        let mut conn = server.open(&root(&server).for_database("app")).unwrap();
        conn.execute("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
        conn.execute_with(
            "INSERT INTO t VALUES (?1, ?2)",
            &[Value::Integer(7), Value::from("it's")],
        )
        .unwrap();
        conn.execute("SELECT id, name FROM t").unwrap();
        assert_eq!(
            conn.fetch_all().unwrap(),
            vec![vec![Value::Integer(7), Value::from("it's")]]
        );
        // Rows are handed out once
        assert!(conn.fetch_all().unwrap().is_empty());
        conn.commit().unwrap();
        conn.close().unwrap();
    }

    #[test]
    fn test_execute_runs_every_statement() {
        let (dir, server) = server();
        fs::write(dir.path().join("app.db"), b"").unwrap();

        let mut conn = server.open(&root(&server).for_database("app")).unwrap();
        conn.execute(
            "CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);",
        )
        .unwrap();
        conn.execute("INSERT INTO t VALUES (3); SELECT COUNT(*) AS n FROM t").unwrap();
        assert_eq!(conn.columns(), vec!["n"]);
        assert_eq!(conn.fetch_all().unwrap(), vec![vec![Value::Integer(3)]]);

        let result = conn.execute_with("SELECT ?1; SELECT ?1", &[Value::Integer(1)]);
        assert!(matches!(result, Err(AdminError::QueryExecution(_))));
        conn.close().unwrap();
    }
}
