/// # Test Utilities Module
///
/// Fixtures for unit tests: a throwaway [`SqliteServer`] rooted in a
/// temporary directory, with helpers to seed databases directly.

use crate::core::db::{ConnectionDescriptor, ConnectionManager, Dialect, Driver, SqliteServer, Value};
use crate::core::{AdminError, Result};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A temporary data directory served by a [`SqliteServer`].
pub struct ServerFixture {
    dir: TempDir,
}

impl ServerFixture {
    /// Creates a server with no databases
    pub fn new() -> Self {
        ServerFixture {
            dir: TempDir::new().expect("temporary directory"),
        }
    }

    /// Creates a server holding empty databases with the given names
    pub fn with_databases(names: &[&str]) -> Self {
        let fixture = Self::new();
        for name in names {
            fs::write(fixture.server().database_path(name), b"").expect("database file");
        }
        fixture
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn server(&self) -> SqliteServer {
        SqliteServer::new(self.dir.path())
    }

    /// Runs a batch directly against a database file, bypassing the client
    pub fn execute(&self, database: &str, sql: &str) {
        let conn = Connection::open(self.server().database_path(database)).expect("open database");
        conn.execute_batch(sql).expect("seed database");
    }

    /// Places a file that is not a SQLite database under `name`
    pub fn corrupt(&self, name: &str) {
        fs::write(
            self.server().database_path(name),
            "this file is not a sqlite database\n".repeat(200),
        )
        .expect("corrupt database file");
    }

    pub fn manager(&self) -> ConnectionManager<SqliteServer> {
        ConnectionManager::new(self.server(), "localhost", 5432).expect("reachable server")
    }

    /// Manager with `database` already selected
    pub fn manager_on(&self, database: &str) -> ConnectionManager<SqliteServer> {
        let mut manager = self.manager();
        manager.select_database(database).expect("database exists");
        manager
    }
}

/// A driver whose connections answer from a fixed script. Used for failure
/// paths a real server does not produce on demand.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDriver {
    /// Rows returned by the database catalog query
    pub databases: Vec<String>,
    /// The single row every `SELECT * FROM` returns
    pub table_row: Vec<Value>,
    pub fail_insert: bool,
    pub fail_rollback: bool,
    pub fail_close: bool,
}

pub struct ScriptedConnection {
    script: ScriptedDriver,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Driver for ScriptedDriver {
    type Connection = ScriptedConnection;

    fn open(&self, _descriptor: &ConnectionDescriptor) -> Result<ScriptedConnection> {
        Ok(ScriptedConnection {
            script: self.clone(),
            columns: Vec::new(),
            rows: Vec::new(),
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }
}

impl crate::core::db::Connection for ScriptedConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.columns.clear();
        self.rows.clear();
        if sql == Dialect::Sqlite.list_databases_sql() {
            self.columns = vec!["datname".to_string()];
            self.rows = self
                .script
                .databases
                .iter()
                .map(|d| vec![Value::from(d.as_str())])
                .collect();
        } else if sql.starts_with("SELECT * FROM") {
            self.columns = (0..self.script.table_row.len()).map(|i| format!("c{}", i)).collect();
            self.rows = vec![self.script.table_row.clone()];
        } else if sql.starts_with("INSERT") && self.script.fail_insert {
            return Err(AdminError::query("insert failed"));
        }
        Ok(())
    }

    fn execute_with(&mut self, sql: &str, _params: &[Value]) -> Result<()> {
        self.execute(sql)
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(std::mem::take(&mut self.rows))
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.script.fail_rollback {
            return Err(AdminError::query("rollback failed"));
        }
        Ok(())
    }

    fn set_autocommit(&mut self, _autocommit: bool) -> Result<()> {
        Ok(())
    }

    fn close(self) -> Result<()> {
        if self.script.fail_close {
            return Err(AdminError::query("close failed"));
        }
        Ok(())
    }
}
