//! Shared fixtures for integration tests

#![allow(dead_code)]

use dbadmin::{Client, SqliteServer, Value};
use std::fs;
use tempfile::TempDir;

pub const HOST: &str = "localhost";
pub const PORT: u16 = 5432;

/// A [`SqliteServer`] over a temporary data directory
pub struct TestServer {
    pub dir: TempDir,
}

impl TestServer {
    pub fn new() -> Self {
        TestServer {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn server(&self) -> SqliteServer {
        SqliteServer::new(self.dir.path())
    }

    pub fn client(&self) -> Client<SqliteServer> {
        Client::connect(self.server(), HOST, PORT).unwrap()
    }

    /// Client with a freshly created database selected, holding `schema`
    pub fn client_on(&self, database: &str, schema: &str) -> Client<SqliteServer> {
        let mut client = self.client();
        client.create_database(database).unwrap();
        client.select_database(database).unwrap();
        for statement in schema.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            client.update(statement).unwrap();
        }
        client
    }

    pub fn corrupt(&self, database: &str) {
        fs::write(
            self.server().database_path(database),
            "garbage, not a database\n".repeat(200),
        )
        .unwrap();
    }
}

/// Every row of `table`, ordered by its first column
pub fn rows(client: &Client<SqliteServer>, table: &str) -> Vec<Vec<Value>> {
    client
        .query(&format!("SELECT * FROM {} ORDER BY 1", table))
        .unwrap()
        .rows
}
