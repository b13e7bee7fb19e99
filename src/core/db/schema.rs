/// Schema Introspection Module
///
/// Server-level metadata: which databases exist, which public tables each one
/// holds, and the DDL that creates and drops databases.
///
/// Nothing here is cached. Every call opens its own connections and returns a
/// snapshot of what the server reported at that moment.

use crate::core::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::connection::ConnectionManager;
use super::driver::{Connection, Dialect, Driver};
use super::value::Value;

/// Public tables per database, as seen by one enumeration.
///
/// A database maps to `None` when its tables could not be read or when it
/// has no public tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaMap {
    databases: BTreeMap<String, Option<Vec<String>>>,
}

impl SchemaMap {
    /// Tables of `database`; `None` for unknown databases and absent entries.
    pub fn tables(&self, database: &str) -> Option<&[String]> {
        self.databases.get(database).and_then(|t| t.as_deref())
    }

    pub fn contains(&self, database: &str) -> bool {
        self.databases.contains_key(database)
    }

    /// Whether `database` is present with the absent-tables marker.
    pub fn is_absent(&self, database: &str) -> bool {
        matches!(self.databases.get(database), Some(None))
    }

    pub fn databases(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[String]>)> {
        self.databases
            .iter()
            .map(|(name, tables)| (name.as_str(), tables.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }
}

impl FromIterator<(String, Option<Vec<String>>)> for SchemaMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<Vec<String>>)>>(iter: I) -> Self {
        SchemaMap {
            databases: iter.into_iter().collect(),
        }
    }
}

/// Catalog operations routed through a [`ConnectionManager`].
pub struct MetadataCatalog<'a, D: Driver> {
    manager: &'a ConnectionManager<D>,
}

impl<'a, D: Driver> MetadataCatalog<'a, D> {
    pub fn new(manager: &'a ConnectionManager<D>) -> Self {
        MetadataCatalog { manager }
    }

    /// Database names in the order the server reports them.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let dialect = self.manager.dialect();
        self.manager
            .with_server_connection(|conn| list_databases_on(conn, dialect))
    }

    /// Builds a fresh [`SchemaMap`] for every database on the server.
    ///
    /// Each database is read over its own connection. A database that cannot
    /// be opened or queried is recorded as absent and the walk continues.
    ///
    /// # Errors
    ///
    /// Only the initial database enumeration can fail the call.
    pub fn schema_map(&self) -> Result<SchemaMap> {
        let dialect = self.manager.dialect();
        let databases = self.list_databases()?;
        let server = self.manager.server_descriptor();

        let mut map = BTreeMap::new();
        for name in databases {
            let descriptor = server.for_database(name.as_str());
            let tables = match self
                .manager
                .with_connection(&descriptor, |conn| public_tables_on(conn, dialect))
            {
                Ok(tables) if tables.is_empty() => None,
                Ok(tables) => Some(tables),
                Err(e) => {
                    warn!("Could not read tables of database '{}': {}", name, e);
                    None
                }
            };
            map.insert(name, tables);
        }

        debug!("Schema map built for {} databases", map.len());
        Ok(SchemaMap { databases: map })
    }

    /// Creates a database. Runs in autocommit mode.
    pub fn create_database(&self, name: &str) -> Result<()> {
        let sql = self.manager.dialect().create_database_sql(name);
        self.run_ddl(&sql)?;
        info!("Created database '{}'", name);
        Ok(())
    }

    /// Drops a database. Runs in autocommit mode.
    pub fn delete_database(&self, name: &str) -> Result<()> {
        let sql = self.manager.dialect().drop_database_sql(name);
        self.run_ddl(&sql)?;
        info!("Dropped database '{}'", name);
        Ok(())
    }

    fn run_ddl(&self, sql: &str) -> Result<()> {
        debug!("Executing DDL: {}", sql);
        self.manager.with_server_connection(|conn| {
            conn.set_autocommit(true)?;
            conn.execute(sql)
        })
    }
}

/// Lists database names over an already open server connection.
pub fn list_databases_on<C: Connection>(conn: &mut C, dialect: Dialect) -> Result<Vec<String>> {
    conn.execute(dialect.list_databases_sql())?;
    first_column(conn)
}

/// Lists public table names over an already open database connection.
pub fn public_tables_on<C: Connection>(conn: &mut C, dialect: Dialect) -> Result<Vec<String>> {
    conn.execute(dialect.public_tables_sql())?;
    first_column(conn)
}

fn first_column<C: Connection>(conn: &mut C) -> Result<Vec<String>> {
    Ok(conn
        .fetch_all()?
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .map(|value| match value {
            Value::Text(s) => s,
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ServerFixture;

    #[test]
    fn test_list_databases() {
        let fixture = ServerFixture::with_databases(&["orders", "inventory"]);
        let manager = fixture.manager();
        let catalog = MetadataCatalog::new(&manager);
        assert_eq!(catalog.list_databases().unwrap(), vec!["inventory", "orders"]);
    }

    #[test]
    fn test_schema_map_lists_public_tables() {
        let fixture = ServerFixture::with_databases(&["app", "empty"]);
        fixture.execute("app", "CREATE TABLE users (id INTEGER); CREATE TABLE accounts (id INTEGER);");
        let manager = fixture.manager();

        let map = MetadataCatalog::new(&manager).schema_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.tables("app").unwrap(),
            &["accounts".to_string(), "users".to_string()]
        );
        assert!(map.contains("empty"));
        assert!(map.is_absent("empty"));
        assert!(map.tables("empty").is_none());
    }

    #[test]
    fn test_schema_map_isolates_broken_database() {
        let fixture = ServerFixture::with_databases(&["good"]);
        fixture.execute("good", "CREATE TABLE t1 (id INTEGER); CREATE TABLE t2 (id INTEGER);");
        fixture.corrupt("broken");
        let manager = fixture.manager();

        let map = MetadataCatalog::new(&manager).schema_map().unwrap();
        assert_eq!(map.databases().collect::<Vec<_>>(), vec!["broken", "good"]);
        assert!(map.is_absent("broken"));
        assert_eq!(map.tables("good").unwrap().len(), 2);
    }

    #[test]
    fn test_create_and_delete_database() {
        let fixture = ServerFixture::new();
        let manager = fixture.manager();
        let catalog = MetadataCatalog::new(&manager);

        catalog.create_database("reports").unwrap();
        assert!(catalog.list_databases().unwrap().contains(&"reports".to_string()));

        catalog.delete_database("reports").unwrap();
        assert!(!catalog.list_databases().unwrap().contains(&"reports".to_string()));

        // Dropping again reports the driver failure
        assert!(catalog.delete_database("reports").is_err());
    }

    #[test]
    fn test_schema_map_serializes_as_object() {
        let map: SchemaMap = vec![
            ("a".to_string(), Some(vec!["t".to_string()])),
            ("b".to_string(), None),
        ]
        .into_iter()
        .collect();
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a":["t"],"b":null}"#);
    }
}
