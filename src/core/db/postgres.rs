/// PostgreSQL Driver
///
/// Talks to a real PostgreSQL server through the synchronous `postgres`
/// client. Catalog statements come from [`Dialect::Postgres`].

use crate::core::{AdminError, Result};
use bytes::BytesMut;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, NoTls, Row};
use std::error::Error;
use tracing::debug;

use super::driver::{Connection, ConnectionDescriptor, Dialect, Driver};
use super::value::Value;

/// Credentials used for every connection the driver opens.
#[derive(Debug, Clone, Default)]
pub struct PostgresDriver {
    user: Option<String>,
    password: Option<String>,
}

impl PostgresDriver {
    pub fn new() -> Self {
        PostgresDriver::default()
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    fn config(&self, descriptor: &ConnectionDescriptor) -> postgres::Config {
        let mut config = postgres::Config::new();
        config.host(descriptor.host()).port(descriptor.port());
        if let Some(database) = descriptor.database() {
            config.dbname(database);
        }
        // libpq falls back to the login name; do the same.
        if let Some(user) = self.user.clone().or_else(|| std::env::var("USER").ok()) {
            config.user(&user);
        }
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }
}

impl Driver for PostgresDriver {
    type Connection = PostgresConnection;

    fn open(&self, descriptor: &ConnectionDescriptor) -> Result<PostgresConnection> {
        let client = self
            .config(descriptor)
            .connect(NoTls)
            .map_err(|e| AdminError::UnreachableServer {
                descriptor: descriptor.to_string(),
                reason: e.to_string(),
            })?;
        debug!("Opened postgres connection: {}", descriptor);
        Ok(PostgresConnection {
            client,
            autocommit: false,
            in_transaction: false,
            columns: Vec::new(),
            rows: Vec::new(),
        })
    }

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }
}

pub struct PostgresConnection {
    client: Client,
    autocommit: bool,
    in_transaction: bool,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl PostgresConnection {
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        if !self.autocommit && !self.in_transaction {
            self.client.batch_execute("BEGIN")?;
            self.in_transaction = true;
        }

        let statement = self.client.prepare(sql)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = if columns.is_empty() && params.is_empty() {
            // Utility statements such as CREATE DATABASE go through the
            // simple protocol.
            self.client.batch_execute(sql)?;
            Vec::new()
        } else {
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
            let rows = self.client.query(&statement, &refs)?;
            rows.iter().map(row_values).collect::<Result<Vec<_>>>()?
        };

        self.columns = columns;
        self.rows = rows;
        Ok(())
    }
}

impl Connection for PostgresConnection {
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
        if self.in_transaction {
            self.client.batch_execute("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_transaction {
            self.client.batch_execute("ROLLBACK")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn set_autocommit(&mut self, autocommit: bool) -> Result<()> {
        if autocommit {
            self.commit()?;
        }
        self.autocommit = autocommit;
        Ok(())
    }

    fn close(self) -> Result<()> {
        self.client.close().map_err(AdminError::from)
    }
}

fn row_values(row: &Row) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let ty = column.type_();
        let value = match *ty {
            Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(Value::from),
            Type::INT2 => row
                .try_get::<_, Option<i16>>(idx)
                .map(|v| v.map(|i| Value::Integer(i64::from(i))).unwrap_or(Value::Null)),
            Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(Value::from),
            Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(Value::from),
            Type::FLOAT4 => row
                .try_get::<_, Option<f32>>(idx)
                .map(|v| v.map(|f| Value::Real(f64::from(f))).unwrap_or(Value::Null)),
            Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(Value::from),
            Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).map(Value::from),
            Type::TIMESTAMP => row
                .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
                .map(Value::from),
            _ => row.try_get::<_, Option<String>>(idx).map(Value::from),
        }
        .map_err(|e| AdminError::query(format!("unsupported column type {}: {}", ty, e)))?;
        values.push(value);
    }
    Ok(values)
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            Value::Integer(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            Value::Real(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            Value::Text(s) => s.to_sql(ty, out),
            Value::Bytes(b) => b.to_sql(ty, out),
            Value::Timestamp(ts) => ts.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
