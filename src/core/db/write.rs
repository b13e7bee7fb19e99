/// Validated Write Module
///
/// Row insertion with a shape check up front: the target table's arity is
/// probed once, every supplied row is compared against it, and only when all
/// rows fit does anything get written.
///
/// Three knobs select between the baseline behaviour and its upgrades:
/// - [`ArityProbe`]: whether an empty table can be probed
/// - [`InsertMode`]: commit per row or once per batch
/// - [`ValueBinding`]: literal interpolation or driver parameters

use crate::core::{AdminError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::connection::ConnectionManager;
use super::driver::{Connection, Dialect, Driver};
use super::value::Value;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// How a table's column count is discovered before writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArityProbe {
    /// Width of the first row; an empty table cannot be probed.
    #[default]
    FirstRow,
    /// Width of the probe's column descriptors; empty tables are fine.
    ColumnMetadata,
}

/// Transaction granularity of `insert_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Commit after every row. A failure partway keeps the rows before it.
    #[default]
    PerRowCommit,
    /// One transaction for the whole batch. A failure keeps nothing.
    SingleTransaction,
}

/// How row values reach the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueBinding {
    /// Values are rendered as SQL literals inside the statement text.
    #[default]
    Literal,
    /// Values are sent as positional parameters; the table name must be a
    /// plain identifier.
    Parameters,
}

/// Write path settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    pub arity_probe: ArityProbe,
    pub insert_mode: InsertMode,
    pub value_binding: ValueBinding,
}

/// `INSERT INTO table VALUES (...)` with every value inlined as a literal.
pub fn insert_statement(table: &str, values: &[Value], dialect: Dialect) -> String {
    let literals: Vec<String> = values.iter().map(|v| v.to_sql_literal(dialect)).collect();
    format!("INSERT INTO {} VALUES ({})", table, literals.join(", "))
}

/// `INSERT INTO table VALUES (...)` with `arity` positional placeholders.
pub fn bound_insert_statement(table: &str, arity: usize, dialect: Dialect) -> String {
    let placeholders: Vec<String> = (1..=arity).map(|i| dialect.placeholder(i)).collect();
    format!("INSERT INTO {} VALUES ({})", table, placeholders.join(", "))
}

/// Checks `name` is a plain, optionally schema-qualified, identifier.
pub fn check_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(AdminError::InvalidIdentifier(name.to_string()))
    }
}

/// Checks every row has exactly `expected` values.
///
/// # Errors
///
/// `AdminError::ArityMismatch` for the first row that does not.
pub fn validate_rows<R: AsRef<[Value]>>(table: &str, expected: usize, rows: &[R]) -> Result<()> {
    match rows.iter().find(|row| row.as_ref().len() != expected) {
        Some(row) => Err(AdminError::ArityMismatch {
            table: table.to_string(),
            expected,
            actual: row.as_ref().len(),
        }),
        None => Ok(()),
    }
}

/// Discovers the column count of `table` over an open connection.
pub fn probe_arity<C: Connection>(conn: &mut C, table: &str, probe: ArityProbe) -> Result<usize> {
    let probe_failed = |reason: String| AdminError::TableProbeFailed {
        table: table.to_string(),
        reason,
    };

    conn.execute(&format!("SELECT * FROM {} LIMIT 1", table))
        .map_err(|e| probe_failed(e.to_string()))?;
    let rows = conn.fetch_all().map_err(|e| probe_failed(e.to_string()))?;

    match probe {
        ArityProbe::FirstRow => rows
            .first()
            .map(|row| row.len())
            .ok_or_else(|| probe_failed("table has no rows to probe".to_string())),
        ArityProbe::ColumnMetadata => match conn.columns().len() {
            0 => Err(probe_failed("table reports no columns".to_string())),
            n => Ok(n),
        },
    }
}

/// Shape-checked writes against the selected database.
pub struct WriteValidator<'a, D: Driver> {
    manager: &'a ConnectionManager<D>,
    options: WriteOptions,
}

impl<'a, D: Driver> WriteValidator<'a, D> {
    pub fn new(manager: &'a ConnectionManager<D>, options: WriteOptions) -> Self {
        WriteValidator { manager, options }
    }

    /// Inserts one row after checking it matches the table's arity.
    ///
    /// # Errors
    ///
    /// - `AdminError::NoDatabaseSelected` without a selection
    /// - `AdminError::TableProbeFailed` when the table cannot be probed
    /// - `AdminError::ArityMismatch` when the row has the wrong width; nothing
    ///   is written
    /// - `AdminError::QueryExecution` when the insert itself fails
    pub fn insert_one(&self, table: &str, values: &[Value]) -> Result<()> {
        self.insert_many(table, &[values]).map(|_| ())
    }

    /// Inserts every row, but only if all of them match the table's arity.
    ///
    /// Returns the number of rows written. Errors are those of
    /// [`WriteValidator::insert_one`]; an arity mismatch anywhere in `rows`
    /// means no row is written at all.
    pub fn insert_many<R: AsRef<[Value]>>(&self, table: &str, rows: &[R]) -> Result<usize> {
        if self.options.value_binding == ValueBinding::Parameters {
            check_identifier(table)?;
        }
        let dialect = self.manager.dialect();

        self.manager.with_database_connection(|conn| {
            let arity = probe_arity(conn, table, self.options.arity_probe)?;
            validate_rows(table, arity, rows)?;

            match self.options.insert_mode {
                InsertMode::PerRowCommit => {
                    for row in rows {
                        self.insert_row(conn, table, row.as_ref(), dialect)?;
                        conn.commit()?;
                    }
                }
                InsertMode::SingleTransaction => {
                    for row in rows {
                        if let Err(e) = self.insert_row(conn, table, row.as_ref(), dialect) {
                            if let Err(rollback_err) = conn.rollback() {
                                warn!("Rollback of {} failed after error: {}", table, rollback_err);
                            }
                            return Err(e);
                        }
                    }
                    conn.commit()?;
                }
            }

            debug!("Inserted {} rows into {}", rows.len(), table);
            Ok(rows.len())
        })
    }

    /// Executes a caller-supplied statement and commits. No validation.
    pub fn update(&self, sql: &str) -> Result<()> {
        debug!("Executing update: {}", sql);
        self.manager.with_database_connection(|conn| {
            conn.execute(sql)?;
            conn.commit()
        })
    }

    fn insert_row(
        &self,
        conn: &mut D::Connection,
        table: &str,
        values: &[Value],
        dialect: Dialect,
    ) -> Result<()> {
        match self.options.value_binding {
            ValueBinding::Literal => conn.execute(&insert_statement(table, values, dialect)),
            ValueBinding::Parameters => {
                let sql = bound_insert_statement(table, values.len(), dialect);
                conn.execute_with(&sql, values)
            }
        }
    }
}
