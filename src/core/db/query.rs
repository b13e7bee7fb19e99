/// Query Execution Module
///
/// Materializes query results into [`ResultTable`]s. Rows and columns keep
/// exactly the order the driver produced them in.

use crate::core::{AdminError, Result};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use super::connection::ConnectionManager;
use super::driver::{Connection, Driver};
use super::value::Value;

/// A column-labelled, row-ordered query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultTable {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Rows in result order; each row has one value per column
    pub rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Every value of the column called `name`, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Value at `row` in the column called `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    /// Serializes the table as `{"columns": [...], "rows": [[...], ...]}`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for ResultTable {
    /// Plain text grid with a header row and one line per row.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect();

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        writeln!(f, "{}", line(&self.columns))?;
        let underline: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", underline.join("-|-"))?;
        for row in &cells {
            writeln!(f, "{}", line(row))?;
        }
        Ok(())
    }
}

/// Builds [`ResultTable`]s from raw driver output.
pub struct TabularResultBuilder;

impl TabularResultBuilder {
    /// Pairs column names with rows.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::QueryExecution` when a row's width differs from
    /// the number of columns.
    pub fn build(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<ResultTable> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AdminError::query(format!(
                "row {} has {} values but the result has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(ResultTable { columns, rows })
    }

    /// Drains the last result set of `conn` into a table.
    pub fn from_connection<C: Connection>(conn: &mut C) -> Result<ResultTable> {
        let rows = conn.fetch_all()?;
        Self::build(conn.columns(), rows)
    }
}

/// Runs `sql` on the selected database and materializes the result.
///
/// # Errors
///
/// `AdminError::NoDatabaseSelected` without a selection, and
/// `AdminError::QueryExecution` with the driver error when execution fails.
pub fn query<D: Driver>(manager: &ConnectionManager<D>, sql: &str) -> Result<ResultTable> {
    query_with(manager, sql, &[])
}

/// Like [`query`], passing `params` to the driver as positional parameters.
pub fn query_with<D: Driver>(
    manager: &ConnectionManager<D>,
    sql: &str,
    params: &[Value],
) -> Result<ResultTable> {
    debug!("Executing query: {}", sql);
    let table = manager.with_database_connection(|conn| {
        if params.is_empty() {
            conn.execute(sql)?;
        } else {
            conn.execute_with(sql, params)?;
        }
        TabularResultBuilder::from_connection(conn)
    })?;
    debug!(
        "Query returned {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

/// Represents different SQL statement types for dispatching raw input
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// Returns rows: SELECT, WITH, VALUES, SHOW, EXPLAIN, PRAGMA
    Query,
    /// INSERT, UPDATE, DELETE
    Write,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from the leading keyword
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or("")
            .to_uppercase();

        match keyword.as_str() {
            "SELECT" | "WITH" | "VALUES" | "SHOW" | "EXPLAIN" | "PRAGMA" => {
                StatementType::Query
            }
            "INSERT" | "UPDATE" | "DELETE" => StatementType::Write,
            "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => StatementType::Ddl,
            _ => StatementType::Other,
        }
    }

    pub fn returns_rows(&self) -> bool {
        matches!(self, StatementType::Query)
    }
}
