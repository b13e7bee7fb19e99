// Core infrastructure modules
pub mod core;

// Client surface and ambient glue
pub mod client;
pub mod config;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::Client;
pub use crate::core::db::{
    ArityProbe, ConnectionDescriptor, Dialect, Driver, InsertMode, ResultTable, SchemaMap,
    SqliteServer, Value, ValueBinding, WriteOptions,
};
#[cfg(feature = "postgres")]
pub use crate::core::db::PostgresDriver;
pub use crate::core::{AdminError, Result};
