/// Database Module
///
/// This module provides the database functionality of the client, organized
/// into focused submodules.
///
/// ## Architecture
///
/// - **Driver** (`driver.rs`): descriptors, dialects and the connection traits
///   every engine implements
/// - **Connection Management** (`connection.rs`): server and database tiers,
///   scoped connection acquisition
/// - **Schema Introspection** (`schema.rs`): database listing, schema maps,
///   database DDL
/// - **Validated Writes** (`write.rs`): arity probe and insert paths
/// - **Query Execution** (`query.rs`): result table materialization
/// - **Drivers** (`sqlite.rs`, `postgres.rs`): the engines shipped with the
///   crate
///
/// ## Error Handling
///
/// All database operations use the standardized `AdminError` type for
/// consistent error propagation.
pub mod connection;
pub mod driver;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod query;
pub mod schema;
pub mod sqlite;
pub mod value;
pub mod write;

pub use connection::*;
pub use driver::*;
#[cfg(feature = "postgres")]
pub use postgres::*;
pub use query::*;
pub use schema::*;
pub use sqlite::*;
pub use value::*;
pub use write::*;
