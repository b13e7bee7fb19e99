/// Core Module
///
/// This module contains the connection tiers, catalog, write path and result
/// materialization that make up the administration client, along with the
/// shared error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{AdminError, DriverError, Result};
