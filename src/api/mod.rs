//! Purpose: Define the public Rust API boundary for linedb.
//! Exports: `Database` and the types its operations take and return.
//! Role: Only public path to storage; internal modules stay private.
//! Invariants: Callers never hold a `LogStore` outside a queued operation.

mod database;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::log::{Durability, LogStore, Records};
pub use crate::core::queue::Pending;
pub use crate::core::record::{Query, Record, validate_record};
pub use database::{Database, DatabaseOptions};
