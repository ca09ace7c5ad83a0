//! Database adapter implementations
//!
//! This module contains the concrete implementation of the `DatabaseAdapter`
//! trait used by [`SqlStore`](crate::store::SqlStore).

pub mod sqlite_native;

pub use sqlite_native::SqliteAdapter;
