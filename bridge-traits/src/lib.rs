//! # Host Bridge Traits
//!
//! Storage abstraction traits that a host must implement for the media
//! library core.
//!
//! ## Overview
//!
//! This crate defines the contract between the data-access core and the
//! concrete storage engine. The core never talks to a database driver
//! directly: it compiles filters and sorts into parameterized SQL and hands
//! them to a [`DatabaseAdapter`](database::DatabaseAdapter).
//!
//! ## Traits
//!
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - Parameterized queries,
//!   atomic batches and migrations
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for
//! consistent error handling. Implementations should:
//!
//! - Convert driver-specific errors to `BridgeError`
//! - Report uniqueness collisions as [`BridgeError::UniqueViolation`] so the
//!   core can tell a lost insert race apart from any other failure
//! - Include error context (statement kind, constraint name)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod database;
pub mod error;

pub use database::{BatchOutcome, DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue, Statement};
pub use error::BridgeError;
