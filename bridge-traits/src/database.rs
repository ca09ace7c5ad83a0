//! Database Abstraction Layer
//!
//! Provides a driver-agnostic trait for the storage collaborator of the
//! media library core.
//!
//! ## Design Philosophy
//!
//! The core compiles its filter and sort trees into parameterized SQL and
//! submits them through this trait. Implementations own connection pooling,
//! timeouts and commit semantics; the core only relies on three guarantees:
//!
//! - positional parameters are bound, never interpolated
//! - a uniqueness collision is reported as [`BridgeError::UniqueViolation`]
//! - [`DatabaseAdapter::execute_batch`] commits all of its statements or none
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::database::{DatabaseAdapter, DatabaseConfig, QueryValue};
//!
//! let adapter = SqliteAdapter::new(DatabaseConfig::in_memory()).await?;
//! let rows = adapter
//!     .query("SELECT id FROM resources WHERE slug = ?", &[QueryValue::from("anohana")])
//!     .await?;
//! ```
//!
//! [`BridgeError::UniqueViolation`]: crate::error::BridgeError::UniqueViolation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration for adapter initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database file path or connection string
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,

    /// Enable statement caching
    pub enable_cache: bool,

    /// Statement cache capacity
    pub cache_capacity: usize,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        let database_url = format!("sqlite:{}", path.display());

        Self {
            database_url,
            min_connections: 1,
            max_connections: 5,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }

    /// Create a configuration for an in-memory database
    ///
    /// Every pooled connection to `sqlite::memory:` opens its own database,
    /// so the pool is pinned to a single connection.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout_secs: 30,
            enable_cache: true,
            cache_capacity: 100,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

// =============================================================================
// Query Result Types
// =============================================================================

/// Represents a single row from a database query as a map of column names to values
pub type QueryRow = std::collections::HashMap<String, QueryValue>;

/// Represents a database value that can be null, integer, real, text, or blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl QueryValue {
    /// Convert to i64 if possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            QueryValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to f64 if possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Real(r) => Some(*r),
            QueryValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Convert to String if possible
    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert to String (owned) if possible
    pub fn as_string(&self) -> Option<String> {
        match self {
            QueryValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Integer(value)
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        QueryValue::Real(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Null)
    }
}

/// A SQL statement with its positional parameters, as submitted in a batch
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<QueryValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<QueryValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// What one statement of a batch did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOutcome {
    pub rows_affected: u64,
    /// Rowid of the row the statement inserted, if it inserted one.
    pub last_insert_id: Option<i64>,
}

impl BatchOutcome {
    pub fn new(rows_affected: u64, last_insert_id: Option<i64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
        }
    }
}

// =============================================================================
// Database Adapter Trait
// =============================================================================

/// Database adapter trait for the storage collaborator
///
/// ## Error Handling
///
/// All methods return `Result<T>` using the `BridgeError` type. A statement
/// rejected by a uniqueness constraint must surface as
/// `BridgeError::UniqueViolation`; everything else is reported as
/// `BridgeError::DatabaseError`.
///
/// ## Atomicity
///
/// `execute_batch` is the only multi-statement write the core issues. It must
/// commit every statement or none, including when the calling future is
/// dropped half way.
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Initialize the database connection
    ///
    /// This method should configure the connection and make sure the
    /// migration bookkeeping table exists.
    async fn initialize(&mut self) -> Result<()>;

    /// Check if the database connection is healthy
    async fn health_check(&self) -> Result<()>;

    /// Close all database connections
    async fn close(&mut self) -> Result<()>;

    // =========================================================================
    // Raw Query Execution
    // =========================================================================

    /// Execute a raw SQL query and return rows
    ///
    /// # Arguments
    ///
    /// * `query` - SQL query string
    /// * `params` - Query parameters (positional)
    ///
    /// # Safety
    ///
    /// This method should use parameterized queries to prevent SQL injection.
    /// Never concatenate user input directly into the query string.
    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>>;

    /// Execute a SQL statement that doesn't return rows (INSERT, UPDATE, DELETE)
    ///
    /// Returns the number of rows affected.
    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64>;

    /// Execute a query and return a single optional row
    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>>;

    /// Execute a query and return exactly one row
    ///
    /// Returns an error if no row is returned.
    async fn query_one(&self, query: &str, params: &[QueryValue]) -> Result<QueryRow>;

    // =========================================================================
    // Batch Operations
    // =========================================================================

    /// Execute multiple statements atomically
    ///
    /// Returns one outcome per statement, in order: the affected row count
    /// and, for an `INSERT` that wrote a row, the new rowid. If any
    /// statement fails, none of them is applied.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<BatchOutcome>>;

    // =========================================================================
    // Migration Support
    // =========================================================================

    /// Get the current schema version (0 when nothing is applied)
    async fn get_schema_version(&self) -> Result<i64>;

    /// Apply a migration
    ///
    /// # Arguments
    ///
    /// * `version` - Migration version number
    /// * `up_sql` - SQL to apply the migration, possibly several statements
    async fn apply_migration(&self, version: i64, up_sql: &str) -> Result<()>;

    /// Check if a migration has been applied
    async fn is_migration_applied(&self, version: i64) -> Result<bool>;
}

// =============================================================================
// Helper Macros for Implementations
// =============================================================================

/// Helper macro to extract values from QueryRow
#[macro_export]
macro_rules! get_column {
    ($row:expr, $col:expr, i64) => {
        $row.get($col).and_then(|v| v.as_i64()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!("Missing or invalid i64 column: {}", $col))
        })?
    };
    ($row:expr, $col:expr, String) => {
        $row.get($col).and_then(|v| v.as_string()).ok_or_else(|| {
            $crate::BridgeError::DatabaseError(format!(
                "Missing or invalid String column: {}",
                $col
            ))
        })?
    };
    ($row:expr, $col:expr, Option<i64>) => {
        $row.get($col)
            .and_then(|v| if v.is_null() { None } else { v.as_i64() })
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn test_query_value_conversions() {
        let int_val = QueryValue::Integer(42);
        assert_eq!(int_val.as_i64(), Some(42));
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert!(int_val.as_str().is_none());

        let text_val = QueryValue::from("hello");
        assert_eq!(text_val.as_str(), Some("hello"));
        assert_eq!(text_val.as_string(), Some("hello".to_string()));
        assert!(text_val.as_i64().is_none());

        let null_val = QueryValue::from(None::<i64>);
        assert!(null_val.is_null());
        assert!(null_val.as_i64().is_none());
    }

    #[test]
    fn test_database_config_in_memory_uses_single_connection() {
        let config = DatabaseConfig::in_memory();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.max_connections, 1);
        assert!(config.enable_cache);
    }

    #[test]
    fn test_database_config_from_path() {
        let config = DatabaseConfig::new("library.db");
        assert!(config.database_url.contains("library.db"));
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_get_column_macro() {
        fn read(row: &QueryRow) -> crate::error::Result<(i64, String, Option<i64>)> {
            let id = get_column!(row, "id", i64);
            let slug = get_column!(row, "slug", String);
            let parent = get_column!(row, "parent", Option<i64>);
            Ok((id, slug, parent))
        }

        let mut row = QueryRow::new();
        row.insert("id".to_string(), QueryValue::Integer(7));
        row.insert("slug".to_string(), QueryValue::from("anohana"));
        row.insert("parent".to_string(), QueryValue::Null);
        assert_eq!(read(&row).unwrap(), (7, "anohana".to_string(), None));

        row.remove("slug");
        assert!(matches!(read(&row), Err(BridgeError::DatabaseError(_))));
    }

    #[test]
    fn test_unique_violation_is_distinguishable() {
        assert!(BridgeError::UniqueViolation("resources.slug".into()).is_unique_violation());
        assert!(!BridgeError::DatabaseError("disk I/O".into()).is_unique_violation());
    }
}
