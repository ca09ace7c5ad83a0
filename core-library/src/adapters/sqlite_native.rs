//! Native SQLite Database Adapter
//!
//! Implements the `DatabaseAdapter` trait using `sqlx` with the native SQLite driver.
//!
//! ## Features
//!
//! - Connection pooling with configurable limits
//! - WAL mode for better concurrency
//! - Atomic batches on a dedicated pooled transaction
//! - Uniqueness collisions reported as `BridgeError::UniqueViolation`
//! - Versioned migrations tracked in `_medialib_migrations`
//! - Foreign key enforcement

use async_trait::async_trait;
use bridge_traits::database::{
    BatchOutcome, DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue, Statement,
};
use bridge_traits::error::{BridgeError, Result};
use core_runtime::logging::strip_path;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Column, Pool, Row, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS _medialib_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    installed_on INTEGER NOT NULL
)";

/// Native SQLite implementation of DatabaseAdapter
///
/// This adapter wraps a `sqlx::Pool<Sqlite>` and implements all database
/// operations using the native SQLite driver.
pub struct SqliteAdapter {
    pool: Pool<Sqlite>,
}

/// Translate a driver error, keeping uniqueness collisions distinguishable.
fn map_sqlx_error(context: &str, error: sqlx::Error) -> BridgeError {
    if let Some(database_error) = error.as_database_error() {
        if database_error.is_unique_violation() {
            return BridgeError::UniqueViolation(database_error.message().to_string());
        }
    }
    BridgeError::DatabaseError(format!("{}: {}", context, error))
}

impl SqliteAdapter {
    /// Create a new SqliteAdapter with the given configuration
    ///
    /// This will establish the connection pool and configure SQLite options,
    /// but will NOT create the migration table. Call `initialize()` for that.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or connection pool creation fails
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        info!(
            database = %strip_path(&config.database_url),
            min_connections = config.min_connections,
            max_connections = config.max_connections,
            "Creating SQLite database adapter"
        );

        let mut connect_options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| BridgeError::DatabaseError(format!("Invalid database URL: {}", e)))?;

        connect_options = connect_options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            // Link rows cascade with their resources
            .foreign_keys(true)
            .create_if_missing(true)
            .pragma("cache_size", "-64000")
            .pragma("auto_vacuum", "INCREMENTAL");

        if config.enable_cache {
            connect_options = connect_options.statement_cache_capacity(config.cache_capacity);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs));

        // An in-memory database lives exactly as long as its connection.
        if config.database_url.contains(":memory:") {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to create connection pool");
                BridgeError::DatabaseError(format!("Connection pool creation failed: {}", e))
            })?;

        info!(
            connections = pool.size(),
            "SQLite connection pool created successfully"
        );

        Ok(Self { pool })
    }

    /// Create a new SqliteAdapter from an existing pool
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Convert a sqlx Row to a QueryRow (HashMap)
    fn row_to_query_row(row: &sqlx::sqlite::SqliteRow) -> QueryRow {
        let mut result = HashMap::new();

        for column in row.columns() {
            let column_name = column.name().to_string();

            let value = if let Ok(v) = row.try_get::<Option<i64>, _>(column.ordinal()) {
                v.map(QueryValue::Integer).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<f64>, _>(column.ordinal()) {
                v.map(QueryValue::Real).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<String>, _>(column.ordinal()) {
                v.map(QueryValue::Text).unwrap_or(QueryValue::Null)
            } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(column.ordinal()) {
                v.map(QueryValue::Blob).unwrap_or(QueryValue::Null)
            } else {
                QueryValue::Null
            };

            result.insert(column_name, value);
        }

        result
    }

    /// Bind positional QueryValue parameters
    fn bind_params<'q>(
        query: sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
        params: &'q [QueryValue],
    ) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let mut query = query;
        for param in params {
            query = match param {
                QueryValue::Null => query.bind(None::<i64>),
                QueryValue::Integer(i) => query.bind(i),
                QueryValue::Real(r) => query.bind(r),
                QueryValue::Text(s) => query.bind(s.as_str()),
                QueryValue::Blob(b) => query.bind(b.as_slice()),
            };
        }
        query
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map_or(false, |head| head.eq_ignore_ascii_case("insert"))
}

/// Split a migration script into single statements. Line comments are
/// dropped; statements must not contain `;` inside string literals.
fn split_statements(script: &str) -> Vec<String> {
    let stripped: String = script
        .lines()
        .map(|line| match line.find("--") {
            Some(start) => &line[..start],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");
    stripped
        .split(';')
        .map(str::trim)
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl DatabaseAdapter for SqliteAdapter {
    async fn initialize(&mut self) -> Result<()> {
        debug!("Initializing database adapter");

        sqlx::query(MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Migration table creation failed", e))?;

        self.health_check().await?;

        info!("Database adapter initialized successfully");
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Database health check failed");
                BridgeError::DatabaseError(format!("Health check failed: {}", e))
            })?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        info!("Closing database connection pool");
        self.pool.close().await;
        Ok(())
    }

    async fn query(&self, query: &str, params: &[QueryValue]) -> Result<Vec<QueryRow>> {
        debug!(query = %query, param_count = params.len(), "Executing query");

        let rows = Self::bind_params(sqlx::query(query), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Query failed", e))?;

        let result: Vec<QueryRow> = rows.iter().map(Self::row_to_query_row).collect();

        debug!(row_count = result.len(), "Query executed successfully");
        Ok(result)
    }

    async fn execute(&self, statement: &str, params: &[QueryValue]) -> Result<u64> {
        debug!(statement = %statement, param_count = params.len(), "Executing statement");

        let result = Self::bind_params(sqlx::query(statement), params)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Execute failed", e))?;

        Ok(result.rows_affected())
    }

    async fn query_one_optional(
        &self,
        query: &str,
        params: &[QueryValue],
    ) -> Result<Option<QueryRow>> {
        let row = Self::bind_params(sqlx::query(query), params)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Query one optional failed", e))?;

        Ok(row.as_ref().map(Self::row_to_query_row))
    }

    async fn query_one(&self, query: &str, params: &[QueryValue]) -> Result<QueryRow> {
        let row = Self::bind_params(sqlx::query(query), params)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Query one failed", e))?;

        Ok(Self::row_to_query_row(&row))
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<BatchOutcome>> {
        debug!(batch_size = statements.len(), "Executing batch");

        // Dropping the transaction before commit rolls it back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Begin transaction failed", e))?;

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let result = Self::bind_params(sqlx::query(&statement.sql), &statement.params)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Batch statement failed", e))?;
            // last_insert_rowid is per connection and goes stale after
            // anything but an insert that wrote a row.
            let inserted = result.rows_affected() > 0 && is_insert(&statement.sql);
            results.push(BatchOutcome::new(
                result.rows_affected(),
                inserted.then(|| result.last_insert_rowid()),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Commit failed", e))?;

        debug!(results = ?results, "Batch executed successfully");
        Ok(results)
    }

    async fn get_schema_version(&self) -> Result<i64> {
        let query = "SELECT COALESCE(MAX(version), 0) AS version FROM _medialib_migrations";
        let row = self.query_one(query, &[]).await?;

        let version = row.get("version").and_then(|v| v.as_i64()).ok_or_else(|| {
            BridgeError::DatabaseError("Failed to get schema version".to_string())
        })?;

        Ok(version)
    }

    async fn apply_migration(&self, version: i64, up_sql: &str) -> Result<()> {
        info!(version, "Applying migration");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Begin transaction failed", e))?;

        for statement in split_statements(up_sql) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Migration failed", e))?;
        }

        sqlx::query(
            "INSERT INTO _medialib_migrations (version, description, installed_on) VALUES (?, ?, ?)",
        )
        .bind(version)
        .bind(format!("Migration {}", version))
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Recording migration failed", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Commit failed", e))?;

        info!(version, "Migration applied successfully");
        Ok(())
    }

    async fn is_migration_applied(&self, version: i64) -> Result<bool> {
        let query = "SELECT COUNT(*) AS count FROM _medialib_migrations WHERE version = ?";
        let row = self.query_one(query, &[QueryValue::Integer(version)]).await?;
        let count = row
            .get("count")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| BridgeError::DatabaseError("Failed to check migration".to_string()))?;

        Ok(count > 0)
    }
}
