//! # Library Configuration Module
//!
//! Provides configuration management for the media library core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`LibraryConfig`]. It enforces fail-fast validation so a misconfigured
//! host is rejected at startup instead of on the first paginated request.
//!
//! ## Storage selection
//!
//! - `database_path` set: resources persist in SQLite at that path
//! - `database_path` unset: resources live in an in-process arena, which is
//!   what tests and ephemeral tooling use
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::LibraryConfig;
//!
//! let config = LibraryConfig::builder()
//!     .database_path("/var/lib/medialib/library.db")
//!     .default_page_size(50)
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.default_page_size, 50);
//! ```
//!
//! ## Error Handling
//!
//! ```
//! use core_runtime::config::LibraryConfig;
//!
//! let result = LibraryConfig::builder().default_page_size(0).build();
//! assert!(result.is_err());
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::database::DatabaseConfig;
use std::path::PathBuf;

/// Page size used when a request names none.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound applied to every requested page size.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 1000;

/// Number of results returned by a search.
pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Configuration for the media library core.
///
/// Use [`LibraryConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Path to the SQLite database file, `None` for the in-memory arena
    pub database_path: Option<PathBuf>,

    /// Maximum number of pooled database connections
    pub max_connections: u32,

    /// Page size used when the caller supplies none (or zero)
    pub default_page_size: u32,

    /// Largest page a caller may request
    pub max_page_size: u32,

    /// Fixed cap on search results
    pub search_limit: u32,

    /// Logging configuration applied by hosts that let the library own it
    pub logging: LoggingConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: 5,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            logging: LoggingConfig::default(),
        }
    }
}

impl LibraryConfig {
    /// Creates a new builder for constructing a `LibraryConfig`.
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty when set
    /// - Page sizes are non-zero and the default fits under the maximum
    /// - Search cap is non-zero
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.max_connections == 0 {
            return Err(invalid(
                "max_connections",
                "Connection pool needs at least one connection",
            ));
        }

        if self.default_page_size == 0 {
            return Err(invalid(
                "default_page_size",
                "Default page size must be greater than 0",
            ));
        }

        if self.max_page_size == 0 {
            return Err(invalid(
                "max_page_size",
                "Maximum page size must be greater than 0",
            ));
        }

        if self.default_page_size > self.max_page_size {
            return Err(invalid(
                "default_page_size",
                &format!(
                    "Default page size {} exceeds the maximum of {}",
                    self.default_page_size, self.max_page_size
                ),
            ));
        }

        if self.search_limit == 0 {
            return Err(invalid(
                "search_limit",
                "Search limit must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Resolve the page size for a request: zero or absent falls back to the
    /// default, anything above the maximum is clamped.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        match requested {
            Some(limit) if limit > 0 => limit.min(self.max_page_size),
            _ => self.default_page_size,
        }
    }

    /// Database adapter settings derived from this configuration.
    pub fn database_config(&self) -> Option<DatabaseConfig> {
        self.database_path.as_ref().map(|path| {
            let mut config = DatabaseConfig::new(path);
            config.max_connections = self.max_connections;
            config
        })
    }
}

fn invalid(setting: &str, message: &str) -> Error {
    Error::InvalidSetting {
        setting: setting.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`LibraryConfig`].
#[derive(Debug, Default)]
pub struct LibraryConfigBuilder {
    database_path: Option<PathBuf>,
    max_connections: Option<u32>,
    default_page_size: Option<u32>,
    max_page_size: Option<u32>,
    search_limit: Option<u32>,
    logging: Option<LoggingConfig>,
}

impl LibraryConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::LibraryConfig;
    ///
    /// let builder = LibraryConfig::builder()
    ///     .database_path("/path/to/library.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the connection pool size.
    ///
    /// Default: 5
    pub fn max_connections(mut self, connections: u32) -> Self {
        self.max_connections = Some(connections);
        self
    }

    /// Sets the page size used when a request names none.
    ///
    /// Default: 20
    pub fn default_page_size(mut self, size: u32) -> Self {
        self.default_page_size = Some(size);
        self
    }

    /// Sets the largest page a caller may request.
    ///
    /// Default: 1000
    pub fn max_page_size(mut self, size: u32) -> Self {
        self.max_page_size = Some(size);
        self
    }

    /// Sets the search result cap.
    ///
    /// Default: 20
    pub fn search_limit(mut self, limit: u32) -> Self {
        self.search_limit = Some(limit);
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds the configuration, validating every setting.
    pub fn build(self) -> Result<LibraryConfig> {
        let defaults = LibraryConfig::default();

        let config = LibraryConfig {
            database_path: self.database_path,
            max_connections: self.max_connections.unwrap_or(defaults.max_connections),
            default_page_size: self
                .default_page_size
                .unwrap_or(defaults.default_page_size),
            max_page_size: self.max_page_size.unwrap_or(defaults.max_page_size),
            search_limit: self.search_limit.unwrap_or(defaults.search_limit),
            logging: self.logging.unwrap_or(defaults.logging),
        };

        config.validate()?;

        Ok(config)
    }
}
