//! # Library Management Module
//!
//! Generic data access for a media library: shows, seasons, episodes and
//! the people, studios, genres, collections and providers around them.
//!
//! ## Overview
//!
//! This module manages:
//! - Resource models and their static schemas
//! - Filter and sort compilation from query parameters
//! - Keyset (cursor) pagination with `next`/`first` links
//! - A generic repository per resource type, with nested writes and
//!   cascading deletes
//! - On-demand relation loading
//! - SQLite persistence through the `DatabaseAdapter` bridge, or an
//!   in-memory store
//!
//! ## Usage
//!
//! ```no_run
//! use core_library::models::{Resource, Show};
//! use core_library::{LibraryManager, ListRequest};
//! use core_runtime::LibraryConfig;
//!
//! # async fn example() -> core_library::Result<()> {
//! let manager = LibraryManager::open(LibraryConfig::default()).await?;
//! manager.shows().create(Show::new("Anohana")).await?;
//!
//! let params = [("title", "ctn:ano"), ("limit", "10")];
//! let request = ListRequest::parse(Show::schema(), params)?;
//! let page = manager.shows().page(&request, "/shows").await?;
//! println!("{} shows, next: {:?}", page.len(), page.next);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod context;
pub mod error;
pub mod identifier;
pub mod manager;
pub mod merger;
pub mod models;
pub mod query;
pub mod relations;
pub mod repositories;
pub mod schema;
pub mod store;
pub mod value;

pub use adapters::SqliteAdapter;
pub use error::{LibraryError, Result};
pub use identifier::Identifier;
pub use manager::LibraryManager;
pub use query::{Filter, ListRequest, Sort};
pub use repositories::{Page, Pagination, Repository};
pub use schema::ResourceKind;
pub use store::{MemoryStore, SqlStore, Store};
