//! # Storage Backends
//!
//! Repositories never issue queries themselves: they compile a request into
//! a [`StoreQuery`] and hand it to a [`Store`]. Two backends exist:
//!
//! - [`MemoryStore`](memory::MemoryStore) - an in-process arena, interpreting
//!   filters with [`crate::query::eval`]
//! - [`SqlStore`](sql::SqlStore) - SQLite through a
//!   [`DatabaseAdapter`](bridge_traits::DatabaseAdapter), lowering filters
//!   with [`crate::query::sql`]
//!
//! Both return documents with `id` and `slug` set, and both draw ids from a
//! single sequence shared by every resource kind.

pub mod memory;
pub mod sql;

pub use memory::MemoryStore;
pub use sql::SqlStore;

use crate::error::Result;
use crate::query::filter::Filter;
use crate::query::sort::SortKey;
use crate::schema::{LinkSide, ResourceKind};
use async_trait::async_trait;
use serde_json::Value as JsonValue;

/// Stored form of a resource: its scalar fields as a JSON object.
pub type Document = serde_json::Map<String, JsonValue>;

/// A listing as sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub filter: Filter,
    /// Fully resolved keys, ending with the id
    pub sort: Vec<SortKey>,
    pub limit: Option<u32>,
}

impl StoreQuery {
    pub fn new(filter: Filter, sort: Vec<SortKey>) -> Self {
        Self {
            filter,
            sort,
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Full replacement of one link relation of a resource being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet {
    pub link: &'static str,
    /// Side of the resource being written
    pub side: LinkSide,
    /// Ids on the other side
    pub ids: Vec<i64>,
}

/// Clear a foreign key on every resource of `kind` pointing at `ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detach {
    pub kind: ResourceKind,
    pub field: &'static str,
    pub ids: Vec<i64>,
}

/// Everything removed by one delete, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletePlan {
    pub removals: Vec<(ResourceKind, Vec<i64>)>,
    pub detach: Vec<Detach>,
}

impl DeletePlan {
    pub fn is_empty(&self) -> bool {
        self.removals.iter().all(|(_, ids)| ids.is_empty())
    }
}

/// Storage of resource documents and their links.
#[async_trait]
pub trait Store: Send + Sync {
    /// Documents of `kind` matching the query, in order.
    async fn fetch(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Document>>;

    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64>;

    async fn get(&self, kind: ResourceKind, id: i64) -> Result<Option<Document>> {
        let query = StoreQuery::new(Filter::eq("id", id), Vec::new()).limit(1);
        Ok(self.fetch(kind, &query).await?.into_iter().next())
    }

    async fn find_by_slug(&self, kind: ResourceKind, slug: &str) -> Result<Option<Document>> {
        let query = StoreQuery::new(Filter::eq("slug", slug), Vec::new()).limit(1);
        Ok(self.fetch(kind, &query).await?.into_iter().next())
    }

    /// Store a new document (its `slug` included) and its links, returning
    /// the assigned id.
    ///
    /// Fails with [`LibraryError::DuplicateResource`] when the slug is taken.
    ///
    /// [`LibraryError::DuplicateResource`]: crate::error::LibraryError::DuplicateResource
    async fn insert(&self, kind: ResourceKind, document: &Document, links: &[LinkSet])
        -> Result<i64>;

    /// Replace a stored document and the named link sets.
    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        document: &Document,
        links: &[LinkSet],
    ) -> Result<()>;

    /// Apply a delete plan, returning the number of resources removed.
    async fn delete(&self, plan: &DeletePlan) -> Result<u64>;

    /// Ids on the other side of `link` for the resource `id` on `side`.
    async fn linked(&self, link: &'static str, side: LinkSide, id: i64) -> Result<Vec<i64>>;
}

pub(crate) fn slug_of(document: &Document) -> Option<&str> {
    document.get("slug").and_then(JsonValue::as_str)
}
