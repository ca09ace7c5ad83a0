//! # Library Manager
//!
//! Entry point of the crate: opens the store described by the
//! configuration, hands out typed repositories and materializes relations
//! on demand.

use crate::adapters::SqliteAdapter;
use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::identifier::Identifier;
use crate::models::{
    downcast, AnyResource, Collection, Episode, Genre, Library, People, Provider, Resource,
    Season, Show, Studio,
};
use crate::relations::{resolve, RelationEntry, RelationRegistry};
use crate::repositories::Repository;
use crate::schema::ResourceKind;
use crate::store::{MemoryStore, SqlStore, Store};
use bridge_traits::database::DatabaseAdapter;
use core_runtime::LibraryConfig;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Handle on one media library.
#[derive(Clone, Debug)]
pub struct LibraryManager {
    ctx: Arc<LibraryContext>,
    relations: Arc<RelationRegistry>,
}

impl LibraryManager {
    /// Manager over an existing store.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid or a model declares a
    /// relation without registering its loader.
    pub fn new(store: Arc<dyn Store>, config: LibraryConfig) -> Result<Self> {
        config.validate()?;
        let relations = RelationRegistry::with_defaults()?;
        Ok(Self {
            ctx: LibraryContext::new(store, config),
            relations: Arc::new(relations),
        })
    }

    /// Open the library described by `config`: the SQLite database at
    /// `database_path`, or a fresh in-memory store when none is set.
    pub async fn open(config: LibraryConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn Store> = match config.database_config() {
            Some(db_config) => {
                let mut adapter = SqliteAdapter::new(db_config).await?;
                adapter.initialize().await?;
                let store = SqlStore::new(Arc::new(adapter));
                store.initialize().await?;
                Arc::new(store)
            }
            None => {
                info!("No database path configured, using an in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Self::new(store, config)
    }

    pub fn context(&self) -> &Arc<LibraryContext> {
        &self.ctx
    }

    pub fn relations(&self) -> &RelationRegistry {
        &self.relations
    }

    pub fn repository<T: Resource>(&self) -> Repository<T> {
        Repository::new(self.ctx.clone())
    }

    pub fn libraries(&self) -> Repository<Library> {
        self.repository()
    }

    pub fn collections(&self) -> Repository<Collection> {
        self.repository()
    }

    pub fn shows(&self) -> Repository<Show> {
        self.repository()
    }

    pub fn seasons(&self) -> Repository<Season> {
        self.repository()
    }

    pub fn episodes(&self) -> Repository<Episode> {
        self.repository()
    }

    pub fn people(&self) -> Repository<People> {
        self.repository()
    }

    pub fn studios(&self) -> Repository<Studio> {
        self.repository()
    }

    pub fn genres(&self) -> Repository<Genre> {
        self.repository()
    }

    pub fn providers(&self) -> Repository<Provider> {
        self.repository()
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Load one relation of `resource` by name.
    ///
    /// # Errors
    ///
    /// [`LibraryError::UnknownRelation`] when `T` declares no such relation.
    pub async fn load<T: Resource>(&self, resource: T, name: &str) -> Result<T> {
        self.load_all(resource, &[name]).await
    }

    /// Load several relations of `resource`. Every name is checked before
    /// any query runs; the queries then run concurrently.
    #[instrument(skip(self, resource), fields(kind = %T::KIND))]
    pub async fn load_all<T: Resource>(&self, resource: T, names: &[&str]) -> Result<T> {
        let entries = names
            .iter()
            .map(|name| self.relations.entry(T::KIND, name).copied())
            .collect::<Result<Vec<RelationEntry>>>()?;

        let owner: AnyResource = resource.into();
        debug!(kind = %T::KIND, id = owner.id(), relations = ?names, "Loading relations");
        let loaded = try_join_all(
            entries
                .iter()
                .map(|entry| resolve(&self.ctx, &owner, entry.def)),
        )
        .await?;

        let mut owner = owner;
        for (entry, loaded) in entries.iter().zip(loaded) {
            entry.assign(&mut owner, loaded)?;
        }
        downcast(owner)
    }

    /// [`load_all`](Self::load_all) over a list of resources.
    pub async fn load_many<T: Resource>(&self, resources: Vec<T>, names: &[&str]) -> Result<Vec<T>> {
        try_join_all(
            resources
                .into_iter()
                .map(|resource| self.load_all(resource, names)),
        )
        .await
    }

    // =========================================================================
    // Kind-driven access
    // =========================================================================

    /// Get a resource whose kind is only known at runtime.
    #[instrument(skip(self, kind, id), fields(kind = %kind))]
    pub async fn get_any(&self, kind: ResourceKind, id: impl Into<Identifier>) -> Result<AnyResource> {
        self.ctx
            .repository(kind)?
            .get(self.ctx.clone(), id.into())
            .await
    }

    #[instrument(skip(self, kind, id), fields(kind = %kind))]
    pub async fn delete_any(&self, kind: ResourceKind, id: impl Into<Identifier>) -> Result<()> {
        self.ctx
            .repository(kind)?
            .delete(self.ctx.clone(), id.into())
            .await
    }

    /// Resource kind named `name`, as used in routes and relation names.
    pub fn kind_named(name: &str) -> Result<ResourceKind> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| LibraryError::invalid_input("kind", format!("no resource kind {}", name)))
    }
}
