//! Session context threaded through every repository call.

use crate::error::Result;
use crate::repositories::dispatch::{ErasedRepository, RepositoryRegistry};
use crate::schema::ResourceKind;
use crate::store::Store;
use core_runtime::LibraryConfig;
use std::sync::Arc;

/// Storage handle, settings and the per-kind repository table shared by
/// the repositories of one library.
///
/// The context holds no mutable state of its own; every call reaches the
/// store through it, so two contexts over two stores never interfere.
pub struct LibraryContext {
    store: Arc<dyn Store>,
    config: LibraryConfig,
    repositories: RepositoryRegistry,
}

impl LibraryContext {
    pub fn new(store: Arc<dyn Store>, config: LibraryConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            config,
            repositories: RepositoryRegistry::new(),
        })
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Type-erased repository of `kind`.
    pub fn repository(&self, kind: ResourceKind) -> Result<&ErasedRepository> {
        self.repositories.get(kind)
    }
}

impl std::fmt::Debug for LibraryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
