//! Repository operations for a resource kind known only at runtime.
//!
//! Nested writes and kind-driven lookups need to call into the repository of
//! another type. Instead of inspecting types, a table built at startup maps
//! every [`ResourceKind`] to plain function pointers that wrap the typed
//! [`Repository`] of that kind.

use super::Repository;
use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::identifier::Identifier;
use crate::models::{
    downcast, AnyResource, Collection, Episode, Genre, Library, People, Provider, Resource,
    Season, Show, Studio,
};
use crate::schema::ResourceKind;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

type GetFn = fn(Arc<LibraryContext>, Identifier) -> BoxFuture<'static, Result<AnyResource>>;
type CreateFn = fn(Arc<LibraryContext>, AnyResource) -> BoxFuture<'static, Result<AnyResource>>;
type DeleteFn = fn(Arc<LibraryContext>, Identifier) -> BoxFuture<'static, Result<()>>;

/// The CRUD entry points of one resource kind, with the type erased.
#[derive(Clone, Copy)]
pub struct ErasedRepository {
    pub kind: ResourceKind,
    get: GetFn,
    create_if_not_exists: CreateFn,
    delete: DeleteFn,
}

impl ErasedRepository {
    pub fn of<T: Resource>() -> Self {
        Self {
            kind: T::KIND,
            get: |ctx, id| {
                Box::pin(async move { Repository::<T>::new(ctx).get(id).await.map(Into::into) })
            },
            create_if_not_exists: |ctx, resource| {
                Box::pin(async move {
                    let resource = downcast::<T>(resource)?;
                    Repository::<T>::new(ctx)
                        .create_if_not_exists(resource)
                        .await
                        .map(Into::into)
                })
            },
            delete: |ctx, id| Box::pin(async move { Repository::<T>::new(ctx).delete(id).await }),
        }
    }

    pub fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Library => Self::of::<Library>(),
            ResourceKind::Collection => Self::of::<Collection>(),
            ResourceKind::Show => Self::of::<Show>(),
            ResourceKind::Season => Self::of::<Season>(),
            ResourceKind::Episode => Self::of::<Episode>(),
            ResourceKind::People => Self::of::<People>(),
            ResourceKind::Studio => Self::of::<Studio>(),
            ResourceKind::Genre => Self::of::<Genre>(),
            ResourceKind::Provider => Self::of::<Provider>(),
        }
    }

    pub fn get(
        &self,
        ctx: Arc<LibraryContext>,
        id: Identifier,
    ) -> BoxFuture<'static, Result<AnyResource>> {
        (self.get)(ctx, id)
    }

    pub fn create_if_not_exists(
        &self,
        ctx: Arc<LibraryContext>,
        resource: AnyResource,
    ) -> BoxFuture<'static, Result<AnyResource>> {
        if resource.kind() != self.kind {
            let message = format!("a {} can't be stored as a {}", resource.kind(), self.kind);
            return Box::pin(async move { Err(LibraryError::Inconsistency(message)) });
        }
        (self.create_if_not_exists)(ctx, resource)
    }

    pub fn delete(&self, ctx: Arc<LibraryContext>, id: Identifier) -> BoxFuture<'static, Result<()>> {
        (self.delete)(ctx, id)
    }
}

impl std::fmt::Debug for ErasedRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedRepository")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Erased repositories of every kind.
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    repositories: HashMap<ResourceKind, ErasedRepository>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        let repositories = ResourceKind::ALL
            .into_iter()
            .map(|kind| (kind, ErasedRepository::for_kind(kind)))
            .collect();
        Self { repositories }
    }

    pub fn get(&self, kind: ResourceKind) -> Result<&ErasedRepository> {
        self.repositories.get(&kind).ok_or_else(|| {
            LibraryError::Inconsistency(format!("no repository registered for {}", kind))
        })
    }
}

impl Default for RepositoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_is_registered() {
        let registry = RepositoryRegistry::new();
        for kind in ResourceKind::ALL {
            assert_eq!(registry.get(kind).unwrap().kind, kind);
        }
    }
}
