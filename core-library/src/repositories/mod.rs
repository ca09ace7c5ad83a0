//! # Repository Pattern Implementation
//!
//! One generic [`Repository<T>`] serves every resource type: CRUD, search,
//! filtered listings and cursor pagination, all driven by the type's static
//! schema and executed against the context's [`Store`].
//!
//! ## Architecture
//!
//! - Filters and sorts are compiled before any storage call
//! - Listings are keyset-paginated on the fully resolved sort
//! - Nested relation objects are written through the repository of their
//!   own kind (see [`dispatch`]), reusing existing rows by slug
//! - Deletes cascade to owned children and detach non-owned references
//!
//! [`Store`]: crate::store::Store

pub mod dispatch;
pub mod pagination;

pub use dispatch::{ErasedRepository, RepositoryRegistry};
pub use pagination::{Page, Pagination};

use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::identifier::Identifier;
use crate::merger::{complete, nullify};
use crate::models::{from_document, to_document, AnyResource, Episode, Nested, Resource, Season};
use crate::query::cursor::keyset_after;
use crate::query::eval::document_id;
use crate::query::filter::{Expr, Filter};
use crate::query::params::ListRequest;
use crate::query::sort::Sort;
use crate::schema::{RelationDef, RelationVia, ResourceKind};
use crate::store::{DeletePlan, Detach, LinkSet, Store, StoreQuery};
use crate::value::Value;
use serde_json::Value as JsonValue;
use std::collections::{HashSet, VecDeque};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Data access for one resource type.
pub struct Repository<T: Resource> {
    ctx: Arc<LibraryContext>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Resource> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(self.ctx.clone())
    }
}

impl<T: Resource> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").field("kind", &T::KIND).finish()
    }
}

fn identifier_filter(id: &Identifier) -> Filter {
    match id {
        Identifier::Id(id) => Filter::eq("id", *id),
        Identifier::Slug(slug) => Filter::eq("slug", slug.as_str()),
    }
}

fn relation_named(kind: ResourceKind, name: &str) -> Result<&'static RelationDef> {
    kind.schema()
        .relations
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| LibraryError::UnknownRelation {
            entity_type: kind.to_string(),
            relation: name.to_string(),
        })
}

impl<T: Resource> Repository<T> {
    pub fn new(ctx: Arc<LibraryContext>) -> Self {
        Self {
            ctx,
            _marker: PhantomData,
        }
    }

    pub fn context(&self) -> &Arc<LibraryContext> {
        &self.ctx
    }

    fn store(&self) -> &dyn Store {
        self.ctx.store()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a resource by id or slug.
    ///
    /// # Errors
    ///
    /// [`LibraryError::NotFound`] when nothing matches.
    pub async fn get(&self, id: impl Into<Identifier>) -> Result<T> {
        let id = id.into();
        self.get_or_default(id.clone())
            .await?
            .ok_or_else(|| LibraryError::not_found(T::KIND.as_str(), &id))
    }

    #[instrument(skip(self, id), fields(kind = %T::KIND))]
    pub async fn get_or_default(&self, id: impl Into<Identifier>) -> Result<Option<T>> {
        let document = match id.into() {
            Identifier::Id(id) => self.store().get(T::KIND, id).await?,
            Identifier::Slug(slug) => self.store().find_by_slug(T::KIND, &slug).await?,
        };
        document.map(from_document).transpose()
    }

    /// First resource matching `filter` in the default order.
    pub async fn find(&self, filter: Filter) -> Result<T> {
        self.find_or_default(filter)
            .await?
            .ok_or_else(|| LibraryError::not_found(T::KIND.as_str(), "matching the filter"))
    }

    #[instrument(skip(self, filter), fields(kind = %T::KIND))]
    pub async fn find_or_default(&self, filter: Filter) -> Result<Option<T>> {
        let query = StoreQuery::new(filter, Sort::default_for(T::schema()).resolved()).limit(1);
        let document = self.store().fetch(T::KIND, &query).await?.into_iter().next();
        document.map(from_document).transpose()
    }

    /// A page of resources matching `filter`, ordered by `sort` and starting
    /// strictly after the cursor resource when one is given.
    ///
    /// # Errors
    ///
    /// [`LibraryError::NotFound`] when the cursor resource does not exist.
    #[instrument(skip(self, filter, sort, pagination), fields(kind = %T::KIND, sort = %sort))]
    pub async fn get_all(
        &self,
        filter: Filter,
        sort: &Sort,
        pagination: Pagination,
    ) -> Result<Vec<T>> {
        let limit = self.ctx.config().page_size(pagination.limit);
        let keys = sort.resolved();

        let mut terms = vec![filter];
        if let Some(after) = pagination.after_id {
            let cursor = self
                .store()
                .get(T::KIND, after)
                .await?
                .ok_or_else(|| LibraryError::not_found(T::KIND.as_str(), after))?;
            terms.push(keyset_after(&keys, &cursor));
        }

        debug!(kind = %T::KIND, sort = %sort, limit, after = ?pagination.after_id, "Listing resources");
        let query = StoreQuery::new(Filter::and(terms), keys).limit(limit);
        self.store()
            .fetch(T::KIND, &query)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    /// Run a parsed listing request.
    pub async fn list(&self, request: &ListRequest) -> Result<Vec<T>> {
        self.get_all(request.filter.clone(), &request.sort, request.pagination)
            .await
    }

    /// Run a parsed listing request and wrap the result with its links.
    pub async fn page(&self, request: &ListRequest, path: &str) -> Result<Page<T>> {
        let items = self.list(request).await?;
        let limit = self.ctx.config().page_size(request.pagination.limit);
        Ok(Page::new(items, path, request.query(), limit))
    }

    #[instrument(skip(self, filter), fields(kind = %T::KIND))]
    pub async fn get_count(&self, filter: &Filter) -> Result<u64> {
        self.store().count(T::KIND, filter).await
    }

    /// Case-insensitive substring match over the type's name-like fields,
    /// capped by the configured search limit.
    #[instrument(skip(self), fields(kind = %T::KIND))]
    pub async fn search(&self, query: &str) -> Result<Vec<T>> {
        let filter = Filter::any(T::schema().search_fields.iter().map(|&field| {
            Filter::Contains {
                field,
                needle: query.to_string(),
                ignore_case: true,
            }
        }));
        let limit = self.ctx.config().search_limit;
        debug!(kind = %T::KIND, query, limit, "Searching resources");

        let request = StoreQuery::new(filter, Sort::default_for(T::schema()).resolved()).limit(limit);
        self.store()
            .fetch(T::KIND, &request)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store a new resource.
    ///
    /// Nested relation objects are reused when they already exist (by id or
    /// slug) and created otherwise, before the resource itself is written.
    /// Those nested creations are separate writes: when the resource's own
    /// insert then fails, they stay in the store.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::DuplicateResource`] when the slug is taken
    /// - [`LibraryError::InvalidRelation`] when a nested object names a
    ///   missing id, or an owner does not exist
    #[instrument(skip(self, resource), fields(kind = %T::KIND))]
    pub async fn create(&self, resource: T) -> Result<T> {
        let mut resource = resource;
        resource.prepare(&self.ctx).await?;
        let nested = resource.take_nested();
        let links = self.write_nested(&mut resource, nested).await?;

        let document = to_document(&resource)?;
        let id = self.store().insert(T::KIND, &document, &links).await?;
        info!(kind = %T::KIND, id, slug = %resource.slug(), "Created resource");

        self.get(id).await
    }

    /// Return the resource with the same slug, creating it when missing.
    ///
    /// A concurrent writer winning the insert race is absorbed by looking
    /// the slug up again; failing that lookup is an inconsistency.
    #[instrument(skip(self, resource), fields(kind = %T::KIND))]
    pub async fn create_if_not_exists(&self, resource: T) -> Result<T> {
        let mut resource = resource;
        resource.prepare(&self.ctx).await?;
        let slug = resource.slug().to_string();
        if let Some(existing) = self.get_or_default(Identifier::Slug(slug.clone())).await? {
            return Ok(existing);
        }

        match self.create(resource).await {
            Err(err) if err.is_duplicate() => {
                warn!(kind = %T::KIND, slug = %slug, "Lost a creation race, looking the resource up");
                self.get_or_default(Identifier::Slug(slug.clone()))
                    .await?
                    .ok_or_else(|| {
                        error!(kind = %T::KIND, slug = %slug, "Duplicate slug can't be found");
                        LibraryError::Inconsistency(format!(
                            "the {} {} collided on insert but does not exist",
                            T::KIND,
                            slug
                        ))
                    })
            }
            other => other,
        }
    }

    /// Replace a stored resource with `edited`, found by its id or slug.
    ///
    /// Without `reset`, fields left unset in `edited` keep their stored
    /// value. With `reset`, every field but the identity starts blank, and
    /// editable link relations missing from the payload are cleared.
    #[instrument(skip(self, edited), fields(kind = %T::KIND))]
    pub async fn edit(&self, edited: T, reset: bool) -> Result<T> {
        let mut edited = edited;
        let existing = if edited.id() != 0 {
            self.get(edited.id()).await?
        } else {
            self.get(Identifier::Slug(edited.slug().to_string())).await?
        };
        let id = existing.id();

        let base = if reset { nullify(&existing) } else { existing };
        let nested = edited.take_nested();
        let mut merged = complete(edited, &base)?;
        merged.set_id(id);
        merged.prepare(&self.ctx).await?;

        let mut links = self.write_nested(&mut merged, nested).await?;
        if reset {
            for relation in T::schema().relations.iter().filter(|r| r.editable) {
                if let RelationVia::Link { link, side } = relation.via {
                    if !links.iter().any(|set| set.link == link) {
                        links.push(LinkSet {
                            link,
                            side,
                            ids: Vec::new(),
                        });
                    }
                }
            }
        }

        let document = to_document(&merged)?;
        self.store().update(T::KIND, id, &document, &links).await?;
        info!(kind = %T::KIND, id, reset, "Edited resource");

        self.get(id).await
    }

    /// Apply `apply` to the stored resource and write the result back.
    #[instrument(skip(self, id, apply), fields(kind = %T::KIND))]
    pub async fn patch<F>(&self, id: impl Into<Identifier>, apply: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()> + Send,
    {
        let mut resource = self.get(id).await?;
        let id = resource.id();
        apply(&mut resource)?;
        resource.set_id(id);
        resource.prepare(&self.ctx).await?;

        let nested = resource.take_nested();
        let links = self.write_nested(&mut resource, nested).await?;
        let document = to_document(&resource)?;
        self.store().update(T::KIND, id, &document, &links).await?;
        info!(kind = %T::KIND, id, "Patched resource");

        self.get(id).await
    }

    /// Overwrite the named fields only.
    ///
    /// # Errors
    ///
    /// [`LibraryError::InvalidInput`] for the id, an unknown field, or a
    /// value of the wrong type.
    pub async fn patch_fields(
        &self,
        id: impl Into<Identifier>,
        fields: serde_json::Map<String, JsonValue>,
    ) -> Result<T> {
        let schema = T::schema();
        let mut updates = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let field = schema.field(&key).ok_or_else(|| {
                LibraryError::invalid_input(key.clone(), format!("no such field on {}", T::KIND))
            })?;
            if field.name == "id" {
                return Err(LibraryError::invalid_input("id", "the id can't be changed"));
            }
            updates.push((field.name, value));
        }

        self.patch(id, move |resource: &mut T| {
            let mut value = serde_json::to_value(&*resource)?;
            if let JsonValue::Object(object) = &mut value {
                for (name, update) in updates {
                    object.insert(name.to_string(), update);
                }
            }
            *resource = serde_json::from_value(value)
                .map_err(|e| LibraryError::invalid_input(T::KIND.as_str(), e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Write the nested relation payloads taken out of `resource`, setting
    /// its foreign keys and returning the link sets to store with it.
    ///
    /// Each nested object is committed on its own. Nothing here is rolled
    /// back if the caller's write of `resource` fails afterwards.
    async fn write_nested(
        &self,
        resource: &mut T,
        nested: Vec<(&'static str, Nested)>,
    ) -> Result<Vec<LinkSet>> {
        let mut links = Vec::new();
        for (name, payload) in nested {
            let relation = relation_named(T::KIND, name)?;
            match (relation.via, payload) {
                (RelationVia::ForeignKey(field), Nested::One(item)) => {
                    let id = match item {
                        Some(item) => Some(self.ensure(relation, item).await?),
                        None => None,
                    };
                    resource.set_reference(field, id);
                }
                (RelationVia::Link { link, side }, Nested::Many(items)) => {
                    let mut ids = Vec::with_capacity(items.len());
                    for item in items {
                        let id = self.ensure(relation, item).await?;
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                    links.push(LinkSet { link, side, ids });
                }
                _ => {
                    return Err(LibraryError::Inconsistency(format!(
                        "the nested {} of a {} doesn't match its declaration",
                        name,
                        T::KIND
                    )))
                }
            }
        }
        Ok(links)
    }

    /// Id of a nested object: an explicit id must exist, anything else goes
    /// through the target repository's `create_if_not_exists`.
    async fn ensure(&self, relation: &RelationDef, item: AnyResource) -> Result<i64> {
        if item.kind() != relation.target {
            return Err(LibraryError::invalid_relation(
                T::KIND.as_str(),
                format!("{} expects a {}, not a {}", relation.name, relation.target, item.kind()),
            ));
        }
        if item.id() != 0 {
            return match self.store().get(relation.target, item.id()).await? {
                Some(_) => Ok(item.id()),
                None => Err(LibraryError::invalid_relation(
                    T::KIND.as_str(),
                    format!("the {} {} does not exist", relation.target, item.id()),
                )),
            };
        }

        let created = self
            .ctx
            .repository(relation.target)?
            .create_if_not_exists(self.ctx.clone(), item)
            .await?;
        Ok(created.id())
    }

    // =========================================================================
    // Deletes
    // =========================================================================

    pub async fn delete(&self, id: impl Into<Identifier>) -> Result<()> {
        let resource = self.get(id).await?;
        self.delete_resource(&resource).await
    }

    /// Remove `resource`, the children it owns, and every link row touching
    /// them, in one atomic write.
    #[instrument(skip(self, resource), fields(kind = %T::KIND, id = resource.id()))]
    pub async fn delete_resource(&self, resource: &T) -> Result<()> {
        let plan = delete_plan(self.store(), T::KIND, vec![resource.id()]).await?;
        let removed = self.store().delete(&plan).await?;
        info!(kind = %T::KIND, id = resource.id(), slug = %resource.slug(), removed, "Deleted resource");
        Ok(())
    }

    /// Delete every resource matching `filter`, returning how many matched.
    #[instrument(skip(self, filter), fields(kind = %T::KIND))]
    pub async fn delete_all(&self, filter: Filter) -> Result<u64> {
        let matches = self
            .store()
            .fetch(T::KIND, &StoreQuery::new(filter, Vec::new()))
            .await?;
        let ids: Vec<i64> = matches.iter().map(document_id).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let plan = delete_plan(self.store(), T::KIND, ids.clone()).await?;
        let removed = self.store().delete(&plan).await?;
        info!(kind = %T::KIND, matched = ids.len(), removed, "Deleted matching resources");
        Ok(ids.len() as u64)
    }
}

/// Collect what deleting `ids` removes: owned children recursively, and the
/// foreign keys of non-owned dependents to clear.
async fn delete_plan(store: &dyn Store, kind: ResourceKind, ids: Vec<i64>) -> Result<DeletePlan> {
    let mut plan = DeletePlan::default();
    let mut seen = HashSet::new();
    let mut pending = VecDeque::from([(kind, ids)]);

    while let Some((kind, ids)) = pending.pop_front() {
        let ids: Vec<i64> = ids.into_iter().filter(|id| seen.insert((kind, *id))).collect();
        if ids.is_empty() {
            continue;
        }

        for relation in kind.schema().relations {
            let RelationVia::Reverse(field) = relation.via else {
                continue;
            };
            if relation.owned {
                let filter = Filter::In {
                    expr: Expr::Field(field),
                    values: ids.iter().copied().map(Value::Int).collect(),
                };
                let children = store
                    .fetch(relation.target, &StoreQuery::new(filter, Vec::new()))
                    .await?;
                pending.push_back((relation.target, children.iter().map(document_id).collect()));
            } else {
                plan.detach.push(Detach {
                    kind: relation.target,
                    field,
                    ids: ids.clone(),
                });
            }
        }
        plan.removals.push((kind, ids));
    }
    Ok(plan)
}

// =============================================================================
// Lookups by number
// =============================================================================

fn belongs_to_show(kind: ResourceKind, show: Identifier) -> Result<Filter> {
    Ok(Filter::Related {
        relation: relation_named(kind, "show")?,
        target: show,
    })
}

impl Repository<Season> {
    /// The season `season_number` of a show given by id or slug.
    pub async fn get_season(&self, show: impl Into<Identifier>, season_number: i32) -> Result<Season> {
        let show = show.into();
        let filter = Filter::and([
            belongs_to_show(Season::KIND, show.clone())?,
            Filter::eq("season_number", i64::from(season_number)),
        ]);
        self.find_or_default(filter).await?.ok_or_else(|| {
            LibraryError::not_found("season", format!("{} season {}", show, season_number))
        })
    }
}

impl Repository<Episode> {
    pub async fn get_episode(
        &self,
        show: impl Into<Identifier>,
        season_number: i32,
        episode_number: i32,
    ) -> Result<Episode> {
        let show = show.into();
        let filter = Filter::and([
            belongs_to_show(Episode::KIND, show.clone())?,
            Filter::eq("season_number", i64::from(season_number)),
            Filter::eq("episode_number", i64::from(episode_number)),
        ]);
        self.find_or_default(filter).await?.ok_or_else(|| {
            LibraryError::not_found(
                "episode",
                format!("{} s{}e{}", show, season_number, episode_number),
            )
        })
    }

    pub async fn get_absolute(
        &self,
        show: impl Into<Identifier>,
        absolute_number: i32,
    ) -> Result<Episode> {
        let show = show.into();
        let filter = Filter::and([
            belongs_to_show(Episode::KIND, show.clone())?,
            Filter::eq("absolute_number", i64::from(absolute_number)),
        ]);
        self.find_or_default(filter).await?.ok_or_else(|| {
            LibraryError::not_found("episode", format!("{} absolute {}", show, absolute_number))
        })
    }
}
