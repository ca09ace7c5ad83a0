//! # Relation Loading
//!
//! Relations are declared statically on each [`Schema`] and materialized on
//! demand. Resolving a relation is generic: the declaration says whether it
//! lives in a foreign key, a reverse foreign key or a link table. Assigning
//! the result is type specific, so every model module registers one
//! assignment function per relation it declares in a [`RelationRegistry`]
//! keyed by `(kind, relation name)`.
//!
//! The registry is built once at startup and [`RelationRegistry::verify`]
//! rejects a registry missing an entry for any declared relation.
//!
//! [`Schema`]: crate::schema::Schema

use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::models::{self, downcast, AnyResource, Resource, Variant};
use crate::query::filter::Filter;
use crate::query::sort::Sort;
use crate::schema::{RelationDef, RelationVia, ResourceKind};
use crate::store::{Document, StoreQuery};
use std::collections::HashMap;
use tracing::debug;

/// Result of resolving a relation, before it is assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    One(Option<AnyResource>),
    Many(Vec<AnyResource>),
}

impl Loaded {
    pub fn one<T: Resource>(self) -> Result<Option<T>> {
        match self {
            Loaded::One(resource) => resource.map(downcast).transpose(),
            Loaded::Many(_) => Err(LibraryError::Inconsistency(format!(
                "expected a single {} but loaded a list",
                T::KIND
            ))),
        }
    }

    pub fn many<T: Resource>(self) -> Result<Vec<T>> {
        match self {
            Loaded::Many(resources) => resources.into_iter().map(downcast).collect(),
            Loaded::One(_) => Err(LibraryError::Inconsistency(format!(
                "expected a list of {} but loaded a single resource",
                T::KIND
            ))),
        }
    }
}

/// Stores a loaded relation on its owner.
pub type AssignFn = fn(&mut AnyResource, Loaded) -> Result<()>;

/// Run `apply` on the concrete resource inside `owner`.
pub fn with_variant<T, F>(owner: &mut AnyResource, apply: F) -> Result<()>
where
    T: Resource,
    F: FnOnce(&mut T) -> Result<()>,
{
    let kind = owner.kind();
    match T::variant_mut(owner) {
        Some(resource) => apply(resource),
        None => Err(LibraryError::Inconsistency(format!(
            "a {} relation was assigned to a {}",
            T::KIND,
            kind
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationEntry {
    pub def: &'static RelationDef,
    assign: AssignFn,
}

impl RelationEntry {
    pub fn assign(&self, owner: &mut AnyResource, loaded: Loaded) -> Result<()> {
        (self.assign)(owner, loaded)
    }
}

/// Table of `(kind, relation)` to the function storing it.
#[derive(Debug, Default)]
pub struct RelationRegistry {
    entries: HashMap<(ResourceKind, &'static str), RelationEntry>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the relations of every built-in model.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        models::library::register_relations(&mut registry)?;
        models::collection::register_relations(&mut registry)?;
        models::show::register_relations(&mut registry)?;
        models::season::register_relations(&mut registry)?;
        models::episode::register_relations(&mut registry)?;
        models::people::register_relations(&mut registry)?;
        models::studio::register_relations(&mut registry)?;
        models::genre::register_relations(&mut registry)?;
        models::provider::register_relations(&mut registry)?;
        registry.verify()?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        kind: ResourceKind,
        name: &'static str,
        assign: AssignFn,
    ) -> Result<()> {
        let def = kind
            .schema()
            .relations
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| {
                LibraryError::Inconsistency(format!("{} declares no relation {}", kind, name))
            })?;
        if self.entries.contains_key(&(kind, name)) {
            return Err(LibraryError::Inconsistency(format!(
                "the relation {}.{} is registered twice",
                kind, name
            )));
        }
        self.entries.insert((kind, name), RelationEntry { def, assign });
        Ok(())
    }

    /// Fail unless every declared relation has a loader.
    pub fn verify(&self) -> Result<()> {
        for kind in ResourceKind::ALL {
            for relation in kind.schema().relations {
                if !self.entries.contains_key(&(kind, relation.name)) {
                    return Err(LibraryError::Inconsistency(format!(
                        "no loader registered for {}.{}",
                        kind, relation.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a relation by name, ignoring case.
    pub fn entry(&self, kind: ResourceKind, name: &str) -> Result<&RelationEntry> {
        kind.schema()
            .relation(name)
            .and_then(|def| self.entries.get(&(kind, def.name)))
            .ok_or_else(|| LibraryError::UnknownRelation {
                entity_type: kind.to_string(),
                relation: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_all(kind: ResourceKind, documents: Vec<Document>) -> Result<Vec<AnyResource>> {
    documents
        .into_iter()
        .map(|document| AnyResource::from_document(kind, document))
        .collect()
}

/// Query the resources reached from `owner` through `relation`, in the
/// target's default order.
pub async fn resolve(
    ctx: &LibraryContext,
    owner: &AnyResource,
    relation: &'static RelationDef,
) -> Result<Loaded> {
    let target = relation.target;
    let sort = Sort::default_for(target.schema()).resolved();
    debug!(
        kind = %owner.kind(),
        id = owner.id(),
        relation = relation.name,
        "Resolving relation"
    );

    match relation.via {
        RelationVia::ForeignKey(field) => {
            let loaded = match owner.reference(field) {
                Some(id) => ctx
                    .store()
                    .get(target, id)
                    .await?
                    .map(|document| AnyResource::from_document(target, document))
                    .transpose()?,
                None => None,
            };
            Ok(Loaded::One(loaded))
        }
        RelationVia::Reverse(field) => {
            let query = StoreQuery::new(Filter::eq(field, owner.id()), sort);
            let documents = ctx.store().fetch(target, &query).await?;
            Ok(Loaded::Many(decode_all(target, documents)?))
        }
        RelationVia::Link { link, side } => {
            let ids = ctx.store().linked(link, side, owner.id()).await?;
            if ids.is_empty() {
                return Ok(Loaded::Many(Vec::new()));
            }
            let query = StoreQuery::new(Filter::ids(ids), sort);
            let documents = ctx.store().fetch(target, &query).await?;
            Ok(Loaded::Many(decode_all(target, documents)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, Show, Studio};

    #[test]
    fn test_defaults_cover_every_declared_relation() {
        let registry = RelationRegistry::with_defaults().unwrap();
        let declared: usize = ResourceKind::ALL
            .iter()
            .map(|kind| kind.schema().relations.len())
            .sum();
        assert_eq!(registry.len(), declared);
    }

    #[test]
    fn test_missing_entry_fails_verification() {
        let mut registry = RelationRegistry::new();
        crate::models::genre::register_relations(&mut registry).unwrap();
        assert!(matches!(
            registry.verify(),
            Err(LibraryError::Inconsistency(_))
        ));
    }

    #[test]
    fn test_register_rejects_undeclared_and_duplicate() {
        let mut registry = RelationRegistry::new();
        let noop: AssignFn = |_, _| Ok(());
        assert!(registry.register(ResourceKind::Genre, "studio", noop).is_err());
        registry.register(ResourceKind::Genre, "shows", noop).unwrap();
        assert!(registry.register(ResourceKind::Genre, "shows", noop).is_err());
    }

    #[test]
    fn test_entry_lookup_is_case_insensitive() {
        let registry = RelationRegistry::with_defaults().unwrap();
        let entry = registry.entry(ResourceKind::Show, "Genres").unwrap();
        assert_eq!(entry.def.name, "genres");

        let err = registry.entry(ResourceKind::Show, "cast").unwrap_err();
        assert!(
            matches!(err, LibraryError::UnknownRelation { ref entity_type, ref relation }
                if entity_type == "show" && relation == "cast")
        );
    }

    #[test]
    fn test_assign_stores_on_the_owner() {
        let registry = RelationRegistry::with_defaults().unwrap();
        let mut owner = AnyResource::from(Show::new("Anohana"));

        let studio = Studio::new("A-1 Pictures");
        registry
            .entry(ResourceKind::Show, "studio")
            .unwrap()
            .assign(&mut owner, Loaded::One(Some(studio.clone().into())))
            .unwrap();
        let genres = vec![AnyResource::from(Genre::new("Drama"))];
        registry
            .entry(ResourceKind::Show, "genres")
            .unwrap()
            .assign(&mut owner, Loaded::Many(genres))
            .unwrap();

        let show: Show = downcast(owner).unwrap();
        assert_eq!(show.studio.as_deref(), Some(&studio));
        assert_eq!(show.genres.map(|g| g.len()), Some(1));
    }

    #[test]
    fn test_assign_rejects_wrong_shapes() {
        let registry = RelationRegistry::with_defaults().unwrap();
        let mut owner = AnyResource::from(Show::new("Anohana"));
        let entry = registry.entry(ResourceKind::Show, "genres").unwrap();
        assert!(entry.assign(&mut owner, Loaded::One(None)).is_err());

        let mut genre = AnyResource::from(Genre::new("Drama"));
        assert!(entry.assign(&mut genre, Loaded::Many(Vec::new())).is_err());
    }
}
