//! Domain models for the media library
//!
//! Every resource is a flat record addressed by id: relations are stored as
//! id fields or link rows, and the `Option` relation payloads on each struct
//! stay `None` until the relation loader fills them in.
//!
//! [`AnyResource`] is the tagged union over every concrete type; erased
//! operations (relation loading, nested writes) dispatch on its variant.

pub mod collection;
pub mod episode;
pub mod genre;
pub mod library;
pub mod people;
pub mod provider;
pub mod season;
pub mod show;
pub mod studio;

pub use collection::Collection;
pub use episode::Episode;
pub use genre::Genre;
pub use library::Library;
pub use people::People;
pub use provider::Provider;
pub use season::Season;
pub use show::{Show, Status};
pub use studio::Studio;

use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::schema::{ResourceKind, Schema};
use crate::store::Document;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt;

// =============================================================================
// Resource trait
// =============================================================================

/// Nested relation payload taken out of a resource before it is written.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested {
    One(Option<AnyResource>),
    Many(Vec<AnyResource>),
}

/// Access to a concrete type inside an [`AnyResource`].
pub trait Variant: Sized {
    fn variant_mut(any: &mut AnyResource) -> Option<&mut Self>;
}

/// Common contract of every library resource.
#[async_trait]
pub trait Resource:
    Serialize
    + DeserializeOwned
    + Clone
    + Default
    + PartialEq
    + fmt::Debug
    + Send
    + Sync
    + Variant
    + Into<AnyResource>
    + TryFrom<AnyResource, Error = AnyResource>
    + 'static
{
    const KIND: ResourceKind;

    fn schema() -> &'static Schema {
        Self::KIND.schema()
    }

    /// Storage id, `0` until the resource is created.
    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    fn slug(&self) -> &str;

    fn set_slug(&mut self, slug: String);

    /// Human-readable name a missing slug is derived from.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Value of a to-one foreign key field.
    fn reference(&self, _field: &str) -> Option<i64> {
        None
    }

    fn set_reference(&mut self, _field: &str, _id: Option<i64>) {}

    /// Take the editable relation payloads out for a write.
    fn take_nested(&mut self) -> Vec<(&'static str, Nested)> {
        Vec::new()
    }

    /// Fix-ups after two instances were merged into this one.
    fn on_merge(&mut self) {}

    /// Resolve owners and computed fields before a write.
    async fn prepare(&mut self, _ctx: &LibraryContext) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tagged union
// =============================================================================

macro_rules! any_resource {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        /// A resource of any kind.
        #[derive(Debug, Clone, PartialEq)]
        pub enum AnyResource {
            $($variant($ty)),*
        }

        impl AnyResource {
            pub fn kind(&self) -> ResourceKind {
                match self {
                    $(AnyResource::$variant(_) => <$ty as Resource>::KIND),*
                }
            }

            pub fn id(&self) -> i64 {
                match self {
                    $(AnyResource::$variant(r) => r.id()),*
                }
            }

            pub fn slug(&self) -> &str {
                match self {
                    $(AnyResource::$variant(r) => r.slug()),*
                }
            }

            pub fn reference(&self, field: &str) -> Option<i64> {
                match self {
                    $(AnyResource::$variant(r) => r.reference(field)),*
                }
            }

            /// Decode a stored document of the given kind.
            pub fn from_document(kind: ResourceKind, document: Document) -> Result<Self> {
                $(
                    if kind == <$ty as Resource>::KIND {
                        return from_document::<$ty>(document).map(AnyResource::$variant);
                    }
                )*
                Err(LibraryError::Inconsistency(format!("no model registered for {}", kind)))
            }

            pub fn to_json(&self) -> Result<JsonValue> {
                let value = match self {
                    $(AnyResource::$variant(r) => serde_json::to_value(r)?),*
                };
                Ok(value)
            }
        }

        $(
            impl From<$ty> for AnyResource {
                fn from(resource: $ty) -> Self {
                    AnyResource::$variant(resource)
                }
            }

            impl TryFrom<AnyResource> for $ty {
                type Error = AnyResource;

                fn try_from(any: AnyResource) -> std::result::Result<Self, AnyResource> {
                    match any {
                        AnyResource::$variant(r) => Ok(r),
                        other => Err(other),
                    }
                }
            }

            impl Variant for $ty {
                fn variant_mut(any: &mut AnyResource) -> Option<&mut Self> {
                    match any {
                        AnyResource::$variant(r) => Some(r),
                        _ => None,
                    }
                }
            }
        )*
    };
}

any_resource! {
    Library(Library),
    Collection(Collection),
    Show(Show),
    Season(Season),
    Episode(Episode),
    People(People),
    Studio(Studio),
    Genre(Genre),
    Provider(Provider),
}

/// Unwrap an erased resource into the expected concrete type.
pub fn downcast<T: Resource>(any: AnyResource) -> Result<T> {
    T::try_from(any).map_err(|other| {
        LibraryError::Inconsistency(format!(
            "expected a {} but found a {}",
            T::KIND,
            other.kind()
        ))
    })
}

// =============================================================================
// Documents
// =============================================================================

/// Serialize a resource into its stored form: relation payloads and the id
/// are left out, the id being owned by the store.
pub fn to_document<T: Resource>(resource: &T) -> Result<Document> {
    let mut document = match serde_json::to_value(resource)? {
        JsonValue::Object(map) => map,
        other => {
            return Err(LibraryError::Inconsistency(format!(
                "{} serialized to a non-object: {}",
                T::KIND,
                other
            )))
        }
    };
    document.remove("id");
    for name in T::schema().relation_names() {
        document.remove(name);
    }
    Ok(document)
}

pub fn from_document<T: Resource>(document: Document) -> Result<T> {
    Ok(serde_json::from_value(JsonValue::Object(document))?)
}

// =============================================================================
// Slugs
// =============================================================================

/// Lowercase, alphanumeric runs joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Ensure a resource carries a usable slug.
///
/// A missing slug is derived from the name. A purely numeric slug gets a `!`
/// suffix so it can never be mistaken for an id.
pub fn validate_slug<T: Resource>(resource: &mut T) -> Result<()> {
    if resource.slug().is_empty() {
        let derived = resource.name().map(slugify).unwrap_or_default();
        resource.set_slug(derived);
    }
    if resource.slug().is_empty() {
        return Err(LibraryError::invalid_input(
            "slug",
            format!("a {} can't have an empty slug", T::KIND),
        ));
    }
    if resource.slug().parse::<i64>().is_ok() {
        let mut slug = resource.slug().to_string();
        slug.push('!');
        resource.set_slug(slug);
    }
    Ok(())
}

/// Read an owner's slug straight from the store, failing with an
/// invalid-relation error naming the dependent kind.
pub(crate) async fn owner_slug(
    ctx: &LibraryContext,
    dependent: ResourceKind,
    owner: ResourceKind,
    owner_id: Option<i64>,
) -> Result<String> {
    let owner_id = owner_id.ok_or_else(|| {
        LibraryError::invalid_relation(
            dependent.as_str(),
            format!("a {} must belong to a {}", dependent, owner),
        )
    })?;
    let document = ctx.store().get(owner, owner_id).await?.ok_or_else(|| {
        LibraryError::invalid_relation(
            dependent.as_str(),
            format!("the {} {} does not exist", owner, owner_id),
        )
    })?;
    match document.get("slug") {
        Some(JsonValue::String(slug)) => Ok(slug.clone()),
        _ => Err(LibraryError::Inconsistency(format!(
            "stored {} {} has no slug",
            owner, owner_id
        ))),
    }
}
