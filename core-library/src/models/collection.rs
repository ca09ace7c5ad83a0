//! Collections: user-curated groups of shows.

use super::{validate_slug, Library, Resource, Show};
use crate::context::LibraryContext;
use crate::error::Result;
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, LinkSide, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD,
    SLUG_FIELD,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Collection,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("overview", FieldKind::Text),
        FieldDef::new("images", FieldKind::Map),
    ],
    relations: &[
        RelationDef::new(
            "shows",
            ResourceKind::Show,
            RelationVia::Link {
                link: "collection_show",
                side: LinkSide::First,
            },
        ),
        RelationDef::new(
            "libraries",
            ResourceKind::Library,
            RelationVia::Link {
                link: "library_collection",
                side: LinkSide::Second,
            },
        ),
    ],
    default_sort: &[("name", false)],
    search_fields: &["name", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub overview: Option<String>,
    pub images: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<Library>>,
}

#[async_trait]
impl Resource for Collection {
    const KIND: ResourceKind = ResourceKind::Collection;

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn slug(&self) -> &str {
        &self.slug
    }

    fn set_slug(&mut self, slug: String) {
        self.slug = slug;
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    async fn prepare(&mut self, _ctx: &LibraryContext) -> Result<()> {
        validate_slug(self)
    }
}

pub(crate) fn register_relations(registry: &mut RelationRegistry) -> Result<()> {
    let kind = ResourceKind::Collection;
    registry.register(kind, "shows", |owner, loaded| {
        with_variant(owner, move |collection: &mut Collection| {
            collection.shows = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "libraries", |owner, loaded| {
        with_variant(owner, move |collection: &mut Collection| {
            collection.libraries = Some(loaded.many()?);
            Ok(())
        })
    })
}
