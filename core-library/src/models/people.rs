//! People credited on shows (staff and voice actors).

use super::{validate_slug, Resource, Show};
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
    kind: ResourceKind::People,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("images", FieldKind::Map),
        FieldDef::new("external_ids", FieldKind::Map),
    ],
    relations: &[RelationDef::new(
        "shows",
        ResourceKind::Show,
        RelationVia::Link {
            link: "show_people",
            side: LinkSide::Second,
        },
    )],
    default_sort: &[("name", false)],
    search_fields: &["name", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct People {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub images: BTreeMap<String, String>,
    pub external_ids: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
}

#[async_trait]
impl Resource for People {
    const KIND: ResourceKind = ResourceKind::People;

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
    registry.register(ResourceKind::People, "shows", |owner, loaded| {
        with_variant(owner, move |people: &mut People| {
            people.shows = Some(loaded.many()?);
            Ok(())
        })
    })
}
