use super::{validate_slug, Resource, Show};
use crate::context::LibraryContext;
use crate::error::Result;
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD, SLUG_FIELD,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Studio,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("external_ids", FieldKind::Map),
    ],
    // Deleting a studio detaches its shows instead of deleting them.
    relations: &[RelationDef::new(
        "shows",
        ResourceKind::Show,
        RelationVia::Reverse("studio_id"),
    )],
    default_sort: &[("name", false)],
    search_fields: &["name", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Studio {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub external_ids: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
}

impl Studio {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Resource for Studio {
    const KIND: ResourceKind = ResourceKind::Studio;

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
    registry.register(ResourceKind::Studio, "shows", |owner, loaded| {
        with_variant(owner, move |studio: &mut Studio| {
            let mut shows: Vec<Show> = loaded.many()?;
            for show in &mut shows {
                show.studio_id = Some(studio.id);
            }
            studio.shows = Some(shows);
            Ok(())
        })
    })
}
