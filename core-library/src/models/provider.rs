//! Metadata providers a library can be configured with.

use super::{validate_slug, Library, Resource};
use crate::context::LibraryContext;
use crate::error::Result;
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, LinkSide, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD,
    SLUG_FIELD,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Provider,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("logo", FieldKind::Text),
    ],
    relations: &[RelationDef::new(
        "libraries",
        ResourceKind::Library,
        RelationVia::Link {
            link: "library_provider",
            side: LinkSide::Second,
        },
    )],
    default_sort: &[("name", false)],
    search_fields: &["name", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub logo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<Library>>,
}

impl Provider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Resource for Provider {
    const KIND: ResourceKind = ResourceKind::Provider;

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
    registry.register(ResourceKind::Provider, "libraries", |owner, loaded| {
        with_variant(owner, move |provider: &mut Provider| {
            provider.libraries = Some(loaded.many()?);
            Ok(())
        })
    })
}
