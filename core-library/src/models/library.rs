//! Libraries: scanned root paths together with the providers used to
//! identify their content.

use super::{validate_slug, Collection, Nested, Provider, Resource, Show};
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
    kind: ResourceKind::Library,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("name", FieldKind::Text),
        FieldDef::new("paths", FieldKind::TextList),
    ],
    relations: &[
        RelationDef::new(
            "providers",
            ResourceKind::Provider,
            RelationVia::Link {
                link: "library_provider",
                side: LinkSide::First,
            },
        )
        .editable(),
        RelationDef::new(
            "shows",
            ResourceKind::Show,
            RelationVia::Link {
                link: "library_show",
                side: LinkSide::First,
            },
        ),
        RelationDef::new(
            "collections",
            ResourceKind::Collection,
            RelationVia::Link {
                link: "library_collection",
                side: LinkSide::First,
            },
        ),
    ],
    default_sort: &[("slug", false)],
    search_fields: &["name", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub paths: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<Provider>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shows: Option<Vec<Show>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<Collection>>,
}

impl Library {
    pub fn new(name: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            name: name.into(),
            paths,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Resource for Library {
    const KIND: ResourceKind = ResourceKind::Library;

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

    fn take_nested(&mut self) -> Vec<(&'static str, Nested)> {
        match self.providers.take() {
            Some(providers) => vec![(
                "providers",
                Nested::Many(providers.into_iter().map(Into::into).collect()),
            )],
            None => Vec::new(),
        }
    }

    async fn prepare(&mut self, _ctx: &LibraryContext) -> Result<()> {
        validate_slug(self)
    }
}

pub(crate) fn register_relations(registry: &mut RelationRegistry) -> Result<()> {
    let kind = ResourceKind::Library;
    registry.register(kind, "providers", |owner, loaded| {
        with_variant(owner, move |library: &mut Library| {
            library.providers = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "shows", |owner, loaded| {
        with_variant(owner, move |library: &mut Library| {
            library.shows = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "collections", |owner, loaded| {
        with_variant(owner, move |library: &mut Library| {
            library.collections = Some(loaded.many()?);
            Ok(())
        })
    })
}
