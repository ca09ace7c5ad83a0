//! Shows: series or movies, the root of the season/episode tree.

use super::{
    validate_slug, AnyResource, Collection, Episode, Genre, Library, Nested, People, Resource,
    Season, Studio,
};
use crate::context::LibraryContext;
use crate::error::Result;
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, LinkSide, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD,
    SLUG_FIELD,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STATUS_VARIANTS: &[&str] = &["unknown", "finished", "airing", "planned"];

/// Airing state of a show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Finished,
    Airing,
    Planned,
}

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Show,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("title", FieldKind::Text),
        FieldDef::new("aliases", FieldKind::TextList),
        FieldDef::new("path", FieldKind::Text),
        FieldDef::new("overview", FieldKind::Text),
        FieldDef::new("status", FieldKind::Enum(STATUS_VARIANTS)),
        FieldDef::new("start_air", FieldKind::Date),
        FieldDef::new("end_air", FieldKind::Date),
        FieldDef::new("is_movie", FieldKind::Bool),
        FieldDef::new("images", FieldKind::Map),
        FieldDef::new("external_ids", FieldKind::Map),
        FieldDef::new("studio_id", FieldKind::Int),
    ],
    relations: &[
        RelationDef::new("studio", ResourceKind::Studio, RelationVia::ForeignKey("studio_id"))
            .editable(),
        RelationDef::new(
            "genres",
            ResourceKind::Genre,
            RelationVia::Link {
                link: "show_genre",
                side: LinkSide::First,
            },
        )
        .editable(),
        RelationDef::new(
            "people",
            ResourceKind::People,
            RelationVia::Link {
                link: "show_people",
                side: LinkSide::First,
            },
        )
        .editable(),
        RelationDef::new("seasons", ResourceKind::Season, RelationVia::Reverse("show_id")).owned(),
        RelationDef::new("episodes", ResourceKind::Episode, RelationVia::Reverse("show_id")).owned(),
        RelationDef::new(
            "libraries",
            ResourceKind::Library,
            RelationVia::Link {
                link: "library_show",
                side: LinkSide::Second,
            },
        ),
        RelationDef::new(
            "collections",
            ResourceKind::Collection,
            RelationVia::Link {
                link: "collection_show",
                side: LinkSide::Second,
            },
        ),
    ],
    default_sort: &[("title", false)],
    search_fields: &["title", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Show {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub aliases: Vec<String>,
    pub path: Option<String>,
    pub overview: Option<String>,
    pub status: Status,
    pub start_air: Option<NaiveDate>,
    pub end_air: Option<NaiveDate>,
    pub is_movie: bool,
    /// Image kind (poster, logo, thumbnail, trailer) to URL
    pub images: BTreeMap<String, String>,
    /// Metadata provider slug to the id on that provider
    pub external_ids: BTreeMap<String, String>,
    pub studio_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub studio: Option<Box<Studio>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genres: Option<Vec<Genre>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub people: Option<Vec<People>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasons: Option<Vec<Season>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<Episode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<Library>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<Collection>>,
}

impl Show {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Resource for Show {
    const KIND: ResourceKind = ResourceKind::Show;

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
        Some(&self.title)
    }

    fn reference(&self, field: &str) -> Option<i64> {
        match field {
            "studio_id" => self.studio_id,
            _ => None,
        }
    }

    fn set_reference(&mut self, field: &str, id: Option<i64>) {
        if field == "studio_id" {
            self.studio_id = id;
        }
    }

    fn take_nested(&mut self) -> Vec<(&'static str, Nested)> {
        let mut nested = Vec::new();
        if let Some(studio) = self.studio.take() {
            nested.push(("studio", Nested::One(Some(AnyResource::from(*studio)))));
        }
        if let Some(genres) = self.genres.take() {
            nested.push(("genres", Nested::Many(genres.into_iter().map(Into::into).collect())));
        }
        if let Some(people) = self.people.take() {
            nested.push(("people", Nested::Many(people.into_iter().map(Into::into).collect())));
        }
        nested
    }

    /// Children absorbed from another instance point back at this show.
    fn on_merge(&mut self) {
        let id = self.id;
        for season in self.seasons.iter_mut().flatten() {
            season.show_id = Some(id);
        }
        for episode in self.episodes.iter_mut().flatten() {
            episode.show_id = Some(id);
        }
    }

    async fn prepare(&mut self, _ctx: &LibraryContext) -> Result<()> {
        validate_slug(self)
    }
}

pub(crate) fn register_relations(registry: &mut RelationRegistry) -> Result<()> {
    let kind = ResourceKind::Show;
    registry.register(kind, "studio", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            show.studio = loaded.one::<Studio>()?.map(Box::new);
            Ok(())
        })
    })?;
    registry.register(kind, "genres", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            show.genres = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "people", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            show.people = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "seasons", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            let mut seasons: Vec<Season> = loaded.many()?;
            for season in &mut seasons {
                season.show_id = Some(show.id);
            }
            show.seasons = Some(seasons);
            Ok(())
        })
    })?;
    registry.register(kind, "episodes", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            let mut episodes: Vec<Episode> = loaded.many()?;
            for episode in &mut episodes {
                episode.show_id = Some(show.id);
            }
            show.episodes = Some(episodes);
            Ok(())
        })
    })?;
    registry.register(kind, "libraries", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            show.libraries = Some(loaded.many()?);
            Ok(())
        })
    })?;
    registry.register(kind, "collections", |owner, loaded| {
        with_variant(owner, move |show: &mut Show| {
            show.collections = Some(loaded.many()?);
            Ok(())
        })
    })
}
