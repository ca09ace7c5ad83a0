//! Seasons of a show.

use super::{owner_slug, Episode, Resource, Show};
use crate::context::LibraryContext;
use crate::error::Result;
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD, SLUG_FIELD,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Season,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("show_id", FieldKind::Int),
        FieldDef::new("season_number", FieldKind::Int),
        FieldDef::new("title", FieldKind::Text),
        FieldDef::new("overview", FieldKind::Text),
        FieldDef::new("start_date", FieldKind::Date),
        FieldDef::new("end_date", FieldKind::Date),
        FieldDef::new("images", FieldKind::Map),
        FieldDef::new("external_ids", FieldKind::Map),
    ],
    relations: &[
        RelationDef::new("show", ResourceKind::Show, RelationVia::ForeignKey("show_id")),
        RelationDef::new("episodes", ResourceKind::Episode, RelationVia::Reverse("season_id"))
            .owned(),
    ],
    default_sort: &[("season_number", false)],
    search_fields: &["title", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Season {
    pub id: i64,
    /// Always `{show-slug}-s{season_number}`, recomputed on every write
    pub slug: String,
    pub show_id: Option<i64>,
    pub season_number: Option<i32>,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub images: BTreeMap<String, String>,
    pub external_ids: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<Box<Show>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<Episode>>,
}

impl Season {
    pub fn new(show_id: i64, season_number: i32) -> Self {
        Self {
            show_id: Some(show_id),
            season_number: Some(season_number),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Resource for Season {
    const KIND: ResourceKind = ResourceKind::Season;

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
        self.title.as_deref()
    }

    fn reference(&self, field: &str) -> Option<i64> {
        match field {
            "show_id" => self.show_id,
            _ => None,
        }
    }

    fn set_reference(&mut self, field: &str, id: Option<i64>) {
        if field == "show_id" {
            self.show_id = id;
        }
    }

    fn on_merge(&mut self) {
        let id = self.id;
        for episode in self.episodes.iter_mut().flatten() {
            episode.season_id = Some(id);
        }
    }

    async fn prepare(&mut self, ctx: &LibraryContext) -> Result<()> {
        let show = owner_slug(ctx, Self::KIND, ResourceKind::Show, self.show_id).await?;
        self.slug = format!("{}-s{}", show, self.season_number.unwrap_or_default());
        Ok(())
    }
}

pub(crate) fn register_relations(registry: &mut RelationRegistry) -> Result<()> {
    let kind = ResourceKind::Season;
    registry.register(kind, "show", |owner, loaded| {
        with_variant(owner, move |season: &mut Season| {
            season.show = loaded.one::<Show>()?.map(Box::new);
            Ok(())
        })
    })?;
    registry.register(kind, "episodes", |owner, loaded| {
        with_variant(owner, move |season: &mut Season| {
            let mut episodes: Vec<Episode> = loaded.many()?;
            for episode in &mut episodes {
                episode.season_id = Some(season.id);
            }
            season.episodes = Some(episodes);
            Ok(())
        })
    })
}
