//! Episodes, attached to a show and optionally to one of its seasons.

use super::{owner_slug, Resource, Season, Show};
use crate::context::LibraryContext;
use crate::error::{LibraryError, Result};
use crate::relations::{with_variant, RelationRegistry};
use crate::schema::{
    FieldDef, FieldKind, RelationDef, RelationVia, ResourceKind, Schema, ID_FIELD, SLUG_FIELD,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Episode,
    fields: &[
        ID_FIELD,
        SLUG_FIELD,
        FieldDef::new("show_id", FieldKind::Int),
        FieldDef::new("season_id", FieldKind::Int),
        FieldDef::new("season_number", FieldKind::Int),
        FieldDef::new("episode_number", FieldKind::Int),
        FieldDef::new("absolute_number", FieldKind::Int),
        FieldDef::new("path", FieldKind::Text),
        FieldDef::new("title", FieldKind::Text),
        FieldDef::new("overview", FieldKind::Text),
        FieldDef::new("release_date", FieldKind::Date),
        FieldDef::new("images", FieldKind::Map),
        FieldDef::new("external_ids", FieldKind::Map),
    ],
    relations: &[
        RelationDef::new("show", ResourceKind::Show, RelationVia::ForeignKey("show_id")),
        RelationDef::new("season", ResourceKind::Season, RelationVia::ForeignKey("season_id")),
    ],
    default_sort: &[
        ("season_number", false),
        ("episode_number", false),
        ("absolute_number", false),
    ],
    search_fields: &["title", "slug"],
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    pub id: i64,
    pub slug: String,
    pub show_id: Option<i64>,
    pub season_id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub absolute_number: Option<i32>,
    pub path: Option<String>,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub images: BTreeMap<String, String>,
    pub external_ids: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub show: Option<Box<Show>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<Box<Season>>,
}

impl Episode {
    /// Slug of an episode of `show_slug`.
    ///
    /// `{show}-s{season}e{episode}` when the season number is known,
    /// `{show}-{absolute}` when only the absolute number is, the show slug
    /// alone otherwise (movies).
    pub fn slug_for(
        show_slug: &str,
        season_number: Option<i32>,
        episode_number: Option<i32>,
        absolute_number: Option<i32>,
    ) -> String {
        match (season_number, absolute_number) {
            (Some(season), _) => format!(
                "{}-s{}e{}",
                show_slug,
                season,
                episode_number.unwrap_or_default()
            ),
            (None, Some(absolute)) => format!("{}-{}", show_slug, absolute),
            (None, None) => show_slug.to_string(),
        }
    }
}

#[async_trait]
impl Resource for Episode {
    const KIND: ResourceKind = ResourceKind::Episode;

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
            "season_id" => self.season_id,
            _ => None,
        }
    }

    fn set_reference(&mut self, field: &str, id: Option<i64>) {
        match field {
            "show_id" => self.show_id = id,
            "season_id" => self.season_id = id,
            _ => {}
        }
    }

    async fn prepare(&mut self, ctx: &LibraryContext) -> Result<()> {
        let show = owner_slug(ctx, Self::KIND, ResourceKind::Show, self.show_id).await?;

        if let Some(season_id) = self.season_id {
            let season = ctx
                .store()
                .get(ResourceKind::Season, season_id)
                .await?
                .ok_or_else(|| {
                    LibraryError::invalid_relation(
                        "episode",
                        format!("the season {} does not exist", season_id),
                    )
                })?;
            let season_show = season.get("show_id").and_then(JsonValue::as_i64);
            if season_show != self.show_id {
                return Err(LibraryError::invalid_relation(
                    "episode",
                    format!(
                        "the season {} does not belong to the show {}",
                        season_id,
                        self.show_id.unwrap_or_default()
                    ),
                ));
            }
        }

        self.slug = Self::slug_for(
            &show,
            self.season_number,
            self.episode_number,
            self.absolute_number,
        );
        Ok(())
    }
}

pub(crate) fn register_relations(registry: &mut RelationRegistry) -> Result<()> {
    let kind = ResourceKind::Episode;
    registry.register(kind, "show", |owner, loaded| {
        with_variant(owner, move |episode: &mut Episode| {
            episode.show = loaded.one::<Show>()?.map(Box::new);
            Ok(())
        })
    })?;
    registry.register(kind, "season", |owner, loaded| {
        with_variant(owner, move |episode: &mut Episode| {
            episode.season = loaded.one::<Season>()?.map(Box::new);
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_for() {
        assert_eq!(Episode::slug_for("anohana", Some(1), Some(3), Some(3)), "anohana-s1e3");
        assert_eq!(Episode::slug_for("one-piece", None, None, Some(1071)), "one-piece-1071");
        assert_eq!(Episode::slug_for("your-name", None, None, None), "your-name");
    }
}
