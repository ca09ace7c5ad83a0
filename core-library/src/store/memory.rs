//! In-process arena store.
//!
//! Every resource kind gets its own id-ordered table and links are kept as
//! `(link, first_id, second_id)` rows. The arena sits behind a single
//! `parking_lot` lock that is never held across an await point.

use super::{slug_of, DeletePlan, Document, LinkSet, Store, StoreQuery};
use crate::error::{LibraryError, Result};
use crate::query::eval::{compare_documents, document_id, evaluate, RecordSource};
use crate::query::filter::Filter;
use crate::schema::{LinkSide, RelationDef, RelationVia, ResourceKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, instrument};

type LinkRow = (&'static str, i64, i64);

#[derive(Debug, Default)]
struct Arena {
    next_id: i64,
    tables: HashMap<ResourceKind, BTreeMap<i64, Document>>,
    links: BTreeSet<LinkRow>,
}

fn own_and_other(row: &LinkRow, side: LinkSide) -> (i64, i64) {
    match side {
        LinkSide::First => (row.1, row.2),
        LinkSide::Second => (row.2, row.1),
    }
}

fn link_row(link: &'static str, side: LinkSide, own: i64, other: i64) -> LinkRow {
    match side {
        LinkSide::First => (link, own, other),
        LinkSide::Second => (link, other, own),
    }
}

impl Arena {
    fn table(&self, kind: ResourceKind) -> impl Iterator<Item = &Document> {
        self.tables.get(&kind).into_iter().flat_map(BTreeMap::values)
    }

    fn identity(&self, kind: ResourceKind, id: i64) -> Option<(i64, String)> {
        let document = self.tables.get(&kind)?.get(&id)?;
        Some((id, slug_of(document)?.to_string()))
    }

    fn linked(&self, link: &str, side: LinkSide, id: i64) -> Vec<i64> {
        self.links
            .iter()
            .filter(|row| row.0 == link)
            .map(|row| own_and_other(row, side))
            .filter(|(own, _)| *own == id)
            .map(|(_, other)| other)
            .collect()
    }

    fn slug_taken(&self, kind: ResourceKind, slug: Option<&str>, except: Option<i64>) -> bool {
        self.table(kind)
            .any(|doc| slug_of(doc) == slug && Some(document_id(doc)) != except)
    }

    fn replace_links(&mut self, id: i64, links: &[LinkSet]) {
        for set in links {
            self.links.retain(|row| {
                row.0 != set.link || own_and_other(row, set.side).0 != id
            });
            for other in &set.ids {
                self.links.insert(link_row(set.link, set.side, id, *other));
            }
        }
    }
}

impl RecordSource for Arena {
    fn related(&self, record: &Document, relation: &RelationDef) -> Vec<(i64, String)> {
        let id = document_id(record);
        match relation.via {
            RelationVia::ForeignKey(fk) => record
                .get(fk)
                .and_then(JsonValue::as_i64)
                .and_then(|target| self.identity(relation.target, target))
                .into_iter()
                .collect(),
            RelationVia::Reverse(field) => self
                .table(relation.target)
                .filter(|doc| doc.get(field).and_then(JsonValue::as_i64) == Some(id))
                .filter_map(|doc| Some((document_id(doc), slug_of(doc)?.to_string())))
                .collect(),
            RelationVia::Link { link, side } => self
                .linked(link, side, id)
                .into_iter()
                .filter_map(|other| self.identity(relation.target, other))
                .collect(),
        }
    }
}

/// A [`Store`] over an in-memory arena, for tests and ephemeral libraries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Arena>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    #[instrument(level = "debug", skip(self, kind, query), fields(kind = %kind, limit = ?query.limit))]
    async fn fetch(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Document>> {
        let arena = self.state.read();
        let mut documents: Vec<Document> = arena
            .table(kind)
            .filter(|doc| evaluate(&query.filter, doc, &*arena))
            .cloned()
            .collect();
        documents.sort_by(|a, b| compare_documents(a, b, &query.sort));
        if let Some(limit) = query.limit {
            documents.truncate(limit as usize);
        }
        Ok(documents)
    }

    #[instrument(level = "debug", skip(self, kind, filter), fields(kind = %kind))]
    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64> {
        let arena = self.state.read();
        let count = arena
            .table(kind)
            .filter(|doc| evaluate(filter, doc, &*arena))
            .count();
        Ok(count as u64)
    }

    #[instrument(level = "debug", skip(self, kind), fields(kind = %kind))]
    async fn get(&self, kind: ResourceKind, id: i64) -> Result<Option<Document>> {
        let arena = self.state.read();
        Ok(arena.tables.get(&kind).and_then(|t| t.get(&id)).cloned())
    }

    #[instrument(level = "debug", skip(self, kind, document, links), fields(kind = %kind, links = links.len()))]
    async fn insert(
        &self,
        kind: ResourceKind,
        document: &Document,
        links: &[LinkSet],
    ) -> Result<i64> {
        let mut arena = self.state.write();
        let slug = slug_of(document);
        if arena.slug_taken(kind, slug, None) {
            return Err(LibraryError::DuplicateResource {
                entity_type: kind.to_string(),
                slug: slug.unwrap_or_default().to_string(),
            });
        }

        arena.next_id += 1;
        let id = arena.next_id;
        let mut stored = document.clone();
        stored.insert("id".to_string(), JsonValue::from(id));
        arena.tables.entry(kind).or_default().insert(id, stored);
        arena.replace_links(id, links);

        debug!(%kind, id, "Inserted resource into arena");
        Ok(id)
    }

    #[instrument(level = "debug", skip(self, kind, document, links), fields(kind = %kind))]
    async fn update(
        &self,
        kind: ResourceKind,
        id: i64,
        document: &Document,
        links: &[LinkSet],
    ) -> Result<()> {
        let mut arena = self.state.write();
        let exists = arena.tables.get(&kind).map(|t| t.contains_key(&id)).unwrap_or(false);
        if !exists {
            return Err(LibraryError::not_found(kind.as_str(), id));
        }
        let slug = slug_of(document);
        if arena.slug_taken(kind, slug, Some(id)) {
            return Err(LibraryError::DuplicateResource {
                entity_type: kind.to_string(),
                slug: slug.unwrap_or_default().to_string(),
            });
        }

        let mut stored = document.clone();
        stored.insert("id".to_string(), JsonValue::from(id));
        arena.tables.entry(kind).or_default().insert(id, stored);
        arena.replace_links(id, links);
        Ok(())
    }

    #[instrument(level = "debug", skip(self, plan), fields(removals = plan.removals.len()))]
    async fn delete(&self, plan: &DeletePlan) -> Result<u64> {
        let mut arena = self.state.write();

        for detach in &plan.detach {
            if let Some(table) = arena.tables.get_mut(&detach.kind) {
                for doc in table.values_mut() {
                    let points_at_removed = doc
                        .get(detach.field)
                        .and_then(JsonValue::as_i64)
                        .map(|target| detach.ids.contains(&target))
                        .unwrap_or(false);
                    if points_at_removed {
                        doc.insert(detach.field.to_string(), JsonValue::Null);
                    }
                }
            }
        }

        let mut removed = 0;
        for (kind, ids) in &plan.removals {
            if let Some(table) = arena.tables.get_mut(kind) {
                for id in ids {
                    if table.remove(id).is_some() {
                        removed += 1;
                    }
                }
            }
            arena
                .links
                .retain(|row| !ids.contains(&row.1) && !ids.contains(&row.2));
        }
        Ok(removed)
    }

    #[instrument(level = "debug", skip(self))]
    async fn linked(&self, link: &'static str, side: LinkSide, id: i64) -> Result<Vec<i64>> {
        Ok(self.state.read().linked(link, side, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::CompareOp;
    use crate::query::sort::SortKey;
    use crate::store::Detach;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_ids_are_shared_across_kinds() {
        let store = MemoryStore::new();
        let show = store
            .insert(ResourceKind::Show, &doc(json!({"slug": "anohana"})), &[])
            .await
            .unwrap();
        let genre = store
            .insert(ResourceKind::Genre, &doc(json!({"slug": "drama"})), &[])
            .await
            .unwrap();
        assert_ne!(show, genre);
        assert!(store.get(ResourceKind::Genre, show).await.unwrap().is_none());
        assert_eq!(
            store.get(ResourceKind::Show, show).await.unwrap().unwrap().get("id"),
            Some(&json!(show))
        );
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected_per_kind() {
        let store = MemoryStore::new();
        let anohana = doc(json!({"slug": "anohana"}));
        store.insert(ResourceKind::Show, &anohana, &[]).await.unwrap();
        store.insert(ResourceKind::Genre, &anohana, &[]).await.unwrap();

        let err = store
            .insert(ResourceKind::Show, &anohana, &[])
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_fetch_filters_sorts_and_limits() {
        let store = MemoryStore::new();
        for (slug, title) in [("c", "Clannad"), ("a", "Anohana"), ("b", "Bakemonogatari")] {
            store
                .insert(ResourceKind::Show, &doc(json!({"slug": slug, "title": title})), &[])
                .await
                .unwrap();
        }

        let query = StoreQuery::new(
            Filter::compare("title", CompareOp::Gt, "B"),
            vec![SortKey::field("title", true), SortKey::field("id", false)],
        )
        .limit(1);
        let rows = store.fetch(ResourceKind::Show, &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(slug_of(&rows[0]), Some("c"));
        assert_eq!(
            store
                .count(ResourceKind::Show, &Filter::True)
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_links_and_delete_plan() {
        let store = MemoryStore::new();
        let studio = store
            .insert(ResourceKind::Studio, &doc(json!({"slug": "a-1"})), &[])
            .await
            .unwrap();
        let genre = store
            .insert(ResourceKind::Genre, &doc(json!({"slug": "drama"})), &[])
            .await
            .unwrap();
        let links = [LinkSet {
            link: "show_genre",
            side: LinkSide::First,
            ids: vec![genre],
        }];
        let show = store
            .insert(
                ResourceKind::Show,
                &doc(json!({"slug": "anohana", "studio_id": studio})),
                &links,
            )
            .await
            .unwrap();

        assert_eq!(
            store.linked("show_genre", LinkSide::Second, genre).await.unwrap(),
            vec![show]
        );

        let plan = DeletePlan {
            removals: vec![(ResourceKind::Studio, vec![studio]), (ResourceKind::Genre, vec![genre])],
            detach: vec![Detach {
                kind: ResourceKind::Show,
                field: "studio_id",
                ids: vec![studio],
            }],
        };
        assert_eq!(store.delete(&plan).await.unwrap(), 2);

        let stored = store.get(ResourceKind::Show, show).await.unwrap().unwrap();
        assert_eq!(stored.get("studio_id"), Some(&JsonValue::Null));
        assert!(store
            .linked("show_genre", LinkSide::First, show)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_named_links_only() {
        let store = MemoryStore::new();
        let show = store
            .insert(
                ResourceKind::Show,
                &doc(json!({"slug": "anohana"})),
                &[
                    LinkSet {
                        link: "show_genre",
                        side: LinkSide::First,
                        ids: vec![10, 11],
                    },
                    LinkSet {
                        link: "show_people",
                        side: LinkSide::First,
                        ids: vec![20],
                    },
                ],
            )
            .await
            .unwrap();

        store
            .update(
                ResourceKind::Show,
                show,
                &doc(json!({"slug": "anohana", "title": "Anohana"})),
                &[LinkSet {
                    link: "show_genre",
                    side: LinkSide::First,
                    ids: vec![12],
                }],
            )
            .await
            .unwrap();

        assert_eq!(
            store.linked("show_genre", LinkSide::First, show).await.unwrap(),
            vec![12]
        );
        assert_eq!(
            store.linked("show_people", LinkSide::First, show).await.unwrap(),
            vec![20]
        );
        assert!(matches!(
            store
                .update(ResourceKind::Show, 999, &doc(json!({"slug": "x"})), &[])
                .await,
            Err(LibraryError::NotFound { .. })
        ));
    }
}
