//! SQLite-backed store.
//!
//! Resources share one `resources` table keyed by a global id sequence; the
//! scalar fields sit in a JSON `body` and are reached with `json_extract`.
//! Link relations are rows of the `links` table. Every write is one
//! [`DatabaseAdapter::execute_batch`] call, so a resource and its links land
//! together or not at all.

use super::{slug_of, DeletePlan, Document, LinkSet, Store, StoreQuery};
use crate::error::{LibraryError, Result};
use crate::query::filter::Filter;
use crate::query::sql::{column, link_columns, lower_filter, order_by, placeholders};
use crate::schema::{LinkSide, ResourceKind};
use async_trait::async_trait;
use bridge_traits::database::{DatabaseAdapter, QueryRow, QueryValue, Statement};
use bridge_traits::error::BridgeError;
use bridge_traits::get_column;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info, instrument};

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/0001_resources.sql"))];

const SELECT_RESOURCES: &str =
    "SELECT r.id AS id, r.slug AS slug, r.body AS body FROM resources r WHERE r.kind = ?";

/// A [`Store`] persisting resources through a [`DatabaseAdapter`].
pub struct SqlStore {
    adapter: Arc<dyn DatabaseAdapter>,
}

impl SqlStore {
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self { adapter }
    }

    /// Apply the pending schema migrations.
    ///
    /// The adapter must already be initialized.
    pub async fn initialize(&self) -> Result<()> {
        for (version, sql) in MIGRATIONS {
            if !self.adapter.is_migration_applied(*version).await? {
                self.adapter.apply_migration(*version, sql).await?;
                info!(version, "Applied library schema migration");
            }
        }
        Ok(())
    }
}

fn row_to_document(row: &QueryRow) -> Result<Document> {
    let id = get_column!(row, "id", i64);
    let slug = get_column!(row, "slug", String);
    let body = get_column!(row, "body", String);

    let mut document = match serde_json::from_str(&body)? {
        JsonValue::Object(map) => map,
        other => {
            return Err(LibraryError::Inconsistency(format!(
                "resource {} has a non-object body: {}",
                id, other
            )))
        }
    };
    document.insert("id".to_string(), JsonValue::from(id));
    document.insert("slug".to_string(), JsonValue::String(slug));
    Ok(document)
}

/// The JSON body column: every field but the real `id` and `slug` columns.
fn body_of(document: &Document) -> Result<String> {
    let mut body = document.clone();
    body.remove("id");
    body.remove("slug");
    Ok(serde_json::to_string(&body)?)
}

fn required_slug(kind: ResourceKind, document: &Document) -> Result<String> {
    slug_of(document)
        .map(str::to_string)
        .ok_or_else(|| LibraryError::invalid_input("slug", format!("a {} needs a slug", kind)))
}

fn write_error(kind: ResourceKind, slug: &str, error: BridgeError) -> LibraryError {
    if error.is_unique_violation() {
        LibraryError::DuplicateResource {
            entity_type: kind.to_string(),
            slug: slug.to_string(),
        }
    } else {
        error.into()
    }
}

fn id_params(ids: &[i64]) -> Vec<QueryValue> {
    ids.iter().map(|id| QueryValue::Integer(*id)).collect()
}

fn clear_links(set: &LinkSet, id: i64) -> Statement {
    let (own, _) = link_columns(set.side);
    Statement::new(
        format!("DELETE FROM links WHERE link = ? AND {} = ?", own),
        vec![QueryValue::from(set.link), QueryValue::Integer(id)],
    )
}

#[async_trait]
impl Store for SqlStore {
    #[instrument(level = "debug", skip(self, kind, query), fields(kind = %kind, limit = ?query.limit))]
    async fn fetch(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Document>> {
        let mut params = vec![QueryValue::from(kind.as_str())];
        let predicate = lower_filter(&query.filter, &mut params);

        let mut sql = format!("{} AND ({})", SELECT_RESOURCES, predicate);
        if !query.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by(&query.sort));
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            params.push(QueryValue::Integer(i64::from(limit)));
        }

        let rows = self.adapter.query(&sql, &params).await?;
        rows.iter().map(row_to_document).collect()
    }

    #[instrument(level = "debug", skip(self, kind, filter), fields(kind = %kind))]
    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64> {
        let mut params = vec![QueryValue::from(kind.as_str())];
        let predicate = lower_filter(filter, &mut params);
        let sql = format!(
            "SELECT COUNT(*) AS count FROM resources r WHERE r.kind = ? AND ({})",
            predicate
        );
        let row = self.adapter.query_one(&sql, &params).await?;
        let count = get_column!(row, "count", i64);
        Ok(count.max(0) as u64)
    }

    #[instrument(level = "debug", skip(self, kind, document, links), fields(kind = %kind, links = links.len()))]
    async fn insert(
        &self,
        kind: ResourceKind,
        document: &Document,
        links: &[LinkSet],
    ) -> Result<i64> {
        let slug = required_slug(kind, document)?;
        let mut statements = vec![Statement::new(
            "INSERT INTO resources (kind, slug, body) VALUES (?, ?, ?)",
            vec![
                QueryValue::from(kind.as_str()),
                QueryValue::from(slug.as_str()),
                QueryValue::Text(body_of(document)?),
            ],
        )];
        // The new id is only known inside the batch, so links address the
        // row by its slug.
        for set in links {
            let (own, other) = link_columns(set.side);
            for target in &set.ids {
                statements.push(Statement::new(
                    format!(
                        "INSERT OR IGNORE INTO links (link, {}, {}) \
                         SELECT ?, id, ? FROM resources WHERE kind = ? AND slug = ?",
                        own, other
                    ),
                    vec![
                        QueryValue::from(set.link),
                        QueryValue::Integer(*target),
                        QueryValue::from(kind.as_str()),
                        QueryValue::from(slug.as_str()),
                    ],
                ));
            }
        }

        let outcomes = self
            .adapter
            .execute_batch(&statements)
            .await
            .map_err(|e| write_error(kind, &slug, e))?;
        let id = outcomes
            .first()
            .and_then(|outcome| outcome.last_insert_id)
            .ok_or_else(|| {
                LibraryError::Inconsistency(format!("insert of {} {} reported no id", kind, slug))
            })?;

        debug!(%kind, id, slug = %slug, "Inserted resource");
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
        if self.get(kind, id).await?.is_none() {
            return Err(LibraryError::not_found(kind.as_str(), id));
        }

        let slug = required_slug(kind, document)?;
        let mut statements = vec![Statement::new(
            "UPDATE resources SET slug = ?, body = ? WHERE kind = ? AND id = ?",
            vec![
                QueryValue::from(slug.as_str()),
                QueryValue::Text(body_of(document)?),
                QueryValue::from(kind.as_str()),
                QueryValue::Integer(id),
            ],
        )];
        for set in links {
            statements.push(clear_links(set, id));
            let (own, other) = link_columns(set.side);
            for target in &set.ids {
                statements.push(Statement::new(
                    format!(
                        "INSERT OR IGNORE INTO links (link, {}, {}) VALUES (?, ?, ?)",
                        own, other
                    ),
                    vec![
                        QueryValue::from(set.link),
                        QueryValue::Integer(id),
                        QueryValue::Integer(*target),
                    ],
                ));
            }
        }

        self.adapter
            .execute_batch(&statements)
            .await
            .map_err(|e| write_error(kind, &slug, e))?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, plan), fields(removals = plan.removals.len()))]
    async fn delete(&self, plan: &DeletePlan) -> Result<u64> {
        let mut statements = Vec::new();

        for detach in plan.detach.iter().filter(|d| !d.ids.is_empty()) {
            let mut params = vec![QueryValue::from(detach.kind.as_str())];
            params.extend(id_params(&detach.ids));
            statements.push(Statement::new(
                format!(
                    "UPDATE resources SET body = json_set(body, '$.\"{field}\"', NULL) \
                     WHERE kind = ? AND {column} IN ({ids})",
                    field = detach.field,
                    column = column("resources", detach.field),
                    ids = placeholders(detach.ids.len())
                ),
                params,
            ));
        }

        let mut removal_statements = Vec::new();
        for (kind, ids) in plan.removals.iter().filter(|(_, ids)| !ids.is_empty()) {
            let marks = placeholders(ids.len());
            let mut link_params = id_params(ids);
            link_params.extend(id_params(ids));
            statements.push(Statement::new(
                format!(
                    "DELETE FROM links WHERE first_id IN ({}) OR second_id IN ({})",
                    marks, marks
                ),
                link_params,
            ));

            let mut params = vec![QueryValue::from(kind.as_str())];
            params.extend(id_params(ids));
            removal_statements.push(statements.len());
            statements.push(Statement::new(
                format!("DELETE FROM resources WHERE kind = ? AND id IN ({})", marks),
                params,
            ));
        }

        if statements.is_empty() {
            return Ok(0);
        }
        let outcomes = self.adapter.execute_batch(&statements).await?;
        Ok(removal_statements
            .into_iter()
            .filter_map(|index| outcomes.get(index))
            .map(|outcome| outcome.rows_affected)
            .sum())
    }

    #[instrument(level = "debug", skip(self))]
    async fn linked(&self, link: &'static str, side: LinkSide, id: i64) -> Result<Vec<i64>> {
        let (own, other) = link_columns(side);
        let sql = format!(
            "SELECT {other} AS id FROM links WHERE link = ? AND {own} = ? ORDER BY {other}",
            other = other,
            own = own
        );
        let rows = self
            .adapter
            .query(&sql, &[QueryValue::from(link), QueryValue::Integer(id)])
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            ids.push(get_column!(row, "id", i64));
        }
        Ok(ids)
    }
}
