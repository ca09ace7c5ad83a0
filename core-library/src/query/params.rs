//! Listing requests as they arrive from the API layer.
//!
//! A query string mixes reserved keys (`sortBy`, `afterID`, `limit`,
//! `fields`) with filter entries; every other key is handed to the filter
//! parser. Reserved keys match case-insensitively.

use crate::error::{LibraryError, Result};
use crate::query::filter::{parse_filter, Filter};
use crate::query::sort::Sort;
use crate::repositories::pagination::{Pagination, AFTER_ID};
use crate::schema::Schema;

const SORT_BY: &str = "sortBy";
const LIMIT: &str = "limit";
const FIELDS: &str = "fields";

/// A parsed listing request.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub filter: Filter,
    pub sort: Sort,
    pub pagination: Pagination,
    /// Relations to load on every returned item
    pub fields: Vec<&'static str>,
    query: Vec<(String, String)>,
}

impl ListRequest {
    pub fn parse<I, K, V>(schema: &'static Schema, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut sort = None;
        let mut pagination = Pagination::default();
        let mut fields = Vec::new();
        let mut filters = Vec::new();
        let mut query = Vec::new();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            query.push((key.to_string(), value.to_string()));

            if key.eq_ignore_ascii_case(SORT_BY) {
                sort = Some(Sort::parse(schema, value)?);
            } else if key.eq_ignore_ascii_case(AFTER_ID) {
                let id = value.trim().parse::<i64>().map_err(|_| {
                    LibraryError::invalid_input(AFTER_ID, format!("{} is not a resource id", value))
                })?;
                pagination.after_id = Some(id);
            } else if key.eq_ignore_ascii_case(LIMIT) {
                let limit = value.trim().parse::<u32>().map_err(|_| {
                    LibraryError::invalid_input(LIMIT, format!("{} is not a page size", value))
                })?;
                pagination.limit = Some(limit);
            } else if key.eq_ignore_ascii_case(FIELDS) {
                for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    let relation = schema.relation(name).ok_or_else(|| {
                        LibraryError::UnknownRelation {
                            entity_type: schema.kind.to_string(),
                            relation: name.to_string(),
                        }
                    })?;
                    if !fields.contains(&relation.name) {
                        fields.push(relation.name);
                    }
                }
            } else {
                filters.push((key.to_string(), value.to_string()));
            }
        }

        let sort = sort.unwrap_or_else(|| Sort::default_for(schema));
        // Echo the resolved sort so a drawn random seed survives into the
        // page links.
        for (key, value) in query.iter_mut() {
            if key.eq_ignore_ascii_case(SORT_BY) {
                *value = sort.to_string();
            }
        }

        Ok(Self {
            filter: parse_filter(schema, filters, None)?,
            sort,
            pagination,
            fields,
            query,
        })
    }

    /// The request's query pairs, suitable for building page links.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::sort::SortKey;
    use crate::schema::ResourceKind;

    fn parse(pairs: &[(&str, &str)]) -> Result<ListRequest> {
        ListRequest::parse(ResourceKind::Show.schema(), pairs.iter().copied())
    }

    #[test]
    fn test_reserved_keys_are_split_from_filters() {
        let request = parse(&[
            ("title", "ctn:Ano"),
            ("SortBy", "startAir:desc"),
            ("afterid", "12"),
            ("limit", "5"),
            ("fields", "genres, studio"),
        ])
        .unwrap();

        assert_eq!(request.sort.keys(), &[SortKey::field("start_air", true)]);
        assert_eq!(request.pagination, Pagination::new(5).after(12));
        assert_eq!(request.fields, vec!["genres", "studio"]);
        assert!(matches!(request.filter, Filter::Contains { field: "title", .. }));
    }

    #[test]
    fn test_drawn_random_seed_is_echoed() {
        let request = parse(&[("sortBy", "random")]).unwrap();
        let echoed = &request.query()[0].1;
        assert!(echoed.starts_with("random:"));
        assert_eq!(
            Sort::parse(ResourceKind::Show.schema(), echoed).unwrap(),
            request.sort
        );
    }

    #[test]
    fn test_defaults() {
        let request = parse(&[]).unwrap();
        assert!(request.sort.is_default());
        assert_eq!(request.pagination, Pagination::default());
        assert_eq!(request.filter, Filter::True);
        assert!(request.fields.is_empty());
    }

    #[test]
    fn test_invalid_reserved_values() {
        assert!(matches!(
            parse(&[("afterID", "anohana")]),
            Err(LibraryError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse(&[("limit", "-1")]),
            Err(LibraryError::InvalidInput { .. })
        ));
        assert!(matches!(
            parse(&[("fields", "cast")]),
            Err(LibraryError::UnknownRelation { .. })
        ));
        assert!(matches!(
            parse(&[("sortBy", "status")]),
            Err(LibraryError::InvalidSort { .. })
        ));
    }
}
