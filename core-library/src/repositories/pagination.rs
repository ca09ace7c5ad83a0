//! Cursor pagination types for repository queries

use crate::models::Resource;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

/// Name of the cursor query parameter.
pub const AFTER_ID: &str = "afterID";

/// Pagination request parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of items to return; `None` or `0` uses the configured default
    pub limit: Option<u32>,
    /// Return the items ordered strictly after this resource
    pub after_id: Option<i64>,
}

impl Pagination {
    /// Create a new pagination request
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::repositories::Pagination;
    ///
    /// let request = Pagination::new(20).after(7);
    /// assert_eq!(request.limit, Some(20));
    /// assert_eq!(request.after_id, Some(7));
    /// ```
    pub fn new(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            after_id: None,
        }
    }

    pub fn after(mut self, id: i64) -> Self {
        self.after_id = Some(id);
        self
    }
}

/// One page of a listing and the links to move around it.
///
/// Totals are never computed: `next` is present whenever the page is full,
/// which may yield one final empty page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The request that produced this page
    #[serde(rename = "this")]
    pub this: String,
    /// The same request without a cursor
    pub first: String,
    /// The request for the following page
    pub next: Option<String>,
    pub items: Vec<T>,
}

impl<T: Resource> Page<T> {
    /// Build a page for `items` returned by the request `path?query`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::models::Genre;
    /// use core_library::repositories::Page;
    ///
    /// let items = vec![Genre { id: 4, ..Default::default() }];
    /// let query = vec![("sortBy".to_string(), "name".to_string())];
    /// let page = Page::new(items, "/genres", &query, 1);
    ///
    /// assert_eq!(page.this, "/genres?sortBy=name");
    /// assert_eq!(page.next.as_deref(), Some("/genres?sortBy=name&afterID=4"));
    /// ```
    pub fn new(items: Vec<T>, path: &str, query: &[(String, String)], limit: u32) -> Self {
        let this = link(path, query.iter());

        let without_cursor: Vec<&(String, String)> = query
            .iter()
            .filter(|(key, _)| !key.eq_ignore_ascii_case(AFTER_ID))
            .collect();
        let first = link(path, without_cursor.iter().copied());

        let next = match items.last() {
            Some(last) if limit > 0 && items.len() == limit as usize => {
                let cursor = (AFTER_ID.to_string(), last.id().to_string());
                Some(link(
                    path,
                    without_cursor.iter().copied().chain(std::iter::once(&cursor)),
                ))
            }
            _ => None,
        };

        Self {
            this,
            first,
            next,
            items,
        }
    }
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Map the items to a different type
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            this: self.this,
            first: self.first,
            next: self.next,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

fn link<'a>(path: &str, query: impl Iterator<Item = &'a (String, String)>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut empty = true;
    for (key, value) in query {
        serializer.append_pair(key, value);
        empty = false;
    }
    if empty {
        path.to_string()
    } else {
        format!("{}?{}", path, serializer.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Show;

    fn show(id: i64) -> Show {
        Show {
            id,
            slug: format!("show-{}", id),
            ..Default::default()
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pagination_default() {
        let request = Pagination::default();
        assert_eq!(request.limit, None);
        assert_eq!(request.after_id, None);
    }

    #[test]
    fn test_full_page_has_next() {
        let query = params(&[("title", "ctn:Ano"), ("afterID", "3"), ("limit", "2")]);
        let page = Page::new(vec![show(4), show(9)], "/shows", &query, 2);

        assert_eq!(page.this, "/shows?title=ctn%3AAno&afterID=3&limit=2");
        assert_eq!(page.first, "/shows?title=ctn%3AAno&limit=2");
        assert_eq!(
            page.next.as_deref(),
            Some("/shows?title=ctn%3AAno&limit=2&afterID=9")
        );
    }

    #[test]
    fn test_short_page_has_no_next() {
        let page = Page::new(vec![show(4)], "/shows", &[], 2);
        assert_eq!(page.this, "/shows");
        assert_eq!(page.first, "/shows");
        assert!(page.next.is_none());

        let empty: Page<Show> = Page::new(Vec::new(), "/shows", &[], 0);
        assert!(empty.next.is_none());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_cursor_key_is_matched_case_insensitively() {
        let query = params(&[("afterid", "3")]);
        let page = Page::new(vec![show(5)], "/shows", &query, 1);
        assert_eq!(page.first, "/shows");
        assert_eq!(page.next.as_deref(), Some("/shows?afterID=5"));
    }

    #[test]
    fn test_page_map() {
        let page = Page::new(vec![show(1), show(2)], "/shows", &[], 2);
        let mapped = page.map(|s| s.id * 2);
        assert_eq!(mapped.items, vec![2, 4]);
        assert!(mapped.next.is_some());
    }
}
