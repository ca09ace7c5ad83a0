//! Sort descriptors.
//!
//! Grammar: `default`, `random[:seed]`, or a comma-separated list of
//! `field[:asc|:desc]` keys. Keys resolve against the resource schema; a
//! listing is always ordered by the requested keys, then the type's default
//! keys, then the id, so two rows never compare equal and keyset pages
//! have deterministic boundaries.

use crate::error::{LibraryError, Result};
use crate::query::filter::Expr;
use crate::schema::Schema;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Field {
        name: &'static str,
        descending: bool,
    },
    /// Reproducible shuffle of the ids for a seed
    Random { seed: u32 },
}

impl SortKey {
    pub fn field(name: &'static str, descending: bool) -> Self {
        SortKey::Field { name, descending }
    }

    pub fn expr(&self) -> Expr {
        match self {
            SortKey::Field { name, .. } => Expr::Field(*name),
            SortKey::Random { seed } => Expr::Random(*seed),
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortKey::Field { descending: true, .. })
    }

    fn names(&self, field: &str) -> bool {
        matches!(self, SortKey::Field { name, .. } if *name == field)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Field {
                name,
                descending: false,
            } => f.write_str(name),
            SortKey::Field {
                name,
                descending: true,
            } => write!(f, "{}:desc", name),
            SortKey::Random { seed } => write!(f, "random:{}", seed),
        }
    }
}

/// A validated sort over one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    keys: Vec<SortKey>,
    defaults: Vec<SortKey>,
}

impl Sort {
    /// The type's default ordering.
    pub fn default_for(schema: &'static Schema) -> Self {
        Self {
            keys: Vec::new(),
            defaults: default_keys(schema),
        }
    }

    pub fn random(schema: &'static Schema, seed: u32) -> Self {
        Self {
            keys: vec![SortKey::Random { seed }],
            defaults: default_keys(schema),
        }
    }

    /// Parse a sort descriptor. A missing random seed is drawn here so that
    /// the returned value (and its `Display`) pins the order.
    pub fn parse(schema: &'static Schema, descriptor: &str) -> Result<Self> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() || descriptor.eq_ignore_ascii_case("default") {
            return Ok(Self::default_for(schema));
        }

        let mut keys = Vec::new();
        for part in descriptor.split(',') {
            let part = part.trim();
            let (key, order) = match part.split_once(':') {
                Some((key, order)) => (key.trim(), Some(order.trim())),
                None => (part, None),
            };

            if key.eq_ignore_ascii_case("random") {
                let seed = match order {
                    Some(seed) => seed.parse::<u32>().map_err(|_| {
                        LibraryError::invalid_sort(part, "the random seed must be a positive integer")
                    })?,
                    None => rand::random::<u32>(),
                };
                keys.push(SortKey::Random { seed });
                continue;
            }

            let field = schema.field(key).ok_or_else(|| {
                LibraryError::invalid_sort(key, format!("no sortable field on {}", schema.kind))
            })?;
            if !field.sortable {
                return Err(LibraryError::invalid_sort(
                    key,
                    "this field can't be used to sort",
                ));
            }
            let descending = match order.map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(LibraryError::invalid_sort(
                        key,
                        format!("the sort order, if set, should be asc or desc, not {}", other),
                    ))
                }
            };
            keys.push(SortKey::field(field.name, descending));
        }

        Ok(Self {
            keys,
            defaults: default_keys(schema),
        })
    }

    /// Keys as requested, empty for the default ordering.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_default(&self) -> bool {
        self.keys.is_empty()
    }

    /// Full ordering sent to the store: requested keys, then the default
    /// keys not already named, then the id.
    pub fn resolved(&self) -> Vec<SortKey> {
        let mut resolved = self.keys.clone();
        for key in &self.defaults {
            if let SortKey::Field { name, .. } = key {
                if !resolved.iter().any(|k| k.names(name)) {
                    resolved.push(*key);
                }
            }
        }
        if !resolved.iter().any(|k| k.names("id")) {
            resolved.push(SortKey::field("id", false));
        }
        resolved
    }
}

fn default_keys(schema: &'static Schema) -> Vec<SortKey> {
    schema
        .default_sort
        .iter()
        .map(|(name, descending)| SortKey::field(*name, *descending))
        .collect()
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            return f.write_str("default");
        }
        let parts: Vec<String> = self.keys.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

/// Parse `descriptor` against `schema`; see [`Sort::parse`].
pub fn parse_sort(schema: &'static Schema, descriptor: &str) -> Result<Sort> {
    Sort::parse(schema, descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceKind;

    fn show() -> &'static Schema {
        ResourceKind::Show.schema()
    }

    #[test]
    fn test_default_sort() {
        let sort = parse_sort(show(), "").unwrap();
        assert!(sort.is_default());
        assert_eq!(
            sort.resolved(),
            vec![SortKey::field("title", false), SortKey::field("id", false)]
        );
        assert_eq!(parse_sort(show(), "Default").unwrap(), sort);
        assert_eq!(sort.to_string(), "default");
    }

    #[test]
    fn test_conglomerate_sort() {
        let sort = parse_sort(show(), "startAir:desc, slug").unwrap();
        assert_eq!(
            sort.resolved(),
            vec![
                SortKey::field("start_air", true),
                SortKey::field("slug", false),
                SortKey::field("title", false),
                SortKey::field("id", false),
            ]
        );
        assert_eq!(sort.to_string(), "start_air:desc,slug");
    }

    #[test]
    fn test_explicit_id_is_not_repeated() {
        let sort = parse_sort(show(), "id:desc").unwrap();
        assert_eq!(
            sort.resolved(),
            vec![SortKey::field("id", true), SortKey::field("title", false)]
        );
    }

    #[test]
    fn test_random_sort() {
        let sort = parse_sort(show(), "random:42").unwrap();
        assert_eq!(sort.keys(), &[SortKey::Random { seed: 42 }]);
        assert_eq!(sort.to_string(), "random:42");

        let drawn = parse_sort(show(), "random").unwrap();
        let reparsed = parse_sort(show(), &drawn.to_string()).unwrap();
        assert_eq!(drawn, reparsed);
    }

    #[test]
    fn test_invalid_sorts() {
        for descriptor in ["nope", "status", "title:up", "random:abc", "aliases"] {
            let err = parse_sort(show(), descriptor).unwrap_err();
            assert!(
                matches!(err, LibraryError::InvalidSort { .. }),
                "{} gave {:?}",
                descriptor,
                err
            );
        }
    }

    #[test]
    fn test_episode_default_sort() {
        let sort = Sort::default_for(ResourceKind::Episode.schema());
        assert_eq!(
            sort.resolved(),
            vec![
                SortKey::field("season_number", false),
                SortKey::field("episode_number", false),
                SortKey::field("absolute_number", false),
                SortKey::field("id", false),
            ]
        );
    }
}
