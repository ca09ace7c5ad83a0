//! Resource identifiers: the immutable numeric id or the mutable slug.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Addresses a single resource either by id or by slug.
///
/// Parsing treats anything that reads as an integer as an id. Slugs made only
/// of digits are suffixed with `!` on write, so the two never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Id(i64),
    Slug(String),
}

impl Identifier {
    pub fn parse(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(id) => Identifier::Id(id),
            Err(_) => Identifier::Slug(value.to_string()),
        }
    }

    /// Whether a resource with this id and slug is the one addressed.
    pub fn matches(&self, id: i64, slug: &str) -> bool {
        match self {
            Identifier::Id(expected) => *expected == id,
            Identifier::Slug(expected) => expected == slug,
        }
    }
}

impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Identifier::parse(s))
    }
}

impl From<i64> for Identifier {
    fn from(id: i64) -> Self {
        Identifier::Id(id)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Identifier::parse(value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Id(id) => write!(f, "{}", id),
            Identifier::Slug(slug) => f.write_str(slug),
        }
    }
}
