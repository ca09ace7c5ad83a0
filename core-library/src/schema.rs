//! # Resource Schemas
//!
//! Static descriptions of every resource type: its tag, its filterable and
//! sortable fields, and its relations. Filters, sorts, cursors, the merger
//! and the relation loader all resolve names against these tables instead
//! of inspecting types at runtime.
//!
//! Field lookup is case-insensitive and ignores `_`, so `startAir`,
//! `StartAir` and `start_air` name the same field.

use crate::models::{collection, episode, genre, library, people, provider, season, show, studio};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Library,
    Collection,
    Show,
    Season,
    Episode,
    People,
    Studio,
    Genre,
    Provider,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 9] = [
        ResourceKind::Library,
        ResourceKind::Collection,
        ResourceKind::Show,
        ResourceKind::Season,
        ResourceKind::Episode,
        ResourceKind::People,
        ResourceKind::Studio,
        ResourceKind::Genre,
        ResourceKind::Provider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Library => "library",
            ResourceKind::Collection => "collection",
            ResourceKind::Show => "show",
            ResourceKind::Season => "season",
            ResourceKind::Episode => "episode",
            ResourceKind::People => "people",
            ResourceKind::Studio => "studio",
            ResourceKind::Genre => "genre",
            ResourceKind::Provider => "provider",
        }
    }

    pub fn schema(&self) -> &'static Schema {
        match self {
            ResourceKind::Library => &library::SCHEMA,
            ResourceKind::Collection => &collection::SCHEMA,
            ResourceKind::Show => &show::SCHEMA,
            ResourceKind::Season => &season::SCHEMA,
            ResourceKind::Episode => &episode::SCHEMA,
            ResourceKind::People => &people::SCHEMA,
            ResourceKind::Studio => &studio::SCHEMA,
            ResourceKind::Genre => &genre::SCHEMA,
            ResourceKind::Provider => &provider::SCHEMA,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a field, driving literal coercion and operator checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Text,
    Bool,
    /// ISO-8601 calendar date, stored as `YYYY-MM-DD` text
    Date,
    /// Closed set of lowercase variant names
    Enum(&'static [&'static str]),
    TextList,
    EnumList(&'static [&'static str]),
    /// String-keyed dictionary; never filterable or sortable
    Map,
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::TextList | FieldKind::EnumList(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub sortable: bool,
}

impl FieldDef {
    /// Scalar fields sort by default. Enum ordinals are ambiguous and
    /// collections have no natural order, so those start unsortable.
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        let sortable = matches!(
            kind,
            FieldKind::Int | FieldKind::Float | FieldKind::Text | FieldKind::Bool | FieldKind::Date
        );
        Self {
            name,
            kind,
            sortable,
        }
    }

    /// Opt an enum field into sorting by its stored name.
    pub const fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// Which column of a link row holds the declaring resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkSide {
    First,
    Second,
}

impl LinkSide {
    pub fn other(&self) -> LinkSide {
        match self {
            LinkSide::First => LinkSide::Second,
            LinkSide::Second => LinkSide::First,
        }
    }
}

/// How a relation is materialized in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationVia {
    /// The declaring resource holds the target id in this field (to-one).
    ForeignKey(&'static str),
    /// Targets hold the declaring resource id in this field (to-many).
    Reverse(&'static str),
    /// Rows of a named link table join both sides (many-to-many).
    Link {
        link: &'static str,
        side: LinkSide,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDef {
    pub name: &'static str,
    pub target: ResourceKind,
    pub via: RelationVia,
    /// Targets are deleted with the declaring resource.
    pub owned: bool,
    /// Nested objects supplied on create/edit are written through.
    pub editable: bool,
}

impl RelationDef {
    pub const fn new(name: &'static str, target: ResourceKind, via: RelationVia) -> Self {
        Self {
            name,
            target,
            via,
            owned: false,
            editable: false,
        }
    }

    pub const fn owned(mut self) -> Self {
        self.owned = true;
        self
    }

    pub const fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn is_to_many(&self) -> bool {
        !matches!(self.via, RelationVia::ForeignKey(_))
    }
}

/// Static description of a resource type.
#[derive(Debug)]
pub struct Schema {
    pub kind: ResourceKind,
    /// Every scalar field, `id` and `slug` included
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
    /// Sort used when a request names none: `(field, descending)`
    pub default_sort: &'static [(&'static str, bool)],
    /// Text fields matched by search
    pub search_fields: &'static [&'static str],
}

/// Fields every resource carries.
pub const ID_FIELD: FieldDef = FieldDef::new("id", FieldKind::Int);
pub const SLUG_FIELD: FieldDef = FieldDef::new("slug", FieldKind::Text);

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        let wanted = normalize(name);
        self.fields.iter().find(|f| normalize(f.name) == wanted)
    }

    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        let wanted = normalize(name);
        self.relations.iter().find(|r| normalize(r.name) == wanted)
    }

    /// Names of document keys that hold relation payloads rather than
    /// stored fields.
    pub fn relation_names(&self) -> impl Iterator<Item = &'static str> {
        self.relations.iter().map(|r| r.name)
    }

    /// Link tables the declaring resource participates in, with its side.
    pub fn links(&self) -> impl Iterator<Item = (&'static str, LinkSide)> {
        self.relations.iter().filter_map(|r| match r.via {
            RelationVia::Link { link, side } => Some((link, side)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup_is_case_and_separator_insensitive() {
        let schema = ResourceKind::Show.schema();
        assert_eq!(schema.field("startAir").map(|f| f.name), Some("start_air"));
        assert_eq!(schema.field("START_AIR").map(|f| f.name), Some("start_air"));
        assert_eq!(schema.field("Title").map(|f| f.name), Some("title"));
        assert!(schema.field("nope").is_none());
    }

    #[test]
    fn test_every_schema_declares_identity_and_default_sort() {
        for kind in ResourceKind::ALL {
            let schema = kind.schema();
            assert_eq!(schema.kind, kind);
            assert_eq!(schema.field("id"), Some(&ID_FIELD));
            assert_eq!(schema.field("slug"), Some(&SLUG_FIELD));
            assert!(!schema.default_sort.is_empty(), "{} has no default sort", kind);
            for (name, _) in schema.default_sort {
                assert!(schema.field(name).map(|f| f.sortable).unwrap_or(false));
            }
            for name in schema.search_fields {
                assert_eq!(schema.field(name).map(|f| f.kind), Some(FieldKind::Text));
            }
        }
    }

    #[test]
    fn test_links_are_declared_from_both_ends() {
        for kind in ResourceKind::ALL {
            for relation in kind.schema().relations {
                if let RelationVia::Link { link, side } = relation.via {
                    let inverse = relation.target.schema().links().find(|(l, _)| *l == link);
                    assert_eq!(inverse, Some((link, side.other())), "{}.{}", kind, relation.name);
                }
            }
        }
    }

    #[test]
    fn test_enum_fields_are_not_sortable_by_default() {
        let status = ResourceKind::Show.schema().field("status").unwrap();
        assert!(!status.sortable);
        assert!(FieldDef::new("status", FieldKind::Enum(&["a"])).sortable().sortable);
    }
}
