//! Filter AST and the `[operator:]value` parser.
//!
//! A filter request is a map of field names to expressions:
//!
//! ```text
//! title=ctn:Ano        substring match on a text field
//! status=airing        equality (the default operator)
//! startAir=gte:2011-01-01
//! genres=ctn:action,comedy   every listed genre must be linked
//! studio=not:a-1-pictures    to-one relation, by slug or numeric id
//! ```
//!
//! Every entry compiles to a [`Filter`] node and the entries are ANDed
//! together after the caller's base predicate. The tree is interpreted by
//! [`crate::query::eval`] for the in-memory store and lowered to SQL by
//! [`crate::query::sql`].

use crate::error::{LibraryError, Result};
use crate::identifier::Identifier;
use crate::schema::{FieldDef, FieldKind, RelationDef, RelationVia, Schema};
use crate::value::Value;
use chrono::NaiveDate;

/// Comparison operator of a [`Filter::Compare`] node.
///
/// `Eq` and `Ne` are null-safe (`IS` / `IS NOT`); the ordering operators
/// never match a null on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Left-hand side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expr {
    /// A stored field of the resource
    Field(&'static str),
    /// The seeded random key of the resource id
    Random(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    False,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        expr: Expr,
        op: CompareOp,
        value: Value,
    },
    In {
        expr: Expr,
        values: Vec<Value>,
    },
    /// Substring match on a text field
    Contains {
        field: &'static str,
        needle: String,
        ignore_case: bool,
    },
    /// Membership in a list field
    Has { field: &'static str, value: Value },
    /// At least one resource reached through the relation is the target
    Related {
        relation: &'static RelationDef,
        target: Identifier,
    },
}

impl Filter {
    pub fn compare(field: &'static str, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            expr: Expr::Field(field),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &'static str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Conjunction, flattening nested `And`s and dropping `True`.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut terms = Vec::new();
        for filter in filters {
            match filter {
                Filter::True => {}
                Filter::False => return Filter::False,
                Filter::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Filter::True,
            1 => terms.pop().unwrap_or(Filter::True),
            _ => Filter::And(terms),
        }
    }

    /// Disjunction, dropping `False`.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut terms = Vec::new();
        for filter in filters {
            match filter {
                Filter::False => {}
                Filter::True => return Filter::True,
                Filter::Or(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Filter::False,
            1 => terms.pop().unwrap_or(Filter::False),
            _ => Filter::Or(terms),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Filter::True => Filter::False,
            Filter::False => Filter::True,
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    pub fn ids(values: impl IntoIterator<Item = i64>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Value::Int).collect();
        if values.is_empty() {
            Filter::False
        } else {
            Filter::In {
                expr: Expr::Field("id"),
                values,
            }
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Not,
    Lt,
    Lte,
    Gt,
    Gte,
    Ctn,
}

impl Operator {
    fn parse(field: &str, raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "not" => Ok(Operator::Not),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "ctn" => Ok(Operator::Ctn),
            _ => Err(LibraryError::invalid_filter(
                field,
                format!("invalid operator: {}", raw),
            )),
        }
    }

    fn ordering(self) -> Option<CompareOp> {
        match self {
            Operator::Lt => Some(CompareOp::Lt),
            Operator::Lte => Some(CompareOp::Lte),
            Operator::Gt => Some(CompareOp::Gt),
            Operator::Gte => Some(CompareOp::Gte),
            _ => None,
        }
    }
}

/// Compile a field→expression map into a predicate over `schema`.
///
/// `base` is ANDed in front of the parsed terms. Unknown fields, unknown
/// operators, operators that make no sense for the field, and literals that
/// don't coerce to the field's type are all rejected with
/// [`LibraryError::InvalidFilter`] naming the field.
pub fn parse_filter<I, K, V>(schema: &Schema, params: I, base: Option<Filter>) -> Result<Filter>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut terms = vec![base.unwrap_or(Filter::True)];
    for (key, expression) in params {
        terms.push(parse_term(schema, key.as_ref(), expression.as_ref())?);
    }
    Ok(Filter::and(terms))
}

fn parse_term(schema: &Schema, key: &str, expression: &str) -> Result<Filter> {
    let (operator, value) = match expression.split_once(':') {
        Some((operator, value)) => (Operator::parse(key, operator)?, value),
        None => (Operator::Eq, expression),
    };

    if let Some(field) = schema.field(key) {
        return parse_field(field, operator, value);
    }
    if let Some(relation) = schema.relation(key) {
        return parse_relation(relation, operator, value);
    }
    Err(LibraryError::invalid_filter(
        key,
        format!("no filterable field with this name on {}", schema.kind),
    ))
}

fn is_null_literal(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("null")
}

fn parse_field(field: &'static FieldDef, operator: Operator, value: &str) -> Result<Filter> {
    if field.kind.is_list() {
        let values = value
            .split(',')
            .map(|item| coerce(field, item))
            .collect::<Result<Vec<_>>>()?;
        let has = |value: Value| Filter::Has {
            field: field.name,
            value,
        };
        return match operator {
            Operator::Eq | Operator::Ctn => Ok(Filter::and(values.into_iter().map(has))),
            Operator::Not => Ok(Filter::and(values.into_iter().map(|v| has(v).negate()))),
            _ => Err(LibraryError::invalid_filter(
                field.name,
                "lists only support eq, not and ctn",
            )),
        };
    }

    match operator {
        Operator::Ctn => match field.kind {
            FieldKind::Text => Ok(Filter::Contains {
                field: field.name,
                needle: value.to_string(),
                ignore_case: false,
            }),
            _ => Err(LibraryError::invalid_filter(
                field.name,
                "ctn is only supported on text and list fields",
            )),
        },
        Operator::Eq => Ok(Filter::compare(field.name, CompareOp::Eq, literal(field, value)?)),
        Operator::Not => Ok(Filter::compare(field.name, CompareOp::Ne, literal(field, value)?)),
        ordering => {
            let op = ordering.ordering().ok_or_else(|| {
                LibraryError::invalid_filter(field.name, "unsupported operator")
            })?;
            match field.kind {
                FieldKind::Int | FieldKind::Float | FieldKind::Text | FieldKind::Date => {
                    Ok(Filter::compare(field.name, op, literal(field, value)?))
                }
                _ => Err(LibraryError::invalid_filter(
                    field.name,
                    "this field can't be compared with lt, lte, gt or gte",
                )),
            }
        }
    }
}

/// A scalar literal, `null` and the empty string included.
fn literal(field: &FieldDef, value: &str) -> Result<Value> {
    if is_null_literal(value) {
        return Ok(Value::Null);
    }
    coerce(field, value)
}

fn coerce(field: &FieldDef, value: &str) -> Result<Value> {
    let mismatch = |expected: &str| {
        LibraryError::invalid_filter(
            field.name,
            format!("expected {} but got \"{}\"", expected, value),
        )
    };
    match field.kind {
        FieldKind::Int => value
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| mismatch("an integer")),
        FieldKind::Float => value
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| mismatch("a number")),
        FieldKind::Bool => match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch("true or false")),
        },
        FieldKind::Date => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(|date| Value::Text(date.format("%Y-%m-%d").to_string()))
            .map_err(|_| mismatch("a date (YYYY-MM-DD)")),
        FieldKind::Text | FieldKind::TextList => Ok(Value::Text(value.to_string())),
        FieldKind::Enum(variants) | FieldKind::EnumList(variants) => {
            enum_variant(variants, value.trim())
                .map(|v| Value::Text(v.to_string()))
                .ok_or_else(|| mismatch(&format!("one of {}", variants.join(", "))))
        }
        FieldKind::Map => Err(LibraryError::invalid_filter(
            field.name,
            "dictionaries can't be filtered",
        )),
    }
}

/// Enum literals are matched by name ignoring case, or by ordinal.
fn enum_variant(variants: &'static [&'static str], value: &str) -> Option<&'static str> {
    if let Some(found) = variants.iter().find(|v| v.eq_ignore_ascii_case(value)) {
        return Some(found);
    }
    value
        .parse::<usize>()
        .ok()
        .and_then(|ordinal| variants.get(ordinal).copied())
}

fn parse_relation(relation: &'static RelationDef, operator: Operator, value: &str) -> Result<Filter> {
    let related = |item: &str| Filter::Related {
        relation,
        target: Identifier::parse(item.trim()),
    };

    if let RelationVia::ForeignKey(fk) = relation.via {
        if is_null_literal(value) {
            return match operator {
                Operator::Eq => Ok(Filter::compare(fk, CompareOp::Eq, Value::Null)),
                Operator::Not => Ok(Filter::compare(fk, CompareOp::Ne, Value::Null)),
                _ => Err(LibraryError::invalid_filter(
                    relation.name,
                    "null only supports eq and not",
                )),
            };
        }
        return match operator {
            Operator::Eq => Ok(related(value)),
            Operator::Not => Ok(related(value).negate()),
            _ => Err(LibraryError::invalid_filter(
                relation.name,
                "a single resource only supports eq and not",
            )),
        };
    }

    if is_null_literal(value) {
        return Err(LibraryError::invalid_filter(
            relation.name,
            "expected an id or a slug",
        ));
    }
    match operator {
        Operator::Eq | Operator::Ctn => Ok(Filter::and(value.split(',').map(related))),
        Operator::Not => Ok(Filter::and(value.split(',').map(|v| related(v).negate()))),
        _ => Err(LibraryError::invalid_filter(
            relation.name,
            "a resource list only supports eq, not and ctn",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceKind;

    fn show_filter(params: &[(&str, &str)]) -> Result<Filter> {
        parse_filter(ResourceKind::Show.schema(), params.iter().copied(), None)
    }

    #[test]
    fn test_default_operator_is_eq() {
        assert_eq!(
            show_filter(&[("title", "Anohana")]).unwrap(),
            Filter::eq("title", "Anohana")
        );
    }

    #[test]
    fn test_field_names_are_case_insensitive() {
        let filter = show_filter(&[("StartAir", "gte:2011-04-14")]).unwrap();
        assert_eq!(
            filter,
            Filter::compare("start_air", CompareOp::Gte, "2011-04-14")
        );
    }

    #[test]
    fn test_null_literals() {
        assert_eq!(
            show_filter(&[("overview", "null")]).unwrap(),
            Filter::compare("overview", CompareOp::Eq, Value::Null)
        );
        assert_eq!(
            show_filter(&[("end_air", "not:")]).unwrap(),
            Filter::compare("end_air", CompareOp::Ne, Value::Null)
        );
        assert_eq!(
            show_filter(&[("studio", "null")]).unwrap(),
            Filter::compare("studio_id", CompareOp::Eq, Value::Null)
        );
    }

    #[test]
    fn test_text_ctn_is_a_substring_match() {
        assert_eq!(
            show_filter(&[("title", "ctn:Ano")]).unwrap(),
            Filter::Contains {
                field: "title",
                needle: "Ano".to_string(),
                ignore_case: false,
            }
        );
    }

    #[test]
    fn test_list_ctn_is_conjunctive() {
        let filter = show_filter(&[("aliases", "ctn:a,b")]).unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::Has {
                    field: "aliases",
                    value: Value::from("a"),
                },
                Filter::Has {
                    field: "aliases",
                    value: Value::from("b"),
                },
            ])
        );
    }

    #[test]
    fn test_relation_targets_parse_ids_and_slugs() {
        let filter = show_filter(&[("genres", "ctn:action,7")]).unwrap();
        match filter {
            Filter::And(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(
                    &terms[0],
                    Filter::Related { relation, target: Identifier::Slug(s) }
                        if relation.name == "genres" && s == "action"
                ));
                assert!(matches!(
                    &terms[1],
                    Filter::Related { target: Identifier::Id(7), .. }
                ));
            }
            other => panic!("unexpected filter {:?}", other),
        }

        let filter = show_filter(&[("studio", "not:2")]).unwrap();
        assert!(matches!(filter, Filter::Not(inner) if matches!(*inner, Filter::Related { .. })));
    }

    #[test]
    fn test_enum_literals() {
        assert_eq!(
            show_filter(&[("status", "Airing")]).unwrap(),
            Filter::eq("status", "airing")
        );
        assert_eq!(
            show_filter(&[("status", "1")]).unwrap(),
            Filter::eq("status", "finished")
        );
        assert!(show_filter(&[("status", "lt:airing")]).is_err());
        assert!(show_filter(&[("status", "cancelled")]).is_err());
    }

    #[test]
    fn test_base_predicate_comes_first() {
        let base = Filter::eq("is_movie", true);
        let filter = parse_filter(
            ResourceKind::Show.schema(),
            [("title", "gt:M")],
            Some(base.clone()),
        )
        .unwrap();
        assert_eq!(
            filter,
            Filter::And(vec![base, Filter::compare("title", CompareOp::Gt, "M")])
        );
    }

    #[test]
    fn test_rejections_name_the_field() {
        let cases: &[(&str, &str)] = &[
            ("nope", "1"),
            ("title", "like:x"),
            ("season_number", "abc"),
            ("images", "x"),
            ("is_movie", "gt:true"),
            ("start_air", "14/04/2011"),
            ("genres", "gt:action"),
        ];
        for (key, value) in cases {
            let err = parse_filter(ResourceKind::Show.schema(), [(*key, *value)], None)
                .expect_err("filter should be rejected");
            match err {
                LibraryError::InvalidFilter { field, .. } => {
                    assert!(field.eq_ignore_ascii_case(key), "{} != {}", field, key)
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_and_simplifies() {
        assert_eq!(Filter::and(vec![]), Filter::True);
        assert_eq!(Filter::and(vec![Filter::True, Filter::False]), Filter::False);
        assert_eq!(Filter::any(vec![]), Filter::False);
        assert_eq!(Filter::ids(Vec::new()), Filter::False);
        assert_eq!(Filter::True.negate(), Filter::False);
    }
}
