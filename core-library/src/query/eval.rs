//! In-memory interpretation of the filter AST.
//!
//! Semantics mirror the SQL lowering in [`crate::query::sql`] so that both
//! stores agree on every query: comparisons against `NULL` never match,
//! `Eq`/`Ne` are null-safe, case-insensitive matching folds ASCII only.

use crate::query::filter::{CompareOp, Expr, Filter};
use crate::query::sort::SortKey;
use crate::schema::RelationDef;
use crate::store::Document;
use crate::value::{random_key, Value};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Access to the records around the one being evaluated.
pub trait RecordSource {
    /// `(id, slug)` of every resource reached from `record` through
    /// `relation`.
    fn related(&self, record: &Document, relation: &RelationDef) -> Vec<(i64, String)>;
}

/// Value of a field in a stored document, `Null` when absent.
pub fn field_value(document: &Document, field: &str) -> Value {
    document
        .get(field)
        .map(Value::from_json)
        .unwrap_or(Value::Null)
}

pub fn document_id(document: &Document) -> i64 {
    document.get("id").and_then(JsonValue::as_i64).unwrap_or_default()
}

pub fn expr_value(document: &Document, expr: &Expr) -> Value {
    match expr {
        Expr::Field(field) => field_value(document, field),
        Expr::Random(seed) => Value::Int(random_key(document_id(document), *seed)),
    }
}

/// Whether `document` satisfies `filter`.
pub fn evaluate(filter: &Filter, document: &Document, source: &dyn RecordSource) -> bool {
    match filter {
        Filter::True => true,
        Filter::False => false,
        Filter::And(terms) => terms.iter().all(|t| evaluate(t, document, source)),
        Filter::Or(terms) => terms.iter().any(|t| evaluate(t, document, source)),
        Filter::Not(inner) => !evaluate(inner, document, source),
        Filter::Compare { expr, op, value } => {
            let actual = expr_value(document, expr);
            match op {
                CompareOp::Eq => actual.same_as(value),
                CompareOp::Ne => !actual.same_as(value),
                CompareOp::Lt => actual.compare(value) == Some(Ordering::Less),
                CompareOp::Lte => matches!(
                    actual.compare(value),
                    Some(Ordering::Less | Ordering::Equal)
                ),
                CompareOp::Gt => actual.compare(value) == Some(Ordering::Greater),
                CompareOp::Gte => matches!(
                    actual.compare(value),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
            }
        }
        Filter::In { expr, values } => {
            let actual = expr_value(document, expr);
            !actual.is_null() && values.iter().any(|v| actual.same_as(v))
        }
        Filter::Contains {
            field,
            needle,
            ignore_case,
        } => match field_value(document, field) {
            Value::Text(text) if *ignore_case => text
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            Value::Text(text) => text.contains(needle.as_str()),
            _ => false,
        },
        Filter::Has { field, value } => match document.get(*field) {
            Some(JsonValue::Array(items)) => items
                .iter()
                .any(|item| Value::from_json(item).same_as(value)),
            _ => false,
        },
        Filter::Related { relation, target } => source
            .related(document, relation)
            .iter()
            .any(|(id, slug)| target.matches(*id, slug)),
    }
}

/// Order of two documents under the given sort keys.
pub fn compare_documents(
    a: &Document,
    b: &Document,
    keys: &[SortKey],
) -> Ordering {
    for key in keys {
        let ordering = expr_value(a, &key.expr()).sort_cmp(&expr_value(b, &key.expr()));
        let ordering = if key.is_descending() {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::Identifier;
    use crate::schema::ResourceKind;
    use serde_json::json;

    struct NoRelations;

    impl RecordSource for NoRelations {
        fn related(&self, _record: &Document, _relation: &RelationDef) -> Vec<(i64, String)> {
            Vec::new()
        }
    }

    struct OneGenre;

    impl RecordSource for OneGenre {
        fn related(&self, _record: &Document, relation: &RelationDef) -> Vec<(i64, String)> {
            if relation.name == "genres" {
                vec![(9, "drama".to_string())]
            } else {
                Vec::new()
            }
        }
    }

    fn doc(value: JsonValue) -> Document {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_comparisons_skip_nulls() {
        let show = doc(json!({"id": 1, "title": "Anohana", "overview": null}));
        let eval = |f: Filter| evaluate(&f, &show, &NoRelations);

        assert!(eval(Filter::compare("title", CompareOp::Lt, "B")));
        assert!(!eval(Filter::compare("overview", CompareOp::Lt, "B")));
        assert!(!eval(Filter::compare("overview", CompareOp::Gte, "B")));
        assert!(eval(Filter::compare("overview", CompareOp::Eq, Value::Null)));
        assert!(eval(Filter::compare("overview", CompareOp::Ne, "B")));
        assert!(eval(Filter::compare("missing", CompareOp::Eq, Value::Null)));
    }

    #[test]
    fn test_contains_and_has() {
        let show = doc(json!({"id": 1, "title": "Anohana", "aliases": ["ano", "AnoHana"]}));
        let eval = |f: Filter| evaluate(&f, &show, &NoRelations);

        let contains = |needle: &str, ignore_case| Filter::Contains {
            field: "title",
            needle: needle.to_string(),
            ignore_case,
        };
        assert!(eval(contains("Ano", false)));
        assert!(!eval(contains("ano", false)));
        assert!(eval(contains("ANO", true)));
        assert!(!eval(contains("ZZZ", true)));

        let has = |value: &str| Filter::Has {
            field: "aliases",
            value: Value::from(value),
        };
        assert!(eval(has("ano")));
        assert!(!eval(has("hana")));
        assert!(!eval(Filter::and(vec![has("ano"), has("hana")])));
    }

    #[test]
    fn test_related_and_random() {
        let show = doc(json!({"id": 3, "title": "Anohana"}));
        let relation = ResourceKind::Show.schema().relation("genres").unwrap();
        let related = |target: Identifier| Filter::Related { relation, target };

        assert!(evaluate(&related(Identifier::Id(9)), &show, &OneGenre));
        assert!(evaluate(&related("drama".into()), &show, &OneGenre));
        assert!(!evaluate(&related("action".into()), &show, &OneGenre));
        assert!(!evaluate(&related(Identifier::Id(9)), &show, &NoRelations));

        let key = random_key(3, 42);
        let filter = Filter::Compare {
            expr: Expr::Random(42),
            op: CompareOp::Eq,
            value: Value::Int(key),
        };
        assert!(evaluate(&filter, &show, &NoRelations));
    }

    #[test]
    fn test_compare_documents_orders_nulls_first() {
        let a = doc(json!({"id": 1, "title": null}));
        let b = doc(json!({"id": 2, "title": "A"}));
        let ascending = [SortKey::field("title", false), SortKey::field("id", false)];
        let descending = [SortKey::field("title", true), SortKey::field("id", false)];

        assert_eq!(compare_documents(&a, &b, &ascending), Ordering::Less);
        assert_eq!(compare_documents(&a, &b, &descending), Ordering::Greater);
    }
}
