//! Lowering of filters and sort keys to SQLite.
//!
//! Resources live in one `resources` table (aliased `r`) with their scalar
//! fields inside a JSON `body`; `id` and `slug` are real columns. Field
//! names come from the static schemas and are safe to inline, every literal
//! is bound as a positional parameter.

use crate::identifier::Identifier;
use crate::query::filter::{CompareOp, Expr, Filter};
use crate::query::sort::SortKey;
use crate::schema::{LinkSide, RelationDef, RelationVia};
use crate::value::random_key_sql;
use bridge_traits::database::QueryValue;

/// SQL expression reading `field` of the row aliased `alias`.
pub fn column(alias: &str, field: &str) -> String {
    match field {
        "id" | "slug" => format!("{}.{}", alias, field),
        other => format!("json_extract({}.body, '$.\"{}\"')", alias, other),
    }
}

fn expr_sql(expr: &Expr) -> String {
    match expr {
        Expr::Field(field) => column("r", field),
        Expr::Random(seed) => random_key_sql("r.id", *seed),
    }
}

/// `(own, other)` columns of a link row for the declaring side.
pub fn link_columns(side: LinkSide) -> (&'static str, &'static str) {
    match side {
        LinkSide::First => ("first_id", "second_id"),
        LinkSide::Second => ("second_id", "first_id"),
    }
}

/// Lower `filter` to a boolean SQL expression, pushing its literals onto
/// `params` in order.
pub fn lower_filter(filter: &Filter, params: &mut Vec<QueryValue>) -> String {
    match filter {
        Filter::True => "1".to_string(),
        Filter::False => "0".to_string(),
        Filter::And(terms) => join(terms, " AND ", params),
        Filter::Or(terms) => join(terms, " OR ", params),
        Filter::Not(inner) => format!("NOT ({})", lower_filter(inner, params)),
        Filter::Compare { expr, op, value } => {
            let operator = match op {
                CompareOp::Eq => "IS",
                CompareOp::Ne => "IS NOT",
                CompareOp::Lt => "<",
                CompareOp::Lte => "<=",
                CompareOp::Gt => ">",
                CompareOp::Gte => ">=",
            };
            params.push(value.to_query_value());
            format!("{} {} ?", expr_sql(expr), operator)
        }
        Filter::In { values, .. } if values.is_empty() => "0".to_string(),
        Filter::In { expr, values } => {
            params.extend(values.iter().map(|v| v.to_query_value()));
            format!("{} IN ({})", expr_sql(expr), placeholders(values.len()))
        }
        Filter::Contains {
            field,
            needle,
            ignore_case,
        } => {
            params.push(QueryValue::Text(needle.clone()));
            let column = column("r", field);
            if *ignore_case {
                format!("instr(lower({}), lower(?)) > 0", column)
            } else {
                format!("instr({}, ?) > 0", column)
            }
        }
        Filter::Has { field, value } => {
            params.push(value.to_query_value());
            format!(
                "EXISTS (SELECT 1 FROM json_each(r.body, '$.\"{}\"') WHERE json_each.value = ?)",
                field
            )
        }
        Filter::Related { relation, target } => lower_related(relation, target, params),
    }
}

fn join(terms: &[Filter], separator: &str, params: &mut Vec<QueryValue>) -> String {
    let parts: Vec<String> = terms
        .iter()
        .map(|t| format!("({})", lower_filter(t, params)))
        .collect();
    parts.join(separator)
}

pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Match of the target row aliased `t` against the identifier.
fn target_match(target: &Identifier, params: &mut Vec<QueryValue>) -> &'static str {
    match target {
        Identifier::Id(id) => {
            params.push(QueryValue::Integer(*id));
            "t.id = ?"
        }
        Identifier::Slug(slug) => {
            params.push(QueryValue::Text(slug.clone()));
            "t.slug = ?"
        }
    }
}

fn lower_related(
    relation: &RelationDef,
    target: &Identifier,
    params: &mut Vec<QueryValue>,
) -> String {
    params.push(QueryValue::from(relation.target.as_str()));
    match relation.via {
        RelationVia::ForeignKey(fk) => {
            let matched = target_match(target, params);
            format!(
                "EXISTS (SELECT 1 FROM resources t WHERE t.kind = ? AND t.id = {} AND {})",
                column("r", fk),
                matched
            )
        }
        RelationVia::Reverse(field) => {
            let matched = target_match(target, params);
            format!(
                "EXISTS (SELECT 1 FROM resources t WHERE t.kind = ? AND {} = r.id AND {})",
                column("t", field),
                matched
            )
        }
        RelationVia::Link { link, side } => {
            let (own, other) = link_columns(side);
            let matched = target_match(target, params);
            params.push(QueryValue::from(link));
            format!(
                "EXISTS (SELECT 1 FROM resources t JOIN links l ON l.{other} = t.id \
                 WHERE t.kind = ? AND {matched} AND l.link = ? AND l.{own} = r.id)",
                other = other,
                matched = matched,
                own = own
            )
        }
    }
}

/// `ORDER BY` terms for the resolved keys.
pub fn order_by(keys: &[SortKey]) -> String {
    let terms: Vec<String> = keys
        .iter()
        .map(|key| {
            let direction = if key.is_descending() { "DESC" } else { "ASC" };
            format!("{} {}", expr_sql(&key.expr()), direction)
        })
        .collect();
    terms.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceKind;
    use crate::value::Value;

    #[test]
    fn test_compare_uses_null_safe_equality() {
        let mut params = Vec::new();
        let sql = lower_filter(&Filter::compare("overview", CompareOp::Eq, Value::Null), &mut params);
        assert_eq!(sql, "json_extract(r.body, '$.\"overview\"') IS ?");
        assert_eq!(params, vec![QueryValue::Null]);
    }

    #[test]
    fn test_and_or_nesting_keeps_parameter_order() {
        let filter = Filter::And(vec![
            Filter::eq("slug", "anohana"),
            Filter::Or(vec![
                Filter::compare("id", CompareOp::Gt, 3i64),
                Filter::Contains {
                    field: "title",
                    needle: "Ano".to_string(),
                    ignore_case: true,
                },
            ]),
        ]);
        let mut params = Vec::new();
        let sql = lower_filter(&filter, &mut params);
        assert_eq!(
            sql,
            "(r.slug IS ?) AND ((r.id > ?) OR (instr(lower(json_extract(r.body, '$.\"title\"')), lower(?)) > 0))"
        );
        assert_eq!(
            params,
            vec![
                QueryValue::from("anohana"),
                QueryValue::Integer(3),
                QueryValue::from("Ano")
            ]
        );
    }

    #[test]
    fn test_related_link_subquery() {
        let relation = ResourceKind::Show.schema().relation("genres").unwrap();
        let mut params = Vec::new();
        let sql = lower_filter(
            &Filter::Related {
                relation,
                target: Identifier::from("drama"),
            },
            &mut params,
        );
        assert!(sql.contains("JOIN links l ON l.second_id = t.id"));
        assert!(sql.contains("l.first_id = r.id"));
        assert_eq!(
            params,
            vec![
                QueryValue::from("genre"),
                QueryValue::from("drama"),
                QueryValue::from("show_genre")
            ]
        );
    }

    #[test]
    fn test_empty_in_is_false() {
        let mut params = Vec::new();
        assert_eq!(lower_filter(&Filter::ids(Vec::new()), &mut params), "0");
        assert_eq!(lower_filter(&Filter::ids(vec![1, 2]), &mut params), "r.id IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_order_by() {
        let keys = [
            SortKey::field("start_air", true),
            SortKey::Random { seed: 7 },
            SortKey::field("id", false),
        ];
        let sql = order_by(&keys);
        assert!(sql.starts_with("json_extract(r.body, '$.\"start_air\"') DESC, "));
        assert!(sql.ends_with("r.id ASC"));
        assert!(sql.contains("+ 7)"));
    }
}
