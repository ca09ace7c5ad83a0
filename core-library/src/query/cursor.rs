//! Keyset pagination.
//!
//! Given the fully resolved sort keys `k0..kn` (the last one being the id)
//! and the cursor resource, the rows strictly after the cursor are
//!
//! ```text
//! (k0 after c0)
//! OR (k0 = c0 AND k1 after c1)
//! OR ...
//! OR (k0 = c0 AND ... AND kn after cn)
//! ```
//!
//! where "after" follows the direction of each key and the placement of
//! nulls: they sort first ascending and therefore last descending.

use crate::query::eval::expr_value;
use crate::query::filter::{CompareOp, Expr, Filter};
use crate::query::sort::SortKey;
use crate::store::Document;
use crate::value::Value;

/// Sort value of `key` on the cursor document.
pub fn key_value(cursor: &Document, key: &SortKey) -> Value {
    expr_value(cursor, &key.expr())
}

fn after(expr: Expr, descending: bool, value: Value) -> Filter {
    let compare = |op, value| Filter::Compare { expr, op, value };
    match (descending, value.is_null()) {
        (false, false) => compare(CompareOp::Gt, value),
        (false, true) => compare(CompareOp::Ne, Value::Null),
        (true, false) => Filter::any(vec![
            compare(CompareOp::Lt, value),
            compare(CompareOp::Eq, Value::Null),
        ]),
        (true, true) => Filter::False,
    }
}

/// Predicate keeping the rows ordered strictly after `cursor` under `keys`.
pub fn keyset_after(keys: &[SortKey], cursor: &Document) -> Filter {
    let mut branches = Vec::with_capacity(keys.len());
    let mut equal_prefix = Vec::with_capacity(keys.len());

    for key in keys {
        let value = key_value(cursor, key);
        let expr = key.expr();

        let mut branch = equal_prefix.clone();
        branch.push(after(expr, key.is_descending(), value.clone()));
        branches.push(Filter::and(branch));

        equal_prefix.push(Filter::Compare {
            expr,
            op: CompareOp::Eq,
            value,
        });
    }
    Filter::any(branches)
}
