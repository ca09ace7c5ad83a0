//! Merging of partial resources.
//!
//! [`complete`] fills the gaps of one instance with the values of another
//! and backs non-resetting edits as well as the combination of records
//! coming from several metadata providers. It works on the serialized form,
//! so every resource type shares one implementation driven by its schema.

use crate::error::{LibraryError, Result};
use crate::models::Resource;
use crate::schema::RelationDef;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

type Object = serde_json::Map<String, JsonValue>;

fn to_object<T: Resource>(resource: &T) -> Result<Object> {
    match serde_json::to_value(resource)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(LibraryError::Inconsistency(format!(
            "{} serialized to a non-object: {}",
            T::KIND,
            other
        ))),
    }
}

/// Whether a serialized value carries no information: null, the type's
/// default, or an empty string, list or dictionary.
fn is_unset(value: &JsonValue, default: Option<&JsonValue>) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::String(s) if s.is_empty() => true,
        JsonValue::Array(items) if items.is_empty() => true,
        JsonValue::Object(map) if map.is_empty() => true,
        other => default == Some(other),
    }
}

fn same_item(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.get("slug").and_then(JsonValue::as_str), b.get("slug").and_then(JsonValue::as_str)) {
        (Some(x), Some(y)) if !x.is_empty() && !y.is_empty() => x == y,
        _ => a == b,
    }
}

fn merge_field(
    relation: Option<&RelationDef>,
    current: JsonValue,
    incoming: JsonValue,
    default: Option<&JsonValue>,
) -> JsonValue {
    match (relation, current, incoming) {
        (Some(relation), JsonValue::Array(first), JsonValue::Array(second))
            if relation.is_to_many() =>
        {
            JsonValue::Array(merge_lists(first, second, same_item))
        }
        (None, JsonValue::Object(mut first), JsonValue::Object(second)) => {
            for (key, value) in second {
                first.entry(key).or_insert(value);
            }
            JsonValue::Object(first)
        }
        (_, current, incoming) if is_unset(&current, default) => incoming,
        (_, current, _) => current,
    }
}

/// Fill every unset field of `first` with the value from `second`.
///
/// Dictionaries merge key-wise with `first` winning, loaded to-many
/// relations concatenate without repeating a slug, and to-one relations are
/// only taken when `first` has none. The type's [`Resource::on_merge`] hook
/// runs on the result.
pub fn complete<T: Resource>(first: T, second: &T) -> Result<T> {
    let defaults = to_object(&T::default())?;
    let mut merged = to_object(&first)?;
    let schema = T::schema();

    for (key, incoming) in to_object(second)? {
        let relation = schema.relations.iter().find(|r| r.name == key);
        let current = merged.remove(&key).unwrap_or(JsonValue::Null);
        let value = merge_field(relation, current, incoming, defaults.get(&key));
        merged.insert(key, value);
    }

    let mut result: T = serde_json::from_value(JsonValue::Object(merged))?;
    result.on_merge();
    Ok(result)
}

/// A blank resource keeping only the identity of `resource`.
pub fn nullify<T: Resource>(resource: &T) -> T {
    let mut blank = T::default();
    blank.set_id(resource.id());
    blank.set_slug(resource.slug().to_string());
    blank
}

/// `first` followed by the items of `second` that are not already in it.
pub fn merge_lists<T, F>(first: Vec<T>, second: Vec<T>, is_equal: F) -> Vec<T>
where
    F: Fn(&T, &T) -> bool,
{
    let mut merged = first;
    for item in second {
        if !merged.iter().any(|existing| is_equal(existing, &item)) {
            merged.push(item);
        }
    }
    merged
}

/// Add the entries of `second` missing from `first`, and replace values of
/// `first` left at their default. Returns whether `first` changed.
pub fn merge_dictionaries<K, V>(first: &mut BTreeMap<K, V>, second: &BTreeMap<K, V>) -> bool
where
    K: Ord + Clone,
    V: Clone + Default + PartialEq,
{
    let blank = V::default();
    let mut changed = false;
    for (key, value) in second {
        match first.get_mut(key) {
            Some(existing) if *existing == blank && *value != blank => {
                *existing = value.clone();
                changed = true;
            }
            Some(_) => {}
            None => {
                first.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }
    changed
}
