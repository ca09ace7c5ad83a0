//! Scalar values flowing through filters, sort keys and cursors.
//!
//! Ordering follows SQLite's rules so that the in-memory arena and the SQL
//! store return rows in the same order: `NULL` sorts before numbers, numbers
//! before text, text compares byte-wise, and booleans are integers.

use bridge_traits::database::QueryValue;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;

/// A literal compared against a resource field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Read a stored document value. Nested arrays and objects compare as
    /// their JSON text, which is what `json_extract` yields for them.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => JsonValue::from(*f),
            Value::Text(s) => JsonValue::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_query_value(&self) -> QueryValue {
        match self {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Integer(i64::from(*b)),
            Value::Int(i) => QueryValue::Integer(*i),
            Value::Float(f) => QueryValue::Real(*f),
            Value::Text(s) => QueryValue::Text(s.clone()),
        }
    }

    fn storage_class(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_real(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            other => other.as_integer().map(|i| i as f64),
        }
    }

    /// Comparison with SQL semantics: anything compared with `NULL` is
    /// unknown.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (a, b) if a.storage_class() != b.storage_class() => {
                Some(a.storage_class().cmp(&b.storage_class()))
            }
            (a, b) => match (a.as_integer(), b.as_integer()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.as_real()?.partial_cmp(&b.as_real()?),
            },
        }
    }

    /// Total order used by `ORDER BY`: `NULL` first, then [`Value::compare`].
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Null-safe equality, the `IS` operator.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self.is_null(), other.is_null()) {
            (true, true) => true,
            (false, false) => self.compare(other) == Some(Ordering::Equal),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

// Lehmer-style scramble of the id; the SQL store emits the same arithmetic.
const RANDOM_MULTIPLIER: i64 = 1_103_515_245;
const RANDOM_MODULUS: i64 = 2_147_483_647;
const RANDOM_MIX: i64 = 48_271;

/// Pseudo-random but reproducible sort key of a resource id for a seed.
pub fn random_key(id: i64, seed: u32) -> i64 {
    let scrambled = id
        .wrapping_mul(RANDOM_MULTIPLIER)
        .wrapping_add(i64::from(seed))
        % RANDOM_MODULUS;
    (scrambled * RANDOM_MIX) % RANDOM_MODULUS
}

/// The SQL expression computing [`random_key`] for `id_column`.
pub fn random_key_sql(id_column: &str, seed: u32) -> String {
    format!(
        "(((({id} * {mul}) + {seed}) % {modulus}) * {mix}) % {modulus}",
        id = id_column,
        mul = RANDOM_MULTIPLIER,
        seed = seed,
        modulus = RANDOM_MODULUS,
        mix = RANDOM_MIX
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_follows_sqlite_storage_classes() {
        assert_eq!(Value::Int(3).compare(&Value::Float(2.5)), Some(Ordering::Greater));
        assert_eq!(Value::Int(10).compare(&Value::from("1")), Some(Ordering::Less));
        assert_eq!(Value::Bool(true).compare(&Value::Int(1)), Some(Ordering::Equal));
        assert_eq!(Value::from("B").compare(&Value::from("a")), Some(Ordering::Less));
        assert_eq!(Value::Null.compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_sort_cmp_puts_null_first() {
        let mut values = vec![Value::from("b"), Value::Null, Value::Int(4), Value::from("a")];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(
            values,
            vec![Value::Null, Value::Int(4), Value::from("a"), Value::from("b")]
        );
    }

    #[test]
    fn test_same_as_is_null_safe() {
        assert!(Value::Null.same_as(&Value::Null));
        assert!(!Value::Null.same_as(&Value::Int(0)));
        assert!(Value::Int(2).same_as(&Value::Float(2.0)));
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from_json(&json!(null)), Value::Null);
        assert_eq!(Value::from_json(&json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from_json(&json!("x")), Value::from("x"));
        assert_eq!(Value::from_json(&json!(["a"])), Value::from("[\"a\"]"));
    }

    #[test]
    fn test_random_key_is_stable_per_seed() {
        assert_eq!(random_key(17, 42), random_key(17, 42));
        let a: Vec<i64> = (1..20).map(|id| random_key(id, 1)).collect();
        let b: Vec<i64> = (1..20).map(|id| random_key(id, 2)).collect();
        assert_ne!(a, b);
        assert!(a.iter().all(|k| (0..RANDOM_MODULUS).contains(k)));
    }

    #[test]
    fn test_random_key_wraps_for_large_ids() {
        let key = random_key(i64::MAX, u32::MAX);
        assert!(key.abs() < RANDOM_MODULUS);
        assert_eq!(key, random_key(i64::MAX, u32::MAX));
    }

    #[test]
    fn test_random_key_sql_mentions_column_and_seed() {
        let sql = random_key_sql("r.id", 42);
        assert!(sql.contains("r.id * 1103515245"));
        assert!(sql.contains("+ 42)"));
    }
}
