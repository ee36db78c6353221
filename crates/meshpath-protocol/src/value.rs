//! The dynamically-typed [`Value`] that travels inside message content.
//!
//! Services exchange loosely structured data: a chat line, a board move,
//! a page body, a user record. Instead of a fixed schema per service, the
//! wire carries a small self-describing value tree, and each service picks
//! out the parts it understands.

use std::collections::BTreeMap;

use num_bigint::BigInt;

/// A serializable unit.
///
/// `List` and `Tuple` both hold an ordered sequence; they differ only by
/// their type tag on the wire, and the distinction survives a round trip.
///
/// `Value` implements `Ord` so it can be a `BTreeMap` key. Mapping keys
/// are therefore unique and iterate in a deterministic order, which makes
/// encoding deterministic too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// A UTF-8 string.
    Str(String),
    /// A signed integer of arbitrary precision.
    Int(BigInt),
    /// A boolean.
    Bool(bool),
    /// An ordered sequence with list semantics.
    List(Vec<Value>),
    /// An ordered sequence with tuple semantics.
    Tuple(Vec<Value>),
    /// A mapping with unique keys.
    Map(BTreeMap<Value, Value>),
}

impl Value {
    /// Builds a `Map` from key/value pairs. Later duplicates win.
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// The empty string, used as "no content".
    pub fn empty() -> Self {
        Value::Str(String::new())
    }

    /// Returns the string if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    pub fn as_int(&self) -> Option<&BigInt> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Returns the integer as `i64` if this is an `Int` that fits.
    pub fn as_i64(&self) -> Option<i64> {
        self.as_int().and_then(|i| i64::try_from(i).ok())
    }

    /// Returns the boolean if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements if this is a `List` or a `Tuple`.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the mapping if this is a `Map`.
    pub fn as_map(&self) -> Option<&BTreeMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up a string key in a `Map`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(&Value::Str(key.to_string()))
    }

    /// Short name of the variant, for log lines and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "str",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Int(i)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(BigInt::from(i))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_builder_and_get() {
        let v = Value::map([("from", Value::from("alice")), ("n", 3.into())]);
        assert_eq!(v.get("from").and_then(Value::as_str), Some("alice"));
        assert_eq!(v.get("n").and_then(Value::as_i64), Some(3));
        assert!(v.get("missing").is_none());
    }

    #[test]
    fn test_as_seq_accepts_list_and_tuple() {
        let list = Value::List(vec![1.into()]);
        let tuple = Value::Tuple(vec![1.into()]);
        assert_eq!(list.as_seq(), tuple.as_seq());
        assert_ne!(list, tuple);
    }

    #[test]
    fn test_as_i64_rejects_out_of_range() {
        let huge = Value::Int(BigInt::from(i64::MAX) * 4);
        assert!(huge.as_int().is_some());
        assert_eq!(huge.as_i64(), None);
    }

    #[test]
    fn test_default_is_empty_string() {
        assert_eq!(Value::default(), Value::Str(String::new()));
        assert_eq!(Value::default().kind(), "str");
    }
}
