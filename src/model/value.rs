//! Declared and resolved value types.
//!
//! [`RawValue`] is what a declaration holds; [`Value`] is what resolution
//! produces. Containers never carry their elements inline in a `RawValue`:
//! list elements and map entries are derived nodes in the graph arena.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Discriminant of a declared value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    None,
    String,
    Integer,
    Boolean,
    BigDecimal,
    Reference,
    List,
    Map,
    Unknown,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::None => "NONE",
            ValueType::String => "STRING",
            ValueType::Integer => "INTEGER",
            ValueType::Boolean => "BOOLEAN",
            ValueType::BigDecimal => "BIG_DECIMAL",
            ValueType::Reference => "REFERENCE",
            ValueType::List => "LIST",
            ValueType::Map => "MAP",
            ValueType::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Text of a reference to another property, e.g. `ext.versions["kotlin"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceTo {
    pub text: String,
}

impl ReferenceTo {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl fmt::Display for ReferenceTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The value a declaration holds before any reference is followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum RawValue {
    None,
    /// Literal string; `${...}` and `$name` segments are references.
    String(String),
    Integer(i64),
    Boolean(bool),
    BigDecimal(Decimal),
    Reference(ReferenceTo),
    /// Elements live as derived child nodes.
    List,
    /// Entries live as derived child nodes.
    Map,
    /// Host expression the engine does not interpret.
    Unknown(String),
}

impl RawValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RawValue::None => ValueType::None,
            RawValue::String(_) => ValueType::String,
            RawValue::Integer(_) => ValueType::Integer,
            RawValue::Boolean(_) => ValueType::Boolean,
            RawValue::BigDecimal(_) => ValueType::BigDecimal,
            RawValue::Reference(_) => ValueType::Reference,
            RawValue::List => ValueType::List,
            RawValue::Map => ValueType::Map,
            RawValue::Unknown(_) => ValueType::Unknown,
        }
    }

    pub fn is_none(&self) -> bool { matches!(self, RawValue::None) }
    pub fn is_container(&self) -> bool { matches!(self, RawValue::List | RawValue::Map) }
}

/// A typed value, either resolved or a shallow view of a raw value.
///
/// Resolved values never contain `Reference`: a reference either resolves
/// to its target's value or degrades to its raw text as a `String`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    None,
    String(String),
    Integer(i64),
    Boolean(bool),
    BigDecimal(Decimal),
    Reference(ReferenceTo),
    List(Vec<Value>),
    /// Entries in declaration order.
    Map(Vec<(String, Value)>),
    Unknown(String),
}

// ============================================================================
// Type checking
// ============================================================================

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::String(_) => ValueType::String,
            Value::Integer(_) => ValueType::Integer,
            Value::Boolean(_) => ValueType::Boolean,
            Value::BigDecimal(_) => ValueType::BigDecimal,
            Value::Reference(_) => ValueType::Reference,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Unknown(_) => ValueType::Unknown,
        }
    }

    pub fn is_none(&self) -> bool { matches!(self, Value::None) }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// String-like values: literals, uninterpreted text and reference text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Unknown(s) => Some(s),
            Value::Reference(r) => Some(&r.text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Map lookup by key, first entry wins.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The form a value takes when spliced into an interpolated string.
    pub fn to_interpolated_string(&self) -> String {
        match self {
            Value::None => "null".to_string(),
            Value::String(s) | Value::Unknown(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::BigDecimal(d) => d.to_string(),
            Value::Reference(r) => r.text.clone(),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::to_interpolated_string).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(entries) => {
                if entries.is_empty() {
                    return "[:]".to_string();
                }
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{k}:{}", v.to_interpolated_string()))
                    .collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }
}

// ============================================================================
// Typed accessors
// ============================================================================

/// Conversion from a [`Value`] to a concrete type.
///
/// Kind mismatches yield `None`, never an error.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Option<Self> {
        match val {
            Value::None => None,
            other => Some(other.clone()),
        }
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_str().map(str::to_owned)
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_int()
    }
}

impl FromValue for i32 {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_int().and_then(|i| i32::try_from(i).ok())
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_bool()
    }
}

impl FromValue for Decimal {
    fn from_value(val: &Value) -> Option<Self> {
        match val {
            Value::BigDecimal(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }
}

impl FromValue for ReferenceTo {
    fn from_value(val: &Value) -> Option<Self> {
        match val {
            Value::Reference(r) => Some(r.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_list().map(<[Value]>::to_vec)
    }
}

impl FromValue for Vec<(String, Value)> {
    fn from_value(val: &Value) -> Option<Self> {
        val.as_map().map(<[(String, Value)]>::to_vec)
    }
}

// ============================================================================
// Conversions (From impls)
// ============================================================================

impl From<bool> for Value { fn from(v: bool) -> Self { Value::Boolean(v) } }
impl From<i32> for Value { fn from(v: i32) -> Self { Value::Integer(v as i64) } }
impl From<i64> for Value { fn from(v: i64) -> Self { Value::Integer(v) } }
impl From<Decimal> for Value { fn from(v: Decimal) -> Self { Value::BigDecimal(v) } }
impl From<String> for Value { fn from(v: String) -> Self { Value::String(v) } }
impl From<&str> for Value { fn from(v: &str) -> Self { Value::String(v.to_owned()) } }
impl From<ReferenceTo> for Value { fn from(v: ReferenceTo) -> Self { Value::Reference(v) } }
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Value::List(v.into_iter().map(Into::into).collect()) }
}

// ============================================================================
// Display
// ============================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "null"),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::BigDecimal(d) => write!(f, "{d}"),
            Value::Reference(r) => write!(f, "{r}"),
            Value::Unknown(s) => write!(f, "{s}"),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Map(m) => {
                if m.is_empty() {
                    return write!(f, "[:]");
                }
                write!(f, "[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from() {
        assert_eq!(Value::from("hello"), Value::String("hello".into()));
        assert_eq!(Value::from(42), Value::Integer(42));
        assert_eq!(Value::from(true), Value::Boolean(true));
        assert_eq!(Value::from(vec![1, 2]), Value::List(vec![Value::Integer(1), Value::Integer(2)]));
    }

    #[test]
    fn test_accessor_mismatch_is_absent() {
        let v = Value::String("value".into());
        assert_eq!(i64::from_value(&v), None);
        assert_eq!(bool::from_value(&v), None);
        assert_eq!(<Vec<Value>>::from_value(&v), None);
        assert_eq!(String::from_value(&v), Some("value".to_string()));
        assert_eq!(String::from_value(&Value::None), None);
        assert_eq!(Value::from_value(&Value::None), None);
    }

    #[test]
    fn test_reference_reads_as_text() {
        let v = Value::Reference(ReferenceTo::new("prop1"));
        assert_eq!(String::from_value(&v), Some("prop1".to_string()));
        assert_eq!(ReferenceTo::from_value(&v), Some(ReferenceTo::new("prop1")));
        assert_eq!(ReferenceTo::from_value(&Value::String("prop1".into())), None);
    }

    #[test]
    fn test_decimal_widening() {
        assert_eq!(Decimal::from_value(&Value::Integer(3)), Some(Decimal::from(3)));
        assert_eq!(i64::from_value(&Value::BigDecimal(Decimal::new(253, 1))), None);
    }

    #[test]
    fn test_interpolated_string() {
        let list = Value::List(vec![Value::Integer(1), Value::String("a".into())]);
        assert_eq!(list.to_interpolated_string(), "[1, a]");
        let map = Value::Map(vec![("k".into(), Value::Boolean(true))]);
        assert_eq!(map.to_interpolated_string(), "[k:true]");
        assert_eq!(Value::Map(Vec::new()).to_interpolated_string(), "[:]");
    }

    #[test]
    fn test_map_get_keeps_order() {
        let map = Value::Map(vec![
            ("key1".into(), Value::Integer(1)),
            ("key3".into(), Value::Integer(3)),
            ("key2".into(), Value::Integer(2)),
        ]);
        let keys: Vec<&str> = map.as_map().unwrap().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["key1", "key3", "key2"]);
        assert_eq!(map.get("key3"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_raw_value_type() {
        assert_eq!(RawValue::List.value_type(), ValueType::List);
        assert_eq!(RawValue::Reference(ReferenceTo::new("a")).value_type(), ValueType::Reference);
        assert_eq!(ValueType::BigDecimal.to_string(), "BIG_DECIMAL");
    }
}
