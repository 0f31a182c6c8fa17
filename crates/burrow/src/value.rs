//! Typed runtime values and the immutable [`ValueSet`] bag.
//!
//! The parser produces [`Value`]s already cast to the declared kind. Commands
//! read them back through [`ValueSet`]'s accessors, which coerce across
//! variants on a best-effort basis and never fail: a missing key or a value
//! that cannot be coerced yields the target type's zero value. Only
//! [`ValueSet::decode_json`] and [`ValueSet::raw`] report absence.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::duration::{format_duration, parse_duration};

/// A dynamically typed value produced by parsing or carried as payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    /// Values collected by a repeatable positional.
    List(Vec<Value>),
    /// A decoded JSON document.
    Json(serde_json::Value),
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Json(_) => "json",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Converts to a JSON document. Durations become their literal text.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Duration(d) => serde_json::Value::String(format_duration(*d)),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(v) => v.clone(),
        }
    }
}

/// Canonical literal text; the parser accepts it back for the same kind.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Duration(d) => f.write_str(&format_duration(*d)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Errors reported by the non-total [`ValueSet`] accessors.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("value \"{0}\" not present")]
    NotPresent(String),

    #[error("failed to decode \"{name}\" as json: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses the canonical boolean literals.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Immutable, name-keyed bag of parsed values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet {
    values: BTreeMap<String, Value>,
}

impl ValueSet {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    /// The stored value, without conversion.
    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reads a value as text. Non-string values are formatted; missing
    /// values read as the empty string.
    pub fn string(&self, name: &str) -> String {
        self.values.get(name).map(Value::to_string).unwrap_or_default()
    }

    /// Reads a value as a list of strings. Scalars become a one-element
    /// list; missing values an empty one.
    pub fn strings(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(Value::List(items)) => items.iter().map(Value::to_string).collect(),
            Some(Value::Json(serde_json::Value::Array(items))) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(other) => vec![other.to_string()],
            None => Vec::new(),
        }
    }

    /// Reads a boolean. Strings use the boolean literal grammar; numbers are
    /// true when non-zero.
    pub fn bool(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_bool(s).unwrap_or(false),
            Some(Value::Int(i)) => *i != 0,
            Some(Value::Json(serde_json::Value::Bool(b))) => *b,
            Some(Value::Json(serde_json::Value::Number(n))) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }

    /// Reads an integer. Floats truncate; strings are parsed.
    pub fn int(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(Value::Int(i)) => *i,
            Some(Value::Float(f)) => *f as i64,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            Some(Value::Json(serde_json::Value::Number(n))) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Reads a float. Integers widen; strings are parsed.
    pub fn float(&self, name: &str) -> f64 {
        match self.values.get(name) {
            Some(Value::Float(f)) => *f,
            Some(Value::Int(i)) => *i as f64,
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            Some(Value::Json(serde_json::Value::Number(n))) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Reads a duration. Strings use the duration grammar; integers are
    /// nanoseconds.
    pub fn duration(&self, name: &str) -> Duration {
        match self.values.get(name) {
            Some(Value::Duration(d)) => *d,
            Some(Value::String(s)) => parse_duration(s).unwrap_or_default(),
            Some(Value::Int(i)) if *i > 0 => Duration::from_nanos(*i as u64),
            _ => Duration::ZERO,
        }
    }

    /// Decodes a value into `T` through JSON.
    ///
    /// String values are parsed as JSON text; every other value is converted
    /// to a JSON document first.
    pub fn decode_json<T: DeserializeOwned>(&self, name: &str) -> Result<T, ValueError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| ValueError::NotPresent(name.to_string()))?;
        let decoded = match value {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.to_json()),
        };
        decoded.map_err(|source| ValueError::Decode {
            name: name.to_string(),
            source,
        })
    }
}

impl FromIterator<(String, Value)> for ValueSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> ValueSet {
        [
            ("name".to_string(), Value::from("web-1")),
            ("count".to_string(), Value::Int(3)),
            ("ratio".to_string(), Value::Float(2.75)),
            ("on".to_string(), Value::Bool(true)),
            ("wait".to_string(), Value::Duration(Duration::from_millis(1500))),
            ("tags".to_string(), Value::from(vec!["a", "b"])),
            ("doc".to_string(), Value::Json(json!({"port": 8080}))),
            ("numeric".to_string(), Value::from("42")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_string_formats_non_strings() {
        let set = sample();
        assert_eq!(set.string("name"), "web-1");
        assert_eq!(set.string("count"), "3");
        assert_eq!(set.string("wait"), "1.5s");
        assert_eq!(set.string("doc"), r#"{"port":8080}"#);
        assert_eq!(set.string("missing"), "");
    }

    #[test]
    fn test_strings_accessor() {
        let set = sample();
        assert_eq!(set.strings("tags"), vec!["a", "b"]);
        assert_eq!(set.strings("name"), vec!["web-1"]);
        assert!(set.strings("missing").is_empty());
    }

    #[test]
    fn test_numeric_coercion() {
        let set = sample();
        assert_eq!(set.int("count"), 3);
        assert_eq!(set.int("ratio"), 2);
        assert_eq!(set.int("numeric"), 42);
        assert_eq!(set.int("name"), 0);
        assert_eq!(set.float("count"), 3.0);
        assert_eq!(set.float("numeric"), 42.0);
        assert_eq!(set.float("missing"), 0.0);
    }

    #[test]
    fn test_bool_and_duration() {
        let set = sample();
        assert!(set.bool("on"));
        assert!(set.bool("count"));
        assert!(!set.bool("name"));
        assert!(!set.bool("missing"));
        assert_eq!(set.duration("wait"), Duration::from_millis(1500));
        assert_eq!(set.duration("name"), Duration::ZERO);
    }

    #[test]
    fn test_decode_json() {
        #[derive(Debug, Deserialize)]
        struct Doc {
            port: u16,
        }

        let set = sample();
        let doc: Doc = set.decode_json("doc").unwrap();
        assert_eq!(doc.port, 8080);

        let tags: Vec<String> = set.decode_json("tags").unwrap();
        assert_eq!(tags, vec!["a", "b"]);

        let err = set.decode_json::<Doc>("missing").unwrap_err();
        assert!(matches!(err, ValueError::NotPresent(_)));
    }

    #[test]
    fn test_raw_reports_absence() {
        let set = sample();
        assert_eq!(set.raw("count"), Some(&Value::Int(3)));
        assert!(set.raw("missing").is_none());
    }

    #[test]
    fn test_bool_literals() {
        assert_eq!(parse_bool("T"), Some(true));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn test_value_serializes_as_json() {
        let v = Value::from(vec![Value::Duration(Duration::from_secs(2)), Value::Int(1)]);
        assert_eq!(serde_json::to_string(&v).unwrap(), r#"["2s",1]"#);
    }
}
