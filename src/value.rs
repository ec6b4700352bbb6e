//! Dynamic values bound into views and manipulated by compiled scripts

use std::cmp::Ordering;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::ViewError;
use crate::messages::{ErrorBag, MessageBag};

/// View data: variable name to value, in insertion order
pub type Data = IndexMap<String, Value>;

/// A view created by a script through `$__env->make(...)`, not yet rendered
#[derive(Debug, Clone, PartialEq)]
pub struct PendingView {
    pub name: String,
    pub path: PathBuf,
    pub engine: String,
    pub data: Data,
}

/// A dynamically typed value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Data),
    /// Named validation bags (`$errors`)
    Errors(ErrorBag),
    /// A single validation bag (`$errors->getBag('login')`)
    Messages(MessageBag),
    /// The rendering environment (`$__env`)
    Env,
    View(Box<PendingView>),
}

/// A value coerced for arithmetic
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    /// Convert any serializable value via its JSON representation
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, ViewError> {
        Ok(Value::from(serde_json::to_value(value)?))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) | Value::Map(_) => "array",
            Value::Errors(_) => "ErrorBag",
            Value::Messages(_) => "MessageBag",
            Value::Env => "Environment",
            Value::View(_) => "View",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness used by `if`, `while`, `!` and the logical operators
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !(s.is_empty() || s == "0"),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Errors(_) | Value::Messages(_) | Value::Env | Value::View(_) => true,
        }
    }

    /// The text `echo` writes for this value
    pub fn to_output(&self) -> Result<String, ViewError> {
        match self {
            Value::Null => Ok(String::new()),
            Value::Bool(true) => Ok("1".to_string()),
            Value::Bool(false) => Ok(String::new()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::Str(s) => Ok(s.clone()),
            other => Err(ViewError::runtime(format!(
                "{} to string conversion",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn to_number(&self) -> Option<Number> {
        match self {
            Value::Null => Some(Number::Int(0)),
            Value::Bool(b) => Some(Number::Int(i64::from(*b))),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Str(s) => parse_numeric(s),
            _ => None,
        }
    }

    /// Loose equality (`==`)
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, v) | (v, Value::Null) => !v.truthy(),
            (Value::Bool(b), v) | (v, Value::Bool(b)) => *b == v.truthy(),
            (Value::Str(a), Value::Str(b)) => match (parse_numeric(a), parse_numeric(b)) {
                (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
                _ => a == b,
            },
            (Value::Int(_) | Value::Float(_), Value::Str(s))
            | (Value::Str(s), Value::Int(_) | Value::Float(_)) => {
                let number = if let Value::Str(_) = self { other } else { self };
                match parse_numeric(s) {
                    Some(parsed) => number
                        .to_number()
                        .is_some_and(|n| n.as_f64() == parsed.as_f64()),
                    None => number.to_output().is_ok_and(|text| &text == s),
                }
            }
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                match (self.to_number(), other.to_number()) {
                    (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                    _ => false,
                }
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering for `<`, `>`, `<=` and `>=`
    ///
    /// Numbers and numeric strings compare numerically; anything else
    /// printable compares as text.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ViewError> {
        if let (Some(a), Some(b)) = (self.to_number(), other.to_number()) {
            return a.as_f64().partial_cmp(&b.as_f64()).ok_or_else(|| {
                ViewError::runtime("cannot compare NaN")
            });
        }
        Ok(self.to_output()?.cmp(&other.to_output()?))
    }

    /// JSON representation, for `json_encode` and the CLI
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null | Value::Env | Value::View(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Messages(bag) => messages_json(bag),
            Value::Errors(errors) => Json::Object(
                errors
                    .bags()
                    .map(|(name, bag)| (name.to_string(), messages_json(bag)))
                    .collect(),
            ),
        }
    }
}

fn messages_json(bag: &MessageBag) -> serde_json::Value {
    serde_json::Value::Array(bag.all().into_iter().map(serde_json::Value::from).collect())
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Parse a numeric string, ignoring surrounding whitespace
pub(crate) fn parse_numeric(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    let plausible = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if plausible {
        trimmed.parse::<f64>().ok().map(Number::Float)
    } else {
        None
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(0.0)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
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

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<ErrorBag> for Value {
    fn from(errors: ErrorBag) -> Self {
        Value::Errors(errors)
    }
}

impl From<Data> for Value {
    fn from(map: Data) -> Self {
        Value::Map(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness_follows_loose_rules() {
        assert!(!Value::Null.truthy());
        assert!(!Value::from("0").truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("a").truthy());
        assert!(!Value::List(vec![]).truthy());
        assert!(Value::Int(-1).truthy());
    }

    #[test]
    fn test_loose_equality_across_types() {
        assert!(Value::Int(1).loose_eq(&Value::from("1")));
        assert!(Value::Int(1).loose_eq(&Value::Float(1.0)));
        assert!(Value::Null.loose_eq(&Value::from("")));
        assert!(!Value::Null.loose_eq(&Value::from("a")));
        assert!(!Value::from("abc").loose_eq(&Value::Int(0)));
        assert!(Value::Bool(true).loose_eq(&Value::from("yes")));
    }

    #[test]
    fn test_float_output_drops_integral_fraction() {
        assert_eq!(Value::Float(3.0).to_output().unwrap(), "3");
        assert_eq!(Value::Float(2.5).to_output().unwrap(), "2.5");
    }

    #[test]
    fn test_arrays_do_not_convert_to_text() {
        let err = Value::List(vec![]).to_output().unwrap_err();
        assert_eq!(err.to_string(), "array to string conversion");
    }

    #[test]
    fn test_json_round_trip_keeps_key_order() {
        let value = Value::from(json!({"b": 1, "a": [true, null, "x"]}));
        let Value::Map(map) = &value else {
            panic!("expected map");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(value.to_json(), json!({"b": 1, "a": [true, null, "x"]}));
    }

    #[test]
    fn test_compare_numeric_strings_numerically() {
        let ord = Value::from("10").compare(&Value::from("9")).unwrap();
        assert_eq!(ord, Ordering::Greater);
        let ord = Value::from("apple").compare(&Value::from("banana")).unwrap();
        assert_eq!(ord, Ordering::Less);
    }
}
