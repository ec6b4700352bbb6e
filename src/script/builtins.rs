//! Functions callable from compiled scripts

use crate::error::ViewError;
use crate::value::Value;

/// Call a builtin function by name
///
/// `isset` and `empty` are not here: they need their arguments unevaluated, so
/// the evaluator handles them.
pub fn call(name: &str, args: Vec<Value>) -> Result<Value, ViewError> {
    match name {
        "count" => {
            let [value] = exact::<1>(name, args)?;
            count(&value)
        }
        "e" => {
            let [value] = exact::<1>(name, args)?;
            Ok(Value::Str(escape_html(&value.to_output()?)))
        }
        "strtoupper" => map_text(name, args, |s| s.to_uppercase()),
        "strtolower" => map_text(name, args, |s| s.to_lowercase()),
        "trim" => map_text(name, args, |s| s.trim().to_string()),
        "ucfirst" => map_text(name, args, |s| {
            let mut chars = s.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }),
        "implode" => implode(args),
        "in_array" => {
            let [needle, haystack] = exact::<2>(name, args)?;
            let found = items(name, &haystack)?
                .iter()
                .any(|item| item.loose_eq(&needle));
            Ok(Value::Bool(found))
        }
        "range" => range(args),
        "str_repeat" => {
            let [text, times] = exact::<2>(name, args)?;
            let times = integer(name, &times)?;
            if times < 0 {
                return Err(ViewError::runtime(
                    "str_repeat(): argument #2 must be greater than or equal to 0",
                ));
            }
            Ok(Value::Str(text.to_output()?.repeat(times as usize)))
        }
        "json_encode" => {
            let [value] = exact::<1>(name, args)?;
            Ok(Value::Str(serde_json::to_string(&value.to_json())?))
        }
        other => Err(ViewError::runtime(format!(
            "call to undefined function {}()",
            other
        ))),
    }
}

/// Replace the five HTML-significant characters with entities
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

fn exact<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ViewError> {
    let given = args.len();
    args.try_into().map_err(|_| {
        ViewError::runtime(format!(
            "{}() expects exactly {} argument{}, {} given",
            name,
            N,
            if N == 1 { "" } else { "s" },
            given
        ))
    })
}

fn map_text(name: &str, args: Vec<Value>, f: impl Fn(&str) -> String) -> Result<Value, ViewError> {
    let [value] = exact::<1>(name, args)?;
    Ok(Value::Str(f(&value.to_output()?)))
}

fn count(value: &Value) -> Result<Value, ViewError> {
    let n = match value {
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        Value::Messages(bag) => bag.count(),
        other => {
            return Err(ViewError::runtime(format!(
                "count(): argument #1 must be of type countable, {} given",
                other.type_name()
            )))
        }
    };
    Ok(Value::from(n))
}

/// The values of a list or map
fn items(name: &str, value: &Value) -> Result<Vec<Value>, ViewError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Map(map) => Ok(map.values().cloned().collect()),
        other => Err(ViewError::runtime(format!(
            "{}(): expected an array, {} given",
            name,
            other.type_name()
        ))),
    }
}

fn integer(name: &str, value: &Value) -> Result<i64, ViewError> {
    match value.to_number() {
        Some(n) => Ok(n.as_f64() as i64),
        None => Err(ViewError::runtime(format!(
            "{}(): expected a number, {} given",
            name,
            value.type_name()
        ))),
    }
}

/// `implode(glue, pieces)` or `implode(pieces)`
fn implode(args: Vec<Value>) -> Result<Value, ViewError> {
    let (glue, pieces) = match args.as_slice() {
        [pieces] => (String::new(), pieces),
        [glue, pieces] => (glue.to_output()?, pieces),
        _ => {
            return Err(ViewError::runtime(format!(
                "implode() expects 1 or 2 arguments, {} given",
                args.len()
            )))
        }
    };
    let parts = items("implode", pieces)?
        .iter()
        .map(Value::to_output)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Str(parts.join(&glue)))
}

/// Inclusive integer range, counting down when `start > end`
fn range(args: Vec<Value>) -> Result<Value, ViewError> {
    let (start, end, step) = match args.as_slice() {
        [start, end] => (integer("range", start)?, integer("range", end)?, 1),
        [start, end, step] => (
            integer("range", start)?,
            integer("range", end)?,
            integer("range", step)?
                .checked_abs()
                .ok_or_else(|| ViewError::runtime("range(): step is out of range"))?,
        ),
        _ => {
            return Err(ViewError::runtime(format!(
                "range() expects 2 or 3 arguments, {} given",
                args.len()
            )))
        }
    };
    if step == 0 {
        return Err(ViewError::runtime("range(): step cannot be 0"));
    }

    let mut values = Vec::new();
    let mut current = start;
    if start <= end {
        while current <= end {
            values.push(Value::Int(current));
            let Some(next) = current.checked_add(step) else {
                break;
            };
            current = next;
        }
    } else {
        while current >= end {
            values.push(Value::Int(current));
            let Some(next) = current.checked_sub(step) else {
                break;
            };
            current = next;
        }
    }
    Ok(Value::List(values))
}
