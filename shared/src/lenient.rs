//! Loose readers for JSON request payloads.
//!
//! Browser clients send whatever their UI produced: numbers as strings,
//! missing flags, `null` payloads. These helpers coerce such values instead
//! of failing the whole frame. Binary formats are strictly typed and go
//! through the plain `Deserialize` impls untouched.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Reads a JSON value as a number the way a lenient client would.
///
/// Numbers, numeric strings and booleans count; everything else is absent.
pub fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Truthiness of a JSON value: `false`, `0`, `""` and `null` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whole numbers only; `1.5` and `"abc"` are absent.
pub fn integral(value: &Value) -> Option<i64> {
    numeric(value)
        .filter(|n| n.fract() == 0.0 && n.abs() <= i64::MAX as f64)
        .map(|n| n as i64)
}

/// Strings as-is, numbers and `true` in their JSON spelling.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(numeric(&Value::deserialize(deserializer)?))
    } else {
        Option::<f64>::deserialize(deserializer)
    }
}

pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(integral(&Value::deserialize(deserializer)?))
    } else {
        Option::<i64>::deserialize(deserializer)
    }
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(truthy(&Value::deserialize(deserializer)?))
    } else {
        bool::deserialize(deserializer)
    }
}

pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(text(&Value::deserialize(deserializer)?))
    } else {
        Option::<String>::deserialize(deserializer)
    }
}

pub fn required_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(text(&Value::deserialize(deserializer)?).unwrap_or_default())
    } else {
        String::deserialize(deserializer)
    }
}

/// Only genuine strings; a number is not a file name.
pub fn strict_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    if deserializer.is_human_readable() {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Some(text),
            _ => None,
        })
    } else {
        Option::<String>::deserialize(deserializer)
    }
}

/// Rewrites an externally tagged request into the shape the typed enum
/// expects.
///
/// A bare tag names a request with an empty payload, a payload that is not
/// an object becomes `{}`, and tags without payloads drop whatever was
/// attached to them. Unknown tags pass through and fail later.
pub fn request_shape(value: Value, payload_tags: &[&str], unit_tags: &[&str]) -> Value {
    match value {
        Value::String(tag) if payload_tags.contains(&tag.as_str()) => {
            let mut map = Map::new();
            map.insert(tag, Value::Object(Map::new()));
            Value::Object(map)
        }
        Value::Object(map) if map.len() == 1 => {
            let Some((tag, payload)) = map.into_iter().next() else {
                return Value::Object(Map::new());
            };
            if unit_tags.contains(&tag.as_str()) {
                return Value::String(tag);
            }
            let payload = match payload {
                Value::Object(fields) if payload_tags.contains(&tag.as_str()) => {
                    Value::Object(fields)
                }
                _ if payload_tags.contains(&tag.as_str()) => Value::Object(Map::new()),
                other => other,
            };
            let mut map = Map::new();
            map.insert(tag, payload);
            Value::Object(map)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(numeric(&json!(12.5)), Some(12.5));
        assert_eq!(numeric(&json!(" 250 ")), Some(250.0));
        assert_eq!(numeric(&json!("")), Some(0.0));
        assert_eq!(numeric(&json!(true)), Some(1.0));
        assert_eq!(numeric(&json!("abc")), None);
        assert_eq!(numeric(&json!(null)), None);
        assert_eq!(numeric(&json!([1])), None);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(&json!(true)));
        assert!(truthy(&json!(1)));
        assert!(truthy(&json!("no")));
        assert!(truthy(&json!({})));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(!truthy(&json!(null)));
    }

    #[test]
    fn test_integral_and_text() {
        assert_eq!(integral(&json!("1")), Some(1));
        assert_eq!(integral(&json!(1.5)), None);
        assert_eq!(text(&json!(42)), Some("42".to_string()));
        assert_eq!(text(&json!(false)), None);
        assert_eq!(text(&json!({"a": 1})), None);
    }

    #[test]
    fn test_request_shape() {
        let payloads = ["join-room"];
        let units = ["restart"];
        assert_eq!(
            request_shape(json!("join-room"), &payloads, &units),
            json!({"join-room": {}})
        );
        assert_eq!(
            request_shape(json!({"join-room": null}), &payloads, &units),
            json!({"join-room": {}})
        );
        assert_eq!(
            request_shape(json!({"restart": {"now": true}}), &payloads, &units),
            json!("restart")
        );
        assert_eq!(
            request_shape(json!({"fly": 3}), &payloads, &units),
            json!({"fly": 3})
        );
    }
}
