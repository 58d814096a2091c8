//! Lenient deserializers for payloads written by a model or a browser.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept strings, numbers, booleans, and lists of strings as a string.
///
/// Lists are concatenated, so `["A", "C"]` becomes `"AC"` which is how
/// multiple-choice answers are stored.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(value).map_err(de::Error::custom)
}

fn value_to_string(value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .collect::<Result<Vec<_>, _>>()
            .map(|parts| parts.concat()),
        Value::Object(_) => Err("expected a string, number or list, found an object".to_string()),
    }
}

/// Accept a list whose items are anything [`lenient_string`] accepts.
/// `null` is an empty list and a lone scalar is a one-item list.
pub(crate) fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(value_to_string)
            .collect::<Result<Vec<_>, _>>()
            .map_err(de::Error::custom),
        other => value_to_string(other).map(|s| vec![s]).map_err(de::Error::custom),
    }
}

/// Like [`lenient_string`], but `null` and empty strings become `None`.
pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = value_to_string(value).map_err(de::Error::custom)?;
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Accept an integer given either as a JSON number or as a numeric string.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom(format!("integer out of range: {n}"))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| de::Error::custom(format!("invalid integer '{s}': {e}"))),
        other => Err(de::Error::custom(format!("expected an integer, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Lenient {
        #[serde(default, deserialize_with = "lenient_string")]
        text: String,
        #[serde(default, deserialize_with = "lenient_i64")]
        number: i64,
        #[serde(default, deserialize_with = "null_as_default")]
        list: Vec<String>,
        #[serde(default, deserialize_with = "lenient_opt_string")]
        maybe: Option<String>,
        #[serde(default, deserialize_with = "lenient_string_list")]
        options: Vec<String>,
    }

    #[test]
    fn test_lenient_string_variants() {
        let p: Lenient = serde_json::from_value(json!({"text": 5})).unwrap();
        assert_eq!(p.text, "5");
        let p: Lenient = serde_json::from_value(json!({"text": ["A", "C"]})).unwrap();
        assert_eq!(p.text, "AC");
        let p: Lenient = serde_json::from_value(json!({"text": null})).unwrap();
        assert_eq!(p.text, "");
        assert!(serde_json::from_value::<Lenient>(json!({"text": {"a": 1}})).is_err());
    }

    #[test]
    fn test_lenient_i64_accepts_numeric_strings() {
        let p: Lenient = serde_json::from_value(json!({"number": "12"})).unwrap();
        assert_eq!(p.number, 12);
        let p: Lenient = serde_json::from_value(json!({"number": -1})).unwrap();
        assert_eq!(p.number, -1);
        assert!(serde_json::from_value::<Lenient>(json!({"number": "x"})).is_err());
    }

    #[test]
    fn test_lenient_opt_string() {
        let p: Lenient = serde_json::from_value(json!({"maybe": 7})).unwrap();
        assert_eq!(p.maybe.as_deref(), Some("7"));
        let p: Lenient = serde_json::from_value(json!({"maybe": ""})).unwrap();
        assert_eq!(p.maybe, None);
        let p: Lenient = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.maybe, None);
    }

    #[test]
    fn test_lenient_string_list() {
        let p: Lenient = serde_json::from_value(json!({"options": ["A", 2, true]})).unwrap();
        assert_eq!(p.options, vec!["A", "2", "true"]);
        let p: Lenient = serde_json::from_value(json!({"options": null})).unwrap();
        assert!(p.options.is_empty());
        let p: Lenient = serde_json::from_value(json!({"options": "only"})).unwrap();
        assert_eq!(p.options, vec!["only"]);
    }

    #[test]
    fn test_null_list_becomes_empty() {
        let p: Lenient = serde_json::from_value(json!({"list": null})).unwrap();
        assert!(p.list.is_empty());
    }
}
