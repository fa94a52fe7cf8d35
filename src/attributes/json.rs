//! JSON wire format for attribute dictionaries.
//!
//! `AttrDictJSON` maps each key to either a list of scalars (a finite set)
//! or one of the three universal-set tag strings (`"IntegerSet"`,
//! `"StringSet"`, `"BooleanSet"`). This module is the only place that
//! knows about that wire shape; domain code never serializes
//! [`super::AttrDict`] directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::{AttrDict, AttrValueSet, Value};

/// Raw wire representation of an attribute dictionary: `{ key: [..] |
/// "IntegerSet" | "StringSet" | "BooleanSet" }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttrDictJson(pub BTreeMap<String, Json>);

/// Errors converting between the JSON wire shape and [`AttrDict`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttrJsonError {
    #[error("attribute '{key}' has an unrecognized tag '{tag}' (expected IntegerSet, StringSet, or BooleanSet)")]
    UnknownTag { key: String, tag: String },

    #[error("attribute '{key}' is neither a list nor a recognized tag string")]
    InvalidShape { key: String },

    #[error("attribute '{key}' list element is not a string, integer, or boolean scalar")]
    InvalidScalar { key: String },
}

impl TryFrom<AttrDictJson> for AttrDict {
    type Error = AttrJsonError;

    fn try_from(raw: AttrDictJson) -> Result<Self, Self::Error> {
        let mut dict = AttrDict::new();
        for (key, value) in raw.0 {
            let set = match &value {
                Json::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(scalar_from_json(&key, item)?);
                    }
                    AttrValueSet::finite(values)
                }
                Json::String(tag) => match tag.as_str() {
                    "IntegerSet" => AttrValueSet::IntegerSet { universal: true },
                    "StringSet" => AttrValueSet::RegexSet { universal: true },
                    "BooleanSet" => AttrValueSet::BooleanSet,
                    other => {
                        return Err(AttrJsonError::UnknownTag {
                            key,
                            tag: other.to_string(),
                        })
                    }
                },
                _ => return Err(AttrJsonError::InvalidShape { key }),
            };
            dict.insert(key, set);
        }
        Ok(dict)
    }
}

fn scalar_from_json(key: &str, item: &Json) -> Result<Value, AttrJsonError> {
    match item {
        Json::String(s) => Ok(Value::Str(s.clone())),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| AttrJsonError::InvalidScalar { key: key.to_string() }),
        _ => Err(AttrJsonError::InvalidScalar { key: key.to_string() }),
    }
}

impl From<&AttrDict> for AttrDictJson {
    fn from(dict: &AttrDict) -> Self {
        let mut raw = BTreeMap::new();
        for (key, set) in &dict.0 {
            let value = match set {
                AttrValueSet::Finite(values) => {
                    Json::Array(values.iter().map(scalar_to_json).collect())
                }
                AttrValueSet::IntegerSet { universal: true } => Json::String("IntegerSet".into()),
                AttrValueSet::RegexSet { universal: true } => Json::String("StringSet".into()),
                AttrValueSet::BooleanSet => Json::String("BooleanSet".into()),
                AttrValueSet::IntegerSet { universal: false } => Json::Array(vec![]),
                AttrValueSet::RegexSet { universal: false } => Json::Array(vec![]),
            };
            raw.insert(key.clone(), value);
        }
        AttrDictJson(raw)
    }
}

fn scalar_to_json(value: &Value) -> Json {
    match value {
        Value::Str(s) => Json::String(s.clone()),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Bool(b) => Json::Bool(*b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_list_round_trips() {
        let raw: AttrDictJson = serde_json::from_str(r#"{"color": ["red", "blue"]}"#).unwrap();
        let dict = AttrDict::try_from(raw).unwrap();
        assert_eq!(
            dict.get("color").unwrap(),
            &AttrValueSet::finite([Value::Str("red".into()), Value::Str("blue".into())])
        );
        let back = AttrDictJson::from(&dict);
        assert_eq!(back.0.get("color").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn universal_tags_round_trip() {
        let raw: AttrDictJson =
            serde_json::from_str(r#"{"n": "IntegerSet", "s": "StringSet"}"#).unwrap();
        let dict = AttrDict::try_from(raw).unwrap();
        assert!(dict.get("n").unwrap().is_universal());
        assert!(dict.get("s").unwrap().is_universal());
    }

    #[test]
    fn unknown_tag_is_an_error() {
        let raw: AttrDictJson = serde_json::from_str(r#"{"n": "FloatSet"}"#).unwrap();
        assert!(matches!(
            AttrDict::try_from(raw),
            Err(AttrJsonError::UnknownTag { .. })
        ));
    }
}
