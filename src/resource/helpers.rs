//! Field helpers shared by resource adapters

use crate::error::{ProviderError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Maximum number of tags ARM accepts on one resource
pub const MAX_TAGS: usize = 50;
pub const MAX_TAG_KEY_LENGTH: usize = 512;
pub const MAX_TAG_VALUE_LENGTH: usize = 256;

/// Canonical region name: "West Europe" and "westeurope" are the same region
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Check a tag map against ARM's limits
pub fn validate_tags(field: &str, tags: &Map<String, Value>) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(ProviderError::validation(
            field,
            format!("a maximum of {} tags can be applied to each resource", MAX_TAGS),
        ));
    }

    for (key, value) in tags {
        if key.len() > MAX_TAG_KEY_LENGTH {
            return Err(ProviderError::validation(
                field,
                format!("the maximum length for a tag key is {} characters: {:?}", MAX_TAG_KEY_LENGTH, key),
            ));
        }
        let Some(value) = value.as_str() else {
            return Err(ProviderError::validation(
                field,
                format!("the value of tag {:?} must be a string", key),
            ));
        };
        if value.len() > MAX_TAG_VALUE_LENGTH {
            return Err(ProviderError::validation(
                field,
                format!(
                    "the maximum length for a tag value is {} characters: {:?}",
                    MAX_TAG_VALUE_LENGTH, key
                ),
            ));
        }
    }

    Ok(())
}

/// Wire tags from the declarative `tags` attribute
pub fn expand_tags(tags: &BTreeMap<String, String>) -> Value {
    Value::Object(
        tags.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Declarative `tags` attribute from wire tags (absent tags become `{}`)
pub fn flatten_tags(tags: Option<&BTreeMap<String, String>>) -> Value {
    match tags {
        Some(tags) => expand_tags(tags),
        None => Value::Object(Map::new()),
    }
}

/// Accept a single-item block either as `[{...}]` or as `{...}`
pub fn single_block<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let item = match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Array(items) => {
            return Err(serde::de::Error::custom(format!(
                "expected exactly one block, found {}",
                items.len()
            )))
        }
        other => other,
    };
    serde_json::from_value(item).map_err(serde::de::Error::custom)
}

/// Deserialize the declarative attributes into an adapter's config type
pub fn decode_config<T: DeserializeOwned>(attributes: &Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(attributes.clone()))
        .map_err(|e| ProviderError::validation("config", e.to_string()))
}
