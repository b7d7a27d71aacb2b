//! Resource Registry - Load resource schemas from JSON
//!
//! Every managed resource type declares its attributes in an embedded JSON
//! file. The schema drives validation and defaulting before any adapter
//! touches the network.

use super::data::ResourceData;
use super::helpers::{normalize_location, validate_tags};
use crate::error::{ProviderError, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/resource_group.json"),
    include_str!("../resources/mysql.json"),
    include_str!("../resources/key_vault.json"),
];

/// Attribute value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Map,
    Block,
}

impl FieldType {
    fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Int => "an integer",
            Self::Bool => "a boolean",
            Self::Map => "a map of strings",
            Self::Block => "a block",
        }
    }
}

/// Value normalization applied before comparing desired and observed state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Normalize {
    Location,
}

/// Named validators beyond type and allow-list checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validator {
    Tags,
}

/// Field definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    /// Set by the remote side; never user-supplied
    #[serde(default)]
    pub computed: bool,
    /// Changing the value replaces the resource
    #[serde(default)]
    pub force_new: bool,
    /// Never printed or logged
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default)]
    pub allowed: Vec<String>,
    #[serde(default)]
    pub allowed_ints: Vec<i64>,
    /// Allow-list matching and diffing ignore case
    #[serde(default)]
    pub ignore_case: bool,
    #[serde(default)]
    pub normalize: Option<Normalize>,
    #[serde(default)]
    pub validate: Option<Validator>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Nested fields of a block
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
}

impl FieldDef {
    fn is_output_only(&self) -> bool {
        self.computed && !self.required && !self.optional
    }
}

/// Resource schema from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSchema {
    pub display_name: String,
    pub service: String,
    pub fields: BTreeMap<String, FieldDef>,
}

impl ResourceSchema {
    /// Look up a field by dotted path, e.g. `sku.name`
    pub fn field(&self, path: &str) -> Option<&FieldDef> {
        let mut parts = path.split('.');
        let mut def = self.fields.get(parts.next()?)?;
        for part in parts {
            def = def.fields.get(part)?;
        }
        Some(def)
    }

    /// Reject a desired state that the remote API would refuse anyway
    pub fn validate(&self, d: &ResourceData) -> Result<()> {
        validate_fields(&self.fields, d.attributes(), "")
    }

    /// Fill in declared defaults for unset optional fields
    pub fn apply_defaults(&self, d: &mut ResourceData) {
        for (name, def) in &self.fields {
            if let Some(default) = &def.default {
                if d.get(name).is_none() {
                    d.set(name, default.clone());
                }
            }
        }
    }

    /// Whether two values of a field describe the same remote state
    pub fn equivalent(&self, path: &str, a: &Value, b: &Value) -> bool {
        let Some(def) = self.field(path) else {
            return a == b;
        };

        match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) if def.normalize == Some(Normalize::Location) => {
                normalize_location(x) == normalize_location(y)
            }
            (Some(x), Some(y)) if def.ignore_case => x.eq_ignore_ascii_case(y),
            _ => a == b,
        }
    }

    /// Top-level fields whose change forces replacement
    pub fn force_new_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, def)| def.force_new)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Copy of the attributes with sensitive values masked
    pub fn redact(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        attributes
            .iter()
            .map(|(k, v)| {
                let sensitive = self.fields.get(k).map(|f| f.sensitive).unwrap_or(false);
                if sensitive && !v.is_null() {
                    (k.clone(), Value::String("(sensitive)".to_string()))
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect()
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_fields(
    fields: &BTreeMap<String, FieldDef>,
    attributes: &Map<String, Value>,
    prefix: &str,
) -> Result<()> {
    for key in attributes.keys() {
        if !fields.contains_key(key) && !(prefix.is_empty() && key == "id") {
            return Err(ProviderError::validation(
                join_path(prefix, key),
                "unsupported argument",
            ));
        }
    }

    for (name, def) in fields {
        if def.is_output_only() {
            continue;
        }
        let path = join_path(prefix, name);
        match attributes.get(name).filter(|v| !v.is_null()) {
            Some(value) => validate_value(&path, def, value)?,
            None if def.required => {
                return Err(ProviderError::validation(path, "the argument is required"));
            }
            None => {}
        }
    }

    Ok(())
}

fn validate_value(path: &str, def: &FieldDef, value: &Value) -> Result<()> {
    let wrong_type = || {
        ProviderError::validation(path, format!("expected {}", def.field_type.describe()))
    };

    match def.field_type {
        FieldType::String => {
            let s = value.as_str().ok_or_else(wrong_type)?;
            if !def.allowed.is_empty() {
                let ok = def.allowed.iter().any(|a| {
                    if def.ignore_case {
                        a.eq_ignore_ascii_case(s)
                    } else {
                        a == s
                    }
                });
                if !ok {
                    return Err(ProviderError::validation(
                        path,
                        format!("expected one of {:?}, got {:?}", def.allowed, s),
                    ));
                }
            }
        }
        FieldType::Int => {
            let n = value.as_i64().ok_or_else(wrong_type)?;
            if !def.allowed_ints.is_empty() && !def.allowed_ints.contains(&n) {
                return Err(ProviderError::validation(
                    path,
                    format!("expected one of {:?}, got {}", def.allowed_ints, n),
                ));
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                return Err(wrong_type());
            }
        }
        FieldType::Map => {
            let map = value.as_object().ok_or_else(wrong_type)?;
            match def.validate {
                Some(Validator::Tags) => validate_tags(path, map)?,
                None => {
                    if map.values().any(|v| !v.is_string()) {
                        return Err(wrong_type());
                    }
                }
            }
        }
        FieldType::Block => {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                Value::Object(_) => vec![value],
                _ => return Err(wrong_type()),
            };
            if def.required && items.is_empty() {
                return Err(ProviderError::validation(path, "at least one block is required"));
            }
            if let Some(max) = def.max_items {
                if items.len() > max {
                    return Err(ProviderError::validation(
                        path,
                        format!("at most {} block(s) allowed, got {}", max, items.len()),
                    ));
                }
            }
            for item in items {
                let obj = item.as_object().ok_or_else(wrong_type)?;
                validate_fields(&def.fields, obj, path)?;
            }
        }
    }

    Ok(())
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceSchema>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the schema registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource schema by type name
pub fn get_schema(type_name: &str) -> Option<&'static ResourceSchema> {
    get_registry().resources.get(type_name)
}

/// All declared resource type names, sorted
pub fn get_all_resource_types() -> Vec<&'static str> {
    let mut types: Vec<&'static str> = get_registry()
        .resources
        .keys()
        .map(|s| s.as_str())
        .collect();
    types.sort_unstable();
    types
}
