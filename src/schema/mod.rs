//! Resource schemas: the configuration shape each resource accepts
//!
//! A `Schema` validates a JSON configuration object, applies defaults
//! (recursively, inside nested blocks too) and reports every problem it finds
//! rather than stopping at the first one.

mod resource_data;

pub use resource_data::{block_bool, block_str, ResourceData};

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Configuration problems found while validating against a schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("configuration must be an object")]
    NotAnObject,

    #[error("{0}: unknown attribute")]
    UnknownAttribute(String),

    #[error("{0}: required attribute is missing")]
    MissingRequired(String),

    #[error("{0}: attribute is computed and cannot be set")]
    ComputedOnly(String),

    #[error("{path}: expected {expected}")]
    TypeMismatch { path: String, expected: &'static str },

    #[error("{path}: '{value}' is not one of {allowed:?}")]
    NotOneOf {
        path: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("{path}: {count} items given, expected between {min} and {max}")]
    ItemCount {
        path: String,
        count: usize,
        min: usize,
        max: usize,
    },
}

/// Value type of an attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "block", rename_all = "snake_case")]
pub enum AttrKind {
    String,
    Bool,
    Int,
    StringList,
    /// Ordered list of nested blocks
    BlockList(Schema),
    /// Unordered set of nested blocks
    BlockSet(Schema),
}

impl AttrKind {
    fn expected(&self) -> &'static str {
        match self {
            AttrKind::String => "a string",
            AttrKind::Bool => "a bool",
            AttrKind::Int => "an integer",
            AttrKind::StringList => "a list of strings",
            AttrKind::BlockList(_) | AttrKind::BlockSet(_) => "a list of blocks",
        }
    }
}

/// A single configuration attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(flatten)]
    pub kind: AttrKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl Attribute {
    fn of(kind: AttrKind) -> Self {
        Self {
            kind,
            description: None,
            required: false,
            optional: true,
            computed: false,
            default: None,
            force_new: false,
            sensitive: false,
            one_of: Vec::new(),
            min_items: None,
            max_items: None,
        }
    }

    pub fn string() -> Self {
        Self::of(AttrKind::String)
    }

    pub fn bool() -> Self {
        Self::of(AttrKind::Bool)
    }

    pub fn int() -> Self {
        Self::of(AttrKind::Int)
    }

    pub fn string_list() -> Self {
        Self::of(AttrKind::StringList)
    }

    pub fn block_list(block: Schema) -> Self {
        Self::of(AttrKind::BlockList(block))
    }

    pub fn block_set(block: Schema) -> Self {
        Self::of(AttrKind::BlockSet(block))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Required when `required` is true, optional otherwise
    pub fn required_if(self, required: bool) -> Self {
        if required {
            self.required()
        } else {
            self
        }
    }

    /// Set by the server only
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self.required = false;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.one_of = allowed.iter().map(|s| (*s).to_string()).collect();
        self
    }

    pub fn min_items(mut self, min: usize) -> Self {
        self.min_items = Some(min);
        self
    }

    pub fn max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }

    /// Shorthand for the single-item blocks used for scripts and app pools
    pub fn single(self) -> Self {
        self.min_items(1).max_items(1)
    }
}

/// Ordered set of named attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`
    pub fn with(mut self, name: &str, attribute: Attribute) -> Self {
        self.insert(name, attribute);
        self
    }

    pub fn insert(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.attributes.iter()
    }

    /// Validate a configuration object and apply defaults
    pub fn validate(&self, config: &Value) -> Result<Map<String, Value>, Vec<SchemaError>> {
        let Some(object) = config.as_object() else {
            return Err(vec![SchemaError::NotAnObject]);
        };

        let mut errors = Vec::new();
        let validated = self.validate_object(object, "", &mut errors);

        if errors.is_empty() {
            Ok(validated)
        } else {
            Err(errors)
        }
    }

    fn validate_object(
        &self,
        object: &Map<String, Value>,
        prefix: &str,
        errors: &mut Vec<SchemaError>,
    ) -> Map<String, Value> {
        let mut out = Map::new();

        for key in object.keys() {
            if !self.attributes.contains_key(key) {
                errors.push(SchemaError::UnknownAttribute(join_path(prefix, key)));
            }
        }

        for (name, attribute) in &self.attributes {
            let path = join_path(prefix, name);
            let value = object.get(name).filter(|v| !v.is_null());

            match value {
                Some(_) if attribute.computed && !attribute.optional => {
                    errors.push(SchemaError::ComputedOnly(path));
                }
                Some(value) => {
                    if let Some(coerced) = attribute.coerce(value, &path, errors) {
                        out.insert(name.clone(), coerced);
                    }
                }
                None if attribute.required => errors.push(SchemaError::MissingRequired(path)),
                None => {
                    if let Some(default) = &attribute.default {
                        out.insert(name.clone(), default.clone());
                    }
                }
            }
        }

        out
    }

    /// Attributes marked force-new whose value differs between two states
    pub fn force_new_changes(&self, prior: &ResourceData, planned: &ResourceData) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attribute)| attribute.force_new)
            .filter(|(name, _)| prior.get(name) != planned.get(name))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl Attribute {
    /// Check a value's type and constraints, returning it in canonical form
    fn coerce(&self, value: &Value, path: &str, errors: &mut Vec<SchemaError>) -> Option<Value> {
        let mismatch = |errors: &mut Vec<SchemaError>| {
            errors.push(SchemaError::TypeMismatch {
                path: path.to_string(),
                expected: self.kind.expected(),
            });
            None
        };

        match &self.kind {
            AttrKind::String => {
                let Some(s) = value.as_str() else {
                    return mismatch(errors);
                };
                if !self.one_of.is_empty() && !self.one_of.iter().any(|allowed| allowed == s) {
                    errors.push(SchemaError::NotOneOf {
                        path: path.to_string(),
                        value: s.to_string(),
                        allowed: self.one_of.clone(),
                    });
                    return None;
                }
                Some(value.clone())
            }
            AttrKind::Bool => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) => match s.to_ascii_lowercase().as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => mismatch(errors),
                },
                _ => mismatch(errors),
            },
            AttrKind::Int => match value {
                Value::Number(n) if n.is_i64() => Some(value.clone()),
                Value::String(s) => match s.parse::<i64>() {
                    Ok(n) => Some(Value::from(n)),
                    Err(_) => mismatch(errors),
                },
                _ => mismatch(errors),
            },
            AttrKind::StringList => {
                let Some(items) = value.as_array() else {
                    return mismatch(errors);
                };
                if items.iter().any(|item| !item.is_string()) {
                    return mismatch(errors);
                }
                self.check_count(items.len(), path, errors);
                Some(value.clone())
            }
            AttrKind::BlockList(block) | AttrKind::BlockSet(block) => {
                // A lone object is accepted as a one-item block list
                let items = match value {
                    Value::Array(items) => items.clone(),
                    Value::Object(_) => vec![value.clone()],
                    _ => return mismatch(errors),
                };
                self.check_count(items.len(), path, errors);

                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, index);
                    match item.as_object() {
                        Some(object) => {
                            out.push(Value::Object(block.validate_object(
                                object, &item_path, errors,
                            )));
                        }
                        None => {
                            errors.push(SchemaError::TypeMismatch {
                                path: item_path,
                                expected: "a block",
                            });
                        }
                    }
                }
                Some(Value::Array(out))
            }
        }
    }

    fn check_count(&self, count: usize, path: &str, errors: &mut Vec<SchemaError>) {
        let min = self.min_items.unwrap_or(0);
        let max = self.max_items.unwrap_or(usize::MAX);
        if count < min || count > max {
            errors.push(SchemaError::ItemCount {
                path: path.to_string(),
                count,
                min,
                max,
            });
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
