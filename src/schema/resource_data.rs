//! Resource data: the id and attribute values of one resource instance

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Schema, SchemaError};

/// Configuration plus computed state for one resource
///
/// Serialises to the state-file format `{"id": "...", "attributes": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl ResourceData {
    /// Wrap a JSON object of attributes; anything else yields no attributes
    pub fn from_attributes(attributes: Value) -> Self {
        Self {
            id: None,
            attributes: match attributes {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// Validate configuration for a new resource
    pub fn from_config(schema: &Schema, config: &Value) -> Result<Self, Vec<SchemaError>> {
        Ok(Self {
            id: None,
            attributes: schema.validate(config)?,
        })
    }

    /// Validate new configuration for an existing resource
    ///
    /// The id and computed attributes carry over from prior state.
    pub fn plan(
        schema: &Schema,
        config: &Value,
        prior: &ResourceData,
    ) -> Result<Self, Vec<SchemaError>> {
        let mut planned = Self::from_config(schema, config)?;
        planned.id = prior.id.clone();

        for (name, attribute) in schema.iter() {
            if attribute.computed && !planned.attributes.contains_key(name) {
                if let Some(value) = prior.attributes.get(name) {
                    planned.attributes.insert(name.clone(), value.clone());
                }
            }
        }

        Ok(planned)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Mark the resource as gone
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key).filter(|v| !v.is_null())
    }

    /// Get a value only when it is set to something other than its zero value
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.get(key).filter(|value| match value {
            Value::String(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64() != Some(0.0),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::Null => false,
        })
    }

    /// String value, or "" when unset
    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or("")
    }

    /// Non-empty string value
    pub fn get_str_ok(&self, key: &str) -> Option<&str> {
        self.get_ok(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_i64(&self, key: &str) -> i64 {
        self.get(key).and_then(Value::as_i64).unwrap_or(0)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All blocks of a block list or set
    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        self.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }

    /// The first block of a single-item block set
    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get_blocks(key).into_iter().next()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) {
        self.attributes.remove(key);
    }
}

/// String field of a block, or "" when unset
pub fn block_str<'a>(block: &'a Map<String, Value>, key: &str) -> &'a str {
    block.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Bool field of a block, or false when unset
pub fn block_bool(block: &Map<String, Value>, key: &str) -> bool {
    block.get(key).and_then(Value::as_bool).unwrap_or(false)
}
