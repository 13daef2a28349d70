use crate::error::ConfigError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// A node's raw JSON config, tagged with the node type for error messages.
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig<'a> {
    node_type: &'a str,
    value: &'a JsonValue,
}

impl<'a> NodeConfig<'a> {
    pub fn new(node_type: &'a str, value: &'a JsonValue) -> Self {
        Self { node_type, value }
    }

    pub fn node_type(&self) -> &str {
        self.node_type
    }

    pub fn raw(&self) -> &'a JsonValue {
        self.value
    }

    pub fn get(&self, key: &str) -> Option<&'a JsonValue> {
        self.value.get(key)
    }

    /// Deserializes the config into the node type's typed options.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        T::deserialize(self.value).map_err(|e| ConfigError::Malformed {
            node_type: self.node_type.to_string(),
            message: e.to_string(),
        })
    }
}

/// A config field that takes either a single value or a list of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Shorthand for semantic config checks.
pub fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}
