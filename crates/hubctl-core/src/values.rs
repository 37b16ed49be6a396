//! Hub configuration values with deep merge support
//!
//! A hub's `config.yaml` is assembled from several layers (values file,
//! `--set` arguments, generated secrets). Each layer is a [`Values`] tree and
//! later layers win.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Values tree with deep merge capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create empty values
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse values from a YAML string; an empty document yields empty values
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::ValuesMerge {
                message: format!("values must be a mapping, got {}", type_name(&other)),
            }),
        }
    }

    /// Serialize to a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// Merge `overlay` on top; mappings merge key by key, anything else
    /// (scalars, sequences) is replaced wholesale
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Merge layers in order, lowest precedence first
    pub fn layered(layers: impl IntoIterator<Item = Values>) -> Self {
        let mut result = Values::new();
        for layer in layers {
            result.merge(&layer);
        }
        result
    }

    /// Set a value by dotted path (e.g., "proxy.secretToken")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        let parts: Vec<&str> = path.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(CoreError::ValuesMerge {
                message: format!("invalid key path '{}'", path),
            });
        }
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Value at a dotted path such as `proxy.secretToken`
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let parts: Vec<&str> = path.split('.').collect();
        get_nested(&self.0, &parts)
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            JsonValue::Object(map) => map.is_empty(),
            JsonValue::Null => true,
            _ => false,
        }
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    if let (JsonValue::Object(target), JsonValue::Object(layer)) = (&mut *base, overlay) {
        for (key, value) in layer {
            match target.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        return;
    }
    *base = overlay.clone();
}

fn set_nested(node: &mut JsonValue, path: &[&str], value: JsonValue) {
    let Some((key, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = JsonValue::Object(serde_json::Map::new());
    }
    if let JsonValue::Object(map) = node {
        let child = map.entry(key.to_string()).or_insert(JsonValue::Null);
        set_nested(child, rest, value);
    }
}

fn get_nested<'a>(root: &'a JsonValue, path: &[&str]) -> Option<&'a JsonValue> {
    path.iter()
        .try_fold(root, |node, key| node.as_object()?.get(*key))
}

/// Parse `--set key=value` arguments into a values tree
///
/// Values keep their YAML meaning (`true`, `2`, `[a, b]`); anything that is
/// not a plain scalar or a flow collection stays a string.
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();
    for arg in set_args {
        let (key, raw) = arg.split_once('=').ok_or_else(|| CoreError::ValuesMerge {
            message: format!("invalid --set argument '{}', expected key=value", arg),
        })?;
        values.set(key, parse_scalar(raw))?;
    }
    Ok(values)
}

fn parse_scalar(raw: &str) -> JsonValue {
    let literal = || JsonValue::String(raw.to_string());
    if raw.is_empty() {
        return literal();
    }
    match serde_yaml::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Null) if raw != "null" && raw != "~" => literal(),
        Ok(JsonValue::Object(_)) if !raw.starts_with('{') => literal(),
        Ok(value) => value,
        Err(_) => literal(),
    }
}
