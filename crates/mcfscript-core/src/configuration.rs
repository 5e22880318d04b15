//! Tree-structured configuration data and its JSON form.
//!
//! A [`Configuration`] is an ordered list of [`ConfigurationNode`]s; each node
//! has a type, an optional scalar value, named string attributes and ordered
//! children of its own. This is the shape of every request and response body
//! exchanged with the crawler's REST API.
//!
//! Children are held through shared [`NodeHandle`]s so that a script
//! reference to `x[0]` mutates the node that lives inside `x`.
//!
//! # JSON mapping
//!
//! - A container (configuration or node) emits one key per child type; several
//!   children of the same type become an array under that key.
//! - A node with no attributes and no children is just its value as a string.
//! - Otherwise a node is an object with `_value_`, `_attribute_<name>` keys and
//!   its own children.
//! - When children of different types interleave, the container emits
//!   `_children_`, an array of node objects each tagged with `_type_`, so that
//!   order survives the round trip.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ScriptError;
use crate::token::quote;

const VALUE_KEY: &str = "_value_";
const TYPE_KEY: &str = "_type_";
const CHILDREN_KEY: &str = "_children_";
const ATTRIBUTE_PREFIX: &str = "_attribute_";

pub type NodeHandle = Rc<RefCell<ConfigurationNode>>;
pub type ConfigurationHandle = Rc<RefCell<Configuration>>;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected JSON structure: {0}")]
    Shape(String),
}

impl From<ConfigurationError> for ScriptError {
    fn from(e: ConfigurationError) -> Self {
        ScriptError::type_error(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationNode {
    pub node_type: String,
    pub value: Option<String>,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<NodeHandle>,
}

impl ConfigurationNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: ConfigurationNode) -> Self {
        self.children.push(child.into_handle());
        self
    }

    pub fn into_handle(self) -> NodeHandle {
        Rc::new(RefCell::new(self))
    }

    /// Copies this node and all of its descendants into fresh handles.
    pub fn deep_copy(&self) -> ConfigurationNode {
        ConfigurationNode {
            node_type: self.node_type.clone(),
            value: self.value.clone(),
            attributes: self.attributes.clone(),
            children: deep_copy_children(&self.children),
        }
    }

    /// `<< "type" : "value" : "a"="v", ... : child, ... >>`
    pub fn script_text(&self) -> String {
        let value = self.value.as_deref().map(quote).unwrap_or_default();
        let attributes = self
            .attributes
            .iter()
            .map(|(name, value)| format!("{}={}", quote(name), quote(value)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "<< {} : {} : {} : {} >>",
            quote(&self.node_type),
            value,
            attributes,
            children_script_text(&self.children)
        )
    }

    fn to_json(&self) -> Value {
        if self.attributes.is_empty() && self.children.is_empty() {
            Value::String(self.value.clone().unwrap_or_default())
        } else {
            Value::Object(self.to_json_object())
        }
    }

    fn to_json_object(&self) -> Map<String, Value> {
        let mut object = Map::new();
        if let Some(value) = &self.value {
            object.insert(VALUE_KEY.to_string(), Value::String(value.clone()));
        }
        for (name, value) in &self.attributes {
            object.insert(format!("{}{}", ATTRIBUTE_PREFIX, name), Value::String(value.clone()));
        }
        children_to_json(&self.children, &mut object);
        object
    }

    fn from_json(node_type: &str, json: &Value) -> Result<ConfigurationNode, ConfigurationError> {
        let mut node = ConfigurationNode::new(node_type);
        match json {
            Value::Object(object) => {
                for (key, value) in object {
                    if key == VALUE_KEY {
                        node.value = scalar_text(value)?;
                    } else if let Some(name) = key.strip_prefix(ATTRIBUTE_PREFIX) {
                        if let Some(text) = scalar_text(value)? {
                            node.attributes.insert(name.to_string(), text);
                        }
                    }
                }
                children_from_json(object, &mut node.children)?;
            }
            Value::Array(_) => {
                return Err(ConfigurationError::Shape(format!(
                    "nested array under '{}'",
                    node_type
                )))
            }
            scalar => node.value = scalar_text(scalar)?,
        }
        Ok(node)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub children: Vec<NodeHandle>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, child: ConfigurationNode) -> Self {
        self.children.push(child.into_handle());
        self
    }

    pub fn into_handle(self) -> ConfigurationHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn deep_copy(&self) -> Configuration {
        Configuration {
            children: deep_copy_children(&self.children),
        }
    }

    /// `{ child, ... }`
    pub fn script_text(&self) -> String {
        format!("{{ {} }}", children_script_text(&self.children))
    }

    pub fn to_json(&self) -> String {
        let mut object = Map::new();
        children_to_json(&self.children, &mut object);
        Value::Object(object).to_string()
    }

    /// Parses a response body. Blank input is an empty configuration.
    pub fn from_json(text: &str) -> Result<Configuration, ConfigurationError> {
        let mut configuration = Configuration::new();
        if text.trim().is_empty() {
            return Ok(configuration);
        }
        match serde_json::from_str::<Value>(text)? {
            Value::Object(object) => {
                children_from_json(&object, &mut configuration.children)?;
                Ok(configuration)
            }
            other => Err(ConfigurationError::Shape(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Fails when adopting `child` under `parent` would make a node its own
/// ancestor.
pub(crate) fn ensure_not_ancestor(parent: &NodeHandle, child: &NodeHandle) -> Result<(), ScriptError> {
    if subtree_contains(child, parent) {
        return Err(ScriptError::reference(
            "Cannot make a configurationnode a child of itself",
        ));
    }
    Ok(())
}

fn subtree_contains(root: &NodeHandle, target: &NodeHandle) -> bool {
    Rc::ptr_eq(root, target)
        || root
            .borrow()
            .children
            .iter()
            .any(|child| subtree_contains(child, target))
}

fn deep_copy_children(children: &[NodeHandle]) -> Vec<NodeHandle> {
    children
        .iter()
        .map(|child| child.borrow().deep_copy().into_handle())
        .collect()
}

fn children_script_text(children: &[NodeHandle]) -> String {
    children
        .iter()
        .map(|child| child.borrow().script_text())
        .collect::<Vec<_>>()
        .join(", ")
}

/// True when some type reappears after a different type has intervened.
fn types_interleave(children: &[NodeHandle]) -> bool {
    let mut seen = HashSet::new();
    let mut last: Option<String> = None;
    for child in children {
        let node_type = child.borrow().node_type.clone();
        if last.as_deref() != Some(node_type.as_str()) {
            if !seen.insert(node_type.clone()) {
                return true;
            }
            last = Some(node_type);
        }
    }
    false
}

fn children_to_json(children: &[NodeHandle], object: &mut Map<String, Value>) {
    if types_interleave(children) {
        let tagged = children
            .iter()
            .map(|child| {
                let child = child.borrow();
                let mut entry = child.to_json_object();
                entry.insert(TYPE_KEY.to_string(), Value::String(child.node_type.clone()));
                Value::Object(entry)
            })
            .collect();
        object.insert(CHILDREN_KEY.to_string(), Value::Array(tagged));
        return;
    }

    let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();
    for child in children {
        let child = child.borrow();
        groups
            .entry(child.node_type.clone())
            .or_default()
            .push(child.to_json());
    }
    for (node_type, mut values) in groups {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        object.insert(node_type, value);
    }
}

fn children_from_json(
    object: &Map<String, Value>,
    children: &mut Vec<NodeHandle>,
) -> Result<(), ConfigurationError> {
    for (key, value) in object {
        if key == VALUE_KEY || key == TYPE_KEY || key.starts_with(ATTRIBUTE_PREFIX) {
            continue;
        }
        if key == CHILDREN_KEY {
            let Value::Array(entries) = value else {
                return Err(ConfigurationError::Shape("_children_ must be an array".into()));
            };
            for entry in entries {
                let node_type = entry
                    .get(TYPE_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| ConfigurationError::Shape("child without _type_".into()))?;
                children.push(ConfigurationNode::from_json(node_type, entry)?.into_handle());
            }
            continue;
        }
        match value {
            Value::Array(items) => {
                for item in items {
                    children.push(ConfigurationNode::from_json(key, item)?.into_handle());
                }
            }
            single => children.push(ConfigurationNode::from_json(key, single)?.into_handle()),
        }
    }
    Ok(())
}

fn scalar_text(value: &Value) -> Result<Option<String>, ConfigurationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(ConfigurationError::Shape(format!(
            "expected a scalar, found {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
