//! Script values.
//!
//! [`Variable`] is a closed set of variants. Scalars are held by value;
//! containers (arrays, dictionaries, configurations, nodes, HTTP results) are
//! shared handles, so assigning one to a second name aliases it the way the
//! scripts expect. Operations a variant does not support fail with a
//! [`ScriptError`] of kind `Type` rather than being absent from the API.
//!
//! # Example
//!
//! ```
//! use mcfscript_core::variable::Variable;
//!
//! let v = Variable::Float(2.0);
//! assert_eq!(v.to_string_value().unwrap(), "2.0");
//! assert_eq!(v.to_int().unwrap(), 2);
//! assert!(Variable::Boolean(true).to_int().is_err());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::configuration::{ensure_not_ancestor, Configuration, ConfigurationHandle, ConfigurationNode, NodeHandle};
use crate::error::ScriptError;
use crate::http::HttpResult;
use crate::reference::{ChildOwner, Slot, VariableReference};
use crate::token::quote;

pub type ArrayHandle = Rc<RefCell<Vec<Slot>>>;
pub type DictionaryHandle = Rc<RefCell<HashMap<DictionaryKey, Slot>>>;

/// A dictionary key: the canonical text of a scalar, so `d[1]`, `d['1']`
/// and `d[new url '1']` name the same entry. Floats key by their script text
/// (`2.0`) and nodes by their value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DictionaryKey(String);

impl DictionaryKey {
    pub fn from_variable(value: &Variable) -> Result<DictionaryKey, ScriptError> {
        match value {
            Variable::Array(_) | Variable::Dictionary(_) | Variable::Configuration(_) | Variable::Result(_) => {
                Err(ScriptError::unsupported("Dictionary key", value.type_name()))
            }
            scalar => scalar.to_string_value().map(DictionaryKey),
        }
    }
}

impl fmt::Display for DictionaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Variable {
    String(String),
    Int(i64),
    Float(f64),
    Boolean(bool),
    /// Absolute or relative URL text; `+` appends an encoded path segment.
    Url(String),
    /// An unencoded connection name, escaped when appended to a URL.
    ConnectionName(String),
    Array(ArrayHandle),
    Dictionary(DictionaryHandle),
    Configuration(ConfigurationHandle),
    ConfigurationNode(NodeHandle),
    Result(Rc<HttpResult>),
}

impl Variable {
    pub fn array(items: Vec<Option<Variable>>) -> Variable {
        Variable::Array(Rc::new(RefCell::new(items.into_iter().map(Slot::new).collect())))
    }

    pub fn dictionary() -> Variable {
        Variable::Dictionary(Rc::new(RefCell::new(HashMap::new())))
    }

    pub fn configuration(configuration: Configuration) -> Variable {
        Variable::Configuration(configuration.into_handle())
    }

    pub fn node(node: ConfigurationNode) -> Variable {
        Variable::ConfigurationNode(node.into_handle())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Variable::String(_) => "string",
            Variable::Int(_) => "integer",
            Variable::Float(_) => "float",
            Variable::Boolean(_) => "boolean",
            Variable::Url(_) => "url",
            Variable::ConnectionName(_) => "connectionname",
            Variable::Array(_) => "array",
            Variable::Dictionary(_) => "dictionary",
            Variable::Configuration(_) => "configuration",
            Variable::ConfigurationNode(_) => "configurationnode",
            Variable::Result(_) => "result",
        }
    }

    pub fn to_string_value(&self) -> Result<String, ScriptError> {
        match self {
            Variable::String(s) | Variable::Url(s) | Variable::ConnectionName(s) => Ok(s.clone()),
            Variable::Int(i) => Ok(i.to_string()),
            Variable::Float(f) => Ok(format_float(*f)),
            Variable::Boolean(b) => Ok(b.to_string()),
            Variable::ConfigurationNode(node) => Ok(node.borrow().value.clone().unwrap_or_default()),
            other => Err(ScriptError::unsupported("String conversion", other.type_name())),
        }
    }

    pub fn to_int(&self) -> Result<i64, ScriptError> {
        match self {
            Variable::Int(i) => Ok(*i),
            Variable::Float(f) => Ok(f.trunc() as i64),
            Variable::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ScriptError::type_error(format!("Illegal integer value '{}'", s))),
            other => Err(ScriptError::unsupported("Integer conversion", other.type_name())),
        }
    }

    pub fn to_float(&self) -> Result<f64, ScriptError> {
        match self {
            Variable::Float(f) => Ok(*f),
            Variable::Int(i) => Ok(*i as f64),
            Variable::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ScriptError::type_error(format!("Illegal float value '{}'", s))),
            other => Err(ScriptError::unsupported("Float conversion", other.type_name())),
        }
    }

    pub fn to_bool(&self) -> Result<bool, ScriptError> {
        match self {
            Variable::Boolean(b) => Ok(*b),
            other => Err(ScriptError::unsupported("Boolean conversion", other.type_name())),
        }
    }

    /// Literal source text for the value. Urls and connection names render as
    /// their quoted text.
    pub fn to_script(&self) -> Result<String, ScriptError> {
        self.script_within(&mut Vec::new())
    }

    /// `open` holds the arrays currently being rendered.
    fn script_within(&self, open: &mut Vec<ArrayHandle>) -> Result<String, ScriptError> {
        match self {
            Variable::String(s) | Variable::Url(s) | Variable::ConnectionName(s) => Ok(quote(s)),
            Variable::Int(i) => Ok(i.to_string()),
            Variable::Float(f) => Ok(format_float(*f)),
            Variable::Boolean(b) => Ok(b.to_string()),
            Variable::Array(items) => {
                if open.iter().any(|a| Rc::ptr_eq(a, items)) {
                    return Err(ScriptError::reference("Array contains itself"));
                }
                open.push(items.clone());
                let slots = items.borrow().clone();
                let mut parts = Vec::with_capacity(slots.len());
                for slot in &slots {
                    parts.push(match slot.get() {
                        Some(v) => v.script_within(open)?,
                        None => "null".to_string(),
                    });
                }
                open.pop();
                Ok(format!("[ {} ]", parts.join(", ")))
            }
            Variable::Configuration(c) => Ok(c.borrow().script_text()),
            Variable::ConfigurationNode(n) => Ok(n.borrow().script_text()),
            other => Err(ScriptError::unsupported("Script conversion", other.type_name())),
        }
    }

    /// Resolves `value.name`.
    pub fn attribute(&self, name: &str) -> Result<VariableReference, ScriptError> {
        match name {
            "__script__" => return Ok(VariableReference::value(Variable::String(self.to_script()?))),
            "__string__" => {
                return Ok(VariableReference::value(Variable::String(self.to_string_value()?)))
            }
            "__int__" => return Ok(VariableReference::value(Variable::Int(self.to_int()?))),
            "__float__" => return Ok(VariableReference::value(Variable::Float(self.to_float()?))),
            "__boolean__" => return Ok(VariableReference::value(Variable::Boolean(self.to_bool()?))),
            _ => {}
        }

        let size = |n: usize| -> Result<VariableReference, ScriptError> {
            Ok(VariableReference::value(Variable::Int(n as i64)))
        };
        match (self, name) {
            (Variable::Array(items), "__size__") => size(items.borrow().len()),
            (Variable::Dictionary(entries), "__size__") => size(entries.borrow().len()),
            (Variable::Configuration(c), "__size__") => size(c.borrow().children.len()),
            (Variable::Configuration(c), "__dict__") => Ok(children_dictionary(&c.borrow().children)),
            (Variable::ConfigurationNode(n), "__size__") => size(n.borrow().children.len()),
            (Variable::ConfigurationNode(n), "__dict__") => Ok(children_dictionary(&n.borrow().children)),
            (Variable::ConfigurationNode(n), "__type__") => {
                Ok(VariableReference::value(Variable::String(n.borrow().node_type.clone())))
            }
            (Variable::ConfigurationNode(n), "__value__") => Ok(VariableReference::NodeValue(n.clone())),
            (Variable::ConfigurationNode(n), _) => Ok(VariableReference::Attribute {
                node: n.clone(),
                name: name.to_string(),
            }),
            (Variable::Result(result), _) => result.attribute(name),
            _ => Err(ScriptError::reference(format!(
                "No attribute '{}' for {}",
                name,
                self.type_name()
            ))),
        }
    }

    /// Resolves `value[index]`.
    pub fn index(&self, index: &Variable) -> Result<VariableReference, ScriptError> {
        match self {
            Variable::Array(items) => {
                let items = items.borrow();
                let i = bounded_index(index, items.len())?;
                Ok(VariableReference::Slot(items[i].clone()))
            }
            Variable::Dictionary(entries) => {
                let key = DictionaryKey::from_variable(index)?;
                let slot = entries.borrow_mut().entry(key).or_default().clone();
                Ok(VariableReference::Slot(slot))
            }
            Variable::Configuration(c) => {
                let i = bounded_index(index, c.borrow().children.len())?;
                Ok(VariableReference::Child {
                    owner: ChildOwner::Configuration(c.clone()),
                    index: i,
                })
            }
            Variable::ConfigurationNode(n) => {
                let i = bounded_index(index, n.borrow().children.len())?;
                Ok(VariableReference::Child {
                    owner: ChildOwner::Node(n.clone()),
                    index: i,
                })
            }
            other => Err(ScriptError::unsupported("Subscript", other.type_name())),
        }
    }

    /// Inserts `value` at `index`, or appends when no index is given.
    pub fn insert_at(&self, value: Option<Variable>, index: Option<&Variable>) -> Result<(), ScriptError> {
        match self {
            Variable::Array(items) => {
                if value.as_ref().is_some_and(|v| reaches_array(v, items, &mut Vec::new())) {
                    return Err(ScriptError::reference("Cannot insert an array into itself"));
                }
                let len = items.borrow().len();
                let at = insertion_index(index, len)?;
                items.borrow_mut().insert(at, Slot::new(value));
                Ok(())
            }
            Variable::Configuration(_) | Variable::ConfigurationNode(_) => {
                let node = match value {
                    Some(Variable::ConfigurationNode(node)) => node,
                    Some(other) => {
                        return Err(ScriptError::type_error(format!(
                            "Cannot insert {} into {}",
                            other.type_name(),
                            self.type_name()
                        )))
                    }
                    None => {
                        return Err(ScriptError::reference(format!(
                            "Cannot insert null into {}",
                            self.type_name()
                        )))
                    }
                };
                if let Variable::ConfigurationNode(parent) = self {
                    ensure_not_ancestor(parent, &node)?;
                }
                self.with_children(|children| {
                    let at = insertion_index(index, children.len())?;
                    children.insert(at, node);
                    Ok(())
                })
            }
            other => Err(ScriptError::unsupported("Insert", other.type_name())),
        }
    }

    /// Removes the element at `index` (or the entry with that key).
    pub fn remove_at(&self, index: &Variable) -> Result<(), ScriptError> {
        match self {
            Variable::Array(items) => {
                let len = items.borrow().len();
                let i = bounded_index(index, len)?;
                items.borrow_mut().remove(i);
                Ok(())
            }
            Variable::Dictionary(entries) => {
                let key = DictionaryKey::from_variable(index)?;
                match entries.borrow_mut().remove(&key) {
                    Some(_) => Ok(()),
                    None => Err(ScriptError::reference(format!("No such key '{}'", key))),
                }
            }
            Variable::Configuration(_) | Variable::ConfigurationNode(_) => self.with_children(|children| {
                let i = bounded_index(index, children.len())?;
                children.remove(i);
                Ok(())
            }),
            other => Err(ScriptError::unsupported("Remove", other.type_name())),
        }
    }

    fn with_children<T>(
        &self,
        f: impl FnOnce(&mut Vec<NodeHandle>) -> Result<T, ScriptError>,
    ) -> Result<T, ScriptError> {
        match self {
            Variable::Configuration(c) => f(&mut c.borrow_mut().children),
            Variable::ConfigurationNode(n) => f(&mut n.borrow_mut().children),
            other => Err(ScriptError::unsupported("Child access", other.type_name())),
        }
    }
}

/// Whether `target` can be reached from `value` through arrays and
/// dictionaries. `visited` holds containers already walked.
fn reaches_array(value: &Variable, target: &ArrayHandle, visited: &mut Vec<*const ()>) -> bool {
    let (id, slots): (*const (), Vec<Slot>) = match value {
        Variable::Array(items) => {
            if Rc::ptr_eq(items, target) {
                return true;
            }
            (Rc::as_ptr(items) as *const (), items.borrow().clone())
        }
        Variable::Dictionary(entries) => (
            Rc::as_ptr(entries) as *const (),
            entries.borrow().values().cloned().collect(),
        ),
        _ => return false,
    };
    if visited.contains(&id) {
        return false;
    }
    visited.push(id);
    slots
        .iter()
        .any(|slot| slot.get().is_some_and(|v| reaches_array(&v, target, visited)))
}

/// Integral floats keep one decimal so they still read as floats.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

fn bounded_index(index: &Variable, len: usize) -> Result<usize, ScriptError> {
    let i = index.to_int()?;
    if i < 0 || i as usize >= len {
        return Err(ScriptError::reference(format!("Index {} out of bounds", i)));
    }
    Ok(i as usize)
}

fn insertion_index(index: Option<&Variable>, len: usize) -> Result<usize, ScriptError> {
    let Some(index) = index else {
        return Ok(len);
    };
    let i = index.to_int()?;
    if i < 0 || i as usize > len {
        return Err(ScriptError::reference(format!("Insert index {} out of bounds", i)));
    }
    Ok(i as usize)
}

/// Children keyed by type; a later child replaces an earlier one of the same type.
fn children_dictionary(children: &[NodeHandle]) -> VariableReference {
    let entries = children
        .iter()
        .map(|child| {
            let key = DictionaryKey(child.borrow().node_type.clone());
            (key, Slot::new(Some(Variable::ConfigurationNode(child.clone()))))
        })
        .collect();
    VariableReference::value(Variable::Dictionary(Rc::new(RefCell::new(entries))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string(s: &str) -> Variable {
        Variable::String(s.to_string())
    }

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(Variable::Int(2).to_string_value().unwrap(), "2");
        assert_eq!(Variable::Float(2.5).to_int().unwrap(), 2);
        assert_eq!(Variable::Float(-2.5).to_int().unwrap(), -2);
        assert_eq!(string("42").to_int().unwrap(), 42);
        assert_eq!(string("1.5").to_float().unwrap(), 1.5);
        assert!(string("abc").to_int().is_err());
        assert!(Variable::Int(1).to_bool().is_err());
        assert_eq!(Variable::Boolean(false).to_string_value().unwrap(), "false");
    }

    #[test]
    fn test_float_text_keeps_decimal_point() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(-3.0), "-3.0");
        assert_eq!(format_float(0.25), "0.25");
    }

    #[test]
    fn test_script_text() {
        assert_eq!(string("2").to_script().unwrap(), "\"2\"");
        let array = Variable::array(vec![Some(Variable::Int(1)), Some(string("2")), None]);
        assert_eq!(array.to_script().unwrap(), "[ 1, \"2\", null ]");
        assert!(Variable::dictionary().to_script().is_err());
    }

    #[test]
    fn test_unsupported_error_names_type() {
        let err = Variable::dictionary().to_string_value().unwrap_err();
        assert_eq!(err.message, "String conversion illegal for dictionary");
    }

    #[test]
    fn test_array_index_insert_remove() {
        let array = Variable::array(vec![Some(Variable::Int(1)), Some(Variable::Int(2))]);
        array.insert_at(Some(Variable::Int(0)), Some(&Variable::Int(0))).unwrap();
        array.insert_at(Some(Variable::Int(3)), None).unwrap();
        assert_eq!(array.to_script().unwrap(), "[ 0, 1, 2, 3 ]");

        array.remove_at(&Variable::Int(1)).unwrap();
        assert_eq!(array.to_script().unwrap(), "[ 0, 2, 3 ]");

        assert!(array.index(&Variable::Int(3)).is_err());
        assert!(array.index(&Variable::Int(-1)).is_err());
        assert!(array.insert_at(None, Some(&Variable::Int(5))).is_err());

        array.index(&Variable::Int(0)).unwrap().set(Some(string("x"))).unwrap();
        assert_eq!(array.to_script().unwrap(), "[ \"x\", 2, 3 ]");
    }

    #[test]
    fn test_dictionary_entries_auto_create() {
        let dict = Variable::dictionary();
        let entry = dict.index(&string("a")).unwrap();
        assert!(entry.is_null());
        entry.set(Some(Variable::Int(1))).unwrap();
        let again = dict.index(&string("a")).unwrap();
        assert!(matches!(again.resolve(), Some(Variable::Int(1))));
        assert!(dict.index(&Variable::array(Vec::new())).is_err());

        dict.remove_at(&string("a")).unwrap();
        assert!(dict.remove_at(&string("a")).is_err());
    }

    #[test]
    fn test_self_containing_arrays() {
        let outer = Variable::array(Vec::new());
        let err = outer.insert_at(Some(outer.clone()), None).unwrap_err();
        assert_eq!(err.message, "Cannot insert an array into itself");

        let dict = Variable::dictionary();
        dict.index(&string("back")).unwrap().set(Some(outer.clone())).unwrap();
        assert!(outer.insert_at(Some(dict), None).is_err());
        assert!(outer.insert_at(Some(Variable::array(Vec::new())), None).is_ok());

        // Element assignment can still close a loop; rendering reports it.
        outer.index(&Variable::Int(0)).unwrap().set(Some(outer.clone())).unwrap();
        let err = outer.to_script().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Reference);
        assert_eq!(err.message, "Array contains itself");

        let shared = Variable::array(vec![Some(Variable::Int(1))]);
        let twice = Variable::array(vec![Some(shared.clone()), Some(shared)]);
        assert_eq!(twice.to_script().unwrap(), "[ [ 1 ], [ 1 ] ]");
    }

    #[test]
    fn test_node_cannot_contain_itself() {
        let parent = Variable::node(ConfigurationNode::new("p"));
        let err = parent.insert_at(Some(parent.clone()), None).unwrap_err();
        assert_eq!(err.message, "Cannot make a configurationnode a child of itself");

        let child = Variable::node(ConfigurationNode::new("c"));
        parent.insert_at(Some(child.clone()), None).unwrap();
        assert!(child.insert_at(Some(parent.clone()), None).is_err());
        assert_eq!(parent.to_script().unwrap(), "<< \"p\" :  :  : << \"c\" :  :  :  >> >>");
    }

    #[test]
    fn test_dictionary_keys_by_canonical_text() {
        let dict = Variable::dictionary();
        dict.index(&Variable::Int(1)).unwrap().set(Some(string("int"))).unwrap();
        let by_text = dict.index(&string("1")).unwrap().resolve().unwrap();
        assert_eq!(by_text.to_string_value().unwrap(), "int");

        dict.index(&Variable::Float(1.5)).unwrap().set(Some(string("float"))).unwrap();
        assert!(!dict.index(&string("1.5")).unwrap().is_null());
        dict.index(&Variable::Float(2.0)).unwrap().set(Some(string("two"))).unwrap();
        assert!(!dict.index(&string("2.0")).unwrap().is_null());

        let node = Variable::node(ConfigurationNode::new("job").with_value("k"));
        dict.index(&node).unwrap().set(Some(string("node"))).unwrap();
        let by_value = dict.index(&string("k")).unwrap().resolve().unwrap();
        assert_eq!(by_value.to_string_value().unwrap(), "node");

        let err = dict.index(&Variable::dictionary()).unwrap_err();
        assert_eq!(err.message, "Dictionary key illegal for dictionary");
    }

    #[test]
    fn test_node_attributes() {
        let node = Variable::node(
            ConfigurationNode::new("job")
                .with_value("v")
                .with_attribute("id", "7")
                .with_child(ConfigurationNode::new("a"))
                .with_child(ConfigurationNode::new("b")),
        );
        let text = |name: &str| {
            node.attribute(name)
                .unwrap()
                .resolve()
                .map(|v| v.to_string_value().unwrap())
        };
        assert_eq!(text("__type__").as_deref(), Some("job"));
        assert_eq!(text("__value__").as_deref(), Some("v"));
        assert_eq!(text("id").as_deref(), Some("7"));
        assert_eq!(text("missing"), None);
        assert_eq!(text("__size__").as_deref(), Some("2"));

        let dict = node.attribute("__dict__").unwrap().resolve().unwrap();
        let b = dict.index(&string("b")).unwrap().resolve().unwrap();
        assert_eq!(b.attribute("__type__").unwrap().resolve().unwrap().to_string_value().unwrap(), "b");
    }

    #[test]
    fn test_configuration_children_share_handles() {
        let config = Variable::configuration(Configuration::new());
        let child = ConfigurationNode::new("c").into_handle();
        config
            .insert_at(Some(Variable::ConfigurationNode(child.clone())), None)
            .unwrap();
        child.borrow_mut().value = Some("changed".into());
        let first = config.index(&Variable::Int(0)).unwrap().resolve().unwrap();
        assert_eq!(first.to_string_value().unwrap(), "changed");

        assert!(config.insert_at(Some(Variable::Int(1)), None).is_err());
        assert!(config.insert_at(None, None).is_err());
        config.remove_at(&Variable::Int(0)).unwrap();
        assert_eq!(config.to_script().unwrap(), "{  }");
    }

    #[test]
    fn test_unknown_attribute_is_reference_error() {
        let err = Variable::Int(1).attribute("nope").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Reference);
    }
}
