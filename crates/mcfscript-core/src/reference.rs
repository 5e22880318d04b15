//! Places a value can be read from or written to.
//!
//! A [`VariableReference`] is what every expression evaluates to. Resolving it
//! never has side effects; [`VariableReference::set`] is the only way to
//! change the place it names. Named variables, array elements and dictionary
//! entries are all [`Slot`]s; configuration children, attributes and values
//! are addressed through the node that owns them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::configuration::{ensure_not_ancestor, ConfigurationHandle, NodeHandle};
use crate::error::ScriptError;
use crate::variable::Variable;

/// A shared, mutable cell holding a value or null.
#[derive(Debug, Clone, Default)]
pub struct Slot(Rc<RefCell<Option<Variable>>>);

impl Slot {
    pub fn new(value: Option<Variable>) -> Self {
        Slot(Rc::new(RefCell::new(value)))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Variable> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Option<Variable>) {
        *self.0.borrow_mut() = value;
    }
}

/// The container whose children a [`VariableReference::Child`] indexes.
#[derive(Debug, Clone)]
pub enum ChildOwner {
    Configuration(ConfigurationHandle),
    Node(NodeHandle),
}

impl ChildOwner {
    pub fn with_children<R>(&self, f: impl FnOnce(&mut Vec<NodeHandle>) -> R) -> R {
        match self {
            ChildOwner::Configuration(c) => f(&mut c.borrow_mut().children),
            ChildOwner::Node(n) => f(&mut n.borrow_mut().children),
        }
    }
}

#[derive(Debug, Clone)]
pub enum VariableReference {
    /// A computed value with no place behind it.
    Value(Option<Variable>),
    Slot(Slot),
    Child { owner: ChildOwner, index: usize },
    Attribute { node: NodeHandle, name: String },
    NodeValue(NodeHandle),
}

impl VariableReference {
    pub fn value(value: Variable) -> Self {
        VariableReference::Value(Some(value))
    }

    pub fn null() -> Self {
        VariableReference::Value(None)
    }

    /// The current value, or `None` for null.
    pub fn resolve(&self) -> Option<Variable> {
        match self {
            VariableReference::Value(v) => v.clone(),
            VariableReference::Slot(slot) => slot.get(),
            VariableReference::Child { owner, index } => owner
                .with_children(|children| children.get(*index).cloned())
                .map(Variable::ConfigurationNode),
            VariableReference::Attribute { node, name } => {
                node.borrow().attributes.get(name).cloned().map(Variable::String)
            }
            VariableReference::NodeValue(node) => node.borrow().value.clone().map(Variable::String),
        }
    }

    pub fn is_null(&self) -> bool {
        self.resolve().is_none()
    }

    /// Replaces what this reference points to. Setting a configuration child
    /// or attribute to null removes it.
    pub fn set(&self, value: Option<Variable>) -> Result<(), ScriptError> {
        match self {
            VariableReference::Value(_) => {
                Err(ScriptError::reference("Assignment target is not a variable"))
            }
            VariableReference::Slot(slot) => {
                slot.set(value);
                Ok(())
            }
            VariableReference::Child { owner, index } => {
                let replacement = match value {
                    None => None,
                    Some(Variable::ConfigurationNode(node)) => Some(node),
                    Some(other) => {
                        return Err(ScriptError::type_error(format!(
                            "Configuration child must be a configurationnode, not {}",
                            other.type_name()
                        )))
                    }
                };
                if let (ChildOwner::Node(parent), Some(node)) = (owner, &replacement) {
                    ensure_not_ancestor(parent, node)?;
                }
                owner.with_children(|children| {
                    if *index >= children.len() {
                        return Err(ScriptError::reference(format!(
                            "Child index {} out of bounds",
                            index
                        )));
                    }
                    match replacement {
                        Some(node) => children[*index] = node,
                        None => {
                            children.remove(*index);
                        }
                    }
                    Ok(())
                })
            }
            VariableReference::Attribute { node, name } => {
                let text = value.map(|v| v.to_string_value()).transpose()?;
                let mut node = node.borrow_mut();
                match text {
                    Some(text) => {
                        node.attributes.insert(name.clone(), text);
                    }
                    None => {
                        node.attributes.shift_remove(name);
                    }
                }
                Ok(())
            }
            VariableReference::NodeValue(node) => {
                let text = value.map(|v| v.to_string_value()).transpose()?;
                node.borrow_mut().value = text;
                Ok(())
            }
        }
    }
}
