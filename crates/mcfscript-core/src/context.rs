//! The flat name → slot mapping a script runs against.

use std::collections::HashMap;

use crate::reference::Slot;
use crate::variable::Variable;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    variables: HashMap<String, Slot>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `name`, created empty on first mention.
    pub fn lookup(&mut self, name: &str) -> Slot {
        self.variables.entry(name.to_string()).or_default().clone()
    }

    pub fn get(&self, name: &str) -> Option<Variable> {
        self.variables.get(name).and_then(Slot::get)
    }

    pub fn set(&mut self, name: &str, value: Variable) {
        self.lookup(name).set(Some(value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}
