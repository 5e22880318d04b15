//! Constructors reached through `new <name> ...`.

use crate::command::required;
use crate::configuration::{Configuration, ConfigurationNode};
use crate::error::ScriptError;
use crate::parser::{Mode, ScriptParser};
use crate::reference::VariableReference;
use crate::stream::TokenStream;
use crate::variable::Variable;

/// Parses whatever follows `new <name>` and builds the value.
///
/// Like [`Command`](crate::command::Command), an operation consumes the same
/// tokens in both modes; in [`Mode::Skip`] it returns a null placeholder.
pub trait NewOperation {
    fn parse(
        &self,
        parser: &mut ScriptParser,
        stream: &mut TokenStream,
        mode: Mode,
    ) -> Result<VariableReference, ScriptError>;
}

pub(crate) fn register_builtins(parser: &mut ScriptParser) {
    parser.register_operation("url", TextOperation::Url);
    parser.register_operation("connectionname", TextOperation::ConnectionName);
    parser.register_operation("configurationnode", NodeOperation);
    parser.register_operation("configuration", EmptyOperation::Configuration);
    parser.register_operation("dictionary", EmptyOperation::Dictionary);
    parser.register_operation("array", EmptyOperation::Array);
}

/// `new url <expr>` and `new connectionname <expr>`: wrap the expression's text.
#[derive(Debug, Clone, Copy)]
pub enum TextOperation {
    Url,
    ConnectionName,
}

impl NewOperation for TextOperation {
    fn parse(
        &self,
        parser: &mut ScriptParser,
        stream: &mut TokenStream,
        mode: Mode,
    ) -> Result<VariableReference, ScriptError> {
        let position = stream.position();
        let argument = parser.require_expression(stream, mode)?;
        if mode.is_skip() {
            return Ok(VariableReference::null());
        }
        let text = required(&argument, "Constructor argument", position)?
            .to_string_value()
            .map_err(|e| e.or_at(position))?;
        Ok(VariableReference::value(match self {
            TextOperation::Url => Variable::Url(text),
            TextOperation::ConnectionName => Variable::ConnectionName(text),
        }))
    }
}

/// `new configurationnode <type-expr>`
#[derive(Debug, Clone, Copy)]
pub struct NodeOperation;

impl NewOperation for NodeOperation {
    fn parse(
        &self,
        parser: &mut ScriptParser,
        stream: &mut TokenStream,
        mode: Mode,
    ) -> Result<VariableReference, ScriptError> {
        let position = stream.position();
        let node_type = parser.require_expression(stream, mode)?;
        if mode.is_skip() {
            return Ok(VariableReference::null());
        }
        let node_type = required(&node_type, "Node type", position)?
            .to_string_value()
            .map_err(|e| e.or_at(position))?;
        Ok(VariableReference::value(Variable::node(ConfigurationNode::new(node_type))))
    }
}

/// Argument-less constructors for empty containers.
#[derive(Debug, Clone, Copy)]
pub enum EmptyOperation {
    Configuration,
    Dictionary,
    Array,
}

impl NewOperation for EmptyOperation {
    fn parse(
        &self,
        _parser: &mut ScriptParser,
        _stream: &mut TokenStream,
        mode: Mode,
    ) -> Result<VariableReference, ScriptError> {
        if mode.is_skip() {
            return Ok(VariableReference::null());
        }
        Ok(VariableReference::value(match self {
            EmptyOperation::Configuration => Variable::configuration(Configuration::new()),
            EmptyOperation::Dictionary => Variable::dictionary(),
            EmptyOperation::Array => Variable::array(Vec::new()),
        }))
    }
}
