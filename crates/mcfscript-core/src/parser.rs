//! Recursive-descent parser that executes as it parses.
//!
//! Every grammar rule is implemented once and takes a [`Mode`]. In
//! [`Mode::Execute`] a rule evaluates what it reads; in [`Mode::Skip`] it
//! consumes exactly the same tokens without looking up variables, performing
//! conversions or running commands. `if`, `while`, `&&` and `||` skip the
//! branches they do not take by re-entering the same rules in skip mode.
//!
//! Expression precedence, loosest first:
//!
//! | level          | operators              |
//! |----------------|------------------------|
//! | or             | `\|\|` `\|`            |
//! | and            | `&&` `&`               |
//! | not            | prefix `!`             |
//! | comparison     | `==` `!=` `<` `>` `<=` `>=` (non-associative) |
//! | additive       | `+` `-`                |
//! | multiplicative | `*` `/`                |
//! | negation       | prefix `-`             |
//! | postfix        | `[index]` `.attribute` |
//!
//! # Example
//!
//! ```
//! use mcfscript_core::parser::ScriptParser;
//! use mcfscript_core::stream::TokenStream;
//!
//! let mut parser = ScriptParser::new();
//! let mut stream = TokenStream::from_source("set x = 2 + 3 * 4;");
//! parser.execute(&mut stream).unwrap();
//! assert_eq!(parser.context().get("x").unwrap().to_int().unwrap(), 14);
//! ```

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use tracing::debug;

use crate::command::{self, Command};
use crate::configuration::{Configuration, ConfigurationNode, NodeHandle};
use crate::context::ExecutionContext;
use crate::error::{Position, ScriptError};
use crate::http::{self, HttpTransport};
use crate::operation::{self, NewOperation};
use crate::operator::{BinaryOperator, UnaryOperator};
use crate::reference::VariableReference;
use crate::stream::TokenStream;
use crate::token::{Token, TokenKind};
use crate::variable::Variable;

/// Whether a rule evaluates what it parses or only consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Execute,
    Skip,
}

impl Mode {
    pub fn is_execute(self) -> bool {
        self == Mode::Execute
    }

    pub fn is_skip(self) -> bool {
        self == Mode::Skip
    }
}

/// Result of running a statement: carry on, or leave the innermost loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Or,
    And,
    Not,
    Comparison,
    Additive,
    Multiplicative,
    Negation,
    Postfix,
}

impl Level {
    fn next(self) -> Level {
        match self {
            Level::Or => Level::And,
            Level::And => Level::Not,
            Level::Not => Level::Comparison,
            Level::Comparison => Level::Additive,
            Level::Additive => Level::Multiplicative,
            Level::Multiplicative => Level::Negation,
            Level::Negation | Level::Postfix => Level::Postfix,
        }
    }

    fn binary_operator(self, token: &Token) -> Option<BinaryOperator> {
        use BinaryOperator::*;

        let op = match (self, token.punctuation()?) {
            (Level::Or, "||") => LogicalOr,
            (Level::Or, "|") => Or,
            (Level::And, "&&") => LogicalAnd,
            (Level::And, "&") => And,
            (Level::Comparison, "==") => Equal,
            (Level::Comparison, "!=") => NotEqual,
            (Level::Comparison, "<") => Less,
            (Level::Comparison, ">") => Greater,
            (Level::Comparison, "<=") => LessEqual,
            (Level::Comparison, ">=") => GreaterEqual,
            (Level::Additive, "+") => Add,
            (Level::Additive, "-") => Subtract,
            (Level::Multiplicative, "*") => Multiply,
            (Level::Multiplicative, "/") => Divide,
            _ => return None,
        };
        Some(op)
    }
}

/// Resolves an operand, failing on null.
fn operand(reference: &VariableReference, what: &str, position: Position) -> Result<Variable, ScriptError> {
    reference
        .resolve()
        .ok_or_else(|| ScriptError::reference(format!("Null value for {}", what)).at(position))
}

fn node_operand(reference: &VariableReference, position: Position) -> Result<NodeHandle, ScriptError> {
    match operand(reference, "configuration child", position)? {
        Variable::ConfigurationNode(node) => Ok(node),
        other => Err(ScriptError::type_error(format!(
            "Configuration child must be a configurationnode, not {}",
            other.type_name()
        ))
        .at(position)),
    }
}

/// Parses and runs scripts against an [`ExecutionContext`].
///
/// Commands and `new` operations are looked up by name in registries that
/// callers may extend. HTTP verbs are only present when a transport is
/// supplied through [`ScriptParser::with_transport`].
pub struct ScriptParser {
    context: ExecutionContext,
    commands: HashMap<String, Rc<dyn Command>>,
    operations: HashMap<String, Rc<dyn NewOperation>>,
    output: Box<dyn Write>,
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptParser {
    /// A parser with the built-in commands and `new` operations, printing to stdout.
    pub fn new() -> Self {
        let mut parser = Self {
            context: ExecutionContext::new(),
            commands: HashMap::new(),
            operations: HashMap::new(),
            output: Box::new(io::stdout()),
        };
        command::register_builtins(&mut parser);
        operation::register_builtins(&mut parser);
        parser
    }

    /// Registers `GET`, `PUT`, `POST` and `DELETE` backed by `transport`.
    pub fn with_transport(mut self, transport: Rc<dyn HttpTransport>) -> Self {
        http::register_verbs(&mut self, transport);
        self
    }

    /// Sends `print` output to `output` instead of stdout.
    pub fn with_output(mut self, output: Box<dyn Write>) -> Self {
        self.output = output;
        self
    }

    pub fn register_command(&mut self, name: &str, command: impl Command + 'static) {
        self.commands.insert(name.to_string(), Rc::new(command));
    }

    pub fn register_operation(&mut self, name: &str, operation: impl NewOperation + 'static) {
        self.operations.insert(name.to_string(), Rc::new(operation));
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Runs every statement in `stream`. Anything left over that does not
    /// start a command is a syntax error.
    pub fn execute(&mut self, stream: &mut TokenStream) -> Result<(), ScriptError> {
        if self.parse_statements(stream, Mode::Execute)? == Flow::Break {
            debug!("break outside of a loop, remaining statements skipped");
        }
        match stream.peek() {
            Some(token) => Err(ScriptError::syntax(format!("Bad command {}", token), token.position)),
            None => Ok(()),
        }
    }

    /// Runs one statement. Returns `false` at end of input. Input consumed by
    /// earlier statements is released first, so a long interactive session
    /// holds only the statement in progress.
    pub fn execute_next(&mut self, stream: &mut TokenStream) -> Result<bool, ScriptError> {
        stream.discard_consumed();
        if self.parse_statement(stream, Mode::Execute)?.is_some() {
            return Ok(true);
        }
        match stream.peek() {
            Some(token) => Err(ScriptError::syntax(format!("Bad command {}", token), token.position)),
            None => Ok(false),
        }
    }

    /// Parses statements until a token that does not start a command.
    ///
    /// Once a `break` runs, the remaining statements in the sequence are
    /// skipped and [`Flow::Break`] is returned.
    pub fn parse_statements(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let mut flow = Flow::Continue;
        loop {
            let effective = if flow == Flow::Break { Mode::Skip } else { mode };
            match self.parse_statement(stream, effective)? {
                None => return Ok(flow),
                Some(Flow::Break) if effective.is_execute() => flow = Flow::Break,
                Some(_) => {}
            }
        }
    }

    pub fn skip_statements(&mut self, stream: &mut TokenStream) -> Result<(), ScriptError> {
        self.parse_statements(stream, Mode::Skip).map(|_| ())
    }

    /// Parses one statement with its terminating `;`. Returns `None`
    /// without consuming anything if the next token is not a command name.
    pub fn parse_statement(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<Option<Flow>, ScriptError> {
        let Some((name, position)) = stream
            .peek()
            .and_then(|t| t.word().map(|w| (w.to_string(), t.position)))
        else {
            return Ok(None);
        };
        let Some(command) = self.commands.get(&name).cloned() else {
            return Ok(None);
        };
        stream.skip();
        if mode.is_execute() {
            debug!(command = %name, line = position.line, "dispatching command");
        }

        let flow = command.parse(self, stream, mode)?;

        if stream.next_is_punctuation(";") {
            stream.skip();
        } else if !(command.is_block() && stream.at_end()) {
            return Err(stream.unexpected("';'"));
        }
        Ok(Some(flow))
    }

    /// Evaluates one expression; a missing expression is a syntax error.
    pub fn evaluate_expression(&mut self, stream: &mut TokenStream) -> Result<VariableReference, ScriptError> {
        self.require_expression(stream, Mode::Execute)
    }

    pub fn skip_expression(&mut self, stream: &mut TokenStream) -> Result<(), ScriptError> {
        self.require_expression(stream, Mode::Skip).map(|_| ())
    }

    /// Parses an expression if one starts at the next token. In skip mode the
    /// returned reference is a null placeholder.
    pub fn parse_expression(
        &mut self,
        stream: &mut TokenStream,
        mode: Mode,
    ) -> Result<Option<VariableReference>, ScriptError> {
        self.parse_level(stream, Level::Or, mode)
    }

    pub fn require_expression(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<VariableReference, ScriptError> {
        self.require_level(stream, Level::Or, mode)
    }

    fn require_level(
        &mut self,
        stream: &mut TokenStream,
        level: Level,
        mode: Mode,
    ) -> Result<VariableReference, ScriptError> {
        match self.parse_level(stream, level, mode)? {
            Some(reference) => Ok(reference),
            None => Err(stream.unexpected("an expression")),
        }
    }

    fn parse_level(
        &mut self,
        stream: &mut TokenStream,
        level: Level,
        mode: Mode,
    ) -> Result<Option<VariableReference>, ScriptError> {
        match level {
            Level::Not => self.parse_prefix(stream, level, UnaryOperator::Not, mode),
            Level::Negation => self.parse_prefix(stream, level, UnaryOperator::Negate, mode),
            Level::Postfix => self.parse_postfix(stream, mode),
            Level::Comparison => self.parse_binary(stream, level, mode, false),
            Level::Or | Level::And | Level::Additive | Level::Multiplicative => {
                self.parse_binary(stream, level, mode, true)
            }
        }
    }

    fn parse_binary(
        &mut self,
        stream: &mut TokenStream,
        level: Level,
        mode: Mode,
        chained: bool,
    ) -> Result<Option<VariableReference>, ScriptError> {
        let Some(mut left) = self.parse_level(stream, level.next(), mode)? else {
            return Ok(None);
        };
        while let Some((op, position)) = stream
            .peek()
            .and_then(|t| level.binary_operator(t).map(|op| (op, t.position)))
        {
            stream.skip();
            left = if mode.is_skip() {
                self.require_level(stream, level.next(), Mode::Skip)?;
                VariableReference::null()
            } else {
                let what = format!("binary {}", op.symbol());
                let lhs = operand(&left, &what, position)?;
                match op.short_circuit(&lhs) {
                    Some(result) => {
                        self.require_level(stream, level.next(), Mode::Skip)?;
                        VariableReference::value(Variable::Boolean(result))
                    }
                    None => {
                        let right = self.require_level(stream, level.next(), Mode::Execute)?;
                        let rhs = operand(&right, &what, position)?;
                        VariableReference::value(lhs.binary(op, &rhs).map_err(|e| e.or_at(position))?)
                    }
                }
            };
            if !chained {
                break;
            }
        }
        Ok(Some(left))
    }

    fn parse_prefix(
        &mut self,
        stream: &mut TokenStream,
        level: Level,
        op: UnaryOperator,
        mode: Mode,
    ) -> Result<Option<VariableReference>, ScriptError> {
        if !stream.next_is_punctuation(op.symbol()) {
            return self.parse_level(stream, level.next(), mode);
        }
        let position = stream.position();
        stream.skip();
        let inner = self.require_level(stream, level, mode)?;
        if mode.is_skip() {
            return Ok(Some(VariableReference::null()));
        }
        let value = operand(&inner, &format!("unary {}", op.symbol()), position)?;
        let result = value.unary(op).map_err(|e| e.or_at(position))?;
        Ok(Some(VariableReference::value(result)))
    }

    fn parse_postfix(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<Option<VariableReference>, ScriptError> {
        let Some(mut current) = self.parse_primary(stream, mode)? else {
            return Ok(None);
        };
        loop {
            let position = stream.position();
            if stream.next_is_punctuation("[") {
                stream.skip();
                let index = self.require_expression(stream, mode)?;
                stream.expect_punctuation("]")?;
                if mode.is_execute() {
                    let base = operand(&current, "subscript", position)?;
                    let key = operand(&index, "subscript index", position)?;
                    current = base.index(&key).map_err(|e| e.or_at(position))?;
                }
            } else if stream.next_is_punctuation(".") {
                stream.skip();
                let Some(name) = stream.peek().and_then(Token::word).map(str::to_string) else {
                    return Err(stream.unexpected("an attribute name"));
                };
                stream.skip();
                if mode.is_execute() {
                    let base = operand(&current, &format!("attribute '{}'", name), position)?;
                    current = base.attribute(&name).map_err(|e| e.or_at(position))?;
                }
            } else {
                return Ok(Some(current));
            }
        }
    }

    fn parse_primary(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<Option<VariableReference>, ScriptError> {
        let Some(token) = stream.peek().cloned() else {
            return Ok(None);
        };
        let position = token.position;
        let execute = mode.is_execute();

        let reference = match token.kind {
            TokenKind::Punctuation(p) => match p.as_str() {
                "(" => {
                    stream.skip();
                    let inner = self.require_expression(stream, mode)?;
                    stream.expect_punctuation(")")?;
                    inner
                }
                "[" => {
                    stream.skip();
                    let items = self.parse_list(stream, mode, "]")?;
                    if execute {
                        let values = items.iter().map(VariableReference::resolve).collect();
                        VariableReference::value(Variable::array(values))
                    } else {
                        VariableReference::null()
                    }
                }
                "{" => {
                    stream.skip();
                    let items = self.parse_list(stream, mode, "}")?;
                    if execute {
                        let mut configuration = Configuration::new();
                        for item in &items {
                            configuration.children.push(node_operand(item, position)?);
                        }
                        VariableReference::value(Variable::configuration(configuration))
                    } else {
                        VariableReference::null()
                    }
                }
                "<<" => {
                    stream.skip();
                    self.parse_node(stream, mode, position)?
                }
                _ => return Ok(None),
            },
            TokenKind::String(s) => {
                stream.skip();
                VariableReference::value(Variable::String(s))
            }
            TokenKind::Integer(text) => {
                stream.skip();
                if execute {
                    let i = text
                        .parse()
                        .map_err(|_| ScriptError::syntax(format!("Illegal integer {}", text), position))?;
                    VariableReference::value(Variable::Int(i))
                } else {
                    VariableReference::null()
                }
            }
            TokenKind::Float(text) => {
                stream.skip();
                if execute {
                    let f = text
                        .parse()
                        .map_err(|_| ScriptError::syntax(format!("Illegal float {}", text), position))?;
                    VariableReference::value(Variable::Float(f))
                } else {
                    VariableReference::null()
                }
            }
            TokenKind::Word(word) => {
                stream.skip();
                match word.as_str() {
                    "true" => VariableReference::value(Variable::Boolean(true)),
                    "false" => VariableReference::value(Variable::Boolean(false)),
                    "null" => VariableReference::null(),
                    "isnull" => {
                        let inner = self.require_level(stream, Level::Postfix, mode)?;
                        if execute {
                            VariableReference::value(Variable::Boolean(inner.is_null()))
                        } else {
                            VariableReference::null()
                        }
                    }
                    "new" => self.parse_new(stream, mode)?,
                    _ if execute => VariableReference::Slot(self.context.lookup(&word)),
                    _ => VariableReference::null(),
                }
            }
        };
        Ok(Some(reference))
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list(
        &mut self,
        stream: &mut TokenStream,
        mode: Mode,
        close: &str,
    ) -> Result<Vec<VariableReference>, ScriptError> {
        let mut items = Vec::new();
        if stream.next_is_punctuation(close) {
            stream.skip();
            return Ok(items);
        }
        loop {
            items.push(self.require_expression(stream, mode)?);
            if stream.next_is_punctuation(",") {
                stream.skip();
                continue;
            }
            stream.expect_punctuation(close)?;
            return Ok(items);
        }
    }

    /// `<< type : value : name = value, ... : child, ... >>` after the opening `<<`.
    /// The value, attribute and child sections may each be empty, and trailing
    /// sections may be left out.
    fn parse_node(
        &mut self,
        stream: &mut TokenStream,
        mode: Mode,
        position: Position,
    ) -> Result<VariableReference, ScriptError> {
        let node_type = self.require_expression(stream, mode)?;
        stream.expect_punctuation(":")?;
        let value = if stream.next_is_punctuation(":") || stream.next_is_punctuation(">>") {
            None
        } else {
            Some(self.require_expression(stream, mode)?)
        };

        let mut attributes = Vec::new();
        let mut children = Vec::new();
        if !stream.next_is_punctuation(">>") {
            stream.expect_punctuation(":")?;
            if !stream.next_is_punctuation(":") && !stream.next_is_punctuation(">>") {
                loop {
                    let name = self.require_expression(stream, mode)?;
                    stream.expect_punctuation("=")?;
                    let value = self.require_expression(stream, mode)?;
                    attributes.push((name, value));
                    if !stream.next_is_punctuation(",") {
                        break;
                    }
                    stream.skip();
                }
            }
            if !stream.next_is_punctuation(">>") {
                stream.expect_punctuation(":")?;
                if !stream.next_is_punctuation(">>") {
                    loop {
                        children.push(self.require_expression(stream, mode)?);
                        if !stream.next_is_punctuation(",") {
                            break;
                        }
                        stream.skip();
                    }
                }
            }
        }
        stream.expect_punctuation(">>")?;

        if mode.is_skip() {
            return Ok(VariableReference::null());
        }

        let text = |v: Variable| v.to_string_value().map_err(|e| e.or_at(position));
        let mut node = ConfigurationNode::new(text(operand(&node_type, "node type", position)?)?);
        if let Some(v) = value.and_then(|r| r.resolve()) {
            node.value = Some(text(v)?);
        }
        for (name, value) in &attributes {
            let name = text(operand(name, "attribute name", position)?)?;
            if let Some(v) = value.resolve() {
                node.attributes.insert(name, text(v)?);
            }
        }
        for child in &children {
            node.children.push(node_operand(child, position)?);
        }
        Ok(VariableReference::value(Variable::node(node)))
    }

    fn parse_new(&mut self, stream: &mut TokenStream, mode: Mode) -> Result<VariableReference, ScriptError> {
        let position = stream.position();
        let Some(name) = stream.peek().and_then(Token::word).map(str::to_string) else {
            return Err(stream.unexpected("an object type after 'new'"));
        };
        let Some(operation) = self.operations.get(&name).cloned() else {
            return Err(ScriptError::syntax(format!("Unknown object type '{}'", name), position));
        };
        stream.skip();
        if mode.is_execute() {
            debug!(operation = %name, line = position.line, "constructing object");
        }
        operation.parse(self, stream, mode).map_err(|e| e.or_at(position))
    }
}
