//! Statement commands.
//!
//! A statement starts with a word naming a registered [`Command`]. The parser
//! consumes that word and the trailing `;`; the command parses everything in
//! between, executing or skipping according to the [`Mode`] it is given.

use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::error::{Position, ScriptError};
use crate::parser::{Flow, Mode, ScriptParser};
use crate::reference::VariableReference;
use crate::stream::TokenStream;
use crate::variable::Variable;

/// A statement keyword's grammar and behavior.
pub trait Command {
    /// Parses the statement body after its keyword. In [`Mode::Skip`] this
    /// must consume the same tokens it would in [`Mode::Execute`] with no
    /// effects, and return [`Flow::Continue`].
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError>;

    /// Block commands may omit the terminating `;` at end of input.
    fn is_block(&self) -> bool {
        false
    }
}

pub(crate) fn register_builtins(parser: &mut ScriptParser) {
    parser.register_command("if", IfCommand);
    parser.register_command("while", WhileCommand);
    parser.register_command("break", BreakCommand);
    parser.register_command("set", SetCommand);
    parser.register_command("insert", InsertCommand);
    parser.register_command("remove", RemoveCommand);
    parser.register_command("print", PrintCommand);
    parser.register_command("error", ErrorCommand);
    parser.register_command("wait", WaitCommand);
}

/// Resolves a reference that must not be null.
pub fn required(reference: &VariableReference, what: &str, position: Position) -> Result<Variable, ScriptError> {
    reference
        .resolve()
        .ok_or_else(|| ScriptError::reference(format!("{} is null", what)).at(position))
}

fn condition(reference: &VariableReference, keyword: &str, position: Position) -> Result<bool, ScriptError> {
    let value = required(reference, &format!("'{}' condition", keyword), position)?;
    match value {
        Variable::Boolean(b) => Ok(b),
        other => Err(ScriptError::type_error(format!(
            "'{}' condition must be boolean, not {}",
            keyword,
            other.type_name()
        ))
        .at(position)),
    }
}

/// `if <expr> then <statements> [else <statements>]`
pub struct IfCommand;

impl Command for IfCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let position = stream.position();
        let test = parser.require_expression(stream, mode)?;
        stream.expect_word("then")?;

        let taken = match mode {
            Mode::Execute => condition(&test, "if", position)?,
            Mode::Skip => false,
        };
        let branch_mode = |selected: bool| if selected { mode } else { Mode::Skip };

        let mut flow = parser.parse_statements(stream, branch_mode(taken))?;
        if stream.next_is_word("else") {
            stream.skip();
            let else_flow = parser.parse_statements(stream, branch_mode(mode.is_execute() && !taken))?;
            if !taken {
                flow = else_flow;
            }
        }
        Ok(flow)
    }

    fn is_block(&self) -> bool {
        true
    }
}

/// `while <expr> <statements>`
///
/// The condition is re-read from the source before every iteration. A
/// `break` in the body ends the loop and is not propagated further.
pub struct WhileCommand;

impl Command for WhileCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        if mode.is_skip() {
            parser.skip_expression(stream)?;
            parser.skip_statements(stream)?;
            return Ok(Flow::Continue);
        }

        let start = stream.mark();
        let mut iterations: u64 = 0;
        loop {
            stream.reset(start);
            let position = stream.position();
            let test = parser.evaluate_expression(stream)?;
            if !condition(&test, "while", position)? {
                parser.skip_statements(stream)?;
                debug!(iterations, "while loop finished");
                return Ok(Flow::Continue);
            }
            iterations += 1;
            // After a break the rest of the body has already been skipped.
            if parser.parse_statements(stream, Mode::Execute)? == Flow::Break {
                debug!(iterations, "while loop broken");
                return Ok(Flow::Continue);
            }
        }
    }

    fn is_block(&self) -> bool {
        true
    }
}

/// `break`
pub struct BreakCommand;

impl Command for BreakCommand {
    fn parse(&self, _parser: &mut ScriptParser, _stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        Ok(match mode {
            Mode::Execute => Flow::Break,
            Mode::Skip => Flow::Continue,
        })
    }
}

/// `set <target> = <expr>`
pub struct SetCommand;

impl Command for SetCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let position = stream.position();
        let target = parser.require_expression(stream, mode)?;
        stream.expect_punctuation("=")?;
        let value = parser.require_expression(stream, mode)?;
        if mode.is_execute() {
            target.set(value.resolve()).map_err(|e| e.or_at(position))?;
        }
        Ok(Flow::Continue)
    }
}

/// `insert <expr> into <target> [at <index>]`
pub struct InsertCommand;

impl Command for InsertCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let value = parser.require_expression(stream, mode)?;
        stream.expect_word("into")?;
        let position = stream.position();
        let target = parser.require_expression(stream, mode)?;
        let index = if stream.next_is_word("at") {
            stream.skip();
            Some(parser.require_expression(stream, mode)?)
        } else {
            None
        };

        if mode.is_execute() {
            let container = required(&target, "Insert target", position)?;
            let index = index
                .map(|i| required(&i, "Insert index", position))
                .transpose()?;
            container
                .insert_at(value.resolve(), index.as_ref())
                .map_err(|e| e.or_at(position))?;
        }
        Ok(Flow::Continue)
    }
}

/// `remove <index> from <target>`
pub struct RemoveCommand;

impl Command for RemoveCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let index = parser.require_expression(stream, mode)?;
        stream.expect_word("from")?;
        let position = stream.position();
        let target = parser.require_expression(stream, mode)?;

        if mode.is_execute() {
            let container = required(&target, "Remove target", position)?;
            let index = required(&index, "Remove index", position)?;
            container.remove_at(&index).map_err(|e| e.or_at(position))?;
        }
        Ok(Flow::Continue)
    }
}

/// `print <expr>`
pub struct PrintCommand;

impl Command for PrintCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let position = stream.position();
        let value = parser.require_expression(stream, mode)?;
        if mode.is_execute() {
            let text = required(&value, "Printed value", position)?
                .to_string_value()
                .map_err(|e| e.or_at(position))?;
            let out = parser.output();
            writeln!(out, "{}", text)?;
            out.flush()?;
        }
        Ok(Flow::Continue)
    }
}

/// `error <expr>`
pub struct ErrorCommand;

impl Command for ErrorCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let position = stream.position();
        let message = parser.require_expression(stream, mode)?;
        if mode.is_skip() {
            return Ok(Flow::Continue);
        }
        let text = required(&message, "Error message", position)?
            .to_string_value()
            .map_err(|e| e.or_at(position))?;
        Err(ScriptError::raised(text).at(position))
    }
}

/// `wait <milliseconds>`
pub struct WaitCommand;

impl Command for WaitCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let position = stream.position();
        let delay = parser.require_expression(stream, mode)?;
        if mode.is_execute() {
            let ms = required(&delay, "Wait time", position)?
                .to_int()
                .map_err(|e| e.or_at(position))?;
            if ms > 0 {
                thread::sleep(Duration::from_millis(ms as u64));
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Captured(Rc<RefCell<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run(source: &str) -> (Result<(), ScriptError>, String) {
        let captured = Captured::default();
        let mut parser = ScriptParser::new().with_output(Box::new(captured.clone()));
        let result = parser.execute(&mut TokenStream::from_source(source));
        let text = String::from_utf8(captured.0.borrow().clone()).unwrap();
        (result, text)
    }

    #[test]
    fn test_if_else_selects_one_branch() {
        let (result, out) = run("set x = 2 + 3 * 4; if x == 14 then print x; else print 0;");
        result.unwrap();
        assert_eq!(out, "14\n");

        let (result, out) = run("if false then print 1; else print 2; ; print 3;");
        result.unwrap();
        assert_eq!(out, "2\n3\n");
    }

    #[test]
    fn test_untaken_branch_has_no_effects() {
        let (result, out) = run("if true then print 'a'; else set y = 1 + true; print 'b'; ;");
        result.unwrap();
        assert_eq!(out, "a\n");
    }

    #[test]
    fn test_if_requires_boolean() {
        let (result, _) = run("if 1 then print 1; ;");
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.position, Some(Position::new(1, 4)));
    }

    #[test]
    fn test_while_loop_counts() {
        let (result, out) = run("set i = 0; while i < 3 print i; set i = i + 1; ; print 'done';");
        result.unwrap();
        assert_eq!(out, "0\n1\n2\ndone\n");
    }

    #[test]
    fn test_break_leaves_innermost_loop() {
        let source = "set i = 0; \
            while true \
              set i = i + 1; \
              if i == 3 then break; ; \
              print i; \
            ; \
            print 'after';";
        let (result, out) = run(source);
        result.unwrap();
        assert_eq!(out, "1\n2\nafter\n");
    }

    #[test]
    fn test_error_command_raises() {
        let (result, out) = run("print 'before'; error 'stop here'; print 'after';");
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Raised);
        assert_eq!(err.message, "stop here");
        assert_eq!(out, "before\n");
    }

    #[test]
    fn test_print_null_is_reference_error() {
        let (result, _) = run("print nothing;");
        assert_eq!(result.unwrap_err().kind, ErrorKind::Reference);
    }

    #[test]
    fn test_wait_accepts_zero() {
        let (result, _) = run("wait 0; wait -5;");
        result.unwrap();
    }

    #[test]
    fn test_set_into_temporary_fails() {
        let (result, _) = run("set 1 = 2;");
        assert_eq!(result.unwrap_err().kind, ErrorKind::Reference);
    }
}
