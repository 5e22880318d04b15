//! Error types for the script engine.
//!
//! Every failure the engine can report is a [`ScriptError`]. The
//! [`ErrorKind`] only classifies the cause for display; callers never need to
//! recover from one kind differently than another, since any error aborts the
//! current parse/execute pass.

use std::fmt;

use thiserror::Error;

/// A location in script source (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Broad cause of a [`ScriptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required token was missing or an unexpected one was found.
    Syntax,
    /// An operator or conversion is not supported by a value's variant.
    Type,
    /// A null operand, an index out of bounds or a missing key.
    Reference,
    /// The HTTP transport failed to complete a request.
    Transport,
    /// Raised explicitly by the script's `error` statement.
    Raised,
    /// Writing script output failed.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Syntax => "Syntax error",
            ErrorKind::Type => "Type error",
            ErrorKind::Reference => "Reference error",
            ErrorKind::Transport => "Transport error",
            ErrorKind::Raised => "Script error",
            ErrorKind::Io => "I/O error",
        };
        f.write_str(label)
    }
}

fn position_suffix(position: &Option<Position>) -> String {
    match position {
        Some(p) => format!(" at {}", p),
        None => String::new(),
    }
}

/// The single error type raised while tokenizing, parsing or evaluating.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}{}", position_suffix(.position))]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: Option<Position>,
}

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            position: None,
        }
    }

    pub fn syntax(message: impl Into<String>, position: Position) -> Self {
        Self::new(ErrorKind::Syntax, message).at(position)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn reference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reference, message)
    }

    pub fn raised(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Raised, message)
    }

    /// An operator or conversion the variant does not implement.
    pub fn unsupported(operation: &str, type_name: &str) -> Self {
        Self::type_error(format!("{} illegal for {}", operation, type_name))
    }

    /// Sets the position unconditionally.
    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets the position only if none was recorded closer to the cause.
    pub fn or_at(mut self, position: Position) -> Self {
        if self.position.is_none() {
            self.position = Some(position);
        }
        self
    }
}

/// Failure reported by an [`HttpTransport`](crate::http::HttpTransport).
#[derive(Error, Debug)]
pub enum TransportError {
    /// The URL could not be parsed or is not absolute.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// The request could not be sent or the response could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The transport could not be constructed from its configuration.
    #[error("transport setup failed: {0}")]
    Setup(String),
}

impl From<std::io::Error> for ScriptError {
    fn from(e: std::io::Error) -> Self {
        ScriptError::new(ErrorKind::Io, e.to_string())
    }
}

impl From<TransportError> for ScriptError {
    fn from(e: TransportError) -> Self {
        ScriptError::new(ErrorKind::Transport, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_position() {
        let e = ScriptError::type_error("binary + illegal for boolean");
        assert_eq!(e.to_string(), "Type error: binary + illegal for boolean");
    }

    #[test]
    fn test_display_with_position() {
        let e = ScriptError::syntax("Missing semicolon", Position::new(3, 7));
        assert_eq!(e.to_string(), "Syntax error: Missing semicolon at line 3, column 7");
    }

    #[test]
    fn test_or_at_keeps_first_position() {
        let e = ScriptError::reference("Index out of bounds")
            .or_at(Position::new(1, 2))
            .or_at(Position::new(5, 5));
        assert_eq!(e.position, Some(Position::new(1, 2)));
    }

    #[test]
    fn test_transport_error_converts() {
        let e: ScriptError = TransportError::Request("connection refused".into()).into();
        assert_eq!(e.kind, ErrorKind::Transport);
        assert!(e.message.contains("connection refused"));
    }
}
