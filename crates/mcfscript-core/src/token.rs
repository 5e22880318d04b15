//! Token types produced by the [`TokenStream`](crate::stream::TokenStream).

use std::fmt;

use crate::error::Position;

/// Punctuation recognized as a single two-character token.
pub const TWO_CHAR_PUNCTUATION: [&str; 8] = ["==", "!=", ">=", "<=", "&&", "||", ">>", "<<"];

/// Double-quotes `text`, escaping `"` and backslash so it re-tokenizes unchanged.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Punctuation(String),
    /// Quoted text with escapes already removed.
    String(String),
    /// Digits as written; converted by the parser so overflow is reported there.
    Integer(String),
    Float(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }

    pub fn is_punctuation(&self, p: &str) -> bool {
        matches!(&self.kind, TokenKind::Punctuation(s) if s == p)
    }

    pub fn is_word(&self, w: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(s) if s == w)
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(s) => Some(s),
            _ => None,
        }
    }

    pub fn punctuation(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Punctuation(s) => Some(s),
            _ => None,
        }
    }

    /// Source text that re-tokenizes to this token.
    pub fn source_text(&self) -> String {
        match &self.kind {
            TokenKind::String(s) => quote(s),
            TokenKind::Punctuation(s)
            | TokenKind::Integer(s)
            | TokenKind::Float(s)
            | TokenKind::Word(s) => s.clone(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::String(s) => write!(f, "string '{}'", s),
            TokenKind::Punctuation(s) => write!(f, "'{}'", s),
            TokenKind::Integer(s) | TokenKind::Float(s) => write!(f, "number {}", s),
            TokenKind::Word(s) => write!(f, "'{}'", s),
        }
    }
}
