//! Character and token streams over script source.
//!
//! [`CharacterStream`] pulls input lazily, one line at a time, from any
//! [`BufRead`] and remembers everything it has read so that a
//! [`TokenStream`] can be rewound to a [`Mark`]. Rewinding is how `while`
//! re-evaluates its condition; lazy reading is what lets the interactive
//! driver execute standard input statement by statement.
//!
//! Offsets are counted from the start of input. Text before the last
//! [`TokenStream::discard_consumed`] is dropped from the buffer, and marks
//! taken before it can no longer be reset to.
//!
//! # Example
//!
//! ```
//! use mcfscript_core::stream::TokenStream;
//!
//! let mut tokens = TokenStream::from_source("set x = 1.5;");
//! assert!(tokens.peek().unwrap().is_word("set"));
//! tokens.skip();
//! assert!(tokens.peek().unwrap().is_word("x"));
//! ```

use std::io::{BufRead, Cursor};

use tracing::warn;

use crate::error::{Position, ScriptError};
use crate::token::{Token, TokenKind, TWO_CHAR_PUNCTUATION};

/// A saved read position. Obtained from [`TokenStream::mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

impl Mark {
    /// Characters consumed from the start of input.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

pub struct CharacterStream {
    reader: Option<Box<dyn BufRead>>,
    chars: Vec<char>,
    /// Input offset of `chars[0]`.
    base: usize,
    offset: usize,
    line: usize,
    column: usize,
}

impl CharacterStream {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self {
            reader: Some(reader),
            chars: Vec::new(),
            base: 0,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Reads more input until `index` is buffered. Returns false at end of input.
    fn fill_to(&mut self, index: usize) -> bool {
        while index >= self.base + self.chars.len() {
            let Some(reader) = self.reader.as_mut() else {
                return false;
            };
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) => self.reader = None,
                Ok(_) => self.chars.extend(line.chars()),
                Err(e) => {
                    warn!(error = %e, "input read failed, treating as end of input");
                    self.reader = None;
                }
            }
        }
        true
    }

    pub fn peek(&mut self) -> Option<char> {
        self.peek_at(0)
    }

    pub fn peek_at(&mut self, ahead: usize) -> Option<char> {
        let index = self.offset + ahead;
        if self.fill_to(index) {
            Some(self.chars[index - self.base])
        } else {
            None
        }
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.offset += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        if mark.offset < self.base {
            warn!(mark = mark.offset, base = self.base, "mark precedes discarded input, ignoring reset");
            return;
        }
        self.offset = mark.offset;
        self.line = mark.line;
        self.column = mark.column;
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    /// Drops buffered input before `offset`, never past the read position.
    pub fn discard_before(&mut self, offset: usize) {
        let upto = offset.min(self.offset);
        if upto > self.base {
            self.chars.drain(..upto - self.base);
            self.base = upto;
        }
    }
}

/// One-token lookahead over a [`CharacterStream`].
pub struct TokenStream {
    chars: CharacterStream,
    /// Scanned but unconsumed token, with the mark of where scanning began.
    lookahead: Option<(Mark, Option<Token>)>,
}

impl TokenStream {
    pub fn new(reader: Box<dyn BufRead>) -> Self {
        Self {
            chars: CharacterStream::new(reader),
            lookahead: None,
        }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Box::new(Cursor::new(source.to_string())))
    }

    /// The next token without consuming it; `None` at end of input.
    pub fn peek(&mut self) -> Option<&Token> {
        if self.lookahead.is_none() {
            let start = self.chars.mark();
            let token = self.scan();
            self.lookahead = Some((start, token));
        }
        self.lookahead.as_ref().and_then(|(_, t)| t.as_ref())
    }

    /// Discards the current lookahead token.
    pub fn skip(&mut self) {
        if self.lookahead.is_none() {
            self.peek();
        }
        self.lookahead = None;
    }

    /// Consumes and returns the next token.
    pub fn next_token(&mut self) -> Option<Token> {
        self.peek();
        self.lookahead.take().and_then(|(_, t)| t)
    }

    /// Position of the next token, or of the end of input.
    pub fn position(&mut self) -> Position {
        let chars_position = self.chars.position();
        self.peek().map(|t| t.position).unwrap_or(chars_position)
    }

    pub fn at_end(&mut self) -> bool {
        self.peek().is_none()
    }

    /// Position from which the next token will be scanned.
    pub fn mark(&self) -> Mark {
        match &self.lookahead {
            Some((start, _)) => *start,
            None => self.chars.mark(),
        }
    }

    pub fn reset(&mut self, mark: Mark) {
        self.lookahead = None;
        self.chars.reset(mark);
    }

    /// Releases input that has been fully consumed. The lookahead token, if
    /// any, stays readable.
    pub fn discard_consumed(&mut self) {
        let keep = self.mark().offset();
        self.chars.discard_before(keep);
    }

    pub fn next_is_punctuation(&mut self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punctuation(p))
    }

    pub fn next_is_word(&mut self, w: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(w))
    }

    /// Consumes punctuation `p` or fails with a syntax error naming what was found.
    pub fn expect_punctuation(&mut self, p: &str) -> Result<(), ScriptError> {
        if self.next_is_punctuation(p) {
            self.skip();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", p)))
        }
    }

    pub fn expect_word(&mut self, w: &str) -> Result<(), ScriptError> {
        if self.next_is_word(w) {
            self.skip();
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", w)))
        }
    }

    /// Syntax error at the next token reporting that `wanted` was expected.
    pub fn unexpected(&mut self, wanted: &str) -> ScriptError {
        let position = self.position();
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "end of input".to_string(),
        };
        ScriptError::syntax(format!("Expected {} but found {}", wanted, found), position)
    }

    /// Drops the lookahead and the remainder of the current input line.
    pub fn recover(&mut self) {
        self.lookahead = None;
        while let Some(c) = self.chars.next() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == '#' {
                while let Some(c) = self.chars.next() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn scan(&mut self) -> Option<Token> {
        self.skip_blanks();
        let position = self.chars.position();
        let first = self.chars.next()?;

        let kind = if first == '\'' || first == '"' {
            let mut text = String::new();
            while let Some(c) = self.chars.next() {
                if c == first {
                    break;
                }
                if c == '\\' {
                    match self.chars.next() {
                        Some(escaped) => text.push(escaped),
                        None => break,
                    }
                } else {
                    text.push(c);
                }
            }
            TokenKind::String(text)
        } else if is_word_char(first) && !first.is_ascii_digit() {
            let mut text = String::from(first);
            while let Some(c) = self.chars.peek() {
                if !is_word_char(c) {
                    break;
                }
                text.push(c);
                self.chars.next();
            }
            TokenKind::Word(text)
        } else if first.is_ascii_digit() {
            let mut text = String::from(first);
            self.scan_digits(&mut text);
            let decimal = self.chars.peek() == Some('.')
                && self.chars.peek_at(1).is_some_and(|c| c.is_ascii_digit());
            if decimal {
                self.chars.next();
                text.push('.');
                self.scan_digits(&mut text);
                TokenKind::Float(text)
            } else {
                TokenKind::Integer(text)
            }
        } else {
            let mut text = String::from(first);
            if let Some(second) = self.chars.peek() {
                text.push(second);
                if TWO_CHAR_PUNCTUATION.contains(&text.as_str()) {
                    self.chars.next();
                } else {
                    text.pop();
                }
            }
            TokenKind::Punctuation(text)
        };

        Some(Token::new(kind, position))
    }

    fn scan_digits(&mut self, text: &mut String) {
        while let Some(c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.chars.next();
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '@'
}
