//! Shared test helpers for mcfscript-core integration tests.
//!
//! Provides a recording mock transport, a shared output buffer that stands in
//! for stdout, and shortcuts for evaluating expressions and running scripts.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::rc::Rc;

use mcfscript_core::error::{ScriptError, TransportError};
use mcfscript_core::http::{HttpResponse, HttpTransport, Method};
use mcfscript_core::parser::ScriptParser;
use mcfscript_core::stream::TokenStream;
use mcfscript_core::variable::Variable;

// ---------------------------------------------------------------------------
// Output capture
// ---------------------------------------------------------------------------

/// A `Write` sink whose contents stay readable after the parser takes it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<String>,
}

/// Replays canned responses in order and records every request it sees.
/// When the queue runs dry it answers `200` with an empty body.
#[derive(Default)]
pub struct MockTransport {
    responses: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: &str) {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }));
    }

    pub fn fail(&self, error: TransportError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }
}

impl HttpTransport for MockTransport {
    fn execute(&self, method: Method, url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.map(String::from),
        });
        self.responses.borrow_mut().pop_front().unwrap_or(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Parser shortcuts
// ---------------------------------------------------------------------------

/// A parser printing into a fresh [`SharedBuffer`].
pub fn parser_with_output() -> (ScriptParser, SharedBuffer) {
    let output = SharedBuffer::default();
    let parser = ScriptParser::new().with_output(Box::new(output.clone()));
    (parser, output)
}

/// A parser with HTTP verbs backed by `transport`.
pub fn parser_with_transport(transport: Rc<MockTransport>) -> (ScriptParser, SharedBuffer) {
    let output = SharedBuffer::default();
    let parser = ScriptParser::new()
        .with_transport(transport)
        .with_output(Box::new(output.clone()));
    (parser, output)
}

pub fn execute(parser: &mut ScriptParser, source: &str) -> Result<(), ScriptError> {
    parser.execute(&mut TokenStream::from_source(source))
}

/// Evaluates one expression and resolves it.
pub fn evaluate(parser: &mut ScriptParser, source: &str) -> Result<Option<Variable>, ScriptError> {
    let mut stream = TokenStream::from_source(source);
    let reference = parser.evaluate_expression(&mut stream)?;
    Ok(reference.resolve())
}

/// Evaluates an expression that must produce a value.
pub fn value(parser: &mut ScriptParser, source: &str) -> Variable {
    evaluate(parser, source)
        .unwrap_or_else(|e| panic!("evaluating {:?} failed: {}", source, e))
        .unwrap_or_else(|| panic!("{:?} evaluated to null", source))
}

pub fn string_of(parser: &mut ScriptParser, source: &str) -> String {
    value(parser, source).to_string_value().unwrap()
}

pub fn int_of(parser: &mut ScriptParser, source: &str) -> i64 {
    value(parser, source).to_int().unwrap()
}

pub fn bool_of(parser: &mut ScriptParser, source: &str) -> bool {
    value(parser, source).to_bool().unwrap()
}

pub fn float_of(parser: &mut ScriptParser, source: &str) -> f64 {
    value(parser, source).to_float().unwrap()
}
