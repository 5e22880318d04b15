//! HTTP verb commands and the transport seam they call through.
//!
//! `GET`, `PUT`, `POST` and `DELETE` store a [`HttpResult`] in their target.
//! They only exist on a parser built with
//! [`ScriptParser::with_transport`](crate::parser::ScriptParser::with_transport);
//! tests supply a recording [`HttpTransport`] and the CLI supplies
//! [`BlockingTransport`](crate::transport::BlockingTransport).

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use tracing::{info, warn};

use crate::command::{required, Command};
use crate::configuration::{Configuration, ConfigurationHandle};
use crate::error::{ScriptError, TransportError};
use crate::parser::{Flow, Mode, ScriptParser};
use crate::reference::VariableReference;
use crate::stream::TokenStream;
use crate::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }

    /// PUT and POST send a configuration as the request body.
    pub fn has_body(self) -> bool {
        matches!(self, Method::Put | Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Performs HTTP requests for the verb commands.
pub trait HttpTransport {
    /// Sends `body` (JSON text) when present and returns the status and
    /// decoded response text.
    fn execute(&self, method: Method, url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError>;
}

/// The value a verb command stores: status plus a lazily parsed body.
#[derive(Debug)]
pub struct HttpResult {
    response: HttpResponse,
    parsed: OnceCell<ConfigurationHandle>,
}

impl HttpResult {
    pub fn new(response: HttpResponse) -> Self {
        Self {
            response,
            parsed: OnceCell::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.response.status
    }

    /// The body as a configuration, parsed on first access.
    pub fn value(&self) -> Result<ConfigurationHandle, ScriptError> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed.clone());
        }
        let configuration = Configuration::from_json(&self.response.body)?.into_handle();
        Ok(self.parsed.get_or_init(|| configuration).clone())
    }

    pub fn attribute(&self, name: &str) -> Result<VariableReference, ScriptError> {
        let is = |code: u16| -> Result<VariableReference, ScriptError> {
            Ok(VariableReference::value(Variable::Boolean(self.status() == code)))
        };
        match name {
            "__OK__" => is(200),
            "__CREATED__" => is(201),
            "__UNAUTHORIZED__" => is(401),
            "__NOTFOUND__" => is(404),
            "__status__" => Ok(VariableReference::value(Variable::Int(i64::from(self.status())))),
            "__value__" => Ok(VariableReference::value(Variable::Configuration(self.value()?))),
            _ => Err(ScriptError::reference(format!("No attribute '{}' for result", name))),
        }
    }
}

pub(crate) fn register_verbs(parser: &mut ScriptParser, transport: Rc<dyn HttpTransport>) {
    for method in [Method::Get, Method::Put, Method::Post, Method::Delete] {
        parser.register_command(method.as_str(), HttpCommand::new(method, transport.clone()));
    }
}

/// `GET r = url`, `DELETE r = url`, `PUT r = payload to url`, `POST r = payload to url`
pub struct HttpCommand {
    method: Method,
    transport: Rc<dyn HttpTransport>,
}

impl HttpCommand {
    pub fn new(method: Method, transport: Rc<dyn HttpTransport>) -> Self {
        Self { method, transport }
    }
}

impl Command for HttpCommand {
    fn parse(&self, parser: &mut ScriptParser, stream: &mut TokenStream, mode: Mode) -> Result<Flow, ScriptError> {
        let target_position = stream.position();
        let target = parser.require_expression(stream, mode)?;
        stream.expect_punctuation("=")?;

        let payload = if self.method.has_body() {
            let position = stream.position();
            let payload = parser.require_expression(stream, mode)?;
            stream.expect_word("to")?;
            Some((payload, position))
        } else {
            None
        };

        let url_position = stream.position();
        let url = parser.require_expression(stream, mode)?;
        if mode.is_skip() {
            return Ok(Flow::Continue);
        }

        let url = required(&url, "URL", url_position)?
            .to_string_value()
            .map_err(|e| e.or_at(url_position))?;
        let body = match payload {
            Some((payload, position)) => {
                let value = required(&payload, "Request payload", position)?;
                Some(payload_json(&value, self.method).map_err(|e| e.or_at(position))?)
            }
            None => None,
        };

        info!(method = %self.method, url = %url, "sending request");
        let response = self
            .transport
            .execute(self.method, &url, body.as_deref())
            .map_err(|e| {
                warn!(method = %self.method, url = %url, error = %e, "request failed");
                ScriptError::from(e).at(url_position)
            })?;
        info!(method = %self.method, status = response.status, "response received");
        if !(200..300).contains(&response.status) {
            warn!(method = %self.method, url = %url, status = response.status, "non-success status");
        }

        target
            .set(Some(Variable::Result(Rc::new(HttpResult::new(response)))))
            .map_err(|e| e.or_at(target_position))?;
        Ok(Flow::Continue)
    }
}

fn payload_json(value: &Variable, method: Method) -> Result<String, ScriptError> {
    match value {
        Variable::Configuration(c) => Ok(c.borrow().to_json()),
        Variable::ConfigurationNode(n) => Ok(Configuration {
            children: vec![n.clone()],
        }
        .to_json()),
        other => Err(ScriptError::type_error(format!(
            "{} payload must be a configuration, not {}",
            method,
            other.type_name()
        ))),
    }
}
