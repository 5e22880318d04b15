//! # mcfscript-core
//!
//! An embeddable interpreter for the ManifoldCF API scripting language: a
//! small statement language for driving the JSON REST API with `GET`, `PUT`,
//! `POST` and `DELETE`, and for building and inspecting the configuration
//! trees that API exchanges.
//!
//! ## Modules
//!
//! - [`stream`] - Lazy character stream and one-token lookahead tokenizer
//! - [`token`] - Token kinds and positions
//! - [`parser`] - Recursive-descent parser that executes or skips as it parses
//! - [`command`] - Built-in statements (`if`, `while`, `set`, `print`, ...)
//! - [`operation`] - `new url`, `new dictionary` and the other constructors
//! - [`variable`] - Script values, conversions and attributes
//! - [`operator`] - Binary and unary operator semantics
//! - [`reference`] - Assignable places (variables, elements, attributes)
//! - [`configuration`] - Configuration trees and their JSON form
//! - [`http`] - HTTP verb commands and the [`http::HttpTransport`] seam
//! - [`transport`] - `reqwest` implementation of the transport
//! - [`config`] - Settings persisted in `~/.mcfscript/config.json`
//!
//! ## Example
//!
//! ```
//! use mcfscript_core::parser::ScriptParser;
//! use mcfscript_core::stream::TokenStream;
//!
//! let mut parser = ScriptParser::new();
//! let mut stream = TokenStream::from_source(
//!     "set jobs = [1, 2]; insert 3 into jobs; set n = jobs.__size__;",
//! );
//! parser.execute(&mut stream).unwrap();
//! assert_eq!(parser.context().get("n").unwrap().to_int().unwrap(), 3);
//! ```

pub mod command;
pub mod config;
pub mod configuration;
pub mod context;
pub mod error;
pub mod http;
pub mod operation;
pub mod operator;
pub mod parser;
pub mod reference;
pub mod stream;
pub mod token;
pub mod transport;
pub mod variable;

pub use error::{ErrorKind, Position, ScriptError};
pub use parser::{Mode, ScriptParser};
pub use stream::TokenStream;
pub use variable::Variable;
