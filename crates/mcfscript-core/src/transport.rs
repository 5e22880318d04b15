//! Blocking HTTP transport built on `reqwest`.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use tracing::debug;

use crate::config::ScriptConfig;
use crate::error::TransportError;
use crate::http::{HttpResponse, HttpTransport, Method};

const DEFAULT_USER_AGENT: &str = concat!("mcfscript/", env!("CARGO_PKG_VERSION"));

pub struct BlockingTransport {
    client: Client,
}

impl BlockingTransport {
    /// Builds a client with the configured timeout (none when unset) and user agent.
    pub fn new(config: &ScriptConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.http_timeout_secs.map(Duration::from_secs))
            .user_agent(config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for BlockingTransport {
    fn execute(&self, method: Method, url: &str, body: Option<&str>) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl(url.to_string()))?;
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Put => self.client.put(url),
            Method::Post => self.client.post(url),
            Method::Delete => self.client.delete(url),
        };
        let request = match body {
            Some(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            None => request,
        };

        let response = request
            .send()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        // text() decodes using the charset from Content-Type, defaulting to UTF-8.
        let body = response
            .text()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        debug!(status, bytes = body.len(), "response body read");
        Ok(HttpResponse { status, body })
    }
}
