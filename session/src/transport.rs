//! The I/O seam of the session.
//!
//! `SessionClient` never talks to the network directly; it hands each
//! `HttpRequest` built by the core to a `Transport` and parses whatever comes
//! back. Production code uses `ReqwestTransport`; tests substitute a fake.

use async_trait::async_trait;
use oyster_core::{ClientError, HttpMethod, HttpRequest, HttpResponse};

use crate::config::SessionConfig;

/// Executes one HTTP exchange.
///
/// Implementations report a response for every status code, 4xx and 5xx
/// included; only failures that produced no response are errors, and those
/// must be `ClientError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError>;
}

/// `reqwest`-backed transport with a cookie store, so the session cookie set
/// by login is sent on every later request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &SessionConfig) -> Result<Self, ClientError> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(transport_error)?;
        Ok(Self { http })
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    ClientError::Transport(err.to_string())
}

fn method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let mut builder = self
            .http
            .request(method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
