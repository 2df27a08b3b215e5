//! HTTP transport capability used by [`RigClient`](crate::client::RigClient).
//!
//! The client never talks to `reqwest` directly. It builds an [`HttpRequest`]
//! and hands it to a [`Transport`], which reports either a decoded
//! [`HttpResponse`] or a tagged [`TransportFailure`]. `HttpTransport` is the
//! production implementation; tests substitute an in-process recorder.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// HTTP verbs accepted by the rig API.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Patch => "patch",
            Self::Delete => "delete",
        }
    }

    fn to_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound call, fully resolved against the client's base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// Absolute URL, e.g. `https://rig.xplex.me/streams/`.
    pub url: String,
    pub method: HttpMethod,
    /// JSON body, if the operation sends one.
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Successful response with its body decoded as JSON.
///
/// Bodies that are empty or not JSON decode to [`Value::Null`].
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Why a transport call did not produce a successful response.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportFailure {
    /// The server answered with a non-success status. A JSON body is decoded;
    /// any other body is carried verbatim as [`Value::String`].
    Structured { status: StatusCode, body: Value },
    /// No response exists: DNS, connect, timeout, or a body that could not be
    /// read.
    Message(String),
}

/// Capability to perform one HTTP exchange.
///
/// Implementations must treat any non-2xx status as a failure and must not
/// retry.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportFailure>> + Send {
        (**self).send(request)
    }
}

/// `reqwest`-backed transport with a fixed per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    http: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { http, timeout })
    }

    /// Wraps an existing `reqwest` client, e.g. one with custom TLS roots.
    pub fn with_client(http: Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportFailure> {
        let mut builder = self
            .http
            .request(request.method.to_reqwest(), &request.url)
            .timeout(self.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body.as_ref() {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| {
            warn!(
                event = "rig_http_send_failed",
                method = %request.method,
                url = %request.url,
                error = %err
            );
            TransportFailure::Message(err.to_string())
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| TransportFailure::Message(err.to_string()))?;

        debug!(
            event = "rig_http_response",
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            body_len = text.len()
        );

        if !status.is_success() {
            return Err(classify_error_body(status, &text));
        }

        Ok(HttpResponse {
            status,
            body: decode_success_body(&text),
        })
    }
}

fn decode_success_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or(Value::Null)
}

fn classify_error_body(status: StatusCode, text: &str) -> TransportFailure {
    let body = serde_json::from_str::<Value>(text)
        .unwrap_or_else(|_| Value::String(text.to_string()));
    TransportFailure::Structured { status, body }
}
