//! HTTP collaborator contract
//!
//! The adapter never talks to the network directly; every request goes
//! through an [`HttpClient`]. This keeps transport concerns (timeouts, TLS,
//! authentication) outside the translation engine and lets tests script
//! responses.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::throttle;

/// Config key holding the active API version (e.g. `v59.0`)
pub const API_VERSION_KEY: &str = "apiVersion";

/// Header suppressing assignment-rule side effects on created records
pub const AUTO_ASSIGN_HEADER: &str = "Sforce-Auto-Assign";

/// HTTP methods used by the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Wire name of the method
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request handed to the collaborator
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method
    pub method: Method,
    /// Path and query, relative to the instance URL
    pub url: String,
    /// Per-request headers
    pub headers: BTreeMap<String, String>,
    /// JSON body
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// Create a request without headers or body
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Merge per-request headers
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Response returned by the collaborator
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Raw body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with a body
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Header value, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is 2xx
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the status is 4xx
    #[inline]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Decode the body as JSON; an empty body decodes as `null`
    pub fn json(&self) -> Result<serde_json::Value> {
        if self.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as lossy UTF-8, for diagnostics
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs requests against the provider
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request and read the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Read a client setting (e.g. [`API_VERSION_KEY`])
    fn config(&self, key: &str) -> Option<String>;
}

impl fmt::Debug for dyn HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.config(API_VERSION_KEY) {
            Some(version) => write!(f, "HttpClient({version})"),
            None => f.write_str("HttpClient"),
        }
    }
}

/// Active API version, read from the client
pub fn api_version(client: &dyn HttpClient) -> Result<String> {
    client
        .config(API_VERSION_KEY)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| Error::config(format!("HTTP client has no \"{API_VERSION_KEY}\" setting")))
}

/// Send a request and apply the usage guard to the response
///
/// The guard runs whenever the usage header is present, whatever the status.
pub async fn send_guarded(client: &dyn HttpClient, request: HttpRequest) -> Result<HttpResponse> {
    let response = client.send(request).await?;
    if let Some(line) = response.header(throttle::HEADER) {
        throttle::guard(line)?;
    }
    Ok(response)
}

/// REST endpoint templates, all under `/services/data/<version>`
pub mod routes {
    use super::escape_query;

    /// `GET` endpoint running a query
    pub fn query(version: &str, statement: &str) -> String {
        format!("/services/data/{version}/query?q={}", escape_query(statement))
    }

    /// `POST` endpoint creating a record
    pub fn sobject(version: &str, table: &str) -> String {
        format!("/services/data/{version}/sobjects/{table}")
    }

    /// `PATCH`/`DELETE` endpoint addressing one record
    pub fn sobject_id(version: &str, table: &str, id: &str) -> String {
        format!("/services/data/{version}/sobjects/{table}/{id}")
    }

    /// `PATCH` endpoint addressing a record by external id
    pub fn sobject_external_id(version: &str, table: &str, field: &str, value: &str) -> String {
        format!("/services/data/{version}/sobjects/{table}/{field}/{value}")
    }

    /// `POST` endpoint running a composite request
    pub fn composite(version: &str) -> String {
        format!("/services/data/{version}/composite")
    }
}

/// Escape a statement for use as a query-string value
///
/// Characters valid in a query component pass through, as do existing `%XX`
/// escapes (parameters bound through the query builder arrive already
/// encoded). `&` and `#` are always escaped so the statement stays one value.
pub fn escape_query(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = String::with_capacity(bytes.len());

    for (i, &b) in bytes.iter().enumerate() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(
                b,
                b'-' | b'_' | b'.' | b'~' | b'!' | b'$' | b'\'' | b'(' | b')' | b'*' | b'+'
                    | b',' | b';' | b'=' | b':' | b'@' | b'/' | b'?'
            )
            || (b == b'%' && is_escape(&bytes[i + 1..]));

        if keep {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }

    out
}

fn is_escape(rest: &[u8]) -> bool {
    rest.len() >= 2 && rest[0].is_ascii_hexdigit() && rest[1].is_ascii_hexdigit()
}
