//! `reqwest`-backed HTTP collaborator
//!
//! Every request carries the bearer token from an [`AccessTokenProvider`] plus
//! the provider's default headers; request-specific headers are applied last
//! and win over the defaults.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AccessTokenProvider;
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpRequest, HttpResponse, Method, API_VERSION_KEY, AUTO_ASSIGN_HEADER};

/// Authorized client for one instance
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    pretty_print: bool,
    properties: HashMap<String, String>,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl std::fmt::Debug for ReqwestHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestHttpClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("pretty_print", &self.pretty_print)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

impl ReqwestHttpClient {
    /// Create a client for the configured instance
    pub fn new(config: &ConnectionConfig, tokens: Arc<dyn AccessTokenProvider>) -> Result<Self> {
        config.validate()?;

        if config.instance_url.starts_with("http://")
            && !config.instance_url.contains("localhost")
            && !config.instance_url.contains("127.0.0.1")
        {
            warn!("instance URL uses plain HTTP, access tokens will be sent in cleartext");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        let base_url = config.instance_url.trim_end_matches('/').to_string();
        debug!(base_url = %base_url, api_version = %config.api_version, "SOQL client initialized");

        Ok(Self {
            client,
            base_url,
            api_version: config.api_version.clone(),
            pretty_print: config.pretty_print,
            properties: config.properties.clone(),
            tokens,
        })
    }

    /// Absolute URL for a path relative to the instance
    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{url}", self.base_url)
        }
    }

    fn default_headers(&self) -> BTreeMap<&'static str, &'static str> {
        let mut headers = BTreeMap::from([
            ("Content-Type", "application/json"),
            (AUTO_ASSIGN_HEADER, "FALSE"),
        ]);
        if self.pretty_print {
            headers.insert("X-PrettyPrint", "1");
        }
        headers
    }

    /// Default headers overlaid with the request's own, names compared case-insensitively
    fn headers_for(&self, request: &HttpRequest) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .default_headers()
            .into_iter()
            .filter(|(name, _)| {
                !request
                    .headers
                    .keys()
                    .any(|own| own.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        headers.extend(request.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        headers
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request_id = Uuid::new_v4();
        let url = self.absolute_url(&request.url);
        let token = self.tokens.access_token().await?;

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url).header(
            "Authorization",
            format!("Bearer {}", token.expose_secret()),
        );
        for (name, value) in self.headers_for(&request) {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(%request_id, method = %request.method, url = %url, "SOQL request");
        let started = Instant::now();

        let response = builder.send().await?;
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
        let body = response.bytes().await?.to_vec();

        debug!(
            %request_id,
            status,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "SOQL response"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn config(&self, key: &str) -> Option<String> {
        if key == API_VERSION_KEY {
            return Some(self.api_version.clone());
        }
        self.properties.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;

    fn client(config: ConnectionConfig) -> ReqwestHttpClient {
        ReqwestHttpClient::new(&config, Arc::new(StaticToken::new("token"))).unwrap()
    }

    #[test]
    fn test_config_exposes_api_version() {
        let client = client(
            ConnectionConfig::new("https://example.my.salesforce.com/", "k", "s")
                .with_api_version("v58.0")
                .with_property("region", "eu"),
        );

        assert_eq!(client.config(API_VERSION_KEY).as_deref(), Some("v58.0"));
        assert_eq!(client.config("region").as_deref(), Some("eu"));
        assert_eq!(client.config("missing"), None);
    }

    #[test]
    fn test_absolute_url() {
        let client = client(ConnectionConfig::new(
            "https://example.my.salesforce.com/",
            "k",
            "s",
        ));

        assert_eq!(
            client.absolute_url("/services/data/v59.0/composite"),
            "https://example.my.salesforce.com/services/data/v59.0/composite"
        );
        assert_eq!(
            client.absolute_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
    }

    #[test]
    fn test_default_headers() {
        let client = client(
            ConnectionConfig::new("https://example.my.salesforce.com", "k", "s")
                .with_pretty_print(false),
        );
        let headers = client.default_headers();

        assert_eq!(headers.get(AUTO_ASSIGN_HEADER), Some(&"FALSE"));
        assert_eq!(headers.get("Content-Type"), Some(&"application/json"));
        assert!(!headers.contains_key("X-PrettyPrint"));
    }

    #[test]
    fn test_request_headers_override_defaults() {
        let client = client(ConnectionConfig::new("https://example.my.salesforce.com", "k", "s"));
        let request = HttpRequest::new(Method::Post, "/x")
            .with_headers(&BTreeMap::from([("sforce-auto-assign".to_string(), "TRUE".to_string())]));

        let headers = client.headers_for(&request);
        let auto_assign: Vec<_> = headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(AUTO_ASSIGN_HEADER))
            .collect();

        assert_eq!(auto_assign.len(), 1);
        assert_eq!(auto_assign[0].1, "TRUE");
        assert!(headers.iter().any(|(name, _)| name == "Content-Type"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ConnectionConfig::new("not a url", "k", "s");
        let err = ReqwestHttpClient::new(&config, Arc::new(StaticToken::new("t"))).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
