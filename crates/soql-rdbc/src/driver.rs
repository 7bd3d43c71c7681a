//! Driver entry point
//!
//! [`SoqlDriver`] turns driver parameters into a ready [`SoqlConnection`] and
//! wraps errors leaving the adapter into a [`DriverError`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::auth::{AccessTokenProvider, PasswordGrantTokenProvider};
use crate::client::ReqwestHttpClient;
use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionFactory};
use crate::error::{Error, ErrorCategory, Result};
use crate::http::HttpClient;
use crate::soql::SoqlConnection;

/// Driver name reported to the relational layer
pub const DRIVER_NAME: &str = "soql";

/// Error handed to the relational layer
///
/// Keeps the adapter error as its source, along with the provider code.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    code: Option<String>,
    #[source]
    source: Error,
}

impl DriverError {
    /// Wrap `source` under a caller message
    pub fn new(message: impl Into<String>, source: Error) -> Self {
        Self {
            message: message.into(),
            code: source.code().map(str::to_string),
            source,
        }
    }

    /// Provider error code, when there was one
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Category of the wrapped error
    pub fn category(&self) -> ErrorCategory {
        self.source.category()
    }

    /// The wrapped error
    pub fn inner(&self) -> &Error {
        &self.source
    }

    /// Take the wrapped error
    pub fn into_inner(self) -> Error {
        self.source
    }
}

impl From<Error> for DriverError {
    fn from(err: Error) -> Self {
        Self::new(err.to_string(), err)
    }
}

/// Creates SOQL connections
#[derive(Default)]
pub struct SoqlDriver {
    client: Option<Arc<dyn HttpClient>>,
}

impl std::fmt::Debug for SoqlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoqlDriver")
            .field("injected_client", &self.client.is_some())
            .finish()
    }
}

impl SoqlDriver {
    /// Driver that authenticates with the password grant
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver that hands out connections over an existing client
    pub fn with_client(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Driver name
    pub fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    /// Connect using driver parameters
    ///
    /// Instance, consumer key and consumer secret are always required; user
    /// and password are required unless a client was injected.
    pub fn connect(&self, params: &HashMap<String, String>) -> Result<SoqlConnection> {
        let config = ConnectionConfig::from_params(params)?;

        let client = match &self.client {
            Some(client) => Arc::clone(client),
            None => {
                let tokens: Arc<dyn AccessTokenProvider> =
                    Arc::new(PasswordGrantTokenProvider::from_config(&config)?);
                Arc::new(ReqwestHttpClient::new(&config, tokens)?) as Arc<dyn HttpClient>
            }
        };

        info!(
            instance = %config.instance_url,
            api_version = %config.api_version,
            "SOQL connection created"
        );
        Ok(SoqlConnection::new(client))
    }

    /// Wrap an adapter error for the relational layer
    pub fn convert_error(&self, message: impl Into<String>, err: Error) -> DriverError {
        DriverError::new(message, err)
    }
}

#[async_trait]
impl ConnectionFactory for SoqlDriver {
    async fn connect(&self, params: &HashMap<String, String>) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SoqlDriver::connect(self, params)?))
    }

    fn name(&self) -> &'static str {
        DRIVER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PARAM_CONSUMER_KEY, PARAM_CONSUMER_SECRET, PARAM_INSTANCE};
    use std::error::Error as _;

    fn params() -> HashMap<String, String> {
        HashMap::from([
            (PARAM_INSTANCE.to_string(), "https://example.my.salesforce.com".to_string()),
            (PARAM_CONSUMER_KEY.to_string(), "key".to_string()),
            (PARAM_CONSUMER_SECRET.to_string(), "secret".to_string()),
        ])
    }

    #[test]
    fn test_name() {
        assert_eq!(SoqlDriver::new().name(), "soql");
    }

    #[test]
    fn test_connect_requires_credentials_without_client() {
        let err = SoqlDriver::new().connect(&params()).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_connect_requires_instance() {
        let mut params = params();
        params.remove(PARAM_INSTANCE);
        assert!(SoqlDriver::new().connect(&params).is_err());
    }

    #[test]
    fn test_convert_error_keeps_code_and_source() {
        let err = SoqlDriver::new().convert_error(
            "query failed",
            Error::provider("unexpected token: FORM", Some("MALFORMED_QUERY".into())),
        );

        assert_eq!(err.to_string(), "query failed");
        assert_eq!(err.code(), Some("MALFORMED_QUERY"));
        assert_eq!(err.category(), ErrorCategory::Provider);
        assert_eq!(err.source().unwrap().to_string(), "unexpected token: FORM");
    }

    #[test]
    fn test_from_error() {
        let err: DriverError = Error::EmptyResult.into();
        assert_eq!(err.to_string(), "result set is empty");
        assert_eq!(err.code(), None);
        assert!(matches!(err.into_inner(), Error::EmptyResult));
    }
}
