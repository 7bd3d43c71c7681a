//! Error types for soql-rdbc
//!
//! Every failure the adapter can raise is classified so callers can tell
//! programming mistakes (syntax, binding) apart from provider rejections,
//! transport problems and throttling:
//! - Syntax / binding errors (never retriable)
//! - Provider and operation failures (carry the provider message and code)
//! - Transport errors (retriable)
//! - Throttling (hard stop before the quota runs out)

use std::fmt;
use thiserror::Error;

/// Result type for soql-rdbc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed query text
    Syntax,
    /// Parameter binding mistakes
    Binding,
    /// Transport-level failure (retriable)
    Transport,
    /// Provider rejected the request
    Provider,
    /// A mutation did not report success
    Operation,
    /// Transaction state or composite commit failure
    Transaction,
    /// Request quota reached
    Throttling,
    /// Response body could not be decoded
    Decode,
    /// Authentication failure
    Authentication,
    /// Configuration error
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// The kind of mutation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `POST /sobjects/<table>`
    Insert,
    /// `PATCH /sobjects/<table>/<id>`
    Update,
    /// `PATCH /sobjects/<table>/<field>/<value>`
    Upsert,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "Insert"),
            Self::Update => write!(f, "Update"),
            Self::Upsert => write!(f, "Upsert"),
        }
    }
}

/// Main error type for soql-rdbc
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Query text could not be tokenized
    #[error("syntax error at offset {position}: {message}")]
    Syntax { message: String, position: usize },

    /// Positional parameter was never produced by the placeholder converter
    #[error("could not find parameter at index {index}")]
    UnknownParameterIndex { index: usize },

    /// Reference map given for a batched command without `referenceId`
    #[error("references must contain a \"referenceId\" entry")]
    MissingReferenceId,

    /// Caller passed arguments the operation cannot work with
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Non-success HTTP status that could not be mapped to a provider error
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Request never produced a response
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Response body was not the JSON we expected
    #[error("decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Provider reported an error message and code
    #[error("{message}")]
    Provider {
        message: String,
        code: Option<String>,
    },

    /// Mutation did not report success
    #[error("{operation} failed with payload {payload}")]
    OperationFailed {
        operation: Operation,
        payload: serde_json::Value,
    },

    /// Composite commit contained sub-request errors
    #[error("Transaction failed with messages: {}", serde_json::Value::from(.messages.clone()))]
    TransactionFailed { messages: Vec<String> },

    /// Commit called with no open transaction
    #[error("there is no active transaction")]
    NoActiveTransaction,

    /// Request quota reached
    #[error("Failed because you've used \"{used}\" from a total of \"{total}\" requests.")]
    Throttled { used: u64, total: u64 },

    /// Query returned no rows where one was required
    #[error("result set is empty")]
    EmptyResult,

    /// Authentication failed
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unsupported operation
    #[error("unsupported: {message}")]
    Unsupported { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Syntax { .. } => ErrorCategory::Syntax,
            Self::UnknownParameterIndex { .. }
            | Self::MissingReferenceId
            | Self::InvalidArgument { .. } => ErrorCategory::Binding,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Http { .. } | Self::Provider { .. } => ErrorCategory::Provider,
            Self::OperationFailed { .. } | Self::EmptyResult => ErrorCategory::Operation,
            Self::TransactionFailed { .. } | Self::NoActiveTransaction => {
                ErrorCategory::Transaction
            }
            Self::Throttled { .. } => ErrorCategory::Throttling,
            Self::Decode { .. } => ErrorCategory::Decode,
            Self::Authentication { .. } => ErrorCategory::Authentication,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Unsupported { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    ///
    /// Transport failures and 5xx responses are; everything else is not.
    #[inline]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            _ => self.category().is_retriable(),
        }
    }

    /// Provider error code, when the provider supplied one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Provider { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Create a syntax error
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        Self::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a provider error
    pub fn provider(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Provider {
            message: message.into(),
            code,
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport_with_source("request timed out", err)
        } else if err.is_connect() {
            Self::transport_with_source("connection failed", err)
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::transport_with_source(err.to_string(), err)
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "syntax"),
            Self::Binding => write!(f, "binding"),
            Self::Transport => write!(f, "transport"),
            Self::Provider => write!(f, "provider"),
            Self::Operation => write!(f, "operation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Throttling => write!(f, "throttling"),
            Self::Decode => write!(f, "decode"),
            Self::Authentication => write!(f, "authentication"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retriable() {
        assert!(ErrorCategory::Transport.is_retriable());

        assert!(!ErrorCategory::Syntax.is_retriable());
        assert!(!ErrorCategory::Throttling.is_retriable());
        assert!(!ErrorCategory::Transaction.is_retriable());
    }

    #[test]
    fn test_throttled_message() {
        let err = Error::Throttled {
            used: 100,
            total: 100,
        };
        assert_eq!(
            err.to_string(),
            "Failed because you've used \"100\" from a total of \"100\" requests."
        );
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_transaction_failed_lists_every_message() {
        let err = Error::TransactionFailed {
            messages: vec!["first".into(), "second".into()],
        };
        assert_eq!(
            err.to_string(),
            r#"Transaction failed with messages: ["first","second"]"#
        );
        assert_eq!(err.category(), ErrorCategory::Transaction);
    }

    #[test]
    fn test_operation_failed_display() {
        let err = Error::OperationFailed {
            operation: Operation::Insert,
            payload: serde_json::json!({"Name": "Acme"}),
        };
        assert_eq!(
            err.to_string(),
            r#"Insert failed with payload {"Name":"Acme"}"#
        );
    }

    #[test]
    fn test_provider_code() {
        let err = Error::provider(
            "sObject type 'Foo' is not supported.",
            Some("INVALID_TYPE".into()),
        );
        assert_eq!(err.code(), Some("INVALID_TYPE"));
        assert_eq!(err.to_string(), "sObject type 'Foo' is not supported.");
        assert_eq!(Error::EmptyResult.code(), None);
    }
}
