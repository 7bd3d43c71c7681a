//! Response payload decoding
//!
//! Normalizes every query response into one [`Payload`]: either a successful
//! result set (records with provider bookkeeping removed) or a failure carrying
//! the provider's message and error code.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::Record;

/// Field the provider attaches to every record (type + url)
pub const RECORD_METADATA_FIELD: &str = "attributes";

/// Decoded result of one remote call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    success: bool,
    total_size: u64,
    records: Vec<Record>,
    next_records_url: Option<String>,
    error_message: Option<String>,
    error_code: Option<String>,
}

/// Wire shape of a query response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    done: bool,
    total_size: u64,
    #[serde(default)]
    records: Vec<serde_json::Value>,
    #[serde(default)]
    next_records_url: Option<String>,
}

/// Wire shape of one provider error entry
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderError {
    /// Human readable message
    pub message: String,
    /// Provider error code (e.g. `INVALID_TYPE`)
    pub error_code: String,
    /// Fields the error refers to, when reported
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Payload {
    /// Decode a successful query response
    pub fn with_values(json: serde_json::Value) -> Result<Self> {
        let response: QueryResponse = serde_json::from_value(json)?;

        let records = response
            .records
            .into_iter()
            .map(remove_record_metadata)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            success: response.done,
            total_size: response.total_size,
            records,
            next_records_url: response.next_records_url,
            error_message: None,
            error_code: None,
        })
    }

    /// Decode a single `{message, errorCode}` error object
    pub fn with_errors(json: serde_json::Value) -> Result<Self> {
        let error: ProviderError = serde_json::from_value(json)?;
        Ok(Self::failed(error.message, error.error_code))
    }

    /// Decode the body of a 4xx response
    ///
    /// The provider answers client errors with a list of error objects; the
    /// first one is kept. A bare error object is accepted too.
    pub fn from_client_error(body: &[u8]) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_slice(body)?;
        let first = match json {
            serde_json::Value::Array(mut errors) if !errors.is_empty() => errors.swap_remove(0),
            serde_json::Value::Array(_) => {
                return Err(Error::decode("client error response contained no errors"))
            }
            other => other,
        };
        Self::with_errors(first)
    }

    /// Build a failed payload
    pub fn failed(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            error_code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Total number of records the query matched
    #[inline]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Decoded records
    #[inline]
    pub fn results(&self) -> &[Record] {
        &self.records
    }

    /// Take ownership of the decoded records
    pub fn into_results(self) -> Vec<Record> {
        self.records
    }

    /// Whether the call succeeded
    #[inline]
    pub fn success(&self) -> bool {
        self.success
    }

    /// Locator of the next batch when the result set was truncated
    pub fn next_records_url(&self) -> Option<&str> {
        self.next_records_url.as_deref()
    }

    /// Provider error message
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Provider error code
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Append the next batch of a truncated result set
    pub fn append(&mut self, next: Payload) {
        self.records.extend(next.records);
        self.success = next.success;
        self.next_records_url = next.next_records_url;
        self.error_message = next.error_message;
        self.error_code = next.error_code;
    }

    /// Turn a failed payload into the matching provider error
    pub fn into_error(self) -> Error {
        Error::provider(
            self.error_message
                .unwrap_or_else(|| "query did not complete".to_string()),
            self.error_code,
        )
    }
}

fn remove_record_metadata(row: serde_json::Value) -> Result<Record> {
    match row {
        serde_json::Value::Object(mut record) => {
            record.shift_remove(RECORD_METADATA_FIELD);
            Ok(record)
        }
        other => Err(Error::decode(format!("expected a record object, got {other}"))),
    }
}
