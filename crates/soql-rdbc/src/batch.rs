//! Transactional batching
//!
//! While a transaction is open, mutations are queued as [`BatchCommand`]s.
//! The outermost commit turns the queue into one all-or-none composite
//! request; the composite response is then scanned for sub-request errors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::{Method, AUTO_ASSIGN_HEADER};

/// Key of the caller-supplied correlation id in a reference map
pub const REFERENCE_ID: &str = "referenceId";

/// One queued mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCommand {
    /// HTTP method of the sub-request
    pub method: Method,
    /// Target URL, relative to the instance
    pub url: String,
    /// JSON body
    pub body: serde_json::Value,
    /// Correlation id linking the command to its sub-response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    /// Headers sent with the sub-request
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub http_headers: BTreeMap<String, String>,
}

impl BatchCommand {
    /// Create a command without correlation id or headers
    pub fn new(method: Method, url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method,
            url: url.into(),
            body,
            reference_id: None,
            http_headers: BTreeMap::new(),
        }
    }

    /// Take the correlation id from a reference map
    ///
    /// An empty map leaves the command without one; a non-empty map must
    /// carry [`REFERENCE_ID`].
    pub fn with_refs(mut self, refs: &BTreeMap<String, String>) -> Result<Self> {
        if refs.is_empty() {
            return Ok(self);
        }
        let reference_id = refs.get(REFERENCE_ID).ok_or(Error::MissingReferenceId)?;
        self.reference_id = Some(reference_id.clone());
        Ok(self)
    }

    /// Attach sub-request headers
    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        self.http_headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

/// Transaction nesting and the commands queued so far
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransactionState {
    /// No transaction open
    #[default]
    Idle,
    /// Open with `depth` nested begins
    Open {
        /// Number of begins not yet matched by a commit
        depth: usize,
        /// Queued commands, in call order
        commands: Vec<BatchCommand>,
    },
}

impl TransactionState {
    /// Whether a transaction is open
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Current nesting depth (0 when idle)
    pub fn depth(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Open { depth, .. } => *depth,
        }
    }

    /// Number of queued commands
    pub fn pending(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Open { commands, .. } => commands.len(),
        }
    }

    /// Open a transaction or nest one more level
    pub fn begin(&mut self) {
        match self {
            Self::Idle => {
                *self = Self::Open {
                    depth: 1,
                    commands: Vec::new(),
                }
            }
            Self::Open { depth, .. } => *depth += 1,
        }
    }

    /// Queue a command on the open transaction
    pub fn queue(&mut self, command: BatchCommand) -> Result<()> {
        match self {
            Self::Idle => Err(Error::NoActiveTransaction),
            Self::Open { commands, .. } => {
                commands.push(command);
                Ok(())
            }
        }
    }

    /// Close one nesting level
    ///
    /// Returns the queued commands once the outermost level closes, leaving
    /// the state idle; `None` while levels remain open.
    pub fn release(&mut self) -> Result<Option<Vec<BatchCommand>>> {
        match self {
            Self::Idle => Err(Error::NoActiveTransaction),
            Self::Open { depth, .. } if *depth > 1 => {
                *depth -= 1;
                Ok(None)
            }
            Self::Open { .. } => match std::mem::take(self) {
                Self::Open { commands, .. } => Ok(Some(commands)),
                Self::Idle => Ok(Some(Vec::new())),
            },
        }
    }

    /// Drop every queued command and close all levels
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

/// Body of a composite request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRequest {
    /// Roll back every sub-request when one fails
    pub all_or_none: bool,
    /// Sub-requests in execution order
    pub composite_request: Vec<BatchCommand>,
}

impl CompositeRequest {
    /// Build an all-or-none request
    ///
    /// Commands without a correlation id get a generated one, plus the header
    /// suppressing auto-assignment.
    pub fn all_or_none(commands: Vec<BatchCommand>) -> Self {
        let composite_request = commands
            .into_iter()
            .map(|mut command| {
                if command.reference_id.is_none() {
                    command.reference_id = Some(generate_reference_id());
                    command
                        .http_headers
                        .insert(AUTO_ASSIGN_HEADER.to_string(), "FALSE".to_string());
                }
                command
            })
            .collect();

        Self {
            all_or_none: true,
            composite_request,
        }
    }
}

/// Unique correlation id (`referenceId` followed by 32 hex digits)
pub fn generate_reference_id() -> String {
    format!("{REFERENCE_ID}{}", Uuid::new_v4().simple())
}

/// Wire shape of a composite response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResponse {
    /// One entry per sub-request
    pub composite_response: Vec<SubResponse>,
}

/// Result of one sub-request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResponse {
    /// Sub-request body: a record result, or a list of error objects
    #[serde(default)]
    pub body: serde_json::Value,
    /// Sub-request status
    #[serde(default)]
    pub http_status_code: u16,
    /// Correlation id of the command
    #[serde(default)]
    pub reference_id: Option<String>,
}

impl SubResponse {
    /// Message of the first error entry, when the body carries one
    pub fn error_message(&self) -> Option<String> {
        let first = self.body.get(0)?;
        first.get("errorCode")?;
        Some(match first.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
    }
}

impl CompositeResponse {
    /// Messages of every failed sub-request, in response order
    pub fn error_messages(&self) -> Vec<String> {
        self.composite_response
            .iter()
            .filter_map(SubResponse::error_message)
            .collect()
    }
}
