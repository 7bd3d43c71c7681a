//! # soql-rdbc
//!
//! Relational driver adapter for a SOQL REST API.
//!
//! Application code written against connection/statement/result abstractions
//! runs against the provider's HTTP API instead of a database socket.
//!
//! ## Features
//!
//! - **Placeholders**: `?` markers rewritten to `:paramN`, literals respected
//! - **Textual binding**: bound values rendered inline as quoted literals
//! - **Transactions**: mutations batched into one all-or-none composite request
//! - **Usage guard**: requests stop once the reported API quota is used up
//! - **Query builder**: SOQL sub-select joins instead of `JOIN` clauses
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use soql_rdbc::prelude::*;
//!
//! let conn = SoqlDriver::new().connect(&params)?;
//!
//! let contact = conn
//!     .execute_query("SELECT Id, Name FROM Contact WHERE Email = ?", [(1usize, "jane@example.com")])?
//!     .fetch_associative()
//!     .await?;
//!
//! conn.begin_transaction().await;
//! conn.insert("Account", &account, &MutationOptions::new()).await?;
//! conn.upsert("Contact", "External__c", "42", &contact, &MutationOptions::new()).await?;
//! conn.commit().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod auth;
pub mod batch;
pub mod binding;
pub mod client;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod http;
pub mod payload;
pub mod placeholder;
pub mod query_builder;
pub mod soql;
pub mod statement;
pub mod throttle;
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    // Error types
    pub use crate::error::{Error, ErrorCategory, Operation, Result};

    // Value and type system
    pub use crate::types::{ParameterType, Record, Row, Value};

    // Connection traits and config
    pub use crate::config::ConnectionConfig;
    pub use crate::connection::{Connection, ConnectionFactory, PreparedStatement};

    // HTTP collaborator and authentication
    pub use crate::auth::{AccessTokenProvider, PasswordGrantTokenProvider, StaticToken};
    pub use crate::client::ReqwestHttpClient;
    pub use crate::http::{HttpClient, HttpRequest, HttpResponse, Method};

    // Statements and results
    pub use crate::payload::Payload;
    pub use crate::statement::{Param, QueryResult, SoqlStatement};

    // Connection, driver and builder
    pub use crate::driver::{DriverError, SoqlDriver};
    pub use crate::query_builder::{Order, QueryBuilder};
    pub use crate::soql::{MutationOptions, SoqlConnection};
}

// Re-export commonly used items at crate root
pub use error::{Error, Result};
pub use types::Value;
