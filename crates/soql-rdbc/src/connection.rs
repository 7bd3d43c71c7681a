//! Connection traits for soql-rdbc
//!
//! The relational abstraction the adapter plugs into:
//! - Connection: query, prepare and transaction control
//! - PreparedStatement: parameterized query support
//! - ConnectionFactory: creates connections from driver parameters

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{Row, Value};

/// A connection to a data source
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute a query that returns rows; `params` bind to `?` markers in order
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Prepare a statement for repeated execution
    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>>;

    /// Begin a transaction (nests when one is already open)
    async fn begin_transaction(&self) -> Result<()>;

    /// Commit the innermost open transaction level
    async fn commit(&self) -> Result<()>;

    /// Abandon every open transaction level
    async fn roll_back(&self) -> Result<()>;

    /// Whether a transaction is open
    async fn is_transaction_active(&self) -> bool;

    /// Execute a query and return the first row (convenience method)
    async fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        let rows = self.query(sql, params).await?;
        Ok(rows.into_iter().next())
    }
}

/// A prepared statement
#[async_trait]
pub trait PreparedStatement: Send + Sync {
    /// Query with the prepared statement
    async fn query(&self, params: &[Value]) -> Result<Vec<Row>>;

    /// Get the SQL string
    fn sql(&self) -> &str;
}

/// Connection factory for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Create a new connection from driver parameters
    async fn connect(&self, params: &HashMap<String, String>) -> Result<Box<dyn Connection>>;

    /// Driver name
    fn name(&self) -> &'static str;
}
