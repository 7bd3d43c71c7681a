//! SOQL connection adapter
//!
//! [`SoqlConnection`] composes the statement engine and the batch coordinator
//! over one [`HttpClient`]. Mutations are sent immediately, or queued while a
//! transaction is open and flushed as one composite request by the outermost
//! commit.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::batch::{BatchCommand, CompositeRequest, CompositeResponse, TransactionState, REFERENCE_ID};
use crate::connection::{Connection, PreparedStatement};
use crate::error::{Error, Operation, Result};
use crate::http::{self, routes, HttpClient, HttpRequest, HttpResponse, Method};
use crate::payload::Payload;
use crate::query_builder::QueryBuilder;
use crate::statement::{Param, QueryResult, SoqlStatement};
use crate::types::{ParameterType, Record, Row, Value};

/// Identifier key addressing a record by its primary id
pub const ID_FIELD: &str = "Id";

/// Correlation references and headers for one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Reference map; when non-empty it must carry `referenceId`
    pub refs: BTreeMap<String, String>,
    /// Headers sent with the request
    pub headers: BTreeMap<String, String>,
}

impl MutationOptions {
    /// Options with no references or headers
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the correlation id used inside a transaction
    pub fn with_reference_id(self, reference_id: impl Into<String>) -> Self {
        self.with_ref(REFERENCE_ID, reference_id)
    }

    /// Add a reference entry
    pub fn with_ref(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.refs.insert(key.into(), value.into());
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Connection to one instance
pub struct SoqlConnection {
    client: Arc<dyn HttpClient>,
    state: Mutex<TransactionState>,
}

impl std::fmt::Debug for SoqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoqlConnection").finish_non_exhaustive()
    }
}

impl SoqlConnection {
    /// Create a connection over an authorized client
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            state: Mutex::new(TransactionState::Idle),
        }
    }

    /// Underlying HTTP client
    pub fn http_client(&self) -> &Arc<dyn HttpClient> {
        &self.client
    }

    /// Create a statement for `sql`
    pub fn prepare(&self, sql: &str) -> Result<SoqlStatement> {
        SoqlStatement::new(Arc::clone(&self.client), sql)
    }

    /// Prepare, bind and execute in one step
    pub fn execute_query<I, P, V>(&self, sql: &str, params: I) -> Result<QueryResult>
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<Param>,
        V: Into<Value>,
    {
        self.prepare(sql)?.execute(params)
    }

    /// Wrap `input` in single quotes, escaping quotes and backslashes
    pub fn quote(&self, input: &str) -> String {
        let mut quoted = String::with_capacity(input.len() + 2);
        quoted.push('\'');
        for c in input.chars() {
            if matches!(c, '\'' | '"' | '\\') {
                quoted.push('\\');
            }
            if c == '\0' {
                quoted.push_str("\\0");
                continue;
            }
            quoted.push(c);
        }
        quoted.push('\'');
        quoted
    }

    /// Builder executing through this connection
    pub fn create_query_builder(&self) -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Open a transaction, or nest one more level
    pub async fn begin_transaction(&self) {
        let mut state = self.state.lock().await;
        state.begin();
        debug!(depth = state.depth(), "transaction begin");
    }

    /// Whether a transaction is open
    pub async fn is_transaction_active(&self) -> bool {
        self.state.lock().await.is_active()
    }

    /// Close one nesting level; the outermost commit sends the queue
    ///
    /// Local state is idle again before the composite request is sent, so a
    /// failed commit leaves the connection ready for a new transaction.
    pub async fn commit(&self) -> Result<()> {
        let commands = {
            let mut state = self.state.lock().await;
            match state.release()? {
                Some(commands) => commands,
                None => {
                    debug!(depth = state.depth(), "nested commit");
                    return Ok(());
                }
            }
        };

        if commands.is_empty() {
            debug!("commit with no queued commands");
            return Ok(());
        }

        let count = commands.len();
        let version = http::api_version(self.client.as_ref())?;
        let body = serde_json::to_value(CompositeRequest::all_or_none(commands))?;
        let request = HttpRequest::new(Method::Post, routes::composite(&version)).with_body(body);

        let response = self.send(request).await?;
        let response: CompositeResponse = serde_json::from_value(response.json()?)?;

        let messages = response.error_messages();
        if !messages.is_empty() {
            warn!(commands = count, errors = messages.len(), "transaction rolled back by provider");
            return Err(Error::TransactionFailed { messages });
        }

        info!(commands = count, "transaction committed");
        Ok(())
    }

    /// Drop the queue and close every level; never touches the network
    pub async fn roll_back(&self) {
        let mut state = self.state.lock().await;
        if state.pending() > 0 {
            debug!(discarded = state.pending(), "transaction rolled back");
        }
        state.reset();
    }

    /// Create a record
    ///
    /// Succeeds when the provider answers `"success": true`.
    pub async fn insert(&self, table: &str, data: &Record, options: &MutationOptions) -> Result<u64> {
        let version = http::api_version(self.client.as_ref())?;
        let command = BatchCommand::new(
            Method::Post,
            routes::sobject(&version, table),
            serde_json::Value::Object(data.clone()),
        );

        let Some(command) = self.queue_if_active(command, options).await? else {
            return Ok(1);
        };

        let response = self.send(single(command, options)).await?;
        let body = response.json()?;
        if body.get("success") != Some(&serde_json::Value::Bool(true)) {
            return Err(operation_failed(Operation::Insert, data));
        }
        Ok(1)
    }

    /// Update the record addressed by the `Id` identifier
    ///
    /// Succeeds on status 204.
    pub async fn update(
        &self,
        table: &str,
        data: &Record,
        identifier: &Record,
        options: &MutationOptions,
    ) -> Result<u64> {
        let id = identifier.get(ID_FIELD).ok_or_else(|| {
            Error::invalid_argument(format!("identifier must contain \"{ID_FIELD}\""))
        })?;

        let version = http::api_version(self.client.as_ref())?;
        let command = BatchCommand::new(
            Method::Patch,
            routes::sobject_id(&version, table, &segment(id)),
            serde_json::Value::Object(data.clone()),
        );

        let Some(command) = self.queue_if_active(command, options).await? else {
            return Ok(1);
        };

        let response = self.send(single(command, options)).await?;
        if response.status != 204 {
            return Err(operation_failed(Operation::Update, data));
        }
        Ok(1)
    }

    /// Insert or update the record addressed by an external id
    ///
    /// Succeeds on status 200, 201 or 204.
    pub async fn upsert(
        &self,
        table: &str,
        external_id_name: &str,
        external_id_value: &str,
        data: &Record,
        options: &MutationOptions,
    ) -> Result<u64> {
        let version = http::api_version(self.client.as_ref())?;
        let command = BatchCommand::new(
            Method::Patch,
            routes::sobject_external_id(&version, table, external_id_name, external_id_value),
            serde_json::Value::Object(data.clone()),
        );

        let Some(command) = self.queue_if_active(command, options).await? else {
            return Ok(1);
        };

        let response = self.send(single(command, options)).await?;
        if !matches!(response.status, 200 | 201 | 204) {
            return Err(operation_failed(Operation::Upsert, data));
        }
        Ok(1)
    }

    /// Delete the record addressed by a single identifier
    ///
    /// `Id` addresses the record directly; any other key is used as an
    /// external id field. Refused while a transaction is open.
    pub async fn delete(
        &self,
        table: &str,
        identifier: &Record,
        headers: &BTreeMap<String, String>,
    ) -> Result<u64> {
        let mut entries = identifier.iter();
        let (key, value) = match (entries.next(), entries.next()) {
            (None, _) => return Err(Error::invalid_argument("empty criteria")),
            (Some(entry), None) => entry,
            (Some(_), Some(_)) => {
                return Err(Error::invalid_argument(
                    "it should have only one DELETE criteria",
                ))
            }
        };

        if self.is_transaction_active().await {
            return Err(Error::unsupported("DELETE is not supported under transaction"));
        }

        let param = match identifier.get(ID_FIELD) {
            Some(id) => segment(id),
            None => format!("{key}/{}", segment(value)),
        };

        let version = http::api_version(self.client.as_ref())?;
        let request = HttpRequest::new(Method::Delete, routes::sobject_id(&version, table, &param))
            .with_headers(headers);
        self.send(request).await?;
        Ok(1)
    }

    /// Queue `command` when a transaction is open; hand it back otherwise
    async fn queue_if_active(
        &self,
        command: BatchCommand,
        options: &MutationOptions,
    ) -> Result<Option<BatchCommand>> {
        let mut state = self.state.lock().await;
        if !state.is_active() {
            return Ok(Some(command));
        }

        let command = command
            .with_refs(&options.refs)?
            .with_headers(&options.headers);
        debug!(method = %command.method, url = %command.url, "queued for commit");
        state.queue(command)?;
        Ok(None)
    }

    /// Send one request; 4xx becomes a provider error, other failures an HTTP error
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, url = %url, body = ?request.body, "sending request");

        let response = http::send_guarded(self.client.as_ref(), request).await?;
        debug!(%method, url = %url, status = response.status, "received response");

        if response.is_client_error() {
            return Err(Payload::from_client_error(&response.body)?.into_error());
        }
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status,
                message: response.text(),
            });
        }
        Ok(response)
    }
}

fn single(command: BatchCommand, options: &MutationOptions) -> HttpRequest {
    HttpRequest::new(command.method, command.url)
        .with_body(command.body)
        .with_headers(&options.headers)
}

fn operation_failed(operation: Operation, data: &Record) -> Error {
    Error::OperationFailed {
        operation,
        payload: serde_json::Value::Object(data.clone()),
    }
}

/// URL segment for an identifier value
fn segment(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prepared statement re-created for every execution
#[derive(Debug, Clone)]
pub struct SoqlPreparedStatement {
    client: Arc<dyn HttpClient>,
    sql: String,
}

#[async_trait]
impl PreparedStatement for SoqlPreparedStatement {
    async fn query(&self, params: &[Value]) -> Result<Vec<Row>> {
        let mut statement = SoqlStatement::new(Arc::clone(&self.client), self.sql.as_str())?;
        for (i, value) in params.iter().enumerate() {
            statement.bind_value(i + 1, value.clone(), ParameterType::default())?;
        }
        statement.execute(Vec::<(Param, Value)>::new())?.rows().await
    }

    fn sql(&self) -> &str {
        &self.sql
    }
}

#[async_trait]
impl Connection for SoqlConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.execute_query(
            sql,
            params
                .iter()
                .enumerate()
                .map(|(i, value)| (Param::Index(i + 1), value.clone())),
        )?
        .rows()
        .await
    }

    async fn prepare(&self, sql: &str) -> Result<Box<dyn PreparedStatement>> {
        // tokenize now so syntax errors surface at prepare time
        SoqlStatement::new(Arc::clone(&self.client), sql)?;
        Ok(Box::new(SoqlPreparedStatement {
            client: Arc::clone(&self.client),
            sql: sql.to_string(),
        }))
    }

    async fn begin_transaction(&self) -> Result<()> {
        SoqlConnection::begin_transaction(self).await;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        SoqlConnection::commit(self).await
    }

    async fn roll_back(&self) -> Result<()> {
        SoqlConnection::roll_back(self).await;
        Ok(())
    }

    async fn is_transaction_active(&self) -> bool {
        SoqlConnection::is_transaction_active(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Offline;

    #[async_trait]
    impl HttpClient for Offline {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse> {
            Err(Error::transport("offline"))
        }

        fn config(&self, _key: &str) -> Option<String> {
            Some("v59.0".into())
        }
    }

    fn connection() -> SoqlConnection {
        SoqlConnection::new(Arc::new(Offline))
    }

    #[test]
    fn test_quote_escapes() {
        let conn = connection();
        assert_eq!(conn.quote("O'Brien"), r"'O\'Brien'");
        assert_eq!(conn.quote(r"a\b"), r"'a\\b'");
        assert_eq!(conn.quote("plain"), "'plain'");
    }

    #[test]
    fn test_mutation_options() {
        let options = MutationOptions::new()
            .with_reference_id("acme")
            .with_header("Sforce-Duplicate-Rule-Header", "allowSave=true");
        assert_eq!(options.refs.get(REFERENCE_ID).map(String::as_str), Some("acme"));
        assert_eq!(options.headers.len(), 1);
    }

    #[test]
    fn test_segment() {
        assert_eq!(segment(&serde_json::json!("001")), "001");
        assert_eq!(segment(&serde_json::json!(42)), "42");
    }

    #[tokio::test]
    async fn test_transactional_state() {
        let conn = connection();
        assert!(!conn.is_transaction_active().await);

        conn.begin_transaction().await;
        assert!(conn.is_transaction_active().await);

        conn.roll_back().await;
        assert!(!conn.is_transaction_active().await);
    }

    #[tokio::test]
    async fn test_commit_without_transaction() {
        let err = connection().commit().await.unwrap_err();
        assert!(matches!(err, Error::NoActiveTransaction));
    }

    #[tokio::test]
    async fn test_empty_commit_sends_nothing() {
        let conn = connection();
        conn.begin_transaction().await;
        // Offline would fail any request
        conn.commit().await.unwrap();
        assert!(!conn.is_transaction_active().await);
    }
}
