//! Statement engine
//!
//! A [`SoqlStatement`] is created from query text, collects bound values, and
//! is consumed by [`SoqlStatement::execute`], which renders the final text and
//! hands back a [`QueryResult`]. Nothing touches the network until one of the
//! `fetch_*` methods runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::binding::{normalize_parameter, separate_bound_values};
use crate::error::{Error, Result};
use crate::http::{self, routes, HttpClient, HttpRequest, HttpResponse, Method};
use crate::payload::Payload;
use crate::placeholder::convert_positional_to_named;
use crate::types::{ParameterType, Record, Row, Value};

/// Parameter reference: 1-based position or name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Param {
    /// Position of a `?` marker, starting at 1
    Index(usize),
    /// Named placeholder, with or without the leading `:`
    Name(String),
}

impl From<usize> for Param {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for Param {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Param {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// A query awaiting execution
pub struct SoqlStatement {
    client: Arc<dyn HttpClient>,
    original_sql: String,
    sql: String,
    parameter_map: BTreeMap<usize, String>,
    bound_values: Vec<(String, Value)>,
    types: HashMap<String, ParameterType>,
}

impl std::fmt::Debug for SoqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoqlStatement")
            .field("original_sql", &self.original_sql)
            .field("sql", &self.sql)
            .field("parameter_map", &self.parameter_map)
            .field("bound_values", &self.bound_values)
            .finish()
    }
}

impl SoqlStatement {
    /// Tokenize `sql`, rewriting `?` markers to `:paramN`
    pub fn new(client: Arc<dyn HttpClient>, sql: impl Into<String>) -> Result<Self> {
        let original_sql = sql.into();
        let converted = convert_positional_to_named(&original_sql)?;

        Ok(Self {
            client,
            original_sql,
            sql: converted.sql,
            parameter_map: converted.parameter_map,
            bound_values: Vec::new(),
            types: HashMap::new(),
        })
    }

    /// Text as given by the caller
    pub fn original_sql(&self) -> &str {
        &self.original_sql
    }

    /// Text with positional markers rewritten
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Positions produced by the placeholder converter
    pub fn parameter_map(&self) -> &BTreeMap<usize, String> {
        &self.parameter_map
    }

    /// Bind a value to a placeholder
    ///
    /// The value is copied now; rebinding a placeholder replaces the earlier
    /// value.
    pub fn bind_value(
        &mut self,
        param: impl Into<Param>,
        value: impl Into<Value>,
        ty: ParameterType,
    ) -> Result<()> {
        let name = match param.into() {
            Param::Index(index) => self
                .parameter_map
                .get(&index)
                .cloned()
                .ok_or(Error::UnknownParameterIndex { index })?,
            Param::Name(name) => normalize_parameter(&name),
        };

        let value = value.into();
        match self.bound_values.iter_mut().find(|(bound, _)| *bound == name) {
            Some((_, slot)) => *slot = value,
            None => self.bound_values.push((name.clone(), value)),
        }
        self.types.insert(name, ty);
        Ok(())
    }

    /// Same as [`bind_value`](Self::bind_value)
    pub fn bind_param(
        &mut self,
        param: impl Into<Param>,
        value: impl Into<Value>,
        ty: ParameterType,
    ) -> Result<()> {
        self.bind_value(param, value, ty)
    }

    /// Bind `params`, then render every bound value into the text
    pub fn execute<I, P, V>(mut self, params: I) -> Result<QueryResult>
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<Param>,
        V: Into<Value>,
    {
        for (param, value) in params {
            self.bind_value(param, value, ParameterType::default())?;
        }

        if !self.bound_values.is_empty() {
            let types = &self.types;
            let rendered: HashMap<String, String> = separate_bound_values(
                self.bound_values.iter().map(|(name, value)| (name, value)),
                |name| types.get(name).copied(),
            )
            .into_iter()
            .map(|(name, _, literal)| (name, literal.to_string()))
            .collect();

            self.sql = crate::placeholder::substitute_named(&self.sql, &rendered)?;
        }

        debug!(sql = %self.sql, parameters = self.bound_values.len(), "statement executed");

        Ok(QueryResult {
            client: self.client,
            sql: self.sql,
        })
    }
}

/// Handle over an executed statement
///
/// Each fetch issues the query again; results are not cached.
#[derive(Clone)]
pub struct QueryResult {
    client: Arc<dyn HttpClient>,
    sql: String,
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult").field("sql", &self.sql).finish()
    }
}

impl QueryResult {
    /// Final query text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Run the query; a failed payload becomes a provider error
    pub async fn fetch_all(&self) -> Result<Payload> {
        let payload = fetch_payload(self.client.as_ref(), &self.sql).await?;
        if !payload.success() {
            return Err(payload.into_error());
        }
        Ok(payload)
    }

    /// First record of the result set
    pub async fn fetch(&self) -> Result<Record> {
        self.fetch_all()
            .await?
            .into_results()
            .into_iter()
            .next()
            .ok_or(Error::EmptyResult)
    }

    /// Every record, fields in provider order
    pub async fn fetch_all_associative(&self) -> Result<Vec<Record>> {
        Ok(self.fetch_all().await?.into_results())
    }

    /// First record
    pub async fn fetch_associative(&self) -> Result<Record> {
        self.fetch().await
    }

    /// Field values of the first record
    pub async fn fetch_numeric(&self) -> Result<Vec<Value>> {
        Ok(Row::from_record(self.fetch().await?).into_values())
    }

    /// Field values of every record
    pub async fn fetch_all_numeric(&self) -> Result<Vec<Vec<Value>>> {
        Ok(self
            .fetch_all_associative()
            .await?
            .into_iter()
            .map(|record| Row::from_record(record).into_values())
            .collect())
    }

    /// First field of the first record
    pub async fn fetch_one(&self) -> Result<Value> {
        self.fetch_numeric()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::EmptyResult)
    }

    /// First field of every record
    pub async fn fetch_first_column(&self) -> Result<Vec<Value>> {
        Ok(self
            .fetch_all_numeric()
            .await?
            .into_iter()
            .filter_map(|values| values.into_iter().next())
            .collect())
    }

    /// Every record as a [`Row`]
    pub async fn rows(&self) -> Result<Vec<Row>> {
        Ok(self
            .fetch_all_associative()
            .await?
            .into_iter()
            .map(Row::from_record)
            .collect())
    }
}

/// Run `statement` against the query endpoint and decode the response
///
/// Truncated result sets are followed through `nextRecordsUrl` until the
/// provider reports completion or an error.
pub async fn fetch_payload(client: &dyn HttpClient, statement: &str) -> Result<Payload> {
    let version = http::api_version(client)?;
    let request = HttpRequest::new(Method::Get, routes::query(&version, statement));
    let mut payload = decode_query(http::send_guarded(client, request).await?)?;

    while let Some(next) = payload.next_records_url().map(str::to_string) {
        debug!(next = %next, fetched = payload.results().len(), "following truncated result set");
        let response = http::send_guarded(client, HttpRequest::new(Method::Get, next)).await?;
        payload.append(decode_query(response)?);
    }

    Ok(payload)
}

fn decode_query(response: HttpResponse) -> Result<Payload> {
    if response.is_client_error() {
        return Payload::from_client_error(&response.body);
    }
    if !response.is_success() {
        return Err(Error::Http {
            status: response.status,
            message: response.text(),
        });
    }
    Payload::with_values(response.json()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

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

    fn statement(sql: &str) -> SoqlStatement {
        SoqlStatement::new(Arc::new(Offline), sql).unwrap()
    }

    #[test]
    fn test_positional_binding() {
        let mut stmt = statement("SELECT Id FROM Contact WHERE Name = ? AND Age = ?");
        stmt.bind_value(1, "John", ParameterType::String).unwrap();
        stmt.bind_value(2, 30, ParameterType::Integer).unwrap();

        let result = stmt.execute(Vec::<(Param, Value)>::new()).unwrap();
        assert_eq!(
            result.sql(),
            "SELECT Id FROM Contact WHERE Name = 'John' AND Age = 30"
        );
    }

    #[test]
    fn test_named_binding() {
        let mut stmt = statement("SELECT Id FROM Contact WHERE Name = :name");
        stmt.bind_value("name", "John", ParameterType::String).unwrap();

        let result = stmt.execute(Vec::<(Param, Value)>::new()).unwrap();
        assert_eq!(result.sql(), "SELECT Id FROM Contact WHERE Name = 'John'");
    }

    #[test]
    fn test_unknown_parameter_index() {
        let mut stmt = statement("SELECT Id FROM Contact WHERE Name = ?");
        let err = stmt.bind_value(2, "John", ParameterType::String).unwrap_err();
        assert!(matches!(err, Error::UnknownParameterIndex { index: 2 }));
    }

    #[test]
    fn test_rebinding_replaces_value() {
        let mut stmt = statement("SELECT Id FROM Contact WHERE Name = ?");
        stmt.bind_value(1, "John", ParameterType::String).unwrap();
        stmt.bind_param(1, "Jane", ParameterType::String).unwrap();

        let result = stmt.execute(Vec::<(Param, Value)>::new()).unwrap();
        assert_eq!(result.sql(), "SELECT Id FROM Contact WHERE Name = 'Jane'");
    }

    #[test]
    fn test_execute_params_bind_first() {
        let stmt = statement("SELECT Id FROM Contact WHERE Id IN (?) AND Active = ?");
        let result = stmt
            .execute([
                (Param::Index(1), Value::from(vec!["a", "b"])),
                (Param::Index(2), Value::Bool(true)),
            ])
            .unwrap();

        assert_eq!(
            result.sql(),
            "SELECT Id FROM Contact WHERE Id IN ('a', 'b') AND Active = true"
        );
    }

    #[test]
    fn test_unbound_placeholder_kept() {
        let stmt = statement("SELECT Id FROM Contact WHERE Name = ? AND Email = ?");
        let result = stmt.execute([(1usize, "John")]).unwrap();
        assert_eq!(
            result.sql(),
            "SELECT Id FROM Contact WHERE Name = 'John' AND Email = :param2"
        );
    }

    #[test]
    fn test_syntax_error_on_create() {
        let err = SoqlStatement::new(Arc::new(Offline), "SELECT Id FROM Contact WHERE Name = 'x")
            .unwrap_err();
        assert!(matches!(err, Error::Syntax { position: 36, .. }));
    }

    #[tokio::test]
    async fn test_execute_does_no_io() {
        let result = statement("SELECT Id FROM Contact")
            .execute(Vec::<(Param, Value)>::new())
            .unwrap();
        // I/O only happens on fetch
        assert!(matches!(
            result.fetch_all().await,
            Err(Error::Transport { .. })
        ));
    }
}
