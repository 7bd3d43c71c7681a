//! Query builder
//!
//! Builds `SELECT` statements piece by piece. SOQL has no `JOIN` clause:
//! related records are read with a nested sub-select in the field list, which
//! [`QueryBuilder::join`] produces. The SQL-style join variants are refused.
//!
//! # Example
//!
//! ```rust
//! use soql_rdbc::query_builder::QueryBuilder;
//!
//! let sql = QueryBuilder::new()
//!     .select(["Id"])
//!     .from("Account")
//!     .join("Contact", &["Name"], "Id = :id", "")
//!     .unwrap()
//!     .set_max_results(1)
//!     .sql();
//!
//! assert_eq!(sql, "SELECT Id, (SELECT Name FROM Contact WHERE Id = :id) FROM Account LIMIT 1");
//! ```

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::soql::SoqlConnection;
use crate::statement::QueryResult;
use crate::types::{ParameterType, Value};

/// Sort direction for `ORDER BY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending (the default)
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl Order {
    /// SQL keyword
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Junction {
    And,
    Or,
}

/// `WHERE` condition built from `and_where`/`or_where` calls
#[derive(Debug, Clone, PartialEq, Eq)]
struct Condition {
    junction: Junction,
    parts: Vec<String>,
}

impl Condition {
    fn single(predicate: String) -> Self {
        Self {
            junction: Junction::And,
            parts: vec![predicate],
        }
    }

    fn combine(self, junction: Junction, predicate: String) -> Self {
        if self.junction == junction || self.parts.len() == 1 {
            let mut parts = self.parts;
            parts.push(predicate);
            return Self { junction, parts };
        }
        Self {
            junction,
            parts: vec![self.render(), predicate],
        }
    }

    fn render(&self) -> String {
        if self.parts.len() == 1 {
            return self.parts[0].clone();
        }
        let separator = match self.junction {
            Junction::And => " AND ",
            Junction::Or => " OR ",
        };
        self.parts
            .iter()
            .map(|part| format!("({part})"))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// `SELECT` statement builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    select: Vec<String>,
    from: Option<String>,
    condition: Option<Condition>,
    group_by: Vec<String>,
    order_by: Vec<String>,
    max_results: Option<u64>,
    first_result: Option<u64>,
    parameters: Vec<(String, Value)>,
    types: HashMap<String, ParameterType>,
}

impl QueryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the field list
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append to the field list
    pub fn add_select(mut self, column: impl Into<String>) -> Self {
        self.select.push(column.into());
        self
    }

    /// Set the queried object
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(table.into());
        self
    }

    /// Append a nested sub-select to the field list
    ///
    /// Renders `(SELECT <columns> FROM <table>[ WHERE <condition>][ <extra>])`;
    /// empty `condition`/`extra` are omitted.
    pub fn join<S: AsRef<str>>(
        self,
        table: &str,
        columns: &[S],
        condition: &str,
        extra: &str,
    ) -> Result<Self> {
        if table.trim().is_empty() {
            return Err(Error::invalid_argument("join table must not be empty"));
        }
        if columns.is_empty() {
            return Err(Error::invalid_argument("join columns must be a non-empty list"));
        }

        let columns = columns
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(", ");
        let mut query = format!("(SELECT {columns} FROM {table}");
        if !condition.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(condition);
        }
        if !extra.is_empty() {
            query.push(' ');
            query.push_str(extra);
        }
        query.push(')');

        Ok(self.add_select(query))
    }

    /// Refused; use [`join`](Self::join)
    pub fn left_join(
        self,
        _from_alias: &str,
        _join: &str,
        _alias: &str,
        _condition: Option<&str>,
    ) -> Result<Self> {
        Err(join_not_allowed("left_join"))
    }

    /// Refused; use [`join`](Self::join)
    pub fn right_join(
        self,
        _from_alias: &str,
        _join: &str,
        _alias: &str,
        _condition: Option<&str>,
    ) -> Result<Self> {
        Err(join_not_allowed("right_join"))
    }

    /// Refused; use [`join`](Self::join)
    pub fn inner_join(
        self,
        _from_alias: &str,
        _join: &str,
        _alias: &str,
        _condition: Option<&str>,
    ) -> Result<Self> {
        Err(join_not_allowed("inner_join"))
    }

    /// Replace the `WHERE` condition
    pub fn where_(mut self, predicate: impl Into<String>) -> Self {
        self.condition = Some(Condition::single(predicate.into()));
        self
    }

    /// Add a predicate joined with `AND`
    pub fn and_where(self, predicate: impl Into<String>) -> Self {
        self.add_condition(Junction::And, predicate.into())
    }

    /// Add a predicate joined with `OR`
    pub fn or_where(self, predicate: impl Into<String>) -> Self {
        self.add_condition(Junction::Or, predicate.into())
    }

    fn add_condition(mut self, junction: Junction, predicate: String) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(condition) => condition.combine(junction, predicate),
            None => Condition::single(predicate),
        });
        self
    }

    /// Replace the grouping
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by = vec![column.into()];
        self
    }

    /// Replace the ordering
    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by = vec![format!("{} {}", column.into(), order.as_str())];
        self
    }

    /// Append to the ordering
    pub fn add_order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by
            .push(format!("{} {}", column.into(), order.as_str()));
        self
    }

    /// Set `LIMIT`
    pub fn set_max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Set `OFFSET`
    pub fn set_first_result(mut self, first: u64) -> Self {
        self.first_result = Some(first);
        self
    }

    /// Set a named parameter
    ///
    /// Textual values are URL-encoded, since the rendered statement travels
    /// in a query string; other values are kept as given.
    pub fn set_parameter(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_parameter_with_type(key, value, ParameterType::default())
    }

    /// Set a named parameter with a declared type
    pub fn set_parameter_with_type(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        ty: ParameterType,
    ) -> Self {
        let key = key.into();
        let value = encode_parameter(value.into());

        match self.parameters.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => *slot = value,
            None => self.parameters.push((key.clone(), value)),
        }
        self.types.insert(key, ty);
        self
    }

    /// Value of a named parameter
    pub fn parameter(&self, key: &str) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Parameters in the order they were first set
    pub fn parameters(&self) -> &[(String, Value)] {
        &self.parameters
    }

    /// Render the statement
    pub fn sql(&self) -> String {
        let mut sql = format!("SELECT {}", self.select.join(", "));

        if let Some(from) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(from);
        }
        if let Some(condition) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(&condition.render());
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(max) = self.max_results {
            sql.push_str(&format!(" LIMIT {max}"));
        }
        if let Some(first) = self.first_result {
            sql.push_str(&format!(" OFFSET {first}"));
        }

        sql
    }

    /// Bind the parameters and execute through `connection`
    pub fn execute_query(&self, connection: &SoqlConnection) -> Result<QueryResult> {
        let mut statement = connection.prepare(&self.sql())?;
        for (name, value) in &self.parameters {
            let ty = self.types.get(name).copied().unwrap_or_default();
            statement.bind_value(name.as_str(), value.clone(), ty)?;
        }
        statement.execute(Vec::<(String, Value)>::new())
    }
}

fn encode_parameter(value: Value) -> Value {
    match value.to_text() {
        Some(text) => Value::String(url::form_urlencoded::byte_serialize(text.as_bytes()).collect()),
        None => value,
    }
}

fn join_not_allowed(method: &str) -> Error {
    Error::unsupported(format!(
        "\"QueryBuilder::{method}\" method call is not allowed, use \"join\" instead."
    ))
}
