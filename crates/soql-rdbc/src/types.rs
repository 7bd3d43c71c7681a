//! Value types for soql-rdbc
//!
//! - `Value`: a bound parameter or a decoded field value
//! - `ParameterType`: declared type hint recorded at bind time
//! - `Record`: one provider record (field order preserved)
//! - `Row`: ordered column/value view over a record

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One provider record: a flat field → value mapping with bookkeeping removed
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Value that can be bound to a placeholder or read back from a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Arbitrary precision decimal
    Decimal(Decimal),
    /// Text string
    String(String),
    /// Date without time
    Date(NaiveDate),
    /// Timestamp without timezone
    DateTime(NaiveDateTime),
    /// Timestamp in UTC
    DateTimeTz(DateTime<Utc>),
    /// UUID
    Uuid(Uuid),
    /// Nested JSON value (compound fields, sub-query results)
    Json(serde_json::Value),
    /// List of values, rendered as a multi-value literal list
    Array(Vec<Value>),
}

impl Value {
    /// Check if value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value renders as text once stringified
    #[inline]
    pub const fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::String(_) | Self::Date(_) | Self::DateTime(_) | Self::DateTimeTz(_) | Self::Uuid(_)
        )
    }

    /// Wrap anything with a string form; it is stringified right away
    pub fn display(value: impl std::fmt::Display) -> Self {
        Self::String(value.to_string())
    }

    /// String form of values that carry one (strings, dates, uuids)
    ///
    /// Dates and timestamps use the ISO-8601 forms the query language accepts.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            Self::DateTimeTz(dt) => Some(dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Uuid(u) => Some(u.to_string()),
            Self::Null
            | Self::Bool(_)
            | Self::Int32(_)
            | Self::Int64(_)
            | Self::Float64(_)
            | Self::Decimal(_)
            | Self::Json(_)
            | Self::Array(_) => None,
        }
    }

    /// Try to convert to i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            Self::Float64(n) if n.is_finite() => Some(*n as i64),
            Self::Decimal(d) => d.to_string().parse().ok(),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to borrow as str
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Convert a decoded JSON field into a value
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int64(i),
                None => n.as_f64().map_or(Self::Json(serde_json::Value::Number(n)), Self::Float64),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from_json).collect())
            }
            obj @ serde_json::Value::Object(_) => Self::Json(obj),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Self::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Declared type of a bound parameter
///
/// Recorded alongside each bound value; rendering is decided by the value
/// itself, the hint only defaults to `String` when nothing was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParameterType {
    /// SQL NULL
    Null,
    /// Integer
    Integer,
    /// Character data (the default)
    #[default]
    String,
    /// Large character object
    LargeObject,
    /// Boolean
    Boolean,
    /// Binary data
    Binary,
    /// ASCII-only character data
    Ascii,
}

/// Record as ordered column values
#[derive(Debug, Clone)]
pub struct Row {
    /// Column names
    columns: Vec<String>,
    /// Column values (same order as columns)
    values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from a decoded record, keeping provider field order
    pub fn from_record(record: Record) -> Self {
        let (columns, values) = record
            .into_iter()
            .map(|(name, json)| (name, Value::from_json(json)))
            .unzip();
        Self { columns, values }
    }

    /// Get column count
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if row is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Get column names
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get all values
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get value by column index
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Get value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }

    /// Consume the row, returning its values in column order
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
