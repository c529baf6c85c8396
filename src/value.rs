use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

use crate::error::{DbError, Result};

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Timestamps are stored as microseconds since the Unix epoch.
    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Value::Integer(at.timestamp_micros())
    }

    fn from_ref(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(t) => ToSqlOutput::Borrowed(ValueRef::Text(t.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Borrowed(ValueRef::Integer(i64::from(*b))),
        })
    }
}

/// Parameter bindings for SQL queries
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: HashMap<String, Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }
    /// Add a named value
    pub fn with_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) {
        self.values.insert(name.to_string(), value.into());
    }
    /// Binds `value` under a fresh `:{prefix}{n}` name and returns the name.
    pub fn bind(&mut self, prefix: &str, value: Value) -> String {
        let name = format!(":{}{}", prefix, self.values.len());
        self.values.insert(name.clone(), value);
        name
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// SQL Query with typed parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Params,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Params::new(),
        }
    }
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// One result row keyed by column name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Record {
    pub columns: HashMap<String, Value>,
}

impl Record {
    pub(crate) fn from_row(names: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut columns = HashMap::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            columns.insert(name.clone(), Value::from_ref(row.get_ref(index)?));
        }
        Ok(Self { columns })
    }

    pub fn with_value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.columns.insert(column.to_string(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn integer(&self, column: &str) -> Result<i64> {
        self.opt_integer(column)?
            .ok_or_else(|| decode_error(column, "unexpected NULL"))
    }

    pub fn opt_integer(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(*i)),
            Value::Boolean(b) => Ok(Some(i64::from(*b))),
            other => Err(decode_error(column, &format!("expected integer, got {other:?}"))),
        }
    }

    pub fn text(&self, column: &str) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| decode_error(column, "unexpected NULL"))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Text(t) => Ok(Some(t.clone())),
            other => Err(decode_error(column, &format!("expected text, got {other:?}"))),
        }
    }

    pub fn timestamp(&self, column: &str) -> Result<DateTime<Utc>> {
        let micros = self.integer(column)?;
        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| decode_error(column, &format!("timestamp {micros} out of range")))
    }

    fn value(&self, column: &str) -> Result<&Value> {
        self.columns
            .get(column)
            .ok_or_else(|| decode_error(column, "column missing from result row"))
    }
}

fn decode_error(column: &str, reason: &str) -> DbError {
    DbError::Decode {
        column: column.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_bind_generates_unique_names() {
        let mut params = Params::new();
        let a = params.bind("w", Value::from(1));
        let b = params.bind("w", Value::from("x"));
        assert_eq!(a, ":w0");
        assert_eq!(b, ":w1");
        assert_eq!(params.values.get(":w1"), Some(&Value::Text("x".into())));
    }

    #[test]
    fn test_record_accessors() {
        let record = Record::default()
            .with_value("id", 7)
            .with_value("name", "Alice")
            .with_value("nick", Value::Null);
        assert_eq!(record.integer("id").unwrap(), 7);
        assert_eq!(record.text("name").unwrap(), "Alice");
        assert_eq!(record.opt_text("nick").unwrap(), None);
        assert!(matches!(record.text("nick"), Err(DbError::Decode { .. })));
        assert!(matches!(record.integer("name"), Err(DbError::Decode { .. })));
        assert!(matches!(record.integer("absent"), Err(DbError::Decode { .. })));
    }

    #[test]
    fn test_timestamp_round_trip_precision() {
        let at = DateTime::from_timestamp_micros(1_700_000_000_123_456).unwrap();
        let record = Record::default().with_value("at", Value::timestamp(at));
        assert_eq!(record.timestamp("at").unwrap(), at);
    }
}
