//! Conjunctive predicates, ordering and change sets, compiled to SQL
//! fragments against a declared table.

use crate::error::{DbError, Result};
use crate::schema::TableDefinition;
use crate::value::{Params, Value};

/// Query operators for building advanced queries
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperator {
    Equal(Value),
    NotEqual(Value),
    GreaterThan(Value),
    GreaterThanOrEqual(Value),
    LessThan(Value),
    LessThanOrEqual(Value),
    Like(String),
    In(Vec<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: QueryOperator,
}

/// Query builder for composable, immutable queries. All conditions must
/// hold (AND).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_condition(mut self, field: &str, op: QueryOperator) -> Self {
        self.conditions.push(Condition {
            field: field.to_string(),
            op,
        });
        self
    }
    /// Shorthand for an equality condition.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(field, QueryOperator::Equal(value.into()))
    }
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(field, QueryOperator::GreaterThan(value.into()))
    }
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with_condition(field, QueryOperator::LessThan(value.into()))
    }
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Compiles to a ` WHERE ...` clause, or an empty string for no
    /// conditions. Values are bound into `params`.
    pub fn where_sql(&self, table: &TableDefinition, params: &mut Params) -> Result<String> {
        if self.conditions.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            table.require_column(&condition.field)?;
            parts.push(condition.sql(params));
        }
        Ok(format!(" WHERE {}", parts.join(" AND ")))
    }
}

impl Condition {
    fn sql(&self, params: &mut Params) -> String {
        let field = &self.field;
        let mut bind = |value: &Value| params.bind("w", value.clone());
        match &self.op {
            QueryOperator::Equal(Value::Null) => format!("{field} IS NULL"),
            QueryOperator::NotEqual(Value::Null) => format!("{field} IS NOT NULL"),
            QueryOperator::Equal(v) => format!("{field} = {}", bind(v)),
            QueryOperator::NotEqual(v) => format!("{field} <> {}", bind(v)),
            QueryOperator::GreaterThan(v) => format!("{field} > {}", bind(v)),
            QueryOperator::GreaterThanOrEqual(v) => format!("{field} >= {}", bind(v)),
            QueryOperator::LessThan(v) => format!("{field} < {}", bind(v)),
            QueryOperator::LessThanOrEqual(v) => format!("{field} <= {}", bind(v)),
            QueryOperator::Like(pattern) => {
                format!("{field} LIKE {}", bind(&Value::Text(pattern.clone())))
            }
            QueryOperator::In(values) if values.is_empty() => "0 = 1".to_string(),
            QueryOperator::In(values) => {
                let names: Vec<String> = values.iter().map(&mut bind).collect();
                format!("{field} IN ({})", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Asc,
        }
    }
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Options for `find_all`: predicate, ordering and paging.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FindOptions {
    pub query: Query,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn filter(mut self, query: Query) -> Self {
        self.query = query;
        self
    }
    pub fn order(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compiles the ORDER BY / LIMIT / OFFSET tail.
    pub fn tail_sql(&self, table: &TableDefinition) -> Result<String> {
        let mut sql = String::new();
        if !self.order_by.is_empty() {
            let mut parts = Vec::with_capacity(self.order_by.len());
            for order in &self.order_by {
                table.require_column(&order.field)?;
                let direction = match order.direction {
                    Direction::Asc => "ASC",
                    Direction::Desc => "DESC",
                };
                parts.push(format!("{} {}", order.field, direction));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }
        Ok(sql)
    }
}

/// Field changes applied by an update, in insertion order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Changes {
    pub values: Vec<(String, Value)>,
}

impl Changes {
    pub fn new() -> Self {
        Self::default()
    }
    /// Sets `field`, replacing an earlier change to the same field.
    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        match self.values.iter_mut().find(|(f, _)| f == field) {
            Some(existing) => existing.1 = value,
            None => self.values.push((field.to_string(), value)),
        }
        self
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Validates against `table` and compiles the `SET` assignments.
    pub fn set_sql(&self, table: &TableDefinition, params: &mut Params) -> Result<Vec<String>> {
        let mut assignments = Vec::with_capacity(self.values.len());
        for (field, value) in &self.values {
            let column = table.require_column(field)?;
            if table.is_managed(column) {
                return Err(DbError::Validation(format!(
                    "column `{}` on table `{}` cannot be changed",
                    field, table.name
                )));
            }
            if column.is_required() && value.is_null() {
                return Err(DbError::Validation(format!(
                    "column `{}` on table `{}` cannot be NULL",
                    field, table.name
                )));
            }
            let name = params.bind("s", value.clone());
            assignments.push(format!("{field} = {name}"));
        }
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDefinition, DataType};

    fn table() -> TableDefinition {
        TableDefinition::new("people")
            .column(ColumnDefinition::new("id", DataType::Integer).primary_key())
            .column(ColumnDefinition::new("name", DataType::Text).not_null())
            .column(ColumnDefinition::new("age", DataType::Integer))
            .with_timestamps()
    }

    #[test]
    fn test_empty_query_has_no_where() {
        let mut params = Params::new();
        assert_eq!(Query::new().where_sql(&table(), &mut params).unwrap(), "");
        assert!(params.is_empty());
    }

    #[test]
    fn test_conjunction_binds_values() {
        let mut params = Params::new();
        let sql = Query::new()
            .gt("age", 20)
            .eq("name", "Alice")
            .with_condition("age", QueryOperator::Equal(Value::Null))
            .where_sql(&table(), &mut params)
            .unwrap();
        assert_eq!(sql, " WHERE age > :w0 AND name = :w1 AND age IS NULL");
        assert_eq!(params.values.get(":w0"), Some(&Value::Integer(20)));
        assert_eq!(params.values.get(":w1"), Some(&Value::Text("Alice".into())));
    }

    #[test]
    fn test_in_operator() {
        let mut params = Params::new();
        let sql = Query::new()
            .with_condition("age", QueryOperator::In(vec![1.into(), 2.into()]))
            .with_condition("name", QueryOperator::In(vec![]))
            .where_sql(&table(), &mut params)
            .unwrap();
        assert_eq!(sql, " WHERE age IN (:w0, :w1) AND 0 = 1");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut params = Params::new();
        let err = Query::new()
            .eq("name; DROP TABLE people", 1)
            .where_sql(&table(), &mut params)
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
        let err = FindOptions::new()
            .order(OrderBy::asc("nope"))
            .tail_sql(&table())
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn test_tail_sql() {
        let tail = FindOptions::new()
            .order(OrderBy::asc("name"))
            .order(OrderBy::desc("age"))
            .limit(10)
            .offset(5)
            .tail_sql(&table())
            .unwrap();
        assert_eq!(tail, " ORDER BY name ASC, age DESC LIMIT 10 OFFSET 5");
        let tail = FindOptions::new().offset(3).tail_sql(&table()).unwrap();
        assert_eq!(tail, " LIMIT -1 OFFSET 3");
    }

    #[test]
    fn test_changes_reject_managed_and_null_required() {
        let mut params = Params::new();
        for changes in [
            Changes::new().set("id", 3),
            Changes::new().set("updated_at", 0),
            Changes::new().set("name", Value::Null),
            Changes::new().set("missing", 1),
        ] {
            assert!(matches!(
                changes.set_sql(&table(), &mut params),
                Err(DbError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_changes_set_replaces() {
        let changes = Changes::new().set("age", 1).set("age", 2);
        assert_eq!(changes.values, vec![("age".to_string(), Value::Integer(2))]);
        let mut params = Params::new();
        let sql = changes
            .set("age", Value::Null)
            .set_sql(&table(), &mut params)
            .unwrap();
        assert_eq!(sql, vec!["age = :s0".to_string()]);
    }
}
