//! Declared table shapes and the `Model` trait binding a struct to its table.

use crate::error::{DbError, Result};
use crate::value::{Record, Value};

/// Column holding the insert time of a timestamped table.
pub const CREATED_AT: &str = "created_at";
/// Column refreshed on every mutation of a timestamped table.
pub const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
    /// Whether `created_at`/`updated_at` are managed by the repository.
    pub timestamps: bool,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            timestamps: false,
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Appends the managed `created_at`/`updated_at` columns.
    pub fn with_timestamps(mut self) -> Self {
        self.timestamps = true;
        self.columns.push(ColumnDefinition::new(CREATED_AT, DataType::Timestamp).not_null());
        self.columns.push(ColumnDefinition::new(UPDATED_AT, DataType::Timestamp).not_null());
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns the column or a `Validation` error naming the table.
    pub fn require_column(&self, name: &str) -> Result<&ColumnDefinition> {
        self.find_column(name).ok_or_else(|| {
            DbError::Validation(format!("unknown column `{}` on table `{}`", name, self.name))
        })
    }

    pub fn primary_key(&self) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    /// Whether the column's value is assigned by the store or the repository.
    pub fn is_managed(&self, column: &ColumnDefinition) -> bool {
        column.is_primary_key()
            || (self.timestamps && (column.name == CREATED_AT || column.name == UPDATED_AT))
    }

    /// Columns a caller must supply on insert.
    pub fn required_columns(&self) -> impl Iterator<Item = &ColumnDefinition> {
        self.columns
            .iter()
            .filter(move |c| c.is_required() && c.default_value.is_none() && !self.is_managed(c))
    }

    pub fn create_sql(&self, if_not_exists: bool) -> String {
        let columns: Vec<String> = self.columns.iter().map(ColumnDefinition::sql).collect();
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            columns.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<DefaultValue>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn primary_key(self) -> Self {
        self.constraint(ColumnConstraint::PrimaryKey)
    }

    pub fn auto_increment(self) -> Self {
        self.constraint(ColumnConstraint::AutoIncrement)
    }

    pub fn not_null(self) -> Self {
        self.constraint(ColumnConstraint::NotNull)
    }

    pub fn unique(self) -> Self {
        self.constraint(ColumnConstraint::Unique)
    }

    pub fn with_default(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
        self
    }

    pub fn has(&self, constraint: ColumnConstraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn is_primary_key(&self) -> bool {
        self.has(ColumnConstraint::PrimaryKey)
    }

    pub fn is_required(&self) -> bool {
        self.has(ColumnConstraint::NotNull)
    }

    pub fn is_unique(&self) -> bool {
        self.has(ColumnConstraint::Unique)
    }

    pub fn sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.sql());
        if self.is_primary_key() {
            sql.push_str(" PRIMARY KEY");
            if self.has(ColumnConstraint::AutoIncrement) {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.is_required() {
            sql.push_str(" NOT NULL");
        }
        if self.is_unique() {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default_value {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.sql());
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
    Real,
    Blob,
    /// Microseconds since the Unix epoch, stored as INTEGER.
    Timestamp,
}

impl DataType {
    pub fn sql(&self) -> &'static str {
        match self {
            DataType::Integer | DataType::Timestamp => "INTEGER",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
            DataType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    Integer(i64),
    Text(String),
    Real(f64),
    Null,
}

impl DefaultValue {
    pub fn sql(&self) -> String {
        match self {
            DefaultValue::Integer(i) => i.to_string(),
            DefaultValue::Text(t) => format!("'{}'", t.replace('\'', "''")),
            DefaultValue::Real(r) => r.to_string(),
            DefaultValue::Null => "NULL".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDefinition {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn create_sql(&self, table: &str) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table,
            self.columns.join(", ")
        )
    }
}

/// Insert fields for a new record. Omitted fields are left out so the
/// column default applies.
pub trait Draft: Send {
    fn into_values(self) -> Vec<(String, Value)>;
}

/// A record kind with a declared table.
pub trait Model: Sized + Send {
    type Draft: Draft;

    fn table() -> TableDefinition;

    fn from_record(record: &Record) -> Result<Self>;

    fn id(&self) -> i64;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableDefinition {
        TableDefinition::new("notes")
            .column(
                ColumnDefinition::new("id", DataType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDefinition::new("title", DataType::Text).not_null().unique())
            .column(
                ColumnDefinition::new("tag", DataType::Text)
                    .not_null()
                    .with_default(DefaultValue::Text("it's".into())),
            )
            .with_timestamps()
    }

    #[test]
    fn test_create_sql() {
        assert_eq!(
            table().create_sql(false),
            "CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             title TEXT NOT NULL UNIQUE, tag TEXT NOT NULL DEFAULT 'it''s', \
             created_at INTEGER NOT NULL, updated_at INTEGER NOT NULL)"
        );
        assert!(table().create_sql(true).starts_with("CREATE TABLE IF NOT EXISTS notes"));
    }

    #[test]
    fn test_required_columns_skip_managed_and_defaulted() {
        let table = table();
        let required: Vec<&str> = table.required_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(required, vec!["title"]);
    }

    #[test]
    fn test_require_column_rejects_unknown() {
        assert!(matches!(
            table().require_column("nope"),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_index_sql() {
        let index = IndexDefinition::new("idx_notes_tag", &["tag"]).unique();
        assert_eq!(
            index.create_sql("notes"),
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_notes_tag ON notes (tag)"
        );
    }
}
