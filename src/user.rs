use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::Changes;
use crate::schema::{
    ColumnDefinition, DataType, DefaultValue, Draft, IndexDefinition, Model, TableDefinition,
    CREATED_AT, UPDATED_AT,
};
use crate::value::{Record, Value};

pub const TABLE: &str = "users";
pub const DEFAULT_AGE: i64 = 18;

/// Column names of the `users` table.
pub mod columns {
    pub const ID: &str = "id";
    pub const FIRST_NAME: &str = "first_name";
    pub const LAST_NAME: &str = "last_name";
    pub const EMAIL: &str = "email";
    pub const AGE: &str = "age";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub age: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.to_string())
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name(), self.email)
    }
}

impl Model for User {
    type Draft = NewUser;

    fn table() -> TableDefinition {
        TableDefinition::new(TABLE)
            .column(
                ColumnDefinition::new(columns::ID, DataType::Integer)
                    .primary_key()
                    .auto_increment(),
            )
            .column(ColumnDefinition::new(columns::FIRST_NAME, DataType::Text).not_null())
            .column(ColumnDefinition::new(columns::LAST_NAME, DataType::Text))
            .column(
                ColumnDefinition::new(columns::EMAIL, DataType::Text)
                    .not_null()
                    .unique(),
            )
            .column(
                ColumnDefinition::new(columns::AGE, DataType::Integer)
                    .with_default(DefaultValue::Integer(DEFAULT_AGE)),
            )
            .with_timestamps()
            .index(IndexDefinition::new("idx_users_last_name", &[columns::LAST_NAME]))
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            id: record.integer(columns::ID)?,
            first_name: record.text(columns::FIRST_NAME)?,
            last_name: record.opt_text(columns::LAST_NAME)?,
            email: record.text(columns::EMAIL)?,
            age: record.opt_integer(columns::AGE)?,
            created_at: record.timestamp(CREATED_AT)?,
            updated_at: record.timestamp(UPDATED_AT)?,
        })
    }

    fn id(&self) -> i64 {
        self.id
    }
}

/// Insert fields for a `User`. Fields left `None` are omitted from the
/// insert, so `age` falls back to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl NewUser {
    pub fn new(first_name: &str, email: &str) -> Self {
        Self {
            first_name: Some(first_name.to_string()),
            email: Some(email.to_string()),
            ..Self::default()
        }
    }

    pub fn last_name(mut self, last_name: &str) -> Self {
        self.last_name = Some(last_name.to_string());
        self
    }

    pub fn age(mut self, age: i64) -> Self {
        self.age = Some(age);
        self
    }
}

impl Draft for NewUser {
    fn into_values(self) -> Vec<(String, Value)> {
        let mut values = Vec::new();
        let mut push = |column: &str, value: Option<Value>| {
            if let Some(value) = value {
                values.push((column.to_string(), value));
            }
        };
        push(columns::FIRST_NAME, self.first_name.map(Value::from));
        push(columns::LAST_NAME, self.last_name.map(Value::from));
        push(columns::EMAIL, self.email.map(Value::from));
        push(columns::AGE, self.age.map(Value::from));
        values
    }
}

/// Changed fields for a `User` update. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub email: Option<String>,
    pub age: Option<Option<i64>>,
}

impl UserChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first_name(mut self, first_name: &str) -> Self {
        self.first_name = Some(first_name.to_string());
        self
    }

    pub fn last_name(mut self, last_name: Option<&str>) -> Self {
        self.last_name = Some(last_name.map(str::to_string));
        self
    }

    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn age(mut self, age: Option<i64>) -> Self {
        self.age = Some(age);
        self
    }
}

impl From<UserChanges> for Changes {
    fn from(changes: UserChanges) -> Self {
        let mut out = Changes::new();
        if let Some(first_name) = changes.first_name {
            out = out.set(columns::FIRST_NAME, first_name);
        }
        if let Some(last_name) = changes.last_name {
            out = out.set(columns::LAST_NAME, last_name);
        }
        if let Some(email) = changes.email {
            out = out.set(columns::EMAIL, email);
        }
        if let Some(age) = changes.age {
            out = out.set(columns::AGE, age);
        }
        out
    }
}
