//! Connection configuration loaded from TOML.
//!
//! ```toml
//! dialect = "sqlite"
//! database = "record_lifecycle.db"   # file path, or ":memory:"
//! host = "localhost"                 # recorded only, the sqlite dialect is embedded
//! port = 5432
//! username = "devuser"
//! password = ""
//! logging = false                    # log every SQL statement at debug level
//! environment = "development"        # or "production"
//! allow_destructive_sync = false
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub dialect: Dialect,
    /// Database name; for sqlite the file path or `:memory:`.
    pub database: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Log generated SQL at debug level.
    pub logging: bool,
    pub create_if_missing: bool,
    pub environment: Environment,
    /// Separately-confirmed permission for a destructive sync in production.
    pub allow_destructive_sync: bool,
}

pub const IN_MEMORY: &str = ":memory:";

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            database: "record_lifecycle.db".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            username: "devuser".to_string(),
            password: String::new(),
            logging: false,
            create_if_missing: true,
            environment: Environment::Development,
            allow_destructive_sync: false,
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("dialect", &self.dialect)
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("logging", &self.logging)
            .field("create_if_missing", &self.create_if_missing)
            .field("environment", &self.environment)
            .field("allow_destructive_sync", &self.allow_destructive_sync)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == IN_MEMORY
    }

    /// Load configuration from file
    ///
    /// Returns default configuration if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DbError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Host, port and database, for log lines.
    pub fn describe(&self) -> String {
        format!("{}://{}:{}/{}", self.dialect, self.host, self.port, self.database)
    }
}
