//! Relational record lifecycle on SQLite.
//!
//! # Intention
//!
//! - Provide a small, typed mapping layer: a connection handle, declared
//!   table schemas, a schema synchronizer and a per-model repository.
//! - Encapsulate SQLite-specific logic, types, and error handling.
//!
//! # Architectural Boundaries
//!
//! - Only database code belongs here; `lifecycle` is the one walk through
//!   that strings the pieces together.
//! - Query planning, constraint enforcement and durability stay with SQLite.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod repository;
pub mod schema;
pub mod sqlite;
pub mod sync;
pub mod user;
pub mod value;

pub use config::{DatabaseConfig, Dialect, Environment};
pub use error::{DbError, Result};
pub use query::{Changes, Condition, Direction, FindOptions, OrderBy, Query, QueryOperator};
pub use repository::Repository;
pub use schema::{
    ColumnConstraint, ColumnDefinition, DataType, DefaultValue, Draft, IndexDefinition, Model,
    TableDefinition,
};
pub use sqlite::{with_connection, Database, Executor};
pub use sync::{SchemaSynchronizer, SyncMode, SyncPolicy, SyncReport};
pub use user::{NewUser, User, UserChanges};
pub use value::{Params, Record, SqlQuery, Value};
