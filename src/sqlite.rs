use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::lock::Mutex;
use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags, Statement};

use crate::config::{DatabaseConfig, Dialect};
use crate::error::{DbError, Result};
use crate::value::{Record, SqlQuery};

/// Runs SQL against an open session.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a statement and return the number of affected rows
    async fn execute(&self, query: SqlQuery) -> Result<usize>;

    /// Execute a statement and collect every result row
    async fn query(&self, query: SqlQuery) -> Result<Vec<Record>>;

    async fn execute_batch(&self, sql: &str) -> Result<()>;
}

/// Connection handle holding a single SQLite session.
pub struct Database {
    config: DatabaseConfig,
    connection: Mutex<Option<Connection>>,
}

impl Database {
    /// Create a handle for `config` without opening a session
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            connection: Mutex::new(None),
        }
    }

    /// Open and authenticate; the session is released again if either step fails.
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        let db = Self::new(config);
        db.open_and_authenticate().await?;
        Ok(db)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub async fn is_open(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Establish the session. Opening an already open handle is a no-op.
    pub async fn open(&self) -> Result<()> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            debug!("session to {} already open", self.config.describe());
            return Ok(());
        }
        if self.config.dialect != Dialect::Sqlite {
            return Err(DbError::Connection(format!(
                "dialect `{}` is not supported by this build",
                self.config.dialect
            )));
        }
        *slot = Some(open_connection(&self.config)?);
        info!("opened session to {}", self.config.describe());
        Ok(())
    }

    /// Verify the session is live and the store is readable.
    pub async fn authenticate(&self) -> Result<()> {
        let slot = self.connection.lock().await;
        let conn = session(&slot)?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| {
            DbError::Connection(format!(
                "authentication against {} failed: {}",
                self.config.describe(),
                e
            ))
        })?;
        debug!("authenticated against {}", self.config.describe());
        Ok(())
    }

    /// Release the session. Returns whether a session was open; calling it
    /// again, or on a handle that never opened, is harmless.
    pub async fn close(&self) -> bool {
        let conn = self.connection.lock().await.take();
        match conn {
            Some(conn) => {
                if let Err((_, e)) = conn.close() {
                    warn!("error while closing {}: {}", self.config.describe(), e);
                }
                info!("closed session to {}", self.config.describe());
                true
            }
            None => false,
        }
    }

    async fn open_and_authenticate(&self) -> Result<()> {
        let result = match self.open().await {
            Ok(()) => self.authenticate().await,
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.close().await;
        }
        result
    }

    fn log_sql(&self, sql: &str) {
        if self.config.logging {
            debug!(target: "sql", "{}", sql);
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.connection.get_mut().take().is_some() {
            debug!("released session to {} on drop", self.config.describe());
        }
    }
}

#[async_trait]
impl Executor for Database {
    async fn execute(&self, query: SqlQuery) -> Result<usize> {
        let slot = self.connection.lock().await;
        self.log_sql(&query.statement);
        let mut stmt = prepare(session(&slot)?, &query)?;
        Ok(stmt.raw_execute()?)
    }

    async fn query(&self, query: SqlQuery) -> Result<Vec<Record>> {
        let slot = self.connection.lock().await;
        self.log_sql(&query.statement);
        let mut stmt = prepare(session(&slot)?, &query)?;
        collect_records(&mut stmt)
    }

    async fn execute_batch(&self, sql: &str) -> Result<()> {
        let slot = self.connection.lock().await;
        self.log_sql(sql);
        session(&slot)?.execute_batch(sql)?;
        Ok(())
    }
}

/// Scoped session: connects, runs `f`, then closes exactly once whatever
/// `f` returned.
pub async fn with_connection<T, F>(config: DatabaseConfig, f: F) -> Result<T>
where
    F: for<'a> FnOnce(&'a Database) -> BoxFuture<'a, Result<T>>,
{
    let db = Database::new(config);
    let result = match db.open_and_authenticate().await {
        Ok(()) => f(&db).await,
        Err(e) => Err(e),
    };
    db.close().await;
    result
}

fn open_connection(config: &DatabaseConfig) -> Result<Connection> {
    let connection = if config.is_in_memory() {
        Connection::open_in_memory()
    } else {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if config.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        Connection::open_with_flags(&config.database, flags)
    };
    connection.map_err(|e| {
        DbError::Connection(format!("cannot open {}: {}", config.describe(), e))
    })
}

fn session(slot: &Option<Connection>) -> Result<&Connection> {
    slot.as_ref()
        .ok_or_else(|| DbError::Connection("session is not open".to_string()))
}

fn prepare<'c>(conn: &'c Connection, query: &SqlQuery) -> Result<Statement<'c>> {
    let mut stmt = conn.prepare(&query.statement)?;
    for (name, value) in &query.params.values {
        let index = stmt.parameter_index(name)?.ok_or_else(|| {
            DbError::Validation(format!("statement has no parameter `{}`", name))
        })?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(stmt)
}

fn collect_records(stmt: &mut Statement<'_>) -> Result<Vec<Record>> {
    let names: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(Record::from_row(&names, row)?);
    }
    Ok(records)
}
