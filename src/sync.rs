//! Reconciles a live table with its declared `TableDefinition`.

use log::{info, warn};

use crate::config::{DatabaseConfig, Environment};
use crate::error::{DbError, Result};
use crate::schema::{ColumnConstraint, ColumnDefinition, IndexDefinition, TableDefinition};
use crate::sqlite::Executor;
use crate::value::{Params, SqlQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Create what is missing; never drop data.
    Safe,
    /// Drop and recreate the table empty. Development and test bootstrapping only.
    Destructive,
}

/// Whether destructive syncs are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub environment: Environment,
    pub allow_destructive: bool,
}

impl SyncPolicy {
    pub fn permits_destructive(&self) -> bool {
        self.environment == Environment::Development || self.allow_destructive
    }
}

impl From<&DatabaseConfig> for SyncPolicy {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            environment: config.environment,
            allow_destructive: config.allow_destructive_sync,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub table: String,
    pub dropped: bool,
    pub created: bool,
    pub added_columns: Vec<String>,
}

pub struct SchemaSynchronizer<'a, E: Executor> {
    executor: &'a E,
    policy: SyncPolicy,
}

impl<'a, E: Executor> SchemaSynchronizer<'a, E> {
    pub fn new(executor: &'a E, policy: SyncPolicy) -> Self {
        Self { executor, policy }
    }

    pub async fn sync(&self, table: &TableDefinition, mode: SyncMode) -> Result<SyncReport> {
        let mut report = SyncReport {
            table: table.name.clone(),
            ..SyncReport::default()
        };
        let existing = self.existing_columns(&table.name).await?;

        match mode {
            SyncMode::Destructive => {
                if !self.policy.permits_destructive() {
                    return Err(DbError::DestructiveSyncRefused(table.name.clone()));
                }
                if !existing.is_empty() {
                    self.executor
                        .execute_batch(&format!("DROP TABLE IF EXISTS {}", table.name))
                        .await?;
                    report.dropped = true;
                }
                self.executor.execute_batch(&table.create_sql(false)).await?;
                report.created = true;
            }
            SyncMode::Safe if existing.is_empty() => {
                self.executor.execute_batch(&table.create_sql(true)).await?;
                report.created = true;
            }
            SyncMode::Safe => {
                for column in &table.columns {
                    if !existing.contains(&column.name) {
                        self.add_column(table, column).await?;
                        report.added_columns.push(column.name.clone());
                    }
                }
            }
        }

        for index in &table.indexes {
            self.executor.execute_batch(&index.create_sql(&table.name)).await?;
        }

        info!(
            "synced table `{}` ({:?}): dropped={} created={} added_columns={:?}",
            report.table, mode, report.dropped, report.created, report.added_columns
        );
        Ok(report)
    }

    /// Column names of `table`, empty when it does not exist.
    async fn existing_columns(&self, table: &str) -> Result<Vec<String>> {
        let rows = self
            .executor
            .query(
                SqlQuery::new("SELECT name FROM pragma_table_info(:table)")
                    .with_params(Params::new().with_value(":table", table)),
            )
            .await?;
        rows.iter().map(|row| row.text("name")).collect()
    }

    // SQLite cannot add PRIMARY KEY or UNIQUE columns in place, and a NOT NULL
    // column needs a default.
    async fn add_column(&self, table: &TableDefinition, column: &ColumnDefinition) -> Result<()> {
        if column.is_primary_key() {
            return Err(DbError::Validation(format!(
                "cannot add primary key column `{}` to existing table `{}`",
                column.name, table.name
            )));
        }
        let mut added = column.clone();
        added
            .constraints
            .retain(|c| !matches!(c, ColumnConstraint::Unique | ColumnConstraint::AutoIncrement));
        if added.is_required() && added.default_value.is_none() {
            warn!(
                "adding required column `{}` to `{}` as nullable: no default for existing rows",
                column.name, table.name
            );
            added.constraints.retain(|c| *c != ColumnConstraint::NotNull);
        }
        self.executor
            .execute_batch(&format!("ALTER TABLE {} ADD COLUMN {}", table.name, added.sql()))
            .await?;
        if column.is_unique() {
            let index = IndexDefinition::new(
                &format!("{}_{}_unique", table.name, column.name),
                &[column.name.as_str()],
            )
            .unique();
            self.executor.execute_batch(&index.create_sql(&table.name)).await?;
        }
        Ok(())
    }
}
