use std::marker::PhantomData;

use chrono::Utc;
use log::debug;

use crate::error::{DbError, Result};
use crate::query::{Changes, FindOptions, OrderBy, Query};
use crate::schema::{Draft, Model, TableDefinition, CREATED_AT, UPDATED_AT};
use crate::sqlite::Executor;
use crate::value::{Params, SqlQuery, Value};

/// CRUD operations scoped to one model's table.
pub struct Repository<'a, M: Model, E: Executor> {
    executor: &'a E,
    table: TableDefinition,
    _model: PhantomData<fn() -> M>,
}

impl<'a, M: Model, E: Executor> Repository<'a, M, E> {
    pub fn new(executor: &'a E) -> Self {
        Self {
            executor,
            table: M::table(),
            _model: PhantomData,
        }
    }

    pub fn table(&self) -> &TableDefinition {
        &self.table
    }

    /// Insert a new record; the store assigns the id and the repository the
    /// timestamps.
    pub async fn insert(&self, draft: M::Draft) -> Result<M> {
        let values = draft.into_values();
        for (field, _) in &values {
            let column = self.table.require_column(field)?;
            if self.table.is_managed(column) {
                return Err(DbError::Validation(format!(
                    "column `{}` on table `{}` is assigned automatically",
                    field, self.table.name
                )));
            }
        }
        for required in self.table.required_columns() {
            let present = values
                .iter()
                .any(|(field, value)| *field == required.name && !value.is_null());
            if !present {
                return Err(DbError::Validation(format!(
                    "missing required field `{}` on table `{}`",
                    required.name, self.table.name
                )));
            }
        }

        let mut params = Params::new();
        let mut columns = Vec::with_capacity(values.len() + 2);
        let mut placeholders = Vec::with_capacity(values.len() + 2);
        for (field, value) in values {
            placeholders.push(params.bind("i", value));
            columns.push(field);
        }
        if self.table.timestamps {
            let now = Value::timestamp(Utc::now());
            for column in [CREATED_AT, UPDATED_AT] {
                placeholders.push(params.bind("i", now.clone()));
                columns.push(column.to_string());
            }
        }

        let statement = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES RETURNING *", self.table.name)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
                self.table.name,
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let rows = self
            .executor
            .query(SqlQuery::new(&statement).with_params(params))
            .await?;
        let record = rows.first().ok_or_else(|| {
            DbError::NotFound(format!("row inserted into `{}`", self.table.name))
        })?;
        let model = M::from_record(record)?;
        debug!("inserted {} id={}", self.table.name, model.id());
        Ok(model)
    }

    /// Snapshot of every matching record, in the requested order.
    pub async fn find_all(&self, options: FindOptions) -> Result<Vec<M>> {
        let mut params = Params::new();
        let statement = format!(
            "SELECT * FROM {}{}{}",
            self.table.name,
            options.query.where_sql(&self.table, &mut params)?,
            options.tail_sql(&self.table)?
        );
        let rows = self
            .executor
            .query(SqlQuery::new(&statement).with_params(params))
            .await?;
        rows.iter().map(M::from_record).collect()
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<M>> {
        self.find_one(Query::new().eq(self.primary_key()?, id)).await
    }

    /// First matching record by primary key ascending.
    pub async fn find_one(&self, query: Query) -> Result<Option<M>> {
        let options = FindOptions::new()
            .filter(query)
            .order(OrderBy::asc(self.primary_key()?))
            .limit(1);
        Ok(self.find_all(options).await?.into_iter().next())
    }

    pub async fn count(&self, query: Query) -> Result<usize> {
        let mut params = Params::new();
        let statement = format!(
            "SELECT count(*) AS count FROM {}{}",
            self.table.name,
            query.where_sql(&self.table, &mut params)?
        );
        let rows = self
            .executor
            .query(SqlQuery::new(&statement).with_params(params))
            .await?;
        let count = match rows.first() {
            Some(row) => row.integer("count")?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Persist `changes` to `record`'s row and refresh `record` from the
    /// stored result. Empty changes are a no-op.
    pub async fn update_one(&self, record: &mut M, changes: impl Into<Changes>) -> Result<()> {
        let changes = changes.into();
        if changes.is_empty() {
            return Ok(());
        }
        let query = Query::new().eq(self.primary_key()?, record.id());
        let mut updated = self.update_rows(&query, &changes).await?;
        match updated.pop() {
            Some(fresh) => {
                *record = fresh;
                Ok(())
            }
            None => Err(self.missing(record.id())),
        }
    }

    /// Apply identical `changes` to every matching row; returns the number of
    /// rows changed and their new state.
    pub async fn update_many(
        &self,
        query: Query,
        changes: impl Into<Changes>,
    ) -> Result<(usize, Vec<M>)> {
        let changes = changes.into();
        if changes.is_empty() {
            return Ok((0, Vec::new()));
        }
        let rows = self.update_rows(&query, &changes).await?;
        Ok((rows.len(), rows))
    }

    /// Remove `record`'s row permanently.
    pub async fn delete_one(&self, record: &M) -> Result<()> {
        let query = Query::new().eq(self.primary_key()?, record.id());
        match self.delete_rows(&query).await? {
            0 => Err(self.missing(record.id())),
            _ => Ok(()),
        }
    }

    pub async fn delete_many(&self, query: Query) -> Result<usize> {
        self.delete_rows(&query).await
    }

    async fn update_rows(&self, query: &Query, changes: &Changes) -> Result<Vec<M>> {
        let mut params = Params::new();
        let mut assignments = changes.set_sql(&self.table, &mut params)?;
        if self.table.timestamps {
            // Strictly increasing even when the clock has not moved.
            let now = params.bind("s", Value::timestamp(Utc::now()));
            assignments.push(format!("{UPDATED_AT} = MAX({now}, {UPDATED_AT} + 1)"));
        }
        let statement = format!(
            "UPDATE {} SET {}{} RETURNING *",
            self.table.name,
            assignments.join(", "),
            query.where_sql(&self.table, &mut params)?
        );
        let rows = self
            .executor
            .query(SqlQuery::new(&statement).with_params(params))
            .await?;
        debug!("updated {} row(s) in {}", rows.len(), self.table.name);
        rows.iter().map(M::from_record).collect()
    }

    async fn delete_rows(&self, query: &Query) -> Result<usize> {
        let mut params = Params::new();
        let statement = format!(
            "DELETE FROM {}{}",
            self.table.name,
            query.where_sql(&self.table, &mut params)?
        );
        let deleted = self
            .executor
            .execute(SqlQuery::new(&statement).with_params(params))
            .await?;
        debug!("deleted {} row(s) from {}", deleted, self.table.name);
        Ok(deleted)
    }

    fn primary_key(&self) -> Result<&str> {
        self.table
            .primary_key()
            .map(|c| c.name.as_str())
            .ok_or_else(|| {
                DbError::Validation(format!("table `{}` has no primary key", self.table.name))
            })
    }

    fn missing(&self, id: i64) -> DbError {
        DbError::NotFound(format!("{} with id {}", self.table.name, id))
    }
}
