use thiserror::Error;

/// Errors raised by the connection handle, synchronizer and repository.
#[derive(Debug, Error)]
pub enum DbError {
    /// Authentication or network failure, or a session that is not open.
    #[error("connection error: {0}")]
    Connection(String),

    /// Missing required field, unknown column or an illegal change.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unique constraint violation on {table}.{column}")]
    UniqueConstraintViolation { table: String, column: String },

    /// The operation target no longer exists.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("destructive sync of table `{0}` refused in production without explicit confirmation")]
    DestructiveSyncRefused(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<rusqlite::Error> for DbError {
    /// Classifies constraint failures reported by SQLite; everything else is
    /// passed through as a driver error.
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    let (table, column) = constraint_target(message);
                    return DbError::UniqueConstraintViolation { table, column };
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    return DbError::Validation(message.clone());
                }
                _ => {}
            }
        }
        DbError::Sqlite(err)
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::Configuration(err.to_string())
    }
}

/// Extracts `table.column` from messages like
/// `UNIQUE constraint failed: users.email`.
fn constraint_target(message: &str) -> (String, String) {
    let target = message
        .rsplit(": ")
        .next()
        .and_then(|t| t.split(", ").next())
        .unwrap_or_default();
    match target.split_once('.') {
        Some((table, column)) => (table.to_string(), column.to_string()),
        None => (String::new(), target.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(extended_code: i32, message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(extended_code),
            Some(message.to_string()),
        )
    }

    #[test]
    fn test_unique_failure_is_classified() {
        let err = DbError::from(failure(
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: users.email",
        ));
        match err {
            DbError::UniqueConstraintViolation { table, column } => {
                assert_eq!(table, "users");
                assert_eq!(column, "email");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_not_null_failure_is_validation() {
        let err = DbError::from(failure(
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL,
            "NOT NULL constraint failed: users.first_name",
        ));
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn test_other_failures_pass_through() {
        let err = DbError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, DbError::Sqlite(_)));
    }
}
