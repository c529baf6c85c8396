use anyhow::Result;
use futures::FutureExt;
use record_lifecycle::lifecycle::{self, sample_users};
use record_lifecycle::{with_connection, Database, DatabaseConfig, DbError, Executor, SqlQuery};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn names(users: &[record_lifecycle::User]) -> Vec<&str> {
    users.iter().map(|u| u.first_name.as_str()).collect()
}

#[tokio::test]
async fn test_full_walk_through() -> Result<()> {
    init_logging();
    let report = lifecycle::run(DatabaseConfig::in_memory()).await?;

    assert_eq!(report.created.len(), sample_users().len());
    assert_eq!(names(&report.all_users), vec!["Alice", "Bob", "Charlie"]);
    assert_eq!(report.created[1].age, Some(18));

    let alice = report.found_by_id.expect("alice by id");
    assert_eq!(alice.id, report.created[0].id);
    assert_eq!(alice.email, "alice.smith@example.com");
    assert_eq!(
        report.found_by_email.as_ref().map(|u| u.first_name.as_str()),
        Some("Bob")
    );

    assert_eq!(names(&report.older_than_20), vec!["Alice", "Charlie"]);
    assert_eq!(report.older_than_20[0].age, Some(30));
    assert_eq!(report.older_than_20[1].age, Some(25));

    let renamed = report.renamed.expect("bob renamed");
    assert_eq!(renamed.last_name.as_deref(), Some("Williams"));
    assert!(renamed.updated_at > report.created[1].updated_at);

    assert_eq!(report.bulk_updated, 1);
    assert_eq!(report.bulk_updated_rows[0].first_name, "Alice");
    assert_eq!(report.bulk_updated_rows[0].age, Some(35));

    assert_eq!(
        report.deleted.as_ref().map(|u| u.first_name.as_str()),
        Some("Charlie")
    );
    assert_eq!(names(&report.remaining), vec!["Alice", "Bob"]);
    Ok(())
}

#[tokio::test]
async fn test_walk_through_reruns_on_the_same_file() -> Result<()> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig::new(dir.path().join("users.db").to_string_lossy());

    lifecycle::run(config.clone()).await?;
    // The destructive sync starts from an empty table each time.
    let report = lifecycle::run(config).await?;
    assert_eq!(report.all_users.len(), 3);
    assert_eq!(report.created[0].id, 1);
    Ok(())
}

#[tokio::test]
async fn test_connection_failure_stops_the_run() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::new(
        dir.path()
            .join("missing")
            .join("users.db")
            .to_string_lossy(),
    );
    let err = lifecycle::run(config).await.unwrap_err();
    assert!(lifecycle::is_connection_failure(&err));
}

#[tokio::test]
async fn test_production_refuses_destructive_sync() {
    init_logging();
    let config = DatabaseConfig {
        environment: record_lifecycle::Environment::Production,
        ..DatabaseConfig::in_memory()
    };
    let err = lifecycle::run(config).await.unwrap_err();
    assert!(matches!(err, DbError::DestructiveSyncRefused(_)));

    let confirmed = DatabaseConfig {
        environment: record_lifecycle::Environment::Production,
        allow_destructive_sync: true,
        ..DatabaseConfig::in_memory()
    };
    assert!(lifecycle::run(confirmed).await.is_ok());
}

#[tokio::test]
async fn test_authenticate_rejects_non_database_file() -> Result<()> {
    init_logging();
    let file = tempfile::NamedTempFile::new()?;
    std::fs::write(file.path(), vec![b'x'; 4096])?;

    let db = Database::new(DatabaseConfig::new(file.path().to_string_lossy()));
    db.open().await?;
    assert!(matches!(
        db.authenticate().await,
        Err(DbError::Connection(_))
    ));
    assert!(db.close().await);
    Ok(())
}

#[tokio::test]
async fn test_close_is_idempotent() -> Result<()> {
    let db = Database::new(DatabaseConfig::in_memory());
    assert!(!db.close().await);

    db.open().await?;
    db.authenticate().await?;
    assert!(db.is_open().await);
    assert!(db.close().await);
    assert!(!db.close().await);
    assert!(!db.is_open().await);
    Ok(())
}

#[tokio::test]
async fn test_with_connection_closes_after_error() {
    init_logging();
    let result: record_lifecycle::Result<()> =
        with_connection(DatabaseConfig::in_memory(), |db| {
            async move {
                db.execute(SqlQuery::new("SELECT * FROM no_such_table"))
                    .await
                    .map(|_| ())
            }
            .boxed()
        })
        .await;
    assert!(matches!(result, Err(DbError::Sqlite(_))));
}

#[tokio::test]
async fn test_with_connection_returns_closure_value() -> Result<()> {
    let rows = with_connection(DatabaseConfig::in_memory(), |db| {
        async move { db.query(SqlQuery::new("SELECT 1 AS one")).await }.boxed()
    })
    .await?;
    assert_eq!(rows[0].integer("one")?, 1);
    Ok(())
}
