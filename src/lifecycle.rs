//! The fixed connect / sync / create / read / update / delete / close walk
//! through over the `users` table.

use futures::FutureExt;
use log::{error, info};

use crate::config::DatabaseConfig;
use crate::error::{DbError, Result};
use crate::query::{FindOptions, OrderBy, Query};
use crate::repository::Repository;
use crate::schema::Model;
use crate::sqlite::{with_connection, Database};
use crate::sync::{SchemaSynchronizer, SyncMode, SyncPolicy};
use crate::user::{columns, NewUser, User, UserChanges};

/// What the walk through observed, step by step.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleReport {
    pub created: Vec<User>,
    pub all_users: Vec<User>,
    pub found_by_id: Option<User>,
    pub found_by_email: Option<User>,
    pub older_than_20: Vec<User>,
    pub renamed: Option<User>,
    pub bulk_updated: usize,
    pub bulk_updated_rows: Vec<User>,
    pub deleted: Option<User>,
    pub remaining: Vec<User>,
}

/// The sample records inserted by the walk through.
pub fn sample_users() -> Vec<NewUser> {
    vec![
        NewUser::new("Alice", "alice.smith@example.com")
            .last_name("Smith")
            .age(30),
        NewUser::new("Bob", "bob.johnson@example.com").last_name("Johnson"),
        NewUser::new("Charlie", "charlie.brown@example.com")
            .last_name("Brown")
            .age(25),
    ]
}

/// Runs the whole sequence. Any failure stops the remaining steps and is
/// logged once; the session is closed exactly once on every path.
pub async fn run(config: DatabaseConfig) -> Result<LifecycleReport> {
    let result = with_connection(config, |db| steps(db).boxed()).await;
    match &result {
        Ok(_) => info!("record lifecycle finished"),
        Err(e) => error!("record lifecycle failed: {}", e),
    }
    result
}

async fn steps(db: &Database) -> Result<LifecycleReport> {
    info!("connection established");

    SchemaSynchronizer::new(db, SyncPolicy::from(db.config()))
        .sync(&User::table(), SyncMode::Destructive)
        .await?;
    info!("table `{}` synchronized (recreated if it existed)", User::table().name);

    let users: Repository<'_, User, Database> = Repository::new(db);

    info!("--- creating users ---");
    let mut created = Vec::new();
    for draft in sample_users() {
        let user = users.insert(draft).await?;
        info!("created user: {}", user.to_json());
        created.push(user);
    }

    info!("--- reading users ---");
    let all_users = users.find_all(FindOptions::new()).await?;
    info!("all users:");
    log_list(&all_users);

    let alice_id = created.first().map(|u| u.id).unwrap_or_default();
    let found_by_id = users.find_by_id(alice_id).await?;
    match &found_by_id {
        Some(user) => info!("found by id {}: {}", alice_id, user.to_json()),
        None => info!("user with id {} not found", alice_id),
    }

    let found_by_email = users
        .find_one(Query::new().eq(columns::EMAIL, "bob.johnson@example.com"))
        .await?;
    match &found_by_email {
        Some(user) => info!("found by email: {}", user.to_json()),
        None => info!("user Bob not found"),
    }

    let older_than_20 = users
        .find_all(
            FindOptions::new()
                .filter(Query::new().gt(columns::AGE, 20))
                .order(OrderBy::asc(columns::FIRST_NAME)),
        )
        .await?;
    info!("users older than 20:");
    for user in &older_than_20 {
        info!("- {} (age: {})", user.first_name, display_age(user));
    }

    info!("--- updating users ---");
    let renamed = match found_by_email {
        Some(ref bob) => {
            let mut bob = bob.clone();
            users
                .update_one(&mut bob, UserChanges::new().last_name(Some("Williams")))
                .await?;
            info!("updated Bob: {}", bob.to_json());
            Some(bob)
        }
        None => None,
    };

    let (bulk_updated, bulk_updated_rows) = users
        .update_many(
            Query::new().eq(columns::LAST_NAME, "Smith"),
            UserChanges::new().age(Some(35)),
        )
        .await?;
    info!("updated {} user(s) with last name Smith", bulk_updated);
    if let Some(first) = bulk_updated_rows.first() {
        info!("first updated row: {}", first.to_json());
    }

    info!("--- deleting users ---");
    let charlie = users
        .find_one(Query::new().eq(columns::EMAIL, "charlie.brown@example.com"))
        .await?;
    let deleted = match charlie {
        Some(charlie) => {
            users.delete_one(&charlie).await?;
            info!("deleted Charlie");
            Some(charlie)
        }
        None => {
            info!("Charlie not found for deletion");
            None
        }
    };

    let remaining = users.find_all(FindOptions::new()).await?;
    info!("remaining users after deletion:");
    log_list(&remaining);

    Ok(LifecycleReport {
        created,
        all_users,
        found_by_id,
        found_by_email,
        older_than_20,
        renamed,
        bulk_updated,
        bulk_updated_rows,
        deleted,
        remaining,
    })
}

fn log_list(users: &[User]) {
    for user in users {
        info!("- {}", user);
    }
}

fn display_age(user: &User) -> String {
    user.age.map_or_else(|| "unknown".to_string(), |age| age.to_string())
}

/// Whether `err` came from the connection step rather than a later one.
pub fn is_connection_failure(err: &DbError) -> bool {
    matches!(err, DbError::Connection(_))
}
