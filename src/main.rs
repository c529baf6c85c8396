//! record-lifecycle: connect, recreate the `users` table, walk through
//! create/read/update/delete and close.
//!
//! # Usage
//!
//! ```bash
//! # defaults, or record_lifecycle.toml when present
//! record-lifecycle
//!
//! # another database file, SQL logged
//! RUST_LOG=sql=debug record-lifecycle --database /tmp/users.db
//! ```

use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use record_lifecycle::config::{DatabaseConfig, Environment};
use record_lifecycle::lifecycle;

#[derive(Debug, Parser)]
#[command(name = "record-lifecycle", version, about)]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist
    #[arg(short, long, default_value = "record_lifecycle.toml")]
    config: PathBuf,

    /// Database name (sqlite file path, or :memory:)
    #[arg(short, long, env = "RECORD_LIFECYCLE_DATABASE")]
    database: Option<String>,

    /// Treat the store as production; destructive syncs then need confirmation
    #[arg(long)]
    production: bool,

    /// Confirm that dropping and recreating tables is intended
    #[arg(long)]
    allow_destructive_sync: bool,

    /// Log at debug level, including generated SQL
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = DatabaseConfig::load(&cli.config)?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    if cli.production {
        config.environment = Environment::Production;
    }
    if cli.allow_destructive_sync {
        config.allow_destructive_sync = true;
    }
    if cli.verbose {
        config.logging = true;
    }
    info!("using {}", config.describe());

    // Failures are logged by the run itself; the process still exits cleanly.
    if let Err(e) = lifecycle::run(config).await {
        if lifecycle::is_connection_failure(&e) {
            error!("check the database settings in {}", cli.config.display());
        }
    }
    info!("database connection closed");
    Ok(())
}
