//! Database connection management for the main catalog store.
//!
//! SQLite is the only backend the on-disk layout in the external-interfaces
//! contract names (`DATA_DIR/channels.db`), so unlike the teacher's
//! multi-backend `DatabaseType` selector this is SQLite-only — simplified
//! in the same spirit as the teacher's `apply_sqlite_optimizations` path.

pub mod migrations;
pub mod repositories;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sea_orm::{ConnectOptions, Database as SeaOrmDatabase, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Database {
    pub connection: Arc<DatabaseConnection>,
}

impl Database {
    /// Open (creating if necessary) the SQLite database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
        }

        let url = format!("sqlite://{}?mode=rwc", path.display());
        info!("opening catalog database at {}", path.display());

        let mut options = ConnectOptions::new(url);
        options
            .max_connections(10)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(5))
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600));

        let connection = SeaOrmDatabase::connect(options)
            .await
            .with_context(|| format!("connecting to catalog database at {}", path.display()))?;

        debug!("catalog database connection established");
        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    pub async fn migrate(&self) -> Result<()> {
        migrations::Migrator::up(self.connection.as_ref(), None).await?;
        Ok(())
    }

    pub fn pool(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }
}
