//! Per-source programme database (§3, §4.E). Single-writer, multi-reader —
//! one SQLite file per `source_id`, opened the same way the catalog
//! database is opened, but migrated with [`super::programme::ProgrammeMigrator`]
//! instead of the main schema.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database as SeaOrmDatabase, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use super::programme::{self, ProgrammeMigrator};
use super::xmltv::ParsedProgramme;
use crate::config::defaults::DEFAULT_EPG_PROGRAMME_BATCH_SIZE;
use crate::errors::EpgError;

#[derive(Clone)]
pub struct ProgrammeStore {
    connection: Arc<DatabaseConnection>,
}

impl ProgrammeStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, EpgError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EpgError::FetchFailed {
                source_id: path.display().to_string(),
                message: format!("creating programme db directory: {e}"),
            })?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let connection = SeaOrmDatabase::connect(url).await?;
        ProgrammeMigrator::up(&connection, None).await?;
        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    /// Inserts `programmes` in batches of [`DEFAULT_EPG_PROGRAMME_BATCH_SIZE`]
    /// rows per transaction (§4.E step 2). Returns the number committed.
    pub async fn insert_batched(&self, programmes: &[ParsedProgramme]) -> Result<usize, EpgError> {
        let mut committed = 0;
        for chunk in programmes.chunks(DEFAULT_EPG_PROGRAMME_BATCH_SIZE) {
            let txn = self.connection.begin().await?;
            for p in chunk {
                let active = programme::ActiveModel {
                    id: sea_orm::NotSet,
                    channel_id: Set(p.channel_id.clone()),
                    start_ts: Set(p.start),
                    stop_ts: Set(p.stop),
                    title: Set(p.title.clone()),
                    sub_title: Set(p.sub_title.clone()),
                    description: Set(p.description.clone()),
                    categories: Set(serde_json::to_string(&p.categories).unwrap_or_else(|_| "[]".into())),
                    episode_num: Set(p.episode_num.clone()),
                    rating: Set(p.rating.clone()),
                    programme_icon: Set(p.icon.clone()),
                    extra_json: Set(None),
                };
                active.insert(&txn).await?;
            }
            txn.commit().await?;
            committed += chunk.len();
        }
        Ok(committed)
    }

    /// Deletes programmes whose `stop_ts` is older than `now - retention`,
    /// run in the same refresh per §4.E step 2.
    pub async fn delete_expired(&self, retention_days: i64, now: DateTime<Utc>) -> Result<u64, EpgError> {
        let cutoff = now - chrono::Duration::days(retention_days);
        let result = self
            .connection
            .execute(Statement::from_sql_and_values(
                self.connection.get_database_backend(),
                "DELETE FROM programmes WHERE stop_ts < $1",
                [cutoff.into()],
            ))
            .await?;
        Ok(result.rows_affected())
    }

    /// All programmes for `channel_id`, ordered by start time, for merged
    /// XMLTV emission.
    pub async fn programmes_for_channel(&self, channel_id: &str) -> Result<Vec<programme::Model>, EpgError> {
        Ok(programme::Entity::find()
            .filter(programme::Column::ChannelId.eq(channel_id.to_string()))
            .order_by_asc(programme::Column::StartTs)
            .all(self.connection.as_ref())
            .await?)
    }

    pub async fn clear_all(&self) -> Result<(), EpgError> {
        programme::Entity::delete_many().exec(self.connection.as_ref()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(channel_id: &str, title: &str) -> ParsedProgramme {
        let now = Utc::now();
        ParsedProgramme {
            channel_id: channel_id.to_string(),
            start: now,
            stop: now + chrono::Duration::hours(1),
            title: title.to_string(),
            sub_title: None,
            description: None,
            categories: vec!["News".to_string()],
            episode_num: None,
            rating: None,
            icon: None,
        }
    }

    #[tokio::test]
    async fn inserts_and_queries_programmes() {
        let dir = tempdir().unwrap();
        let store = ProgrammeStore::open(dir.path().join("src1.db")).await.unwrap();
        let inserted = store
            .insert_batched(&[sample("X", "Morning Show"), sample("X", "Evening News")])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let rows = store.programmes_for_channel("X").await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn deletes_rows_past_retention() {
        let dir = tempdir().unwrap();
        let store = ProgrammeStore::open(dir.path().join("src1.db")).await.unwrap();
        let mut old = sample("X", "Old Show");
        old.stop = Utc::now() - chrono::Duration::days(10);
        store.insert_batched(&[old]).await.unwrap();

        let deleted = store.delete_expired(1, Utc::now()).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.programmes_for_channel("X").await.unwrap().is_empty());
    }
}
