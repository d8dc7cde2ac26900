//! Persistence of finished runs.

use async_trait::async_trait;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

use crate::{
    errors::StoreError,
    models::{Run, RunInsert},
};

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persists a run and returns it with its assigned id.
    async fn save(&self, run: RunInsert) -> Result<Run, StoreError>;

    /// All runs, newest start time first.
    async fn list(&self) -> Result<Vec<Run>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Run>, StoreError>;
}

/// Row layout of the `runs` table; path and samples are JSON text.
#[derive(Debug, FromRow)]
struct RunRow {
    id: i64,
    start_time_ms: i64,
    end_time_ms: i64,
    distance_km: f64,
    duration_seconds: i64,
    pace_min_per_km: f64,
    avg_heart_rate: Option<f64>,
    path_json: String,
    heart_rate_samples_json: String,
}

impl TryFrom<RunRow> for Run {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Run {
            id: row.id,
            start_time_ms: row.start_time_ms,
            end_time_ms: row.end_time_ms,
            distance_km: row.distance_km,
            duration_seconds: u64::try_from(row.duration_seconds).unwrap_or(0),
            pace_min_per_km: row.pace_min_per_km,
            avg_heart_rate: row.avg_heart_rate,
            path: serde_json::from_str(&row.path_json)?,
            heart_rate_samples: serde_json::from_str(&row.heart_rate_samples_json)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `url` and applies migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// A private in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // Every connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn save(&self, run: RunInsert) -> Result<Run, StoreError> {
        let path_json = serde_json::to_string(&run.path)?;
        let samples_json = serde_json::to_string(&run.heart_rate_samples)?;
        let duration_seconds = i64::try_from(run.duration_seconds).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r#"
            INSERT INTO runs (start_time_ms, end_time_ms, distance_km, duration_seconds,
                              pace_min_per_km, avg_heart_rate, path_json, heart_rate_samples_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.start_time_ms)
        .bind(run.end_time_ms)
        .bind(run.distance_km)
        .bind(duration_seconds)
        .bind(run.pace_min_per_km)
        .bind(run.avg_heart_rate)
        .bind(path_json)
        .bind(samples_json)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!("Saved run {id}");
        Ok(Run::from_insert(id, run))
    }

    async fn list(&self) -> Result<Vec<Run>, StoreError> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, start_time_ms, end_time_ms, distance_km, duration_seconds,
                   pace_min_per_km, avg_heart_rate, path_json, heart_rate_samples_json
            FROM runs
            ORDER BY start_time_ms DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Run::try_from).collect()
    }

    async fn get(&self, id: i64) -> Result<Option<Run>, StoreError> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, start_time_ms, end_time_ms, distance_km, duration_seconds,
                   pace_min_per_km, avg_heart_rate, path_json, heart_rate_samples_json
            FROM runs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Run::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HeartRateSample, Position};

    fn insert(start_time_ms: i64) -> RunInsert {
        RunInsert {
            start_time_ms,
            end_time_ms: start_time_ms + 300_000,
            distance_km: 1.0,
            duration_seconds: 300,
            pace_min_per_km: 5.0,
            avg_heart_rate: Some(150.0),
            path: vec![
                Position::new(0.0, 0.0, start_time_ms),
                Position::new(0.0, 0.25, start_time_ms + 300_000),
            ],
            heart_rate_samples: vec![HeartRateSample::new(start_time_ms, 150)],
        }
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        let saved = store.save(insert(1_000)).await.unwrap();
        assert!(saved.id > 0);

        let loaded = store.get(saved.id).await.unwrap().expect("stored run");
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        assert!(store.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        store.save(insert(1_000)).await.unwrap();
        store.save(insert(3_000)).await.unwrap();
        store.save(insert(2_000)).await.unwrap();

        let starts: Vec<i64> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.start_time_ms)
            .collect();
        assert_eq!(starts, vec![3_000, 2_000, 1_000]);
    }

    #[tokio::test]
    async fn test_null_heart_rate_is_preserved() {
        let store = SqliteRunStore::in_memory().await.unwrap();
        let mut run = insert(1_000);
        run.avg_heart_rate = None;
        run.heart_rate_samples.clear();
        let saved = store.save(run).await.unwrap();
        let loaded = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.avg_heart_rate, None);
        assert!(loaded.heart_rate_samples.is_empty());
    }
}
