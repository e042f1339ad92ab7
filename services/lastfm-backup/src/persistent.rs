//!
//! src/persistent.rs  Andrew Belles  Oct 18th, 2026
//!
//! Defines module for persisting scrobbles. Each (user, type) partition
//! lives in its own sqlite table keyed by timestamp.
//!

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, sqlite::SqliteConnectOptions, Pool, Row, Sqlite};
use tracing::{debug, info};

use crate::errors::BackupError;
use crate::types::{Partition, Scrobble};

/// What the sync engine, exporter and stats reporter need from storage
#[async_trait]
pub trait ScrobbleStore: Send + Sync {
    /// Create the partition table if missing, dropping it first if asked
    async fn prepare(&self, partition: &Partition, drop: bool) -> Result<(), BackupError>;

    /// Whether the partition table was ever created
    async fn exists(&self, partition: &Partition) -> Result<bool, BackupError>;

    /// Newest stored timestamp, None for an empty partition
    async fn max_timestamp(&self, partition: &Partition) -> Result<Option<i64>, BackupError>;

    /// Insert unless the timestamp is already present. True if a row was written.
    async fn insert_if_absent(&self, partition: &Partition, scrobble: &Scrobble) ->
        Result<bool, BackupError>;

    /// Every row, newest first
    async fn scan_desc(&self, partition: &Partition) -> Result<Vec<Scrobble>, BackupError>;

    async fn count(&self, partition: &Partition) -> Result<i64, BackupError>;
}

/// Read paths (export, stats) refuse partitions that were never synced
/// rather than creating an empty table for a mistyped user
pub async fn require_synced(store: &dyn ScrobbleStore, partition: &Partition) ->
    Result<(), BackupError> {
    if store.exists(partition).await? {
        Ok(())
    } else {
        Err(BackupError::InvalidInput(format!(
            "nothing stored for {partition}, run a sync first"
        )))
    }
}

pub struct Persistent {
    pool: Pool<Sqlite>
}

impl Persistent {

    pub async fn init(database_url: &str) -> Result<Self, BackupError> {
        let is_memory = database_url == "sqlite::memory:";

        let mut opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true);

        // WAL is file-only; don't set it for in-memory
        if !is_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                       .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        }

        // one writer, one partition at a time
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .connect_with(opts)
            .await?;

        debug!(db = database_url, "db.open");
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_scrobble(r: &sqlx::sqlite::SqliteRow, partition: &Partition) ->
    Result<Scrobble, BackupError> {
    // optional columns may hold NULL in databases written by older tools
    let text = |col: &str| -> Result<String, BackupError> {
        Ok(r.try_get::<Option<String>, _>(col)?.unwrap_or_default())
    };

    Ok(Scrobble {
        timestamp: r.try_get("timestamp")?,
        artist: r.try_get("artist")?,
        artist_mbid: text("artist_mbid")?,
        track: r.try_get("track")?,
        track_mbid: text("track_mbid")?,
        album: text("album")?,
        album_mbid: text("album_mbid")?,
        kind: partition.kind
    })
}

#[async_trait]
impl ScrobbleStore for Persistent {
    async fn prepare(&self, partition: &Partition, drop: bool) -> Result<(), BackupError> {
        let table = partition.table();
        if drop {
            sqlx::query(&format!("DROP TABLE IF EXISTS {table};"))
                .execute(&self.pool)
                .await?;
            info!(partition = %partition, "db.drop");
        }

        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS {table} (
              timestamp    INTEGER PRIMARY KEY,
              artist       TEXT NOT NULL,
              artist_mbid  TEXT,
              track        TEXT NOT NULL,
              track_mbid   TEXT,
              album        TEXT,
              album_mbid   TEXT
            );
            "
        )).execute(&self.pool).await?;

        Ok(())
    }

    async fn exists(&self, partition: &Partition) -> Result<bool, BackupError> {
        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1;"
        )
        .bind(partition.table_name())
        .fetch_one(&self.pool)
        .await?;
        Ok(found > 0)
    }

    async fn max_timestamp(&self, partition: &Partition) -> Result<Option<i64>, BackupError> {
        let ts: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT MAX(timestamp) FROM {};", partition.table()
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(ts)
    }

    async fn insert_if_absent(&self, partition: &Partition, scrobble: &Scrobble) ->
        Result<bool, BackupError> {
        let written = sqlx::query(&format!(
            r"
            INSERT OR IGNORE INTO {} (
                timestamp, artist, artist_mbid, track, track_mbid, album, album_mbid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);
            ",
            partition.table()
        ))
        .bind(scrobble.timestamp)
        .bind(&scrobble.artist)
        .bind(&scrobble.artist_mbid)
        .bind(&scrobble.track)
        .bind(&scrobble.track_mbid)
        .bind(&scrobble.album)
        .bind(&scrobble.album_mbid)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(written == 1)
    }

    async fn scan_desc(&self, partition: &Partition) -> Result<Vec<Scrobble>, BackupError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT timestamp, artist, artist_mbid, track, track_mbid, album, album_mbid
              FROM {}
            ORDER BY timestamp DESC;
            ",
            partition.table()
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|r| row_to_scrobble(r, partition)).collect()
    }

    async fn count(&self, partition: &Partition) -> Result<i64, BackupError> {
        let count = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {};", partition.table()
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
