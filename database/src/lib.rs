use chrono::{DateTime, Utc};
use crosspost_core::{CoreError, DatabaseError, MediaType, ProcessingRecord, UploadStatus};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

mod tests;

const CREATE_POSTED_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS posted (
        post_id TEXT PRIMARY KEY,
        reddit_url TEXT NOT NULL,
        title TEXT NOT NULL,
        subreddit TEXT NOT NULL,
        author TEXT,
        post_type TEXT NOT NULL,
        media_url TEXT NOT NULL,
        local_path TEXT,
        external_post_id TEXT,
        status TEXT NOT NULL,
        error_message TEXT,
        posted_at TIMESTAMP NOT NULL
    )
"#;

const UPSERT_POSTED: &str = r#"
    INSERT INTO posted (
        post_id, reddit_url, title, subreddit, author, post_type, media_url,
        local_path, external_post_id, status, error_message, posted_at
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(post_id) DO UPDATE SET
        reddit_url = excluded.reddit_url,
        title = excluded.title,
        subreddit = excluded.subreddit,
        author = excluded.author,
        post_type = excluded.post_type,
        media_url = excluded.media_url,
        local_path = excluded.local_path,
        external_post_id = excluded.external_post_id,
        status = excluded.status,
        error_message = excluded.error_message,
        posted_at = excluded.posted_at
"#;

const SELECT_COLUMNS: &str = "post_id, reddit_url, title, subreddit, author, post_type, \
     media_url, local_path, external_post_id, status, error_message, posted_at";

/// Durable dedup table: one row per post that reached a terminal outcome.
#[derive(Debug, Clone)]
pub struct Database {
    connection_string: String,
    filename: Option<PathBuf>,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            filename: None,
            pool: None,
        }
    }

    /// Open (creating if needed) the store file at `path` and make sure the
    /// schema exists.
    pub async fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DatabaseError::ConnectionFailed {
                    reason: format!("creating {}: {}", parent.display(), e),
                }
            })?;
        }

        let mut db = Self {
            connection_string: path.display().to_string(),
            filename: Some(path.to_path_buf()),
            pool: None,
        };
        db.connect().await?;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        // A plain file path never goes through URL parsing
        let options = match &self.filename {
            Some(path) => SqliteConnectOptions::new().filename(path),
            None => SqliteConnectOptions::from_str(&self.connection_string).map_err(|e| {
                DatabaseError::ConnectionFailed {
                    reason: format!("{}: {}", self.connection_string, e),
                }
            })?,
        }
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: format!("{}: {}", self.connection_string, e),
            })?;

        info!("Connected to dedup store at {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::query(CREATE_POSTED_TABLE)
            .execute(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: format!("create posted table: {}", e),
            })?;
        debug!("Dedup schema is up to date");
        Ok(())
    }

    /// True when the post already has a row, whatever its status.
    pub async fn has(&self, post_id: &str) -> Result<bool, CoreError> {
        let row = sqlx::query("SELECT 1 FROM posted WHERE post_id = ?")
            .bind(post_id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(row.is_some())
    }

    /// Insert or overwrite the row for `record.post_id` in one statement.
    pub async fn upsert(&self, record: &ProcessingRecord) -> Result<(), CoreError> {
        sqlx::query(UPSERT_POSTED)
            .bind(&record.post_id)
            .bind(&record.reddit_url)
            .bind(&record.title)
            .bind(&record.subreddit)
            .bind(&record.author)
            .bind(record.post_type.as_str())
            .bind(&record.media_url)
            .bind(&record.local_path)
            .bind(&record.external_post_id)
            .bind(record.status.as_str())
            .bind(&record.error_message)
            .bind(record.posted_at)
            .execute(self.pool()?)
            .await
            .map_err(sql_error)?;

        debug!(
            "Recorded post {} with status {}",
            record.post_id, record.status
        );
        Ok(())
    }

    pub async fn get(&self, post_id: &str) -> Result<Option<ProcessingRecord>, CoreError> {
        let query = format!("SELECT {} FROM posted WHERE post_id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(post_id)
            .fetch_optional(self.pool()?)
            .await
            .map_err(sql_error)?;

        row.map(|r| record_from_row(&r)).transpose()
    }

    pub async fn count(&self) -> Result<i64, CoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posted")
            .fetch_one(self.pool()?)
            .await
            .map_err(sql_error)?;
        Ok(count)
    }

    pub async fn failed_records(&self) -> Result<Vec<ProcessingRecord>, CoreError> {
        let query = format!(
            "SELECT {} FROM posted WHERE status = ? ORDER BY posted_at",
            SELECT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(UploadStatus::Failed.as_str())
            .fetch_all(self.pool()?)
            .await
            .map_err(sql_error)?;

        rows.iter().map(record_from_row).collect()
    }

    /// Forget a post so the next run processes it again. Returns whether a
    /// row existed.
    pub async fn clear(&self, post_id: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM posted WHERE post_id = ?")
            .bind(post_id)
            .execute(self.pool()?)
            .await
            .map_err(sql_error)?;

        let cleared = result.rows_affected() > 0;
        if cleared {
            info!("Cleared dedup row for {}", post_id);
        }
        Ok(cleared)
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            info!("Closed dedup store");
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database not connected".to_string(),
            }
            .into()
        })
    }
}

fn sql_error(error: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_error) = &error {
        // SQLITE_BUSY
        if db_error.code().as_deref() == Some("5") {
            return DatabaseError::DatabaseLocked.into();
        }
    }
    DatabaseError::Sql(error).into()
}

fn record_from_row(row: &SqliteRow) -> Result<ProcessingRecord, CoreError> {
    let post_id: String = row.try_get("post_id").map_err(sql_error)?;

    let post_type: String = row.try_get("post_type").map_err(sql_error)?;
    let post_type = MediaType::from_str(&post_type).map_err(|details| {
        DatabaseError::CorruptRow {
            post_id: post_id.clone(),
            details,
        }
    })?;

    let status: String = row.try_get("status").map_err(sql_error)?;
    let status = UploadStatus::from_str(&status).map_err(|details| DatabaseError::CorruptRow {
        post_id: post_id.clone(),
        details,
    })?;

    let posted_at: DateTime<Utc> = row.try_get("posted_at").map_err(sql_error)?;

    Ok(ProcessingRecord {
        reddit_url: row.try_get("reddit_url").map_err(sql_error)?,
        title: row.try_get("title").map_err(sql_error)?,
        subreddit: row.try_get("subreddit").map_err(sql_error)?,
        author: row.try_get("author").map_err(sql_error)?,
        post_type,
        media_url: row.try_get("media_url").map_err(sql_error)?,
        local_path: row.try_get("local_path").map_err(sql_error)?,
        external_post_id: row.try_get("external_post_id").map_err(sql_error)?,
        status,
        error_message: row.try_get("error_message").map_err(sql_error)?,
        posted_at,
        post_id,
    })
}
