use crosspost_core::{CoreError, MediaPost, ProcessingRecord, UploadStatus};
use database::Database;
use std::path::Path;
use tracing::{debug, info};

/// Writes exactly one row per terminal outcome of a post.
#[derive(Debug, Clone)]
pub struct OutcomeRecorder {
    db: Database,
}

impl OutcomeRecorder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn record(
        &self,
        post: &MediaPost,
        local_path: Option<&Path>,
        external_id: Option<&str>,
        status: UploadStatus,
        error: Option<String>,
    ) -> Result<ProcessingRecord, CoreError> {
        let record = ProcessingRecord::for_post(
            post,
            local_path.map(|path| path.display().to_string()),
            external_id.map(str::to_string),
            status,
            error,
        );

        self.db.upsert(&record).await?;

        match status {
            UploadStatus::Success => info!(
                "Recorded {} as {} (external id {})",
                post.post_id,
                status,
                external_id.unwrap_or("-")
            ),
            UploadStatus::Failed => debug!(
                "Recorded {} as {}: {}",
                post.post_id,
                status,
                record.error_message.as_deref().unwrap_or("")
            ),
        }

        Ok(record)
    }

    pub async fn success(
        &self,
        post: &MediaPost,
        local_path: &Path,
        external_id: &str,
    ) -> Result<ProcessingRecord, CoreError> {
        self.record(
            post,
            Some(local_path),
            Some(external_id),
            UploadStatus::Success,
            None,
        )
        .await
    }

    pub async fn failure(
        &self,
        post: &MediaPost,
        local_path: Option<&Path>,
        error: impl ToString,
    ) -> Result<ProcessingRecord, CoreError> {
        self.record(
            post,
            local_path,
            None,
            UploadStatus::Failed,
            Some(error.to_string()),
        )
        .await
    }
}
