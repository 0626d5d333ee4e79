#[cfg(test)]
mod tests {
    use crate::Database;
    use crosspost_core::{MediaPost, MediaType, ProcessingRecord, UploadStatus};
    use std::env;

    async fn setup_test_db() -> Database {
        let db_path = env::temp_dir().join(format!("test_crosspost_{}.db", uuid::Uuid::new_v4()));
        Database::open(&db_path)
            .await
            .expect("Failed to open test database")
    }

    fn sample_post(post_id: &str) -> MediaPost {
        MediaPost::new(
            "pics",
            post_id,
            "A picture",
            format!("https://www.reddit.com/r/pics/comments/{}/", post_id),
            MediaType::Image,
            "https://i.redd.it/img.png",
        )
    }

    #[tokio::test]
    async fn test_database_connection_and_migrations() {
        let db = setup_test_db().await;

        // Migrations are idempotent
        db.run_migrations().await.expect("Second migration run failed");
        assert_eq!(db.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_has_reports_any_status() {
        let db = setup_test_db().await;
        assert!(!db.has("abc123").await.unwrap());

        let failed = ProcessingRecord::for_post(
            &sample_post("abc123"),
            None,
            None,
            UploadStatus::Failed,
            Some("download failed".to_string()),
        );
        db.upsert(&failed).await.unwrap();

        assert!(db.has("abc123").await.unwrap());
        assert!(!db.has("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_single_row() {
        let db = setup_test_db().await;
        let post = sample_post("abc123");

        let failed = ProcessingRecord::for_post(
            &post,
            Some("media/reddit_1.png".to_string()),
            None,
            UploadStatus::Failed,
            Some("Destination rejected upload with status 500: oops".to_string()),
        );
        db.upsert(&failed).await.unwrap();

        let success = ProcessingRecord::for_post(
            &post,
            Some("media/reddit_1.png".to_string()),
            Some("987".to_string()),
            UploadStatus::Success,
            None,
        );
        db.upsert(&success).await.unwrap();

        assert_eq!(db.count().await.unwrap(), 1);
        let stored = db.get("abc123").await.unwrap().expect("row should exist");
        assert_eq!(stored.status, UploadStatus::Success);
        assert_eq!(stored.external_post_id.as_deref(), Some("987"));
        assert!(stored.error_message.is_none());
        assert_eq!(stored.reddit_url, post.permalink);
        assert_eq!(stored.post_type, MediaType::Image);
    }

    #[tokio::test]
    async fn test_failed_records_and_clear() {
        let db = setup_test_db().await;

        for (post_id, status) in [
            ("ok1", UploadStatus::Success),
            ("bad1", UploadStatus::Failed),
            ("bad2", UploadStatus::Failed),
        ] {
            let record = ProcessingRecord::for_post(&sample_post(post_id), None, None, status, None);
            db.upsert(&record).await.unwrap();
        }

        let failed = db.failed_records().await.unwrap();
        let ids: Vec<&str> = failed.iter().map(|r| r.post_id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"bad1"));
        assert!(ids.contains(&"bad2"));

        assert!(db.clear("bad1").await.unwrap());
        assert!(!db.clear("bad1").await.unwrap());
        assert!(!db.has("bad1").await.unwrap());
        assert_eq!(db.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let db_path = env::temp_dir().join(format!("test_crosspost_{}.db", uuid::Uuid::new_v4()));

        let db = Database::open(&db_path).await.unwrap();
        let record = ProcessingRecord::for_post(
            &sample_post("abc123"),
            None,
            Some("987".to_string()),
            UploadStatus::Success,
            None,
        );
        db.upsert(&record).await.unwrap();
        db.close().await;

        let reopened = Database::open(&db_path).await.unwrap();
        assert!(reopened.has("abc123").await.unwrap());
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_open_path_with_url_characters() {
        let dir = env::temp_dir().join(format!("crosspost #1?mode=ro_{}", uuid::Uuid::new_v4()));
        let db_path = dir.join("posted.db");

        let db = Database::open(&db_path).await.unwrap();
        let record = ProcessingRecord::for_post(
            &sample_post("abc123"),
            None,
            Some("987".to_string()),
            UploadStatus::Success,
            None,
        );
        db.upsert(&record).await.unwrap();
        db.close().await;

        // The file lands at exactly the requested path
        assert!(db_path.is_file());
        let reopened = Database::open(&db_path).await.unwrap();
        assert!(reopened.has("abc123").await.unwrap());
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_unconnected_database_errors() {
        let db = Database::new("sqlite::memory:".to_string());
        assert!(db.has("abc123").await.is_err());
    }

    #[tokio::test]
    async fn test_open_fails_for_unusable_path() {
        // Parent "directory" is a regular file
        let blocker = env::temp_dir().join(format!("crosspost_file_{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        assert!(Database::open(&blocker.join("posted.db")).await.is_err());
    }
}
