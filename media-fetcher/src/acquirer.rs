use crate::extension::resolve_extension;
use crate::http::{ByteStream, FetchRequest, MediaSource};
use crate::retry::{RetryConfig, RetryExecutor, RetryMetrics};
use crosspost_core::{AcquireConfig, AcquisitionError, MediaPost};
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// Write buffer size for streamed downloads.
pub const CHUNK_SIZE: usize = 64 * 1024;

const REDDIT_ORIGIN: &str = "https://www.reddit.com";

/// Resolves a local file for a post's media.
#[derive(Debug)]
pub struct Acquirer<S> {
    source: S,
    storage_root: PathBuf,
    min_file_size: u64,
    retry: RetryExecutor,
}

impl<S: MediaSource> Acquirer<S> {
    pub fn new(source: S, storage_root: impl Into<PathBuf>, config: &AcquireConfig) -> Self {
        Self {
            source,
            storage_root: storage_root.into(),
            min_file_size: config.min_file_size,
            retry: RetryExecutor::new(RetryConfig::from(config)),
        }
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = RetryExecutor::new(config);
        self
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn retry_metrics(&self) -> RetryMetrics {
        self.retry.get_metrics()
    }

    /// Local path for the post's media: the pre-fetched file when it exists,
    /// otherwise a fresh download.
    pub async fn acquire(&self, post: &MediaPost) -> Result<PathBuf, AcquisitionError> {
        if let Some(path) = self.prefetched_file(post).await {
            info!("Using pre-fetched file {} for {}", path.display(), post.post_id);
            return Ok(path);
        }

        if post.url.trim().is_empty() {
            return Err(AcquisitionError::MissingUrl {
                post_id: post.post_id.clone(),
            });
        }

        self.retry
            .execute(&format!("download {}", post.post_id), || self.download(post))
            .await
    }

    async fn prefetched_file(&self, post: &MediaPost) -> Option<PathBuf> {
        let reference = post.prefetched_path.as_ref()?;
        let path = if reference.is_absolute() {
            reference.clone()
        } else {
            self.storage_root.join(reference)
        };

        match fs::try_exists(&path).await {
            Ok(true) => Some(path),
            _ => {
                debug!(
                    "Pre-fetched file {} for {} is missing, downloading directly",
                    path.display(),
                    post.post_id
                );
                None
            }
        }
    }

    async fn download(&self, post: &MediaPost) -> Result<PathBuf, AcquisitionError> {
        let referer = referer_for(&post.permalink);
        let media = self
            .source
            .fetch(FetchRequest {
                url: &post.url,
                referer: &referer,
            })
            .await?;

        let extension = resolve_extension(media.content_type.as_deref(), &post.url, post.media_type);
        fs::create_dir_all(&self.storage_root).await?;
        let (path, file) = create_unique_file(&self.storage_root, &extension).await?;

        match write_body(file, media.body).await {
            Ok(written) if written >= self.min_file_size => {
                info!(
                    "Downloaded {} bytes for {} to {}",
                    written,
                    post.post_id,
                    path.display()
                );
                Ok(path)
            }
            Ok(written) => {
                discard(&path).await;
                Err(AcquisitionError::TooSmall {
                    bytes: written,
                    min_bytes: self.min_file_size,
                })
            }
            Err(error) => {
                discard(&path).await;
                Err(error)
            }
        }
    }
}

/// Reddit permalinks are sometimes site-relative.
fn referer_for(permalink: &str) -> String {
    if permalink.starts_with('/') {
        format!("{}{}", REDDIT_ORIGIN, permalink)
    } else {
        permalink.to_string()
    }
}

async fn create_unique_file(
    root: &Path,
    extension: &str,
) -> Result<(PathBuf, File), AcquisitionError> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();

    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("reddit_{}{}", stamp, extension)
        } else {
            format!("reddit_{}_{}{}", stamp, suffix, extension)
        };
        let path = root.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

async fn write_body(file: File, mut body: ByteStream) -> Result<u64, AcquisitionError> {
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    writer.flush().await?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!("Could not remove rejected download {}: {}", path.display(), e);
    }
}
