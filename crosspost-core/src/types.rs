use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Kind of media a discovered post points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    External,
    Preview,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::External => "external",
            MediaType::Preview => "preview",
        }
    }

    /// Only directly hosted images and videos go through the pipeline.
    pub fn is_supported(&self) -> bool {
        matches!(self, MediaType::Image | MediaType::Video)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "external" => Ok(MediaType::External),
            "preview" => Ok(MediaType::Preview),
            _ => Err(format!("Unknown media type: {}", s)),
        }
    }
}

/// A discovered post handed to the pipeline by the discovery side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPost {
    pub subreddit: String,
    pub post_id: String,
    pub title: String,
    pub permalink: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default)]
    pub author: Option<String>,
    /// File already fetched by the discovery side. Relative paths are
    /// resolved against the storage root.
    #[serde(default, alias = "downloaded_path")]
    pub prefetched_path: Option<PathBuf>,
}

impl MediaPost {
    pub fn new(
        subreddit: impl Into<String>,
        post_id: impl Into<String>,
        title: impl Into<String>,
        permalink: impl Into<String>,
        media_type: MediaType,
        url: impl Into<String>,
    ) -> Self {
        Self {
            subreddit: subreddit.into(),
            post_id: post_id.into(),
            title: title.into(),
            permalink: permalink.into(),
            media_type,
            url: url.into(),
            author: None,
            prefetched_path: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_prefetched_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.prefetched_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Success,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Success => "success",
            UploadStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(UploadStatus::Success),
            "failed" => Ok(UploadStatus::Failed),
            _ => Err(format!("Unknown upload status: {}", s)),
        }
    }
}

/// Terminal outcome of one post, one row per `post_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub post_id: String,
    pub reddit_url: String,
    pub title: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub post_type: MediaType,
    pub media_url: String,
    pub local_path: Option<String>,
    pub external_post_id: Option<String>,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub posted_at: DateTime<Utc>,
}

impl ProcessingRecord {
    pub fn for_post(
        post: &MediaPost,
        local_path: Option<String>,
        external_post_id: Option<String>,
        status: UploadStatus,
        error_message: Option<String>,
    ) -> Self {
        Self {
            post_id: post.post_id.clone(),
            reddit_url: post.permalink.clone(),
            title: post.title.clone(),
            subreddit: post.subreddit.clone(),
            author: post.author.clone(),
            post_type: post.media_type,
            media_url: post.url.clone(),
            local_path,
            external_post_id,
            status,
            error_message,
            posted_at: Utc::now(),
        }
    }
}
