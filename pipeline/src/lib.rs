pub mod outcome;
pub mod rate_limiter;

pub use outcome::OutcomeRecorder;
pub use rate_limiter::{PauseStats, RateLimitConfig, RateLimiter};

use crosspost_core::{CoreError, ErrorExt, MediaPost};
use database::Database;
use futures::{Stream, StreamExt};
use media_fetcher::{Acquirer, MediaSource};
use publisher::Publisher;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::pin;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Duplicate,
    Unsupported,
    Invalid,
}

/// Terminal state of one `Pipeline::process` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    AcquireFailed {
        error: String,
    },
    PublishFailed {
        local_path: PathBuf,
        error: String,
    },
    Done {
        local_path: PathBuf,
        external_id: String,
    },
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Done { .. })
    }

    /// The post reached the network and is followed by a rate-limit wait.
    pub fn acquired(&self) -> bool {
        matches!(
            self,
            ProcessOutcome::Done { .. } | ProcessOutcome::PublishFailed { .. }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub seen: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub interrupted: bool,
}

impl RunSummary {
    pub fn tally(&mut self, outcome: &ProcessOutcome) {
        self.seen += 1;
        match outcome {
            ProcessOutcome::Done { .. } => self.succeeded += 1,
            ProcessOutcome::AcquireFailed { .. } | ProcessOutcome::PublishFailed { .. } => {
                self.failed += 1
            }
            ProcessOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seen, {} succeeded, {} failed, {} skipped",
            self.seen, self.succeeded, self.failed, self.skipped
        )?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        Ok(())
    }
}

/// Dedup, acquire, publish and record, one post at a time.
pub struct Pipeline<S, P> {
    acquirer: Acquirer<S>,
    publisher: P,
    recorder: OutcomeRecorder,
    limiter: RateLimiter,
}

impl<S: MediaSource, P: Publisher> Pipeline<S, P> {
    pub fn new(db: Database, acquirer: Acquirer<S>, publisher: P, limits: RateLimitConfig) -> Self {
        Self {
            acquirer,
            publisher,
            recorder: OutcomeRecorder::new(db),
            limiter: RateLimiter::new(limits),
        }
    }

    pub fn database(&self) -> &Database {
        self.recorder.database()
    }

    pub fn acquirer(&self) -> &Acquirer<S> {
        &self.acquirer
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Drive one post to a terminal state, then wait out the rate limit.
    /// Per-post failures are recorded and returned as outcomes; only store
    /// errors come back as `Err`.
    pub async fn process(&self, post: &MediaPost) -> Result<ProcessOutcome, CoreError> {
        let outcome = self.settle(post).await?;
        if outcome.acquired() {
            self.limiter.pause().await;
        }
        Ok(outcome)
    }

    /// Everything up to and including the outcome row. Runs to completion
    /// once started so that an upload is never left unrecorded.
    async fn settle(&self, post: &MediaPost) -> Result<ProcessOutcome, CoreError> {
        if post.post_id.trim().is_empty() {
            CoreError::InvalidInput {
                message: format!("post without id (url '{}')", post.url),
            }
            .log_warn();
            return Ok(ProcessOutcome::Skipped(SkipReason::Invalid));
        }

        if !post.media_type.is_supported() {
            info!(
                "Skipping: {}",
                CoreError::UnsupportedType {
                    post_id: post.post_id.clone(),
                    media_type: post.media_type.to_string(),
                }
            );
            return Ok(ProcessOutcome::Skipped(SkipReason::Unsupported));
        }

        if self.database().has(&post.post_id).await? {
            info!(
                "Skipping: {}",
                CoreError::DuplicatePost {
                    post_id: post.post_id.clone(),
                }
            );
            return Ok(ProcessOutcome::Skipped(SkipReason::Duplicate));
        }

        info!("Processing {} ({}) from r/{}", post.post_id, post.media_type, post.subreddit);

        let local_path = match self.acquirer.acquire(post).await {
            Ok(path) => path,
            Err(e) => {
                e.log_error();
                self.recorder.failure(post, None, &e).await?;
                return Ok(ProcessOutcome::AcquireFailed {
                    error: e.to_string(),
                });
            }
        };

        let outcome = match self.publisher.publish(&local_path, post).await {
            Ok(external_id) => {
                self.recorder
                    .success(post, &local_path, &external_id)
                    .await?;
                ProcessOutcome::Done {
                    local_path,
                    external_id,
                }
            }
            Err(e) => {
                e.log_error();
                self.recorder.failure(post, Some(&local_path), &e).await?;
                ProcessOutcome::PublishFailed {
                    local_path,
                    error: e.to_string(),
                }
            }
        };

        Ok(outcome)
    }

    pub async fn run<St>(&self, posts: St) -> Result<RunSummary, CoreError>
    where
        St: Stream<Item = MediaPost>,
    {
        self.run_until(posts, std::future::pending::<()>()).await
    }

    /// Process posts until the stream ends or `shutdown` resolves.
    /// Shutdown is honoured between posts and during the rate-limit wait,
    /// never while a post is being acquired, published or recorded.
    pub async fn run_until<St, F>(&self, posts: St, shutdown: F) -> Result<RunSummary, CoreError>
    where
        St: Stream<Item = MediaPost>,
        F: Future<Output = ()>,
    {
        let mut posts = pin!(posts);
        let mut shutdown = pin!(shutdown);
        let mut summary = RunSummary::default();

        loop {
            let step = tokio::select! {
                biased;
                _ = &mut shutdown => None,
                next = posts.next() => match next {
                    Some(post) => Some(post),
                    None => break,
                },
            };

            let Some(post) = step else {
                warn!("Shutdown requested, stopping intake");
                summary.interrupted = true;
                break;
            };

            let outcome = match self.settle(&post).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => {
                    e.log_error();
                    error!("Run aborted after {}", summary);
                    return Err(e);
                }
                Err(e) => {
                    e.log_warn();
                    summary.seen += 1;
                    summary.failed += 1;
                    continue;
                }
            };
            summary.tally(&outcome);

            if outcome.acquired() {
                // The row is already durable; cutting the wait short loses nothing
                let interrupted = tokio::select! {
                    biased;
                    _ = &mut shutdown => true,
                    _ = self.limiter.pause() => false,
                };
                if interrupted {
                    warn!("Shutdown requested during rate-limit wait");
                    summary.interrupted = true;
                    break;
                }
            }
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }

    /// Release the store. Call once the run is over, however it ended.
    pub async fn shutdown(&self) {
        self.database().close().await;
    }
}
