use anyhow::Context;
use crosspost_core::{AppConfig, ErrorExt, MediaPost};
use database::Database;
use futures::stream::{self, Stream};
use media_fetcher::{Acquirer, HttpMediaSource};
use pipeline::{Pipeline, RateLimitConfig};
use publisher::HttpPublisher;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str =
    "crosspost=info,pipeline=info,media_fetcher=info,publisher=info,database=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting crosspost");

    let config = AppConfig::load()
        .map_err(|e| {
            e.log_error();
            e
        })
        .context("loading configuration")?;

    let source = HttpMediaSource::new(&config.acquire).context("building media client")?;
    let publisher = HttpPublisher::new(&config.publish).context("building upload client")?;
    let acquirer = Acquirer::new(source, &config.storage_root, &config.acquire);

    let db = Database::open(&config.store_path)
        .await
        .map_err(|e| {
            e.log_error();
            e
        })
        .context("opening dedup store")?;

    let pipeline = Pipeline::new(db, acquirer, publisher, RateLimitConfig::from(&config));

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received");
    };

    let result = pipeline.run_until(stdin_posts(), shutdown).await;
    pipeline.shutdown().await;

    let summary = result.context("run aborted")?;
    info!("Summary: {}", summary);
    Ok(())
}

/// One JSON object per line; malformed lines are skipped.
fn stdin_posts() -> impl Stream<Item = MediaPost> {
    let lines = BufReader::new(tokio::io::stdin()).lines();

    stream::unfold(lines, |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<MediaPost>(line) {
                        Ok(post) => return Some((post, lines)),
                        Err(e) => warn!("Skipping malformed input line: {}", e),
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    return None;
                }
            }
        }
    })
}
