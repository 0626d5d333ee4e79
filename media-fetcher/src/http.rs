use crosspost_core::{AcquireConfig, AcquisitionError};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT,
};
use reqwest::{redirect, Client};
use std::future::Future;
use tracing::debug;

const MAX_REDIRECTS: usize = 10;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>, AcquisitionError>>;

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub referer: &'a str,
}

/// An open media response: its declared type and a body still to be read.
pub struct FetchedMedia {
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl FetchedMedia {
    pub fn from_bytes(content_type: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            body: stream::iter(vec![Ok(bytes)]).boxed(),
        }
    }
}

impl std::fmt::Debug for FetchedMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedMedia")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

/// Anything that can open a media URL for streaming.
pub trait MediaSource {
    fn fetch(
        &self,
        request: FetchRequest<'_>,
    ) -> impl Future<Output = Result<FetchedMedia, AcquisitionError>>;
}

/// Direct HTTP(S) download with a browser-like request profile.
#[derive(Debug, Clone)]
pub struct HttpMediaSource {
    client: Client,
    user_agent: String,
}

impl HttpMediaSource {
    pub fn new(config: &AcquireConfig) -> Result<Self, AcquisitionError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| AcquisitionError::ClientSetup {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

impl MediaSource for HttpMediaSource {
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedMedia, AcquisitionError> {
        debug!("GET {} (referer {})", request.url, request.referer);

        let response = self
            .client
            .get(request.url)
            .header(USER_AGENT, &self.user_agent)
            .header(REFERER, request.referer)
            .header(ACCEPT, "image/avif,image/webp,video/*,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            // Raw bytes only; the file on disk must be the media itself
            .header(ACCEPT_ENCODING, "identity")
            .send()
            .await
            .map_err(|source| AcquisitionError::Request {
                url: request.url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::HttpStatus {
                status: status.as_u16(),
                url: request.url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let url = request.url.to_string();
        let body = stream::try_unfold(response, move |mut response| {
            let url = url.clone();
            async move {
                match response.chunk().await {
                    Ok(Some(chunk)) => Ok(Some((chunk.to_vec(), response))),
                    Ok(None) => Ok(None),
                    Err(source) => Err(AcquisitionError::Request { url, source }),
                }
            }
        })
        .boxed();

        Ok(FetchedMedia { content_type, body })
    }
}
