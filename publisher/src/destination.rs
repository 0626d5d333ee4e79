use crate::{build_caption, classify_media, MediaKind, Publisher};
use crosspost_core::{CredentialPlacement, Destination, MediaPost, PublishConfig, PublishError};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder};
use serde_json::Value;
use std::path::Path;
use tokio::fs::File;
use tracing::{debug, info, warn};

/// Rejection bodies are kept for the failure record, but not unbounded.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Fallback key when the configured id field is absent.
const FALLBACK_ID_FIELD: &str = "post_id";

/// Multipart upload to the configured destination.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
    config: PublishConfig,
}

impl HttpPublisher {
    pub fn new(config: &PublishConfig) -> Result<Self, PublishError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    pub fn endpoint_for(&self, kind: MediaKind) -> Result<&str, PublishError> {
        let url = match kind {
            MediaKind::Video => self.config.video_url.as_deref(),
            MediaKind::Photo => self.config.photo_url.as_deref(),
        };
        url.ok_or_else(|| PublishError::NoDestination {
            kind: kind.to_string(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.destination {
            Destination::PlatformApi {
                access_token,
                credential: CredentialPlacement::Bearer,
                ..
            } => request.bearer_auth(access_token),
            Destination::PlatformApi {
                access_token,
                credential: CredentialPlacement::Query,
                ..
            } => request.query(&[("access_token", access_token.as_str())]),
            Destination::Relay => request,
        }
    }

    async fn build_form(&self, local_path: &Path, caption: String) -> Result<Form, PublishError> {
        let file = File::open(local_path).await?;
        let length = file.metadata().await?.len();
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        // Streamed from disk; the known length keeps Content-Length set
        let part = Part::stream_with_length(Body::from(file), length)
            .file_name(file_name)
            .mime_str("application/octet-stream")?;

        Ok(Form::new()
            .text(self.config.caption_field.clone(), caption)
            .part(self.config.file_field.clone(), part))
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, local_path: &Path, post: &MediaPost) -> Result<String, PublishError> {
        let kind = classify_media(local_path, post.media_type)?;
        let endpoint = self.endpoint_for(kind)?;
        let caption = build_caption(&post.title, &self.config.caption_footer);
        let form = self.build_form(local_path, caption).await?;

        info!(
            "Uploading {} as {} for {} to {}",
            local_path.display(),
            kind,
            post.post_id,
            endpoint
        );

        let response = self
            .authorize(self.client.post(endpoint))
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        let external_id = interpret_response(&self.config.destination, status, &body)?;

        info!("Published {} as {}", post.post_id, external_id);

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            debug!("Settling for {:.1}s after upload", settle.as_secs_f64());
            tokio::time::sleep(settle).await;
        }

        Ok(external_id)
    }
}

/// Turns a destination response into the external identifier.
pub fn interpret_response(
    destination: &Destination,
    status: u16,
    body: &str,
) -> Result<String, PublishError> {
    if !(200..300).contains(&status) {
        warn!("Destination answered HTTP {}", status);
        return Err(PublishError::Rejected {
            status,
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    match destination {
        Destination::Relay => {
            if body.trim().is_empty() {
                return Err(PublishError::InvalidResponse {
                    details: "relay returned an empty body".to_string(),
                });
            }
            Ok(body.to_string())
        }
        Destination::PlatformApi { id_field, .. } => {
            let json: Value =
                serde_json::from_str(body).map_err(|e| PublishError::InvalidResponse {
                    details: format!("expected JSON body: {}", e),
                })?;

            [id_field.as_str(), FALLBACK_ID_FIELD]
                .iter()
                .find_map(|field| match json.get(field) {
                    Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
                    Some(Value::Number(id)) => Some(id.to_string()),
                    _ => None,
                })
                .ok_or_else(|| PublishError::InvalidResponse {
                    details: format!("no '{}' in response: {}", id_field, body),
                })
        }
    }
}
