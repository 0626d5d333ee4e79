use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_PATH_ENV: &str = "CROSSPOST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "crosspost.toml";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Everything the pipeline needs, passed in at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file holding the dedup table.
    pub store_path: PathBuf,
    /// Directory downloaded media is written to.
    pub storage_root: PathBuf,
    pub rate_delay_min_secs: f64,
    pub rate_delay_max_secs: f64,
    pub acquire: AcquireConfig,
    pub publish: PublishConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("posted.db"),
            storage_root: PathBuf::from("media"),
            rate_delay_min_secs: 2.0,
            rate_delay_max_secs: 6.0,
            acquire: AcquireConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireConfig {
    pub max_retries: u32,
    /// Downloads below this many bytes are treated as error pages.
    pub min_file_size: u64,
    pub timeout_secs: u64,
    pub backoff_unit_ms: u64,
    pub jitter_factor: f64,
    pub user_agent: String,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_file_size: 1024,
            timeout_secs: 60,
            backoff_unit_ms: 1000,
            jitter_factor: 0.2,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl AcquireConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub destination: Destination,
    pub video_url: Option<String>,
    pub photo_url: Option<String>,
    /// Appended to every caption on its own line.
    pub caption_footer: String,
    pub file_field: String,
    pub caption_field: String,
    pub timeout_secs: u64,
    /// Pause after a successful upload before the next step.
    pub settle_delay_secs: f64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            destination: Destination::default(),
            video_url: None,
            photo_url: None,
            caption_footer: String::new(),
            file_field: "file".to_string(),
            caption_field: "caption".to_string(),
            timeout_secs: 300,
            settle_delay_secs: 3.0,
        }
    }
}

impl PublishConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        secs_to_duration(self.settle_delay_secs)
    }
}

/// Where uploads go and how their response is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    /// Structured platform API: authenticated, JSON response with an id.
    PlatformApi {
        access_token: String,
        #[serde(default)]
        credential: CredentialPlacement,
        #[serde(default = "default_id_field")]
        id_field: String,
    },
    /// Generic relay or webhook: unauthenticated, body is the identifier.
    Relay,
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Relay
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPlacement {
    #[default]
    Bearer,
    /// Sent as the `access_token` query parameter.
    Query,
}

fn default_id_field() -> String {
    "id".to_string()
}

impl AppConfig {
    /// Load from `$CROSSPOST_CONFIG` (or `crosspost.toml` when present),
    /// then apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV).ok();
        let path = explicit
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else if explicit.is_some() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        } else {
            info!("No configuration file at {}, using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CROSSPOST_DB") {
            self.store_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("CROSSPOST_MEDIA_DIR") {
            self.storage_root = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("UPLOAD_MIN_DELAY") {
            self.rate_delay_min_secs = parse_secs("UPLOAD_MIN_DELAY", &raw)?;
        }
        if let Some(raw) = lookup("UPLOAD_MAX_DELAY") {
            self.rate_delay_max_secs = parse_secs("UPLOAD_MAX_DELAY", &raw)?;
        }
        if let Some(token) = lookup("CROSSPOST_ACCESS_TOKEN") {
            match &mut self.publish.destination {
                Destination::PlatformApi { access_token, .. } => *access_token = token,
                Destination::Relay => {
                    debug!("CROSSPOST_ACCESS_TOKEN ignored for relay destination");
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, secs) in [
            ("rate_delay_min_secs", self.rate_delay_min_secs),
            ("rate_delay_max_secs", self.rate_delay_max_secs),
            ("publish.settle_delay_secs", self.publish.settle_delay_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: secs.to_string(),
                });
            }
        }
        if self.rate_delay_min_secs < 0.0 || self.rate_delay_max_secs < self.rate_delay_min_secs {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "rate delay bounds must satisfy 0 <= min <= max (got {} and {})",
                    self.rate_delay_min_secs, self.rate_delay_max_secs
                ),
            });
        }
        if self.acquire.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "acquire.max_retries".to_string(),
                value: "0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.acquire.jitter_factor) {
            return Err(ConfigError::InvalidValue {
                field: "acquire.jitter_factor".to_string(),
                value: self.acquire.jitter_factor.to_string(),
            });
        }
        if self.publish.video_url.is_none() && self.publish.photo_url.is_none() {
            return Err(ConfigError::MissingField {
                field: "publish.video_url or publish.photo_url".to_string(),
            });
        }
        if let Destination::PlatformApi { access_token, .. } = &self.publish.destination {
            if access_token.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "publish.destination.access_token".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn rate_delay_bounds(&self) -> (Duration, Duration) {
        (
            secs_to_duration(self.rate_delay_min_secs),
            secs_to_duration(self.rate_delay_max_secs),
        )
    }
}

/// Out-of-range values (negative, NaN, infinite) become zero; `validate`
/// reports them.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn parse_secs(field: &str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const PLATFORM_TOML: &str = r#"
        store_path = "state/posted.db"
        storage_root = "state/media"
        rate_delay_min_secs = 1.5
        rate_delay_max_secs = 4.0

        [acquire]
        max_retries = 5

        [publish]
        video_url = "https://graph.example.com/v19.0/123/videos"
        photo_url = "https://graph.example.com/v19.0/123/photos"
        caption_footer = "Follow for more"
        file_field = "source"

        [publish.destination]
        kind = "platform_api"
        access_token = "secret"
        credential = "query"
    "#;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = AppConfig::default();
        assert_eq!(config.store_path, PathBuf::from("posted.db"));
        assert_eq!(config.rate_delay_min_secs, 2.0);
        assert_eq!(config.rate_delay_max_secs, 6.0);
        assert_eq!(config.acquire.max_retries, 3);
        assert_eq!(config.acquire.min_file_size, 1024);
        assert_eq!(config.acquire.timeout(), Duration::from_secs(60));
        assert_eq!(config.publish.timeout(), Duration::from_secs(300));
        assert_eq!(config.publish.destination, Destination::Relay);
    }

    #[test]
    fn test_parse_platform_destination() {
        let config = AppConfig::from_toml_str(PLATFORM_TOML).unwrap();
        assert_eq!(config.acquire.max_retries, 5);
        assert_eq!(config.acquire.min_file_size, 1024);
        assert_eq!(config.publish.file_field, "source");
        assert_eq!(config.publish.caption_field, "caption");
        assert_eq!(
            config.publish.destination,
            Destination::PlatformApi {
                access_token: "secret".to_string(),
                credential: CredentialPlacement::Query,
                id_field: "id".to_string(),
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_relay_destination() {
        let config = AppConfig::from_toml_str(
            r#"
            [publish]
            video_url = "https://hook.example.com/video"

            [publish.destination]
            kind = "relay"
            "#,
        )
        .unwrap();
        assert_eq!(config.publish.destination, Destination::Relay);
        assert!(config.publish.photo_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::from_toml_str(PLATFORM_TOML).unwrap();
        let env: HashMap<&str, &str> = [
            ("CROSSPOST_DB", "/tmp/other.db"),
            ("UPLOAD_MIN_DELAY", "0.5"),
            ("UPLOAD_MAX_DELAY", "0.75"),
            ("CROSSPOST_ACCESS_TOKEN", "rotated"),
        ]
        .into_iter()
        .collect();

        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(
            config.rate_delay_bounds(),
            (Duration::from_millis(500), Duration::from_millis(750))
        );
        match &config.publish.destination {
            Destination::PlatformApi { access_token, .. } => assert_eq!(access_token, "rotated"),
            other => panic!("unexpected destination {:?}", other),
        }
    }

    #[test]
    fn test_invalid_delay_override_is_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "UPLOAD_MIN_DELAY").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_non_finite_delays_are_rejected() {
        for raw in [
            "rate_delay_max_secs = inf",
            "rate_delay_min_secs = nan",
            "rate_delay_min_secs = -inf",
            "[publish]\nsettle_delay_secs = inf",
            "[publish]\nsettle_delay_secs = -1.0",
        ] {
            let mut config = AppConfig::from_toml_str(raw).unwrap();
            config.publish.video_url = Some("https://hook.example.com/video".to_string());

            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue { .. })),
                "accepted {}",
                raw
            );
            // Conversions stay total even on an unvalidated config
            let _ = config.rate_delay_bounds();
            let _ = config.publish.settle_delay();
        }
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::from_toml_str(PLATFORM_TOML).unwrap();
        config.rate_delay_min_secs = 10.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        // No destinations configured at all
        assert!(matches!(
            AppConfig::default().validate(),
            Err(ConfigError::MissingField { .. })
        ));

        let mut config = AppConfig::from_toml_str(PLATFORM_TOML).unwrap();
        config.publish.destination = Destination::PlatformApi {
            access_token: " ".to_string(),
            credential: CredentialPlacement::Bearer,
            id_field: "id".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
