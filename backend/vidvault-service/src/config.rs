/// Configuration management for vidvault-service
///
/// Loads configuration from environment variables with sensible defaults.
/// Secrets (vault master keys, API tokens) have no defaults and never appear
/// in `Debug` output.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub streaming: StreamingConfig,
    pub transcode: TranscodeConfig,
    pub vault: VaultConfig,
    pub auth: AuthConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
    /// Base that rewritten manifest URIs point at, e.g. `https://api.example.com`.
    /// Empty means root-relative URIs (`/videos/...`).
    pub public_base_url: String,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: i64,
    pub allowed_content_types: Vec<String>,
    pub url_ttl: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 5 * 1024 * 1024 * 1024,
            allowed_content_types: [
                "video/mp4",
                "video/quicktime",
                "video/webm",
                "video/x-matroska",
                "video/x-msvideo",
                "video/mpeg",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            url_ttl: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StreamingConfig {
    /// Lifetime of the presigned GET URLs the gateway fetches through
    pub presigned_get_ttl: Duration,
    /// Upper bound on a single upstream storage read
    pub request_timeout: Duration,
    /// `max-age` for segment responses
    pub segment_max_age_secs: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            presigned_get_ttl: Duration::from_secs(60 * 60),
            request_timeout: Duration::from_secs(30),
            segment_max_age_secs: 300,
        }
    }
}

#[derive(Clone)]
pub struct TranscodeConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// Shared bearer token the job API presents on webhook callbacks.
    /// `None` disables the webhook route.
    pub webhook_token: Option<String>,
    pub manifest_file_name: String,
    pub poll_interval: Duration,
    pub poll_batch_size: i64,
    pub stale_pending_ttl: Duration,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8090".to_string(),
            api_token: None,
            webhook_token: None,
            manifest_file_name: "master.m3u8".to_string(),
            poll_interval: Duration::from_secs(15),
            poll_batch_size: 100,
            stale_pending_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl fmt::Debug for TranscodeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field(
                "webhook_token",
                &self.webhook_token.as_ref().map(|_| "<redacted>"),
            )
            .field("manifest_file_name", &self.manifest_file_name)
            .field("poll_interval", &self.poll_interval)
            .field("poll_batch_size", &self.poll_batch_size)
            .field("stale_pending_ttl", &self.stale_pending_ttl)
            .finish()
    }
}

/// Master key material for the credential vault
#[derive(Clone)]
pub struct VaultConfig {
    pub key_version: i16,
    pub master_key: String,
    /// Retired `(version, key)` pairs still needed to open older rows
    pub previous_keys: Vec<(i16, String)>,
}

impl fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let previous: Vec<i16> = self.previous_keys.iter().map(|(v, _)| *v).collect();
        f.debug_struct("VaultConfig")
            .field("key_version", &self.key_version)
            .field("previous_versions", &previous)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_public_key_pem: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let upload_defaults = UploadConfig::default();
        let streaming_defaults = StreamingConfig::default();
        let transcode_defaults = TranscodeConfig::default();

        Ok(Config {
            app: AppConfig {
                host: env_or("VIDVAULT_HOST", "0.0.0.0"),
                port: env_parse("VIDVAULT_PORT", 8080)?,
                env: env_or("APP_ENV", "development"),
                public_base_url: env_or("VIDVAULT_PUBLIC_BASE_URL", "")
                    .trim_end_matches('/')
                    .to_string(),
            },
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", "postgresql://localhost/vidvault"),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            upload: UploadConfig {
                max_file_size_bytes: env_parse(
                    "UPLOAD_MAX_FILE_SIZE_BYTES",
                    upload_defaults.max_file_size_bytes,
                )?,
                allowed_content_types: match std::env::var("UPLOAD_ALLOWED_CONTENT_TYPES") {
                    Ok(raw) => parse_list(&raw),
                    Err(_) => upload_defaults.allowed_content_types,
                },
                url_ttl: Duration::from_secs(env_parse(
                    "UPLOAD_URL_TTL_SECS",
                    upload_defaults.url_ttl.as_secs(),
                )?),
            },
            streaming: StreamingConfig {
                presigned_get_ttl: Duration::from_secs(env_parse(
                    "STREAM_PRESIGNED_GET_TTL_SECS",
                    streaming_defaults.presigned_get_ttl.as_secs(),
                )?),
                request_timeout: Duration::from_secs(env_parse(
                    "STREAM_REQUEST_TIMEOUT_SECS",
                    streaming_defaults.request_timeout.as_secs(),
                )?),
                segment_max_age_secs: env_parse(
                    "STREAM_SEGMENT_MAX_AGE_SECS",
                    streaming_defaults.segment_max_age_secs,
                )?,
            },
            transcode: TranscodeConfig {
                api_base_url: env_or("TRANSCODE_API_URL", &transcode_defaults.api_base_url)
                    .trim_end_matches('/')
                    .to_string(),
                api_token: std::env::var("TRANSCODE_API_TOKEN").ok(),
                webhook_token: std::env::var("TRANSCODE_WEBHOOK_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty()),
                manifest_file_name: env_or(
                    "TRANSCODE_MANIFEST_FILE_NAME",
                    &transcode_defaults.manifest_file_name,
                ),
                poll_interval: Duration::from_secs(env_parse(
                    "TRANSCODE_POLL_INTERVAL_SECS",
                    transcode_defaults.poll_interval.as_secs(),
                )?),
                poll_batch_size: env_parse(
                    "TRANSCODE_POLL_BATCH_SIZE",
                    transcode_defaults.poll_batch_size,
                )?,
                stale_pending_ttl: Duration::from_secs(env_parse(
                    "UPLOAD_STALE_PENDING_TTL_SECS",
                    transcode_defaults.stale_pending_ttl.as_secs(),
                )?),
            },
            vault: VaultConfig {
                key_version: env_parse("VAULT_KEY_VERSION", 1)?,
                master_key: env_required("VAULT_MASTER_KEY")?,
                previous_keys: parse_previous_keys(
                    &std::env::var("VAULT_PREVIOUS_KEYS").unwrap_or_default(),
                )?,
            },
            auth: AuthConfig {
                jwt_public_key_pem: env_required("JWT_PUBLIC_KEY_PEM")?.replace("\\n", "\n"),
            },
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn env_parse<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `VAULT_PREVIOUS_KEYS` format: `1:<base64>,2:<base64>`
fn parse_previous_keys(raw: &str) -> Result<Vec<(i16, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (version, key) = entry.split_once(':').ok_or(ConfigError::Invalid {
                name: "VAULT_PREVIOUS_KEYS",
                reason: "expected <version>:<base64 key>".to_string(),
            })?;
            let version = version.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "VAULT_PREVIOUS_KEYS",
                reason: format!("invalid key version {:?}", version),
            })?;
            Ok((version, key.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_defaults() {
        let cfg = UploadConfig::default();
        assert_eq!(cfg.max_file_size_bytes, 5_368_709_120);
        assert!(cfg.allowed_content_types.contains(&"video/mp4".to_string()));
        assert_eq!(cfg.url_ttl, Duration::from_secs(900));
    }

    #[test]
    fn list_parsing_normalizes() {
        assert_eq!(
            parse_list(" Video/MP4, ,video/webm "),
            vec!["video/mp4".to_string(), "video/webm".to_string()]
        );
    }

    #[test]
    fn previous_keys_parse() {
        let keys = parse_previous_keys("1:AAAA, 2:BBBB").unwrap();
        assert_eq!(keys, vec![(1, "AAAA".to_string()), (2, "BBBB".to_string())]);
        assert!(parse_previous_keys("").unwrap().is_empty());
        assert!(parse_previous_keys("nocolon").is_err());
        assert!(parse_previous_keys("x:AAAA").is_err());
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let vault = VaultConfig {
            key_version: 2,
            master_key: "c2VjcmV0LW1hc3Rlci1rZXk=".to_string(),
            previous_keys: vec![(1, "b2xkLWtleQ==".to_string())],
        };
        let rendered = format!("{:?}", vault);
        assert!(!rendered.contains("c2VjcmV0"));
        assert!(!rendered.contains("b2xk"));

        let transcode = TranscodeConfig {
            api_token: Some("tok-123".to_string()),
            ..Default::default()
        };
        assert!(!format!("{:?}", transcode).contains("tok-123"));
    }
}
