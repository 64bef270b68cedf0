use crate::simulation::{DEFAULT_TIMEOUT, PipelineConfig, SubmitPolicy};
use serde::Deserialize;
use std::time::Duration;
use std::{env, path::Path, path::PathBuf};
use thoughtcomm_providers::gemini::{DEFAULT_MODEL, GEMINI_API_BASE_URL};
use thoughtcomm_providers::{AnswerPath, GeminiSettings};
use thoughtcomm_types::{ApiKey, StageDeck, StageDeckError, StageDescriptor};
use url::Url;

/// Environment variable consulted when the config file has no key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "THOUGHTCOMM_CONFIG";

/// On-disk configuration.
///
/// ```toml
/// [service]
/// endpoint = "https://generativelanguage.googleapis.com/v1beta"
/// model = "gemini-2.5-flash"
/// timeout_seconds = 30
///
/// [api_keys]
/// google = "${GEMINI_API_KEY}"
///
/// [simulation]
/// submit_policy = "reject_while_pending"
///
/// [[stages]]
/// title = "1. Drafting"
/// description = "..."
/// accent = "gray"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ThoughtcommConfig {
    pub service: Option<ServiceConfig>,
    pub api_keys: Option<ApiKeys>,
    pub simulation: Option<SimulationConfig>,
    /// Stage deck; the six reference stages are used when empty.
    #[serde(default)]
    pub stages: Vec<StageDescriptor>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid service endpoint {endpoint:?}: {source}")]
    Endpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("no API key configured (set [api_keys] google or GEMINI_API_KEY)")]
    MissingApiKey,
    #[error(transparent)]
    Stages(#[from] StageDeckError),
}

/// Generation service endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceConfig {
    /// Base URL; `/models/{model}:generateContent` is appended.
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// JSON pointer to the answer text inside the response envelope.
    pub answer_path: Option<AnswerPath>,
    pub timeout_seconds: Option<u64>,
    /// Permit plain-http endpoints (local test servers only).
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let google = if self.google.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("google", &google).finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub submit_policy: SubmitPolicy,
}

/// Replace `${VAR}` references with environment values; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        let end = start + 2 + end_rel;
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}

impl ThoughtcommConfig {
    /// Load from [`config_path`]. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    pub fn stage_deck(&self) -> Result<StageDeck, ConfigError> {
        if self.stages.is_empty() {
            return Ok(StageDeck::reference());
        }
        Ok(StageDeck::new(self.stages.clone())?)
    }

    /// API key from the config file (with `${VAR}` expansion), else from [`API_KEY_ENV`].
    pub fn api_key(&self) -> Option<ApiKey> {
        let from_file = self
            .api_keys
            .as_ref()
            .and_then(|keys| keys.google.as_deref())
            .map(expand_env_vars)
            .and_then(|key| ApiKey::new(key).ok());
        from_file.or_else(|| env::var(API_KEY_ENV).ok().and_then(|key| ApiKey::new(key).ok()))
    }

    pub fn request_timeout(&self) -> Duration {
        self.service
            .as_ref()
            .and_then(|s| s.timeout_seconds)
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    pub fn gemini_settings(&self) -> Result<GeminiSettings, ConfigError> {
        let service = self.service.as_ref();
        let endpoint = service
            .and_then(|s| s.endpoint.as_deref())
            .map(expand_env_vars)
            .unwrap_or_else(|| GEMINI_API_BASE_URL.to_string());
        let base_url = Url::parse(&endpoint)
            .map_err(|source| ConfigError::Endpoint { endpoint, source })?;
        let model = service
            .and_then(|s| s.model.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        Ok(GeminiSettings {
            base_url,
            model,
            api_key: self.api_key().ok_or(ConfigError::MissingApiKey)?,
            timeout: self.request_timeout(),
            allow_http: service.is_some_and(|s| s.allow_http),
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            answer_path: self
                .service
                .as_ref()
                .and_then(|s| s.answer_path.clone())
                .unwrap_or_default(),
            timeout: self.request_timeout(),
            policy: self
                .simulation
                .as_ref()
                .map(|s| s.submit_policy)
                .unwrap_or_default(),
        }
    }
}

/// `$THOUGHTCOMM_CONFIG`, else `~/.thoughtcomm/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".thoughtcomm").join("config.toml"))
}
