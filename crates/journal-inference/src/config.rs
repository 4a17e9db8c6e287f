//! Inference configuration system.
//!
//! This module selects and configures the inference backend used by the chat
//! engine. Configuration can be loaded from:
//! - TOML files (an `[inference]` table, `${VAR}` placeholders substituted)
//! - Environment variables (`JOURNAL_*` prefixed)
//!
//! # Example
//!
//! ```rust,no_run
//! use journal_inference::config::InferenceConfig;
//!
//! // Explicitly from a file
//! let config = InferenceConfig::from_file(std::path::Path::new("inference.toml")).expect("Failed to load");
//!
//! // Or from environment variables
//! let config = InferenceConfig::from_env();
//! let backends = config.build_backends().expect("Failed to build backends");
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use journal_core::{defaults, ChatBackend, EmbeddingBackend, InferenceBackend};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing configuration for default backend: {0}")]
    MissingBackend(String),

    #[error("Backend not compiled in: {0}")]
    Unsupported(String),

    #[error("Failed to initialize backend: {0}")]
    Init(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for journal_core::Error {
    fn from(e: ConfigError) -> Self {
        journal_core::Error::Config(e.to_string())
    }
}

/// Inference backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ollama,
    OpenAI,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

fn validate_url(label: &str, url: &str) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} base_url cannot be empty",
            label
        )));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{} base_url must start with http:// or https://, got: {}",
            label, url
        )));
    }
    Ok(())
}

fn validate_model(label: &str, field: &str, model: &str) -> ConfigResult<()> {
    if model.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} {} cannot be empty",
            label, field
        )));
    }
    Ok(())
}

/// Ollama backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API.
    pub base_url: String,
    /// Model to use for text generation.
    pub generation_model: String,
    /// Model to use for embeddings.
    pub embedding_model: String,
    /// Embedding vector dimension.
    #[serde(default = "OllamaConfig::default_dimension")]
    pub embedding_dimension: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OLLAMA_URL.to_string(),
            generation_model: defaults::GEN_MODEL.to_string(),
            embedding_model: defaults::EMBED_MODEL.to_string(),
            embedding_dimension: defaults::EMBED_DIMENSION,
        }
    }
}

impl OllamaConfig {
    fn default_dimension() -> usize {
        defaults::EMBED_DIMENSION
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_url("Ollama", &self.base_url)?;
        validate_model("Ollama", "generation_model", &self.generation_model)?;
        validate_model("Ollama", "embedding_model", &self.embedding_model)
    }
}

/// OpenAI backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI-compatible API.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model to use for text generation.
    pub generation_model: String,
    /// Model to use for embeddings.
    pub embedding_model: String,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            generation_model: "gpt-3.5-turbo".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
        }
    }
}

impl OpenAIConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        validate_url("OpenAI", &self.base_url)?;
        validate_model("OpenAI", "generation_model", &self.generation_model)?;
        validate_model("OpenAI", "embedding_model", &self.embedding_model)
    }
}

/// Backends built from an [`InferenceConfig`], one handle per role.
#[derive(Clone)]
pub struct Backends {
    pub chat: Arc<dyn ChatBackend>,
    pub embedding: Arc<dyn EmbeddingBackend>,
    pub health: Arc<dyn InferenceBackend>,
}

impl Backends {
    fn from_backend<B: InferenceBackend + 'static>(backend: B) -> Self {
        let backend = Arc::new(backend);
        Self {
            chat: backend.clone(),
            embedding: backend.clone(),
            health: backend,
        }
    }
}

/// Main inference configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Default backend to use.
    pub default: BackendKind,
    /// Ollama configuration (if enabled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
    /// OpenAI configuration (if enabled).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAIConfig>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            default: BackendKind::Ollama,
            ollama: Some(OllamaConfig::default()),
            openai: None,
        }
    }
}

impl InferenceConfig {
    /// Load from `path` when given, otherwise from environment variables.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                info!("Loading inference config from: {}", path.display());
                Self::from_file(path)
            }
            None => {
                debug!("No config file given, using environment variables");
                let config = Self::from_env();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let content = Self::substitute_env_vars(content);

        #[derive(Deserialize)]
        struct TomlRoot {
            inference: TomlInferenceConfig,
        }

        #[derive(Deserialize)]
        struct TomlInferenceConfig {
            default: String,
            #[serde(default)]
            ollama: Option<OllamaConfig>,
            #[serde(default)]
            openai: Option<OpenAIConfig>,
        }

        let root: TomlRoot = toml::from_str(&content)?;

        let config = Self {
            default: root.inference.default.parse()?,
            ollama: root.inference.ollama,
            openai: root.inference.openai,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let default = env::var("JOURNAL_INFERENCE_DEFAULT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        let ollama = match default {
            BackendKind::Ollama => Some(OllamaConfig {
                base_url: env::var("JOURNAL_OLLAMA_URL")
                    .unwrap_or_else(|_| defaults::OLLAMA_URL.to_string()),
                generation_model: env::var("JOURNAL_OLLAMA_GENERATION_MODEL")
                    .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
                embedding_model: env::var("JOURNAL_OLLAMA_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| defaults::EMBED_MODEL.to_string()),
                embedding_dimension: env::var("JOURNAL_OLLAMA_EMBED_DIM")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults::EMBED_DIMENSION),
            }),
            BackendKind::OpenAI => None,
        };

        let openai = match default {
            BackendKind::OpenAI => Some(OpenAIConfig {
                base_url: env::var("JOURNAL_OPENAI_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                api_key: env::var("JOURNAL_OPENAI_API_KEY")
                    .or_else(|_| env::var("OPENAI_API_KEY"))
                    .ok(),
                generation_model: env::var("JOURNAL_OPENAI_GENERATION_MODEL")
                    .unwrap_or_else(|_| "gpt-3.5-turbo".to_string()),
                embedding_model: env::var("JOURNAL_OPENAI_EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            }),
            BackendKind::Ollama => None,
        };

        Self {
            default,
            ollama,
            openai,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        match self.default {
            BackendKind::Ollama if self.ollama.is_none() => {
                return Err(ConfigError::MissingBackend(
                    "Ollama is set as default but not configured".to_string(),
                ));
            }
            BackendKind::OpenAI if self.openai.is_none() => {
                return Err(ConfigError::MissingBackend(
                    "OpenAI is set as default but not configured".to_string(),
                ));
            }
            _ => {}
        }

        if let Some(ref ollama) = self.ollama {
            ollama.validate()?;
        }

        if let Some(ref openai) = self.openai {
            openai.validate()?;
        }

        Ok(())
    }

    /// Construct the default backend.
    pub fn build_backends(&self) -> ConfigResult<Backends> {
        info!(backend = %self.default, "Building inference backend");
        match self.default {
            BackendKind::Ollama => self.build_ollama(),
            BackendKind::OpenAI => self.build_openai(),
        }
    }

    #[cfg(feature = "ollama")]
    fn build_ollama(&self) -> ConfigResult<Backends> {
        let cfg = self.ollama.clone().ok_or_else(|| {
            ConfigError::MissingBackend("Ollama is set as default but not configured".to_string())
        })?;
        Ok(Backends::from_backend(crate::OllamaBackend::with_config(
            cfg.base_url,
            cfg.embedding_model,
            cfg.generation_model,
            cfg.embedding_dimension,
        )))
    }

    #[cfg(not(feature = "ollama"))]
    fn build_ollama(&self) -> ConfigResult<Backends> {
        Err(ConfigError::Unsupported("ollama".to_string()))
    }

    #[cfg(feature = "openai")]
    fn build_openai(&self) -> ConfigResult<Backends> {
        let cfg = self.openai.clone().ok_or_else(|| {
            ConfigError::MissingBackend("OpenAI is set as default but not configured".to_string())
        })?;
        let backend = crate::openai::OpenAIBackend::new(crate::openai::OpenAIConfig {
            base_url: cfg.base_url,
            api_key: cfg.api_key,
            embed_model: cfg.embedding_model,
            gen_model: cfg.generation_model,
            ..Default::default()
        })
        .map_err(|e| ConfigError::Init(e.to_string()))?;
        Ok(Backends::from_backend(backend))
    }

    #[cfg(not(feature = "openai"))]
    fn build_openai(&self) -> ConfigResult<Backends> {
        Err(ConfigError::Unsupported("openai".to_string()))
    }

    /// Substitute environment variables in the format ${VAR_NAME}.
    fn substitute_env_vars(content: &str) -> String {
        let Ok(re) = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
            return content.to_string();
        };
        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }
}
