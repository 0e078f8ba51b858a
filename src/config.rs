//! Application configuration.
//!
//! Loaded from a TOML file, then overlaid with environment variables:
//!
//! | Variable | Overrides |
//! |---|---|
//! | `KGP_API_BASE` | `llm.api_base` |
//! | `KGP_API_KEY`, `OPENAI_API_KEY` | `llm.api_key` when unset in the file |
//! | `KGP_MODEL` | `llm.model` |
//! | `KGP_PROMPT_DIR` | `paths.prompt_dir` |
//! | `NEO4J_PASSWORD` | `neo4j.password` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, LlmError};
use crate::kg::Neo4jConfig;
use crate::llm::EndpointConfig;
use crate::llm::config::{ENV_API_BASE, ENV_API_KEYS, MAX_BACKOFF_BASE};
use crate::stage::StageSettings;

/// Config file used when none is given and it exists.
pub const DEFAULT_CONFIG_PATH: &str = "configs/kg-prompt.toml";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_OUTPUT_DIR: &str = "outputs/kg_prompting";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Chat endpoint settings.
    #[serde(default)]
    pub llm: LlmSection,
    /// Retrieval stage request settings.
    #[serde(default)]
    pub retrieval: StageSection,
    /// Generation stage request settings.
    #[serde(default)]
    pub generation: StageSection,
    /// Knowledge-base connection; required only when queries are executed.
    pub neo4j: Option<Neo4jSection>,
    /// Filesystem locations.
    #[serde(default)]
    pub paths: PathsSection,
}

/// `[llm]`
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    /// Provider name (`openai` or `openai-compatible`).
    pub provider: String,
    /// Endpoint base address.
    pub api_base: Option<String>,
    /// Bearer credential.
    pub api_key: Option<String>,
    /// Model identifier shared by both stages.
    pub model: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Linear backoff base in seconds.
    pub retry_backoff: f64,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_base: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_retries: 3,
            retry_backoff: 2.0,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for LlmSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSection")
            .field("provider", &self.provider)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `[retrieval]` / `[generation]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageSection {
    /// Sampling temperature.
    pub temperature: f64,
    /// Token cap; omitted from requests when unset.
    pub max_tokens: Option<u32>,
    /// Extra request fields merged into the body.
    pub extra: Option<Map<String, Value>>,
}

/// `[neo4j]`
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Neo4jSection {
    /// HTTP base URI.
    pub uri: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Neo4jSection {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for Neo4jSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jSection")
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `[paths]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    /// Directory holding `retrieval.txt` / `generation.txt`.
    pub prompt_dir: Option<PathBuf>,
    /// Directory for pipeline artifacts.
    pub output_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            prompt_dir: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

impl AppConfig {
    /// Loads configuration and applies environment overrides.
    ///
    /// With `path = None`, [`DEFAULT_CONFIG_PATH`] is read if it exists and
    /// built-in defaults are used otherwise. An explicit path must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.is_file() {
                    Self::from_file(default)?
                } else {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    fn from_toml(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Overlays environment values obtained through `lookup`.
    ///
    /// Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(base) = var(ENV_API_BASE) {
            self.llm.api_base = Some(base);
        }
        if self.llm.api_key.as_deref().is_none_or(str::is_empty) {
            self.llm.api_key = ENV_API_KEYS.iter().find_map(|key| var(key));
        }
        if let Some(model) = var("KGP_MODEL") {
            self.llm.model = model;
        }
        if let Some(dir) = var("KGP_PROMPT_DIR") {
            self.paths.prompt_dir = Some(PathBuf::from(dir));
        }
        if let Some(password) = var("NEO4J_PASSWORD") {
            self.neo4j.get_or_insert_with(Neo4jSection::default).password = password;
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "llm.model",
                message: "must not be empty".to_string(),
            });
        }
        if !(0.0..=MAX_BACKOFF_BASE).contains(&self.llm.retry_backoff) {
            return Err(ConfigError::InvalidValue {
                key: "llm.retry_backoff",
                message: format!(
                    "expected 0..={MAX_BACKOFF_BASE} seconds, got {}",
                    self.llm.retry_backoff
                ),
            });
        }
        for (key, section) in [
            ("retrieval.temperature", &self.retrieval),
            ("generation.temperature", &self.generation),
        ] {
            if !section.temperature.is_finite() || !(0.0..=2.0).contains(&section.temperature) {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: format!("expected 0.0..=2.0, got {}", section.temperature),
                });
            }
        }
        Ok(())
    }

    /// Endpoint configuration for the chat client.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiKeyMissing`] when no key was configured.
    pub fn endpoint_config(&self) -> Result<EndpointConfig, LlmError> {
        let mut builder = EndpointConfig::builder()
            .max_retries(self.llm.max_retries)
            .backoff_base(self.llm.retry_backoff)
            .timeout(Duration::from_secs(self.llm.timeout_secs));
        if let Some(base) = &self.llm.api_base {
            builder = builder.base_url(base);
        }
        if let Some(key) = self.llm.api_key.as_ref().filter(|k| !k.is_empty()) {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    /// Request settings for the retrieval stage.
    #[must_use]
    pub fn retrieval_settings(&self) -> StageSettings {
        self.stage_settings(&self.retrieval)
    }

    /// Request settings for the generation stage.
    #[must_use]
    pub fn generation_settings(&self) -> StageSettings {
        self.stage_settings(&self.generation)
    }

    fn stage_settings(&self, section: &StageSection) -> StageSettings {
        StageSettings {
            model: self.llm.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            extra: section.extra.clone(),
        }
    }

    /// Knowledge-base connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSection`] without a `[neo4j]` section.
    pub fn neo4j_config(&self) -> Result<Neo4jConfig, ConfigError> {
        let section = self.neo4j.as_ref().ok_or(ConfigError::MissingSection("neo4j"))?;
        Ok(Neo4jConfig {
            uri: section.uri.clone(),
            user: section.user.clone(),
            password: section.password.clone(),
            database: section.database.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
        })
    }
}
