//! Configuration for the lessonforge pipeline.
//!
//! Configuration lives in `forge.json` (camelCase keys). Every field has a
//! default, so a missing file or a partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "forge.json";

/// Default OpenAI-compatible API base URL.
fn default_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default chat model for lesson content.
fn default_content_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default image model for assets.
fn default_asset_model() -> String {
    "dall-e-3".to_string()
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default number of generate-then-validate attempts per session.
const fn default_max_attempts() -> u32 {
    5
}

/// Default per-call timeout in seconds.
const fn default_call_timeout() -> u64 {
    120
}

/// Default deadline for one whole generation session, in seconds.
const fn default_session_deadline() -> u64 {
    600
}

/// Default timeout for one status write, in seconds.
const fn default_persistence_timeout() -> u64 {
    30
}

/// Default requested image size.
fn default_size_hint() -> String {
    "1024x1024".to_string()
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default output directory for persisted lessons.
fn default_output_dir() -> String {
    "lessons".to_string()
}

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Content generation settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Asset generation settings.
    #[serde(default)]
    pub assets: AssetConfig,

    /// Status persistence settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Name of the environment variable holding the provider API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Directory where lesson documents and assets are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            assets: AssetConfig::default(),
            persistence: PersistenceConfig::default(),
            api_key_env: default_api_key_env(),
            output_dir: default_output_dir(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `forge.json` in the current directory. If not found, returns
    /// the default configuration.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            ForgeError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `forge.json` from a specific directory, falling back to defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the default configuration. A file that exists
    /// is parsed and then validated.
    ///
    /// # Errors
    ///
    /// Returns `ForgeError::ConfigParseError` if the file cannot be read or is
    /// not valid JSON, and `ForgeError::ConfigValidationError` if a value is
    /// out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(ForgeError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ForgeError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.assets.validate()?;
        self.persistence.validate()?;

        if self.api_key_env.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the name of the variable holding your key, e.g. \"OPENAI_API_KEY\"",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(ForgeError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your forge.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }

    /// Reads the provider API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ForgeError::missing_api_key(&self.api_key_env)),
        }
    }
}

/// Settings for the content model and the retry loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Chat model name.
    #[serde(default = "default_content_model")]
    pub model: String,

    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Sampling temperature, 0.0 to 2.0.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum generate-then-validate attempts per session.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Timeout for one generator call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Deadline for the whole session, in seconds.
    #[serde(default = "default_session_deadline")]
    pub session_deadline_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_content_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_attempts: default_max_attempts(),
            call_timeout_secs: default_call_timeout(),
            session_deadline_secs: default_session_deadline(),
        }
    }
}

impl GenerationConfig {
    /// Returns the per-call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Returns the session deadline.
    #[must_use]
    pub const fn session_deadline(&self) -> Duration {
        Duration::from_secs(self.session_deadline_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(ForgeError::config_validation(
                "generation.maxAttempts must be greater than 0",
                "Set generation.maxAttempts to at least 1 in your forge.json",
            ));
        }

        if self.call_timeout_secs == 0 || self.session_deadline_secs == 0 {
            return Err(ForgeError::config_validation(
                "generation timeouts must be greater than 0",
                "Set generation.callTimeoutSecs and generation.sessionDeadlineSecs to at least 1 second",
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ForgeError::config_validation(
                format!(
                    "generation.temperature must be between 0 and 2, got {}",
                    self.temperature
                ),
                "Use a temperature such as 0.7",
            ));
        }

        validate_model_and_endpoint("generation", &self.model, &self.endpoint)
    }
}

/// Settings for the image model and the enrichment stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetConfig {
    /// Image model name.
    #[serde(default = "default_asset_model")]
    pub model: String,

    /// API base URL; `/images/generations` is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Requested image size, `WIDTHxHEIGHT`.
    #[serde(default = "default_size_hint")]
    pub size_hint: String,

    /// Timeout for one asset call, in seconds.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            model: default_asset_model(),
            endpoint: default_endpoint(),
            size_hint: default_size_hint(),
            call_timeout_secs: default_call_timeout(),
        }
    }
}

impl AssetConfig {
    /// Returns the per-call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.call_timeout_secs == 0 {
            return Err(ForgeError::config_validation(
                "assets.callTimeoutSecs must be greater than 0",
                "Set assets.callTimeoutSecs to at least 1 second in your forge.json",
            ));
        }

        let dimensions = self
            .size_hint
            .split_once('x')
            .map(|(w, h)| (w.parse::<u32>(), h.parse::<u32>()));
        if !matches!(dimensions, Some((Ok(w), Ok(h))) if w > 0 && h > 0) {
            return Err(ForgeError::config_validation(
                format!("assets.sizeHint '{}' is not WIDTHxHEIGHT", self.size_hint),
                "Use a size such as \"1024x1024\"",
            ));
        }

        validate_model_and_endpoint("assets", &self.model, &self.endpoint)
    }
}

/// Settings for status writes through the persistence gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Timeout for one status write, in seconds. A write that takes longer
    /// is abandoned and logged.
    #[serde(default = "default_persistence_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: default_persistence_timeout(),
        }
    }
}

impl PersistenceConfig {
    /// Returns the per-write timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.call_timeout_secs == 0 {
            return Err(ForgeError::config_validation(
                "persistence.callTimeoutSecs must be greater than 0",
                "Set persistence.callTimeoutSecs to at least 1 second in your forge.json",
            ));
        }
        Ok(())
    }
}

fn validate_model_and_endpoint(section: &str, model: &str, endpoint: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(ForgeError::config_validation(
            format!("{section}.model must not be empty"),
            format!("Set {section}.model in your forge.json"),
        ));
    }
    if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
        return Err(ForgeError::config_validation(
            format!("{section}.endpoint '{endpoint}' is not an http(s) URL"),
            "Use a base URL such as \"https://api.openai.com/v1\"",
        ));
    }
    Ok(())
}
