//! Configuration loading for Assura.
//! Reads assura.toml from the current directory or the path in the
//! ASSURA_CONFIG env var; secrets come from the environment (.env is
//! honoured via dotenvy).

use std::path::Path;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Owner id assigned to requests without a bearer token. MVP auth only.
    #[serde(default = "default_owner")]
    pub default_owner: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5000 }
fn default_owner() -> String { "test-user-123".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            default_owner: default_owner(),
        }
    }
}

/// Which persistence gateway to run behind the `IncidentStore` trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Process-lifetime storage. Restart loses all data, by design.
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_storage_mode")]
    pub mode: StorageMode,
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_storage_mode() -> StorageMode { StorageMode::Memory }
fn default_db_url() -> String { "postgres://localhost/assura".to_string() }
fn default_max_connections() -> u32 { 10 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            mode: default_storage_mode(),
            url: default_db_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "anthropic" or "openai_compatible".
    #[serde(default = "default_llm_backend")]
    pub backend: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Base URL for the openai_compatible backend.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// Env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_backend() -> String { "anthropic".to_string() }
fn default_llm_model() -> String { "claude-3-5-sonnet-20241022".to_string() }
fn default_llm_base_url() -> String { "http://localhost:11434".to_string() }
fn default_api_key_env() -> String { "ANTHROPIC_API_KEY".to_string() }
fn default_llm_timeout() -> u64 { 30 }
fn default_max_tokens() -> u32 { 1024 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_llm_backend(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the environment, if present.
    pub fn api_key(&self) -> Option<SecretString> {
        std::env::var(&self.api_key_env).ok().map(SecretString::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// The single policy flag: real AES-256-GCM when true, identity when
    /// false. Resolved once at process start.
    #[serde(default)]
    pub enabled: bool,
    /// Env var holding the base64-encoded 32-byte key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

fn default_key_env() -> String { "ASSURA_ENCRYPTION_KEY".to_string() }

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self { enabled: false, key_env: default_key_env() }
    }
}

impl EncryptionConfig {
    pub fn key(&self) -> Option<SecretString> {
        std::env::var(&self.key_env).ok().map(SecretString::from)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "bool_true")]
    pub pdf: bool,
    /// No OCR capability ships with this build; enabling image analysis
    /// without one still yields `Unavailable` outcomes.
    #[serde(default)]
    pub image: bool,
    #[serde(default)]
    pub video: bool,
}

fn bool_true() -> bool { true }

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { pdf: true, image: false, video: false }
    }
}

/// How the background Process transition is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerMode {
    /// Degraded mode: Process runs inline on the submitting task.
    Inline,
    /// Queued mode: worker tasks drain a channel, one Process in flight
    /// per incident.
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_scheduler_mode")]
    pub mode: SchedulerMode,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Confidence below this escalates to a human.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Confidence below this forces severity re-derivation.
    #[serde(default = "default_severity_floor")]
    pub severity_floor_confidence: f64,
    /// Incident types (substring match) that coverage verification accepts.
    #[serde(default = "default_covered_types")]
    pub covered_types: Vec<String>,
}

fn default_scheduler_mode() -> SchedulerMode { SchedulerMode::Inline }
fn default_workers() -> usize { 2 }
fn default_min_confidence() -> f64 { 0.6 }
fn default_severity_floor() -> f64 { 0.4 }

fn default_covered_types() -> Vec<String> {
    [
        "car_accident",
        "vehicle_accident",
        "auto_accident",
        "property_damage",
        "theft",
        "vandalism",
        "water_damage",
        "fire_damage",
        "wind_damage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: default_scheduler_mode(),
            workers: default_workers(),
            min_confidence: default_min_confidence(),
            severity_floor_confidence: default_severity_floor(),
            covered_types: default_covered_types(),
        }
    }
}

impl Config {
    /// Load configuration from assura.toml.
    /// Checks the ASSURA_CONFIG env var first, then the current directory;
    /// a missing default file yields the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        match std::env::var("ASSURA_CONFIG") {
            Ok(path) => {
                if !Path::new(&path).exists() {
                    return Err(ConfigError::NotFound(path));
                }
                Self::from_path(&path)
            }
            Err(_) => {
                let path = "assura.toml";
                if Path::new(path).exists() {
                    Self::from_path(path)
                } else {
                    tracing::info!("no assura.toml found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
