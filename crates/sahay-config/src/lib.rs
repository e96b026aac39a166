use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Embedding provider configuration. The dimension is fixed at setup time and
/// must match across every writer and reader of a vector partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> usize {
    384
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
        }
    }
}

/// Chat model configuration (answer generation, summarization, fact extraction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
        }
    }
}

/// Translation / speech-to-text provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_base_url")]
    pub base_url: String,
}

fn default_translation_base_url() -> String {
    "https://api.sarvam.ai".to_string()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_translation_base_url(),
        }
    }
}

/// Top-level sahay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SahayConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    /// Directory for the SQLite databases. Defaults to the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Resolve the sahay config directory (~/.sahay/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".sahay"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.sahay/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<SahayConfig, ConfigError> {
    // Load .env if present (API keys are env-only, never in the config file)
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<SahayConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(SahayConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: SahayConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config_from(Path::new("/nonexistent/config.json5")).unwrap();
        assert_eq!(config.gateway.port, 8000);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.chat.model, "gemini-2.5-flash");
    }

    #[test]
    fn test_partial_config_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json5");
        std::fs::write(
            &path,
            r#"{
                // only override the port
                gateway: { port: 9000 },
                embedding: { dimensions: 768 },
            }"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.embedding.dimensions, 768);
    }
}
