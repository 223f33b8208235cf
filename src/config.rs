use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Space queried when no explicit inference target is configured.
pub const DEFAULT_INFERENCE_SPACE: &str = "Penality/pdf-something";
/// Question asked about every uploaded document unless the request supplies its own.
pub const DEFAULT_UPLOAD_PROMPT: &str = "What is the document about";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;
const DEFAULT_SERVER_PORT: u16 = 5000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the gateway.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory receiving uploaded documents, the index file, and the metadata file.
    pub documents_dir: PathBuf,
    /// File name of the vector index inside `documents_dir`.
    pub index_file_name: String,
    /// File name of the metadata mapping inside `documents_dir`.
    pub metadata_file_name: String,
    /// Hosted Space identifier (`owner/name`) backing the inference adapter.
    pub inference_space: String,
    /// Explicit base URL for the inference service; derived from the Space id when absent.
    pub inference_url: Option<String>,
    /// Optional bearer token sent to the inference service.
    pub inference_token: Option<String>,
    /// Default question asked after each upload.
    pub upload_prompt: String,
    /// How document records are written into the metadata store.
    pub metadata_write_mode: MetadataWriteMode,
    /// Dimension every pushed index must declare, when set.
    pub index_dimension: Option<u32>,
    /// Maximum accepted request body size in bytes.
    pub max_upload_bytes: usize,
    /// Address the HTTP listener binds to.
    pub server_host: IpAddr,
    /// Port the HTTP listener binds to.
    pub server_port: u16,
}

/// Strategy used when recording a new document in the metadata store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MetadataWriteMode {
    /// Every upload discards the previous mapping and writes a single entry.
    #[default]
    Replace,
    /// Uploads merge their entry into the existing mapping.
    Merge,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("Documents"),
            index_file_name: "faiss_index.bin".to_string(),
            metadata_file_name: "metadata.json".to_string(),
            inference_space: DEFAULT_INFERENCE_SPACE.to_string(),
            inference_url: None,
            inference_token: None,
            upload_prompt: DEFAULT_UPLOAD_PROMPT.to_string(),
            metadata_write_mode: MetadataWriteMode::Replace,
            index_dimension: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            documents_dir: load_env_optional("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.documents_dir),
            index_file_name: load_env_optional("INDEX_FILE_NAME")
                .unwrap_or(defaults.index_file_name),
            metadata_file_name: load_env_optional("METADATA_FILE_NAME")
                .unwrap_or(defaults.metadata_file_name),
            inference_space: load_env_optional("INFERENCE_SPACE")
                .unwrap_or(defaults.inference_space),
            inference_url: load_env_optional("INFERENCE_URL"),
            inference_token: load_env_optional("INFERENCE_TOKEN"),
            upload_prompt: load_env_optional("UPLOAD_PROMPT").unwrap_or(defaults.upload_prompt),
            metadata_write_mode: load_env_optional("METADATA_WRITE_MODE")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("METADATA_WRITE_MODE".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            index_dimension: parse_optional("INDEX_DIMENSION")?,
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            server_host: parse_optional("SERVER_HOST")?.unwrap_or(defaults.server_host),
            server_port: parse_optional("SERVER_PORT")?.unwrap_or(defaults.server_port),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for MetadataWriteMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Self::Replace),
            "merge" | "upsert" => Ok(Self::Merge),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_write_mode_parses_known_values() {
        assert_eq!(
            "replace".parse::<MetadataWriteMode>(),
            Ok(MetadataWriteMode::Replace)
        );
        assert_eq!(
            " Merge ".parse::<MetadataWriteMode>(),
            Ok(MetadataWriteMode::Merge)
        );
        assert_eq!(
            "upsert".parse::<MetadataWriteMode>(),
            Ok(MetadataWriteMode::Merge)
        );
        assert!("append".parse::<MetadataWriteMode>().is_err());
    }

    #[test]
    fn defaults_match_the_documents_layout() {
        let config = Config::default();
        assert_eq!(config.documents_dir, PathBuf::from("Documents"));
        assert_eq!(config.index_file_name, "faiss_index.bin");
        assert_eq!(config.metadata_file_name, "metadata.json");
        assert_eq!(config.metadata_write_mode, MetadataWriteMode::Replace);
        assert_eq!(config.upload_prompt, DEFAULT_UPLOAD_PROMPT);
        assert_eq!(config.server_port, 5000);
    }
}
