use crate::error::ConfigError;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Name this subsystem uses for record ownership and origin tagging.
pub const DEFAULT_ORIGIN: &str = "vanilla_meta";

/// Configuration for the metadata plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VanillaMetaConfig {
    /// Directory holding `metadata.xml.gz` and `metadata.index`
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Remote compressed metadata feed; there is no built-in default
    #[serde(default)]
    pub metadata_url: String,

    /// Origin and owner name stamped on claimed records
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Preferred locales, most preferred first
    #[serde(default = "default_locales")]
    pub locales: Vec<String>,

    /// Skip malformed components instead of failing the compile
    #[serde(default = "default_true")]
    pub ignore_invalid: bool,

    /// Pre-compute search tokens while compiling
    #[serde(default = "default_true")]
    pub tokenize: bool,

    /// Restrict refine lookups to entries carrying our origin
    #[serde(default = "default_true")]
    pub refine_filter_by_origin: bool,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(DEFAULT_ORIGIN)
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

fn default_locales() -> Vec<String> {
    vec!["C".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("vanilla-meta/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for VanillaMetaConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            metadata_url: String::new(),
            origin: default_origin(),
            locales: default_locales(),
            ignore_invalid: true,
            tokenize: true,
            refine_filter_by_origin: true,
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl VanillaMetaConfig {
    /// Defaults rooted at `cache_dir`, fetching from `metadata_url`.
    pub fn new(cache_dir: impl Into<PathBuf>, metadata_url: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            metadata_url: metadata_url.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.metadata_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Invalid("metadata_url must be set".to_string()));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "metadata_url must be http(s): {url}"
            )));
        }
        if self.origin.trim().is_empty() {
            return Err(ConfigError::Invalid("origin must not be empty".to_string()));
        }
        if self.locales.iter().all(|locale| locale.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "at least one locale is required".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
