//! Configuration loading and root folder resolution
//!
//! Config file resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `ERALINE_CONFIG` environment variable
//! 3. Platform config file (`~/.config/eraline/config.toml`, `/etc/eraline/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Provider API keys resolve environment (`ERALINE_<PROVIDER>_API_KEY`) before TOML.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ERALINE_CONFIG";

/// Ephemeral cache schema version shipped with this build
///
/// Bumping it forces every ephemeral cache to cold-start; the durable store is untouched.
pub const DEFAULT_CACHE_VERSION: u32 = 13;

/// Default per-call timeout for external requests, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Top-level TOML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the durable store and the ephemeral cache snapshot
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    /// Ephemeral cache version tag
    pub cache_version: u32,
    /// Timeout applied to every external call
    pub request_timeout_secs: u64,
    pub reference: ReferenceConfig,
    pub metadata: MetadataConfig,
    /// Inference providers, in any order (sorted by priority at load)
    pub providers: Vec<ProviderToml>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            logging: LoggingConfig::default(),
            cache_version: DEFAULT_CACHE_VERSION,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            reference: ReferenceConfig::default(),
            metadata: MetadataConfig::default(),
            providers: default_providers(),
        }
    }
}

impl TomlConfig {
    /// Root folder, falling back to the OS default
    pub fn root_folder(&self) -> PathBuf {
        self.root_folder
            .clone()
            .unwrap_or_else(get_default_root_folder)
    }

    /// Path of the SQLite durable store
    pub fn database_path(&self) -> PathBuf {
        self.root_folder().join("eraline.db")
    }

    /// Path of the ephemeral cache snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.root_folder().join("attribution-cache.json")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit ANSI colors
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

/// Reference knowledge base configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReferenceConfig {
    pub enabled: bool,
    /// Locales tried in order (primary first)
    pub locales: Vec<String>,
    /// Candidate articles fetched per locale
    pub max_candidates: usize,
    pub user_agent: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locales: vec!["en".to_string(), "ja".to_string()],
            max_candidates: 3,
            user_agent: "Eraline/0.1 (timeline attribution resolver)".to_string(),
        }
    }
}

/// Upstream metadata provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetadataConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub primary_language: String,
    pub secondary_language: String,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            api_key: None,
            primary_language: "ja-JP".to_string(),
            secondary_language: "en-US".to_string(),
        }
    }
}

/// Wire protocol spoken by an inference provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderProtocol {
    /// OpenAI-compatible `/chat/completions`
    ChatCompletions,
    /// Gemini `generateContent`
    GenerateContent,
}

/// Inference provider entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderToml {
    /// Short name, used in source tags (`<name>_error`)
    pub name: String,
    pub display_name: String,
    pub protocol: ProviderProtocol,
    pub base_url: String,
    pub model: String,
    /// Lower value runs first
    pub priority: u32,
    pub enabled: bool,
    /// Rolling hourly request budget (0 = unlimited)
    pub rate_limit_per_hour: u32,
    /// "high" | "medium" | "low"
    pub reasoning: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Provider table shipped by default
pub fn default_providers() -> Vec<ProviderToml> {
    vec![
        ProviderToml {
            name: "deepseek".to_string(),
            display_name: "DeepSeek-V3".to_string(),
            protocol: ProviderProtocol::ChatCompletions,
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            priority: 1,
            enabled: true,
            rate_limit_per_hour: 50,
            reasoning: "high".to_string(),
            api_key: None,
        },
        ProviderToml {
            name: "gemini".to_string(),
            display_name: "Gemini Flash 2.0".to_string(),
            protocol: ProviderProtocol::GenerateContent,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash-exp".to_string(),
            priority: 2,
            enabled: true,
            rate_limit_per_hour: 50,
            reasoning: "medium".to_string(),
            api_key: None,
        },
        ProviderToml {
            name: "groq".to_string(),
            display_name: "Groq (Llama 3.1)".to_string(),
            protocol: ProviderProtocol::ChatCompletions,
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.1-70b-versatile".to_string(),
            priority: 3,
            enabled: false,
            rate_limit_per_hour: 100,
            reasoning: "low".to_string(),
            api_key: None,
        },
    ]
}

/// Resolve the config file path
///
/// Returns `None` when no file exists anywhere; callers then use defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config file
    platform_config_file()
}

fn platform_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("eraline").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/eraline/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Load configuration following the resolution order
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => {
            let config = load_toml_config(&path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => {
            debug!("No config file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let mut config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.providers.sort_by_key(|p| p.priority);
    Ok(config)
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;

    // May hold provider API keys
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Environment variable holding a provider's API key
pub fn api_key_env_var(provider: &str) -> String {
    format!("ERALINE_{}_API_KEY", provider.to_ascii_uppercase())
}

/// Resolve an API key: environment first, then TOML
pub fn resolve_api_key(provider: &str, toml_key: Option<&str>) -> Option<String> {
    let env_key = std::env::var(api_key_env_var(provider)).ok();

    if let (Some(_), Some(_)) = (&env_key, toml_key) {
        if env_key.as_deref().map(is_valid_key).unwrap_or(false)
            && toml_key.map(is_valid_key).unwrap_or(false)
        {
            warn!(
                provider,
                "API key found in both environment and TOML. Using environment."
            );
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            return Some(key);
        }
    }

    toml_key.filter(|k| is_valid_key(k)).map(str::to_string)
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Get OS-dependent default root folder path
pub fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("eraline"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/eraline"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("eraline"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/eraline"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("eraline"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\eraline"))
    } else {
        PathBuf::from("./eraline_data")
    }
}
