//! Validated process configuration (spec.md §6 "Configuration";
//! SPEC_FULL.md §A.3).
//!
//! Grounded on `lanegrid-agtrace`'s `Config::load_from`/TOML-file shape
//! (`examples/lanegrid-agtrace/src/config.rs`), layered with an
//! environment-variable overlay in the same manual field-by-field style its
//! CLI binary uses for flags (`clap`'s `env` attribute): a TOML file
//! supplies defaults, environment variables override them, and the merged
//! record is validated once, eagerly, at startup with a per-field
//! [`ConfigError`] rather than failing lazily on first use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chainclaw_types::error::{Classify, ErrorClass};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{field}: {reason}")]
pub struct ConfigError {
    pub field: String,
    pub reason: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

impl Classify for ConfigError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Config
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityMode {
    Open,
    Allowlist,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    Anthropic,
    OpenAi,
    Ollama,
}

/// Chain ids with a built-in default RPC URL (spec.md §6 "per-chain RPC
/// URLs (defaulted)"): Ethereum mainnet, Polygon, Arbitrum one.
const DEFAULT_RPC_URLS: &[(u64, &str)] =
    &[(1, "https://eth.llamarpc.com"), (137, "https://polygon-rpc.com"), (42161, "https://arb1.arbitrum.io/rpc")];

/// On-disk TOML shape (every field optional; env vars and built-in
/// defaults fill the rest). Mirrors [`Config`] but pre-validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub wallet_password: Option<String>,
    pub wallet_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub security_mode: Option<SecurityMode>,
    #[serde(default)]
    pub allowlist: Vec<String>,
    pub llm_provider: Option<LlmProviderKind>,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    #[serde(default)]
    pub rpc_urls: HashMap<u64, String>,
    pub simulator_api_key: Option<String>,
    pub dex_aggregator_api_key: Option<String>,
}

impl ConfigFile {
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::new("config_file", format!("could not read {}: {err}", path.display())))?;
        toml::from_str(&content).map_err(|err| ConfigError::new("config_file", format!("invalid TOML: {err}")))
    }
}

/// Environment variable overrides, applied on top of a [`ConfigFile`]
/// (spec.md §6). One env var per field, `CHAINCLAW_`-prefixed.
pub struct EnvOverrides {
    vars: HashMap<String, String>,
}

impl EnvOverrides {
    pub fn from_process_env() -> Self {
        let vars = std::env::vars().filter(|(k, _)| k.starts_with("CHAINCLAW_")).collect();
        Self { vars }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Fully validated configuration (spec.md §6). Constructed once at boot via
/// [`Config::load`]; every field has already passed validation, so
/// downstream code never needs to re-check it.
#[derive(Debug, Clone)]
pub struct Config {
    pub wallet_password: String,
    pub wallet_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_level: String,
    pub security_mode: SecurityMode,
    pub allowlist: Vec<String>,
    pub llm_provider: LlmProviderKind,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub rpc_urls: HashMap<u64, String>,
    pub simulator_api_key: Option<String>,
    pub dex_aggregator_api_key: Option<String>,
}

impl Config {
    /// Loads an optional TOML file, layers environment variables over it,
    /// fills remaining fields with defaults, then validates eagerly
    /// (spec.md §6 "Invalid configuration raises *config* class errors at
    /// startup with per-field messages").
    pub fn load(config_path: Option<&Path>) -> Result<Self, Vec<ConfigError>> {
        let file = match config_path {
            Some(path) => ConfigFile::load_from(path).map_err(|e| vec![e])?,
            None => ConfigFile::default(),
        };
        let env = EnvOverrides::from_process_env();
        Self::merge_and_validate(file, &env)
    }

    fn merge_and_validate(file: ConfigFile, env: &EnvOverrides) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let wallet_password = env
            .get("CHAINCLAW_WALLET_PASSWORD")
            .map(str::to_string)
            .or(file.wallet_password)
            .unwrap_or_default();
        if wallet_password.len() < 8 {
            errors.push(ConfigError::new("wallet_password", "must be at least 8 characters"));
        }

        let wallet_dir = env
            .get("CHAINCLAW_WALLET_DIR")
            .map(PathBuf::from)
            .or(file.wallet_dir)
            .unwrap_or_else(default_wallet_dir);

        let data_dir =
            env.get("CHAINCLAW_DATA_DIR").map(PathBuf::from).or(file.data_dir).unwrap_or_else(default_data_dir);

        let log_level = env.get("CHAINCLAW_LOG_LEVEL").map(str::to_string).or(file.log_level).unwrap_or_else(|| "info".to_string());

        let security_mode = match env.get("CHAINCLAW_SECURITY_MODE") {
            Some("open") => SecurityMode::Open,
            Some("allowlist") => SecurityMode::Allowlist,
            Some(other) => {
                errors.push(ConfigError::new("security_mode", format!("unknown mode '{other}'")));
                SecurityMode::Open
            }
            None => file.security_mode.unwrap_or(SecurityMode::Open),
        };

        let allowlist = match env.get("CHAINCLAW_ALLOWLIST") {
            Some(csv) => csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect(),
            None => file.allowlist,
        };
        if security_mode == SecurityMode::Allowlist && allowlist.is_empty() {
            errors.push(ConfigError::new("allowlist", "security_mode 'allowlist' requires at least one entry"));
        }

        let llm_provider = match env.get("CHAINCLAW_LLM_PROVIDER") {
            Some("anthropic") => LlmProviderKind::Anthropic,
            Some("openai") => LlmProviderKind::OpenAi,
            Some("ollama") => LlmProviderKind::Ollama,
            Some(other) => {
                errors.push(ConfigError::new("llm_provider", format!("unknown provider '{other}'")));
                LlmProviderKind::Anthropic
            }
            None => file.llm_provider.unwrap_or(LlmProviderKind::Anthropic),
        };
        let llm_api_key = env.get("CHAINCLAW_LLM_API_KEY").map(str::to_string).or(file.llm_api_key);
        let llm_base_url = env.get("CHAINCLAW_LLM_BASE_URL").map(str::to_string).or(file.llm_base_url);
        if llm_provider != LlmProviderKind::Ollama && llm_api_key.is_none() {
            errors.push(ConfigError::new("llm_api_key", "required unless llm_provider is 'ollama'"));
        }

        let mut rpc_urls: HashMap<u64, String> = DEFAULT_RPC_URLS.iter().map(|(id, url)| (*id, url.to_string())).collect();
        rpc_urls.extend(file.rpc_urls);
        for (key, value) in &env.vars {
            if let Some(chain_id) = key.strip_prefix("CHAINCLAW_RPC_") {
                match chain_id.parse::<u64>() {
                    Ok(id) => {
                        rpc_urls.insert(id, value.clone());
                    }
                    Err(_) => errors.push(ConfigError::new("rpc_urls", format!("'{key}' is not a valid chain id"))),
                }
            }
        }

        let simulator_api_key = env.get("CHAINCLAW_SIMULATOR_API_KEY").map(str::to_string).or(file.simulator_api_key);
        let dex_aggregator_api_key =
            env.get("CHAINCLAW_DEX_AGGREGATOR_API_KEY").map(str::to_string).or(file.dex_aggregator_api_key);

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            wallet_password,
            wallet_dir,
            data_dir,
            log_level,
            security_mode,
            allowlist,
            llm_provider,
            llm_api_key,
            llm_base_url,
            rpc_urls,
            simulator_api_key,
            dex_aggregator_api_key,
        })
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("chainclaw")
}

fn default_wallet_dir() -> PathBuf {
    default_data_dir().join("wallets")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &[(&str, &str)]) -> EnvOverrides {
        EnvOverrides { vars: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect() }
    }

    #[test]
    fn short_wallet_password_is_rejected() {
        let env = env_with(&[("CHAINCLAW_WALLET_PASSWORD", "short"), ("CHAINCLAW_LLM_API_KEY", "key")]);
        let errors = Config::merge_and_validate(ConfigFile::default(), &env).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "wallet_password"));
    }

    #[test]
    fn allowlist_mode_without_entries_is_rejected() {
        let env = env_with(&[
            ("CHAINCLAW_WALLET_PASSWORD", "password123"),
            ("CHAINCLAW_LLM_API_KEY", "key"),
            ("CHAINCLAW_SECURITY_MODE", "allowlist"),
        ]);
        let errors = Config::merge_and_validate(ConfigFile::default(), &env).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "allowlist"));
    }

    #[test]
    fn ollama_provider_does_not_require_an_api_key() {
        let env = env_with(&[("CHAINCLAW_WALLET_PASSWORD", "password123"), ("CHAINCLAW_LLM_PROVIDER", "ollama")]);
        let config = Config::merge_and_validate(ConfigFile::default(), &env).unwrap();
        assert_eq!(config.llm_provider, LlmProviderKind::Ollama);
        assert!(config.llm_api_key.is_none());
    }

    #[test]
    fn default_rpc_urls_are_present_and_overridable() {
        let env = env_with(&[
            ("CHAINCLAW_WALLET_PASSWORD", "password123"),
            ("CHAINCLAW_LLM_API_KEY", "key"),
            ("CHAINCLAW_RPC_1", "https://custom.example/rpc"),
        ]);
        let config = Config::merge_and_validate(ConfigFile::default(), &env).unwrap();
        assert_eq!(config.rpc_urls.get(&1).unwrap(), "https://custom.example/rpc");
        assert!(config.rpc_urls.contains_key(&137));
    }

    #[test]
    fn config_file_values_are_used_when_no_env_override_present() {
        let file = ConfigFile {
            wallet_password: Some("password123".to_string()),
            llm_api_key: Some("file-key".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let config = Config::merge_and_validate(file, &env_with(&[])).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.llm_api_key.as_deref(), Some("file-key"));
    }
}
