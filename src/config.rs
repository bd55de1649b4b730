//! Configuration for service endpoints and builder defaults.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SIT_CURATOR_ANALYZER_URL, SIT_CURATOR_SIT_URL,
//!    SIT_CURATOR_ENTITIES_URL)
//! 2. Config file (.sit-curator/config.yaml)
//! 3. Defaults (local backend on port 8000)
//!
//! Config file discovery:
//! - Searches current directory and parents for .sit-curator/config.yaml
//! - Falls back to ~/.sit-curator/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{KeywordGrouping, DEFAULT_GROUP_NAME, DEFAULT_WINDOW};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".sit-curator";
const CONFIG_FILE: &str = "config.yaml";

pub const ENV_ANALYZER_URL: &str = "SIT_CURATOR_ANALYZER_URL";
pub const ENV_SIT_URL: &str = "SIT_CURATOR_SIT_URL";
pub const ENV_ENTITIES_URL: &str = "SIT_CURATOR_ENTITIES_URL";

const DEFAULT_ANALYZER_URL: &str = "http://localhost:8000/api/analyzer";
const DEFAULT_SIT_URL: &str = "http://localhost:8000/api/sit";
const DEFAULT_ENTITIES_URL: &str = "http://localhost:8000/api/presidio/entities";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_LANGUAGE: &str = "en";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesConfig {
    pub analyzer_url: Option<String>,
    pub sit_url: Option<String>,
    pub entities_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuilderConfig {
    pub group_name: Option<String>,
    pub keyword_grouping: Option<KeywordGrouping>,
    pub language: Option<String>,
    pub context_window: Option<usize>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub services: ServiceSettings,
    pub builder: BuilderSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub analyzer_url: String,
    pub sit_url: String,
    pub entities_url: String,
    pub timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            analyzer_url: DEFAULT_ANALYZER_URL.to_string(),
            sit_url: DEFAULT_SIT_URL.to_string(),
            entities_url: DEFAULT_ENTITIES_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderSettings {
    /// Name of the supporting group new versions get
    pub group_name: String,
    pub keyword_grouping: KeywordGrouping,
    /// Detection language
    pub language: String,
    /// Context characters considered around a detection when suggesting
    pub context_window: usize,
}

impl Default for BuilderSettings {
    fn default() -> Self {
        Self {
            group_name: DEFAULT_GROUP_NAME.to_string(),
            keyword_grouping: KeywordGrouping::default(),
            language: DEFAULT_LANGUAGE.to_string(),
            context_window: DEFAULT_WINDOW,
        }
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Find config file: current directory upwards, then the home directory
fn find_config_file() -> Option<PathBuf> {
    let from_cwd = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file_from(&cwd));

    from_cwd.or_else(|| {
        let home = dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE);
        home.exists().then_some(home)
    })
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge file values, environment overrides, and defaults
fn resolve<F>(file: ConfigFile, env: F) -> (ServiceSettings, BuilderSettings)
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = ServiceSettings::default();
    let pick = |var: &str, from_file: Option<String>, default: String| {
        env(var)
            .filter(|v| !v.trim().is_empty())
            .or(from_file)
            .unwrap_or(default)
    };

    let services = ServiceSettings {
        analyzer_url: pick(
            ENV_ANALYZER_URL,
            file.services.analyzer_url,
            defaults.analyzer_url,
        ),
        sit_url: pick(ENV_SIT_URL, file.services.sit_url, defaults.sit_url),
        entities_url: pick(
            ENV_ENTITIES_URL,
            file.services.entities_url,
            defaults.entities_url,
        ),
        timeout: file
            .services
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    };

    let builder_defaults = BuilderSettings::default();
    let builder = BuilderSettings {
        group_name: file
            .builder
            .group_name
            .filter(|g| !g.trim().is_empty())
            .unwrap_or(builder_defaults.group_name),
        keyword_grouping: file
            .builder
            .keyword_grouping
            .unwrap_or(builder_defaults.keyword_grouping),
        language: file.builder.language.unwrap_or(builder_defaults.language),
        context_window: file
            .builder
            .context_window
            .unwrap_or(builder_defaults.context_window),
    };

    (services, builder)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();

    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    let (services, builder) = resolve(file, |var| std::env::var(var).ok());

    Ok(ResolvedConfig {
        services,
        builder,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
