//! Application configuration for collection-index.
//!
//! User config lives at `~/.collection-index/collection-index.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::types::{LabelSource, MalformedPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "collection-index.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".collection-index";

// ---------------------------------------------------------------------------
// Config structs (matching collection-index.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Error-handling policy.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Default output file for the generated index.
    #[serde(default = "default_output")]
    pub output: String,

    /// Root URL used when none is given on the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,

    /// Which version supplies a collection's name and description.
    #[serde(default)]
    pub label_source: LabelSource,

    /// Maximum number of source files read at once.
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            root_url: None,
            label_source: LabelSource::default(),
            read_concurrency: default_read_concurrency(),
        }
    }
}

fn default_output() -> String {
    "index.json".into()
}
fn default_read_concurrency() -> usize {
    8
}

/// `[policy]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Behavior when a source cannot be read or parsed.
    #[serde(default)]
    pub on_malformed: MalformedPolicy,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.collection-index/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| IndexError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.collection-index/collection-index.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| IndexError::config(format!("failed to parse {}: {e}", path.display())))?;

    if config.defaults.read_concurrency == 0 {
        return Err(IndexError::config(format!(
            "{}: read_concurrency must be at least 1",
            path.display()
        )));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| IndexError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| IndexError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| IndexError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ci-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("index.json"));
        assert!(toml_str.contains("fail-fast"));
        assert!(toml_str.contains("oldest"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.read_concurrency, 8);
        assert_eq!(parsed.policy.on_malformed, MalformedPolicy::FailFast);
        assert!(parsed.defaults.root_url.is_none());
    }

    #[test]
    fn config_with_overrides() {
        let toml_str = r#"
[defaults]
root_url = "https://example.com/collections"
label_source = "newest"

[policy]
on_malformed = "skip-and-warn"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.defaults.root_url.as_deref(),
            Some("https://example.com/collections")
        );
        assert_eq!(config.defaults.label_source, LabelSource::Newest);
        assert_eq!(config.defaults.output, "index.json");
        assert_eq!(config.policy.on_malformed, MalformedPolicy::SkipAndWarn);
    }

    #[test]
    fn load_rejects_zero_concurrency() {
        let path = temp_file("[defaults]\nread_concurrency = 0\n");
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("read_concurrency"));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn load_reports_parse_errors() {
        let path = temp_file("[policy]\non_malformed = \"shrug\"\n");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, IndexError::Config { .. }));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
