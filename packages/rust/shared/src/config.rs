//! Application configuration for apietl.
//!
//! User config lives at `~/.apietl/apietl.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EtlError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "apietl.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".apietl";

// ---------------------------------------------------------------------------
// Config structs (matching apietl.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source API settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Output artifact locations.
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the JSON API serving `/users` and `/posts`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Verify the server's TLS certificate. Off unless explicitly enabled.
    #[serde(default)]
    pub verify_tls: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            verify_tls: false,
        }
    }
}

fn default_base_url() -> String {
    "https://jsonplaceholder.typicode.com".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[output]` section. File names are relative to `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_users_csv")]
    pub users_csv: String,

    #[serde(default = "default_posts_csv")]
    pub posts_csv: String,

    #[serde(default = "default_summary_csv")]
    pub summary_csv: String,

    /// SQLite database file name.
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            users_csv: default_users_csv(),
            posts_csv: default_posts_csv(),
            summary_csv: default_summary_csv(),
            database: default_database(),
        }
    }
}

fn default_data_dir() -> String {
    "data".into()
}
fn default_users_csv() -> String {
    "users_cleaned.csv".into()
}
fn default_posts_csv() -> String {
    "posts_enriched.csv".into()
}
fn default_summary_csv() -> String {
    "user_post_summary.csv".into()
}
fn default_database() -> String {
    "analytics.db".into()
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, validated from config + CLI flags)
// ---------------------------------------------------------------------------

/// Validated HTTP source settings.
#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub base_url: Url,
    pub timeout: Duration,
    pub verify_tls: bool,
}

/// Resolved output artifact paths.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub data_dir: PathBuf,
    pub users_csv: PathBuf,
    pub posts_csv: PathBuf,
    pub summary_csv: PathBuf,
    pub database: PathBuf,
}

impl From<&OutputConfig> for OutputPaths {
    fn from(config: &OutputConfig) -> Self {
        let dir = PathBuf::from(&config.data_dir);
        Self {
            users_csv: dir.join(&config.users_csv),
            posts_csv: dir.join(&config.posts_csv),
            summary_csv: dir.join(&config.summary_csv),
            database: dir.join(&config.database),
            data_dir: dir,
        }
    }
}

/// Runtime pipeline configuration, validated from an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: SourceOptions,
    pub outputs: OutputPaths,
}

impl TryFrom<&AppConfig> for PipelineConfig {
    type Error = EtlError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.source.base_url).map_err(|e| {
            EtlError::config(format!("invalid base_url '{}': {e}", config.source.base_url))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(EtlError::config(format!(
                "base_url must use http or https, got '{}'",
                base_url.scheme()
            )));
        }
        if config.source.timeout_secs == 0 {
            return Err(EtlError::config("timeout_secs must be greater than zero"));
        }

        Ok(Self {
            source: SourceOptions {
                base_url,
                timeout: Duration::from_secs(config.source.timeout_secs),
                verify_tls: config.source.verify_tls,
            },
            outputs: OutputPaths::from(&config.output),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.apietl/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| EtlError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.apietl/apietl.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EtlError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EtlError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| EtlError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EtlError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("jsonplaceholder.typicode.com"));
        assert!(toml_str.contains("analytics.db"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let toml_str = r#"
[output]
data_dir = "/tmp/etl-out"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.output.data_dir, "/tmp/etl-out");
        assert_eq!(config.output.users_csv, "users_cleaned.csv");
        assert_eq!(config.source.timeout_secs, 30);
        assert!(!config.source.verify_tls);
    }

    #[test]
    fn pipeline_config_resolves_paths() {
        let mut app = AppConfig::default();
        app.output.data_dir = "out".into();
        let pipeline = PipelineConfig::try_from(&app).expect("valid config");
        assert_eq!(pipeline.outputs.users_csv, PathBuf::from("out/users_cleaned.csv"));
        assert_eq!(pipeline.outputs.database, PathBuf::from("out/analytics.db"));
        assert_eq!(pipeline.source.timeout, Duration::from_secs(30));
        assert_eq!(
            pipeline.source.base_url.as_str(),
            "https://jsonplaceholder.typicode.com/"
        );
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut app = AppConfig::default();
        app.source.base_url = "not a url".into();
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("invalid base_url"));

        app.source.base_url = "ftp://example.com".into();
        let err = PipelineConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut app = AppConfig::default();
        app.source.timeout_secs = 0;
        assert!(PipelineConfig::try_from(&app).is_err());
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("apietl_cfg_{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(
            &path,
            "[source]\nbase_url = \"http://localhost:8080\"\nverify_tls = true\n",
        )
        .unwrap();

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.source.base_url, "http://localhost:8080");
        assert!(config.source.verify_tls);

        std::fs::write(&path, "[source\nbroken").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
    }
}
