//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`TALKCSV_*`)
//! 2. Config file (`~/.talkcsv/config.toml`)
//! 3. Defaults

use crate::data::resolver::resolve_app_path;
use crate::error::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Data source configuration.
    pub data: DataConfig,

    /// Answering agent configuration.
    pub agent: AgentConfig,

    /// Offline converter configuration.
    pub convert: ConvertConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the talkcsv home directory.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_talkcsv_home(),
        }
    }
}

/// Data source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Fixed database file. Relative paths resolve against the executable's directory.
    pub fixed_db: PathBuf,

    /// Table name used for uploaded files.
    pub upload_table: String,

    /// How long a resolved handle stays cached (e.g. "2h", "30m").
    pub cache_ttl: String,

    /// Rows shown when previewing an upload.
    pub preview_rows: usize,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            fixed_db: PathBuf::from("analytics_db"),
            upload_table: "csv_table".to_string(),
            cache_ttl: "2h".to_string(),
            preview_rows: 10,
        }
    }
}

impl DataConfig {
    /// Parse the cache TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration string is invalid or negative.
    pub fn cache_ttl(&self) -> Result<std::time::Duration> {
        parse_duration(&self.cache_ttl)?
            .to_std()
            .map_err(|_| Error::Config(format!("Invalid cache TTL: {}", self.cache_ttl)))
    }

    /// Fixed database file, relative paths taken from the executable's directory.
    #[must_use]
    pub fn fixed_db_path(&self) -> PathBuf {
        resolve_app_path(&self.fixed_db)
    }
}

/// Answering agent configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,

    /// Model name.
    pub model: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// Maximum reasoning steps before giving up.
    pub max_steps: usize,

    /// Maximum rows returned to the model per query.
    pub row_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "gemma2-9b-it".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            max_steps: 15,
            row_limit: 50,
        }
    }
}

impl AgentConfig {
    /// Read the API key from the configured environment variable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the variable is unset or empty.
    pub fn api_key(&self) -> Result<String> {
        match env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::Config(format!(
                "Please add the API key ({} is not set)",
                self.api_key_env
            ))),
        }
    }
}

/// Text encoding of a delimited input file.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// UTF-8; invalid sequences are a load error.
    Utf8,

    /// ISO-8859-1; every byte maps to one character.
    #[default]
    Latin1,
}

/// Offline converter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Source CSV file.
    pub csv: PathBuf,

    /// Target database file.
    pub db: PathBuf,

    /// Target table name.
    pub table: String,

    /// Source file encoding.
    pub encoding: Encoding,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            csv: PathBuf::from("reports.csv"),
            db: PathBuf::from("analytics_db"),
            table: "test".to_string(),
            encoding: Encoding::Latin1,
        }
    }
}

impl ConvertConfig {
    /// Target database file, resolved like [`DataConfig::fixed_db_path`] so
    /// the default target is the database `chat` opens.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        resolve_app_path(&self.db)
    }
}

/// Get the default talkcsv home directory.
fn default_talkcsv_home() -> PathBuf {
    dirs::home_dir().map_or_else(|| PathBuf::from(".talkcsv"), |h| h.join(".talkcsv"))
}

/// Parse a duration string like "2h", "30m", "7d".
///
/// A bare number is read as days.
///
/// # Errors
///
/// Returns an error if the duration format is invalid.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let parse_err = |_| Error::Config(format!("Invalid duration: {s}"));

    if let Some(stripped) = s.strip_suffix('d') {
        let num: i64 = stripped.parse().map_err(parse_err)?;
        Ok(Duration::days(num))
    } else if let Some(stripped) = s.strip_suffix('h') {
        let num: i64 = stripped.parse().map_err(parse_err)?;
        Ok(Duration::hours(num))
    } else if let Some(stripped) = s.strip_suffix('m') {
        let num: i64 = stripped.parse().map_err(parse_err)?;
        Ok(Duration::minutes(num))
    } else if let Some(stripped) = s.strip_suffix('s') {
        let num: i64 = stripped.parse().map_err(parse_err)?;
        Ok(Duration::seconds(num))
    } else {
        let num: i64 = s.parse().map_err(parse_err)?;
        Ok(Duration::days(num))
    }
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path();
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path).map_err(Error::Storage)?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("TALKCSV_CONFIG") {
        return PathBuf::from(path);
    }

    if let Ok(home) = env::var("TALKCSV_HOME") {
        return PathBuf::from(home).join("config.toml");
    }

    default_talkcsv_home().join("config.toml")
}

/// Apply environment variable overrides to config.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = env::var("TALKCSV_STORAGE_PATH") {
        config.storage.path = PathBuf::from(path);
    } else if let Ok(home) = env::var("TALKCSV_HOME") {
        config.storage.path = PathBuf::from(home);
    }

    if let Ok(path) = env::var("TALKCSV_FIXED_DB") {
        config.data.fixed_db = PathBuf::from(path);
    }

    if let Ok(ttl) = env::var("TALKCSV_CACHE_TTL") {
        config.data.cache_ttl = ttl;
    }

    if let Ok(model) = env::var("TALKCSV_MODEL") {
        config.agent.model = model;
    }

    if let Ok(url) = env::var("TALKCSV_BASE_URL") {
        config.agent.base_url = url;
    }

    if let Ok(val) = env::var("TALKCSV_MAX_STEPS") {
        if let Ok(steps) = val.parse() {
            config.agent.max_steps = steps;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_convert_target_is_default_fixed_source() {
        let config = Config::default();
        assert_eq!(config.convert.db_path(), config.data.fixed_db_path());
        assert!(config.data.fixed_db_path().is_absolute());
    }

    #[test]
    fn absolute_db_paths_are_kept() {
        let mut config = Config::default();
        config.convert.db = PathBuf::from("/srv/data/analytics_db");
        assert_eq!(config.convert.db_path(), PathBuf::from("/srv/data/analytics_db"));
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.data.fixed_db, PathBuf::from("analytics_db"));
        assert_eq!(config.data.upload_table, "csv_table");
        assert_eq!(config.data.cache_ttl, "2h");
        assert_eq!(config.agent.model, "gemma2-9b-it");
        assert_eq!(config.agent.api_key_env, "GROQ_API_KEY");
        assert_eq!(config.convert.table, "test");
        assert_eq!(config.convert.encoding, Encoding::Latin1);
    }

    #[test]
    fn default_cache_ttl_is_two_hours() {
        let config = DataConfig::default();
        assert_eq!(
            config.cache_ttl().unwrap(),
            std::time::Duration::from_secs(2 * 60 * 60)
        );
    }

    #[test]
    fn negative_cache_ttl_rejected() {
        let config = DataConfig {
            cache_ttl: "-5m".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.cache_ttl(), Err(Error::Config(_))));
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
            [data]
            fixed_db = "/srv/analytics.db"
            cache_ttl = "30m"

            [agent]
            model = "llama3-70b-8192"
            max_steps = 5

            [convert]
            encoding = "utf8"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.data.fixed_db, PathBuf::from("/srv/analytics.db"));
        assert_eq!(config.data.cache_ttl, "30m");
        assert_eq!(config.agent.model, "llama3-70b-8192");
        assert_eq!(config.agent.max_steps, 5);
        assert_eq!(config.convert.encoding, Encoding::Utf8);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml = r"
            [agent]
            max_steps = 3
        ";

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.agent.max_steps, 3);
        assert_eq!(config.agent.row_limit, 50); // Default
        assert_eq!(config.data.upload_table, "csv_table"); // Default
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_duration("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_duration("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_duration("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_duration("3").unwrap(), Duration::days(3));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn missing_api_key_is_config_error() {
        let config = AgentConfig {
            api_key_env: "TALKCSV_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.api_key(), Err(Error::Config(_))));
    }
}
