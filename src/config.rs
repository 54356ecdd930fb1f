//! Runtime configuration loaded from `config.yaml`.
//!
//! Every section is optional; a missing file or a missing key falls back to
//! the defaults below. Secrets are never stored in the file: the `llm`
//! section names the environment variable holding the API key.
//!
//! ```yaml
//! data_dir: ./materials
//! output_dir: ./DailyReport
//! llm:
//!   base_url: https://api.deepseek.com
//!   model: deepseek-chat
//!   api_key_env: DEEPSEEK_API_KEY
//! summarizer:
//!   concurrency: 4
//! dedup:
//!   history_days: 2
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the day files.
    pub data_dir: PathBuf,
    /// Directory the brief is written to.
    pub output_dir: PathBuf,
    pub llm: LlmConfig,
    pub summarizer: SummarizerConfig,
    pub dedup: DedupConfig,
    pub store: StoreConfig,
    pub brief: BriefConfig,
    pub scrape: ScrapeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("materials"),
            output_dir: PathBuf::from("DailyReport"),
            llm: LlmConfig::default(),
            summarizer: SummarizerConfig::default(),
            dedup: DedupConfig::default(),
            store: StoreConfig::default(),
            brief: BriefConfig::default(),
            scrape: ScrapeConfig::default(),
        }
    }
}

/// OpenAI-compatible chat endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable the API key is read from.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".into(),
            model: "deepseek-chat".into(),
            api_key_env: "DEEPSEEK_API_KEY".into(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout_secs: 120,
            max_retries: 5,
            base_delay_ms: 1000,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnv(self.api_key_env.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Article text beyond this many characters is cut before sending.
    pub max_content_chars: usize,
    /// Records annotated at once. 1 keeps the batch strictly sequential.
    pub concurrency: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 5000,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// How many previous days' files are pooled as history.
    pub history_days: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { history_days: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub lock_attempts: u32,
    pub lock_delay_ms: u64,
    /// Age after which a lock with no live, checkable holder is taken over.
    pub lock_stale_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_attempts: 50,
            lock_delay_ms: 200,
            lock_stale_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefConfig {
    /// Leave out records the model flagged as repeats of earlier news.
    pub omit_flagged_duplicates: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub people_daily_count: usize,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            people_daily_count: 3,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".into(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `./config.yaml` is used when
    /// present, otherwise the built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    debug!("No config file found; using defaults");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_yaml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.summarizer.max_content_chars, 5000);
        assert_eq!(config.summarizer.concurrency, 1);
        assert_eq!(config.dedup.history_days, 1);
        assert!(!config.brief.omit_flagged_duplicates);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
data_dir: /srv/news
llm:
  model: gpt-4o
  base_url: https://api.openai.com/v1
summarizer:
  concurrency: 4
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/news"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "DEEPSEEK_API_KEY");
        assert_eq!(config.summarizer.concurrency, 4);
        assert_eq!(config.summarizer.max_content_chars, 5000);
        assert_eq!(config.output_dir, PathBuf::from("DailyReport"));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(AppConfig::from_yaml_str("summarizer: [1, 2").is_err());
        assert!(AppConfig::from_yaml_str("dedup:\n  history_days: many\n").is_err());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/daily_news/config.yaml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "brief:\n  omit_flagged_duplicates: true\n").unwrap();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(config.brief.omit_flagged_duplicates);
    }

    #[test]
    fn test_missing_api_key_env() {
        let llm = LlmConfig {
            api_key_env: "DAILY_NEWS_BRIEF_TEST_UNSET_KEY".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(llm.api_key(), Err(ConfigError::MissingEnv(_))));
    }
}
