use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::error::{AppError, Result};

pub const API_TOKEN_ENV: &str = "HF_API_TOKEN";

/// Upper bound for `days_limit`, about a century.
pub const MAX_DAYS_LIMIT: i64 = 36_500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreStrategyKind {
    #[default]
    KeywordHeuristic,
    LlmRated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArxivQuery {
    #[serde(default = "default_arxiv_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_arxiv_search")]
    pub search_query: String,
    #[serde(default = "default_arxiv_max_results")]
    pub max_results: u32,
    #[serde(default = "default_arxiv_sort_by")]
    pub sort_by: String,
    #[serde(default = "default_arxiv_sort_order")]
    pub sort_order: String,
}

impl Default for ArxivQuery {
    fn default() -> Self {
        Self {
            endpoint: default_arxiv_endpoint(),
            search_query: default_arxiv_search(),
            max_results: default_arxiv_max_results(),
            sort_by: default_arxiv_sort_by(),
            sort_order: default_arxiv_sort_order(),
        }
    }
}

impl ArxivQuery {
    pub fn url(&self) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy={}&sortOrder={}",
            self.endpoint,
            urlencoding::encode(&self.search_query),
            self.max_results,
            urlencoding::encode(&self.sort_by),
            urlencoding::encode(&self.sort_order),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub api_token: Option<String>,

    #[serde(default = "default_inference_url")]
    pub inference_url: String,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_days_limit")]
    pub days_limit: i64,

    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,

    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,

    #[serde(default = "default_rate_limit_delay")]
    pub rate_limit_delay_secs: u64,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,

    #[serde(default)]
    pub score_strategy: ScoreStrategyKind,

    #[serde(default)]
    pub arxiv: ArxivQuery,

    pub catalog_path: Option<String>,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("foresight");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("articles.db").to_string_lossy().to_string()
}

fn default_inference_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_llm_model() -> String {
    "mistralai/Mistral-7B-Instruct-v0.3".to_string()
}

fn default_embedding_model() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_max_new_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_days_limit() -> i64 {
    180
}

fn default_page_timeout() -> u64 {
    5
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_rate_limit_delay() -> u64 {
    2
}

fn default_max_workers() -> usize {
    5
}

fn default_cycle_interval() -> u64 {
    300
}

fn default_arxiv_endpoint() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_arxiv_search() -> String {
    "all:oil AND all:gas".to_string()
}

fn default_arxiv_max_results() -> u32 {
    3
}

fn default_arxiv_sort_by() -> String {
    "lastUpdatedDate".to_string()
}

fn default_arxiv_sort_order() -> String {
    "descending".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            api_token: None,
            inference_url: default_inference_url(),
            llm_model: default_llm_model(),
            embedding_model: default_embedding_model(),
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            days_limit: default_days_limit(),
            page_timeout_secs: default_page_timeout(),
            feed_timeout_secs: default_feed_timeout(),
            rate_limit_delay_secs: default_rate_limit_delay(),
            max_workers: default_max_workers(),
            cycle_interval_secs: default_cycle_interval(),
            score_strategy: ScoreStrategyKind::default(),
            arxiv: ArxivQuery::default(),
            catalog_path: None,
        }
    }
}

impl Config {
    /// Load from `path` (or the default location), writing a default file
    /// when none exists yet. The token from the environment wins over the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save(&config_path)?;
            config
        };

        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.trim().is_empty() {
                config.api_token = Some(token);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("foresight")
            .join("config.toml")
    }

    pub fn catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load(Path::new(path)),
            None => Ok(Catalog::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(AppError::Config("max_workers must be at least 1".into()));
        }
        if !(0..=MAX_DAYS_LIMIT).contains(&self.days_limit) {
            return Err(AppError::Config(format!(
                "days_limit must be between 0 and {MAX_DAYS_LIMIT}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();

        assert!(path.exists());
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.days_limit, 180);
        assert_eq!(config.score_strategy, ScoreStrategyKind::KeywordHeuristic);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/x.db\"\nscore_strategy = \"llm_rated\"\n\n[arxiv]\nmax_results = 10\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();

        assert_eq!(config.db_path, "/tmp/x.db");
        assert_eq!(config.score_strategy, ScoreStrategyKind::LlmRated);
        assert_eq!(config.arxiv.max_results, 10);
        assert_eq!(config.arxiv.sort_by, "lastUpdatedDate");
        assert_eq!(config.rate_limit_delay_secs, 2);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_workers = 0\n").unwrap();

        assert!(matches!(Config::load(Some(&path)), Err(AppError::Config(_))));
    }

    #[test]
    fn days_limit_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, format!("days_limit = {MAX_DAYS_LIMIT}\n")).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap().days_limit, MAX_DAYS_LIMIT);

        for bad in [-1, MAX_DAYS_LIMIT + 1, 1_000_000_000] {
            std::fs::write(&path, format!("days_limit = {bad}\n")).unwrap();
            assert!(matches!(Config::load(Some(&path)), Err(AppError::Config(_))));
        }
    }

    #[test]
    fn arxiv_url_encodes_query() {
        let url = ArxivQuery::default().url();
        assert!(url.starts_with("http://export.arxiv.org/api/query?"));
        assert!(url.contains("search_query=all%3Aoil%20AND%20all%3Agas"));
        assert!(url.contains("max_results=3"));
        assert!(url.contains("sortBy=lastUpdatedDate&sortOrder=descending"));
    }
}
