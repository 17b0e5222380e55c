use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One entry pulled out of a feed, before scraping and scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    /// Feed-provided summary as plain text.
    pub snippet: String,
    /// LLM output, or an `Error:` string when generation failed.
    pub summary: Option<String>,
    pub full_text: String,
    pub published_date: String,
    pub source: String,
    pub relevance_score: f64,
    pub novelty_score: f64,
    pub heat_score: f64,
    pub locations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub summary: Option<String>,
    pub full_text: String,
    pub published_date: String,
    pub source: String,
    pub relevance_score: f64,
    pub novelty_score: f64,
    pub heat_score: f64,
    pub locations: String,
}

impl Article {
    pub fn location_list(&self) -> Vec<&str> {
        self.locations
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Relevance,
    Novelty,
    Heat,
    Date,
}

impl SortOrder {
    pub fn order_by(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance_score DESC",
            SortOrder::Novelty => "novelty_score DESC",
            SortOrder::Heat => "heat_score DESC",
            SortOrder::Date => "published_date DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "novelty" => Ok(SortOrder::Novelty),
            "heat" => Ok(SortOrder::Heat),
            "date" => Ok(SortOrder::Date),
            other => Err(format!(
                "unknown sort order '{other}' (expected relevance, novelty, heat or date)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceFilter {
    #[default]
    All,
    /// Every feed except arXiv.
    Rss,
    Arxiv,
    /// Exact feed display name.
    Named(String),
}

impl FromStr for SourceFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("source filter must not be empty".to_string());
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "all" => SourceFilter::All,
            "rss" => SourceFilter::Rss,
            "arxiv" => SourceFilter::Arxiv,
            _ => SourceFilter::Named(trimmed.to_string()),
        })
    }
}

/// Inclusive calendar-day range over `published_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ArticleQuery {
    pub search: Option<String>,
    pub source: SourceFilter,
    pub categories: Vec<String>,
    pub date_range: Option<DateRange>,
    pub sort: SortOrder,
    pub limit: Option<usize>,
}
