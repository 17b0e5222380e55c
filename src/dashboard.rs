//! Data side of the dashboard: cached queries, autocomplete, badges, score
//! bars and summary previews. Rendering is left to the consumer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;

use crate::ai::{is_error_summary, SummarySections};
use crate::catalog::Catalog;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::geo::{country_mentions, Gazetteer};
use crate::models::{Article, ArticleQuery};
use crate::pipeline::RunStats;

const SUGGESTION_LIMIT: usize = 5;
const PREVIEW_LINES: usize = 3;
const SUMMARY_MARKER: &str = "SUMMARY:";

/// Runs one ingestion cycle to completion.
#[async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn refresh(&self) -> Result<RunStats>;
}

/// Integer 0..=100 for a progress bar. Out-of-range values clamp, NaN is 0.
pub fn score_bar(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.clamp(0.0, 100.0) as u8
}

/// The first few non-empty lines of a summary, with the remainder kept
/// behind a "continue reading" fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPreview {
    pub lead: Vec<String>,
    pub rest: Vec<String>,
}

impl SummaryPreview {
    pub fn new(summary: &str) -> Self {
        let body = match summary.find(SUMMARY_MARKER) {
            Some(pos) => &summary[pos + SUMMARY_MARKER.len()..],
            None => summary,
        };

        let mut lines: Vec<String> = body
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        let rest = lines.split_off(lines.len().min(PREVIEW_LINES));

        Self { lead: lines, rest }
    }

    pub fn has_more(&self) -> bool {
        !self.rest.is_empty()
    }
}

/// Everything the list view shows for one article.
#[derive(Debug, Clone)]
pub struct ArticleCard {
    pub article: Article,
    pub categories: Vec<String>,
    pub relevance_bar: u8,
    pub novelty_bar: u8,
    pub heat_bar: u8,
    pub preview: SummaryPreview,
    pub sections: SummarySections,
}

pub struct Dashboard {
    store: ArticleStore,
    catalog: Arc<Catalog>,
    gazetteer: Gazetteer,
    trigger: Option<Arc<dyn RefreshTrigger>>,
    cache: HashMap<ArticleQuery, Vec<Article>>,
}

impl Dashboard {
    pub fn new(store: ArticleStore, catalog: Arc<Catalog>) -> Self {
        Self {
            gazetteer: Gazetteer::from_catalog(&catalog),
            store,
            catalog,
            trigger: None,
            cache: HashMap::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn RefreshTrigger>) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// Query results, served from the cache until the next refresh.
    pub async fn articles(&mut self, query: &ArticleQuery) -> Result<Vec<Article>> {
        if let Some(cached) = self.cache.get(query) {
            tracing::debug!(?query, "Serving cached results");
            return Ok(cached.clone());
        }

        let articles = self.store.query(query, &self.catalog).await?;
        self.cache.insert(query.clone(), articles.clone());
        Ok(articles)
    }

    /// Run the ingestion to completion, then drop every cached result.
    pub async fn refresh(&mut self) -> Result<RunStats> {
        let trigger = self
            .trigger
            .clone()
            .ok_or_else(|| AppError::Config("no refresh trigger configured".into()))?;

        let stats = trigger.refresh().await?;
        let invalidated = self.cached_queries();
        self.cache.clear();
        tracing::info!(inserted = stats.inserted, invalidated, "Dashboard refreshed");
        Ok(stats)
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    pub async fn suggestions(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.store.title_suggestions(text, SUGGESTION_LIMIT).await
    }

    /// Categories with at least one keyword in the title or snippet, in
    /// catalog order.
    pub fn matching_categories(&self, title: &str, snippet: &str) -> Vec<String> {
        let text = format!("{title} {snippet}").to_lowercase();
        self.catalog
            .categories
            .iter()
            .filter(|c| c.keywords.iter().any(|k| text.contains(&k.to_lowercase())))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn card(&self, article: Article) -> ArticleCard {
        // Failed generations show the feed snippet instead.
        let summary = match article.summary.as_deref() {
            Some(s) if !s.trim().is_empty() && !is_error_summary(s) => s,
            _ => article.snippet.as_str(),
        };
        let preview = SummaryPreview::new(summary);
        let sections = SummarySections::parse(summary);

        ArticleCard {
            categories: self.matching_categories(&article.title, &article.snippet),
            relevance_bar: score_bar(article.relevance_score),
            novelty_bar: score_bar(article.novelty_score),
            heat_bar: score_bar(article.heat_score),
            preview,
            sections,
            article,
        }
    }

    pub fn country_counts(&self, articles: &[Article]) -> BTreeMap<String, usize> {
        country_mentions(articles, &self.gazetteer)
    }
}
