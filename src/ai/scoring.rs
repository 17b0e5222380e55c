use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use crate::catalog::{Catalog, WeightedTerm};
use crate::config::ScoreStrategyKind;
use crate::db::ArticleStore;
use crate::error::{AppError, Result};
use crate::text::truncate_chars;

use super::client::{Embedder, TextGeneration};
use super::summarizer::{is_error_summary, Summarizer};

/// Stored RSS date layout; arXiv dates are RFC 3339.
pub const STORED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const MAX_EMBED_CHARS: usize = 2000;
const RECENCY_WINDOW_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scores {
    pub novelty: f64,
    pub heat: f64,
}

pub struct ScoreInput<'a> {
    pub text: &'a str,
    pub summary: &'a str,
    pub published_date: &'a str,
}

/// Novelty and heat for one article.
#[async_trait]
pub trait ScoreStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    async fn score(&self, input: &ScoreInput<'_>) -> Result<Scores>;
}

pub fn strategy_for(
    kind: ScoreStrategyKind,
    catalog: &Catalog,
    generator: Arc<dyn TextGeneration>,
    store: ArticleStore,
) -> Result<Box<dyn ScoreStrategy>> {
    let strategy: Box<dyn ScoreStrategy> = match kind {
        ScoreStrategyKind::KeywordHeuristic => Box::new(KeywordHeuristic::new(catalog)?),
        ScoreStrategyKind::LlmRated => Box::new(LlmRated::new(generator, store, catalog)),
    };
    Ok(strategy)
}

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Share of the total indicator weight whose terms occur in `lower`, 0..=1.
fn weight_ratio(indicators: &[WeightedTerm], lower: &str) -> f64 {
    let total: f64 = indicators.iter().map(|i| i.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let matched: f64 = indicators
        .iter()
        .filter(|i| lower.contains(&i.term.to_lowercase()))
        .map(|i| i.weight)
        .sum();
    matched / total
}

pub fn parse_published(published_date: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(published_date, STORED_DATE_FORMAT)
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(published_date)
                .ok()
                .map(|d| d.naive_utc())
        })
}

/// Keyword-presence scoring with no network calls.
pub struct KeywordHeuristic {
    innovation: Vec<WeightedTerm>,
    trending: Vec<WeightedTerm>,
    capitalised: Regex,
    measurement: Regex,
    now: Option<NaiveDateTime>,
}

impl KeywordHeuristic {
    pub fn new(catalog: &Catalog) -> Result<Self> {
        let capitalised = Regex::new(r"\b[A-Z][A-Za-z]*(?:\s+[A-Z][A-Za-z]*)*\b")
            .map_err(anyhow::Error::from)?;
        let measurement =
            Regex::new(r"\d+(?:\.\d+)?(?:\s*[A-Za-z]+)?").map_err(anyhow::Error::from)?;

        Ok(Self {
            innovation: catalog.innovation_indicators.clone(),
            trending: catalog.trending_indicators.clone(),
            capitalised,
            measurement,
            now: None,
        })
    }

    /// Pin the clock used for recency decay.
    pub fn with_now(mut self, now: NaiveDateTime) -> Self {
        self.now = Some(now);
        self
    }

    pub fn novelty(&self, text: &str) -> f64 {
        let indicator = weight_ratio(&self.innovation, &text.to_lowercase());

        let words = text.split_whitespace().count();
        let density = if words == 0 {
            0.0
        } else {
            self.capitalised.find_iter(text).count() as f64 / words as f64
        };

        let measurements = self.measurement.find_iter(text).count() as f64;

        clamp_score(
            0.5 * indicator * 100.0 + 0.3 * density * 100.0 + 0.2 * (measurements * 5.0).min(100.0),
        )
    }

    pub fn heat(&self, text: &str, published_date: &str) -> f64 {
        let trending = weight_ratio(&self.trending, &text.to_lowercase());
        let now = self.now.unwrap_or_else(|| Utc::now().naive_utc());

        let recency = match parse_published(published_date) {
            Some(published) => {
                let days_old = (now - published).num_days() as f64;
                (1.0 - days_old / RECENCY_WINDOW_DAYS).clamp(0.0, 1.0)
            }
            None => 0.5,
        };

        clamp_score(0.7 * trending * 100.0 + 30.0 * recency)
    }
}

#[async_trait]
impl ScoreStrategy for KeywordHeuristic {
    fn name(&self) -> &'static str {
        "keyword_heuristic"
    }

    async fn score(&self, input: &ScoreInput<'_>) -> Result<Scores> {
        Ok(Scores {
            novelty: self.novelty(input.text),
            heat: self.heat(input.text, input.published_date),
        })
    }
}

/// Novelty rated by a second LLM call; heat from how often the summary's
/// dominant technology keyword already appears in the store.
pub struct LlmRated {
    generator: Arc<dyn TextGeneration>,
    store: ArticleStore,
    keywords: Vec<String>,
}

impl LlmRated {
    pub fn new(generator: Arc<dyn TextGeneration>, store: ArticleStore, catalog: &Catalog) -> Self {
        Self {
            generator,
            store,
            keywords: catalog.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    async fn novelty(&self, summary: &str) -> Result<f64> {
        let prompt = format!(
            "Rate the novelty of the technology described below for the oil and gas \
             industry on a scale from 0 (well established) to 100 (never seen before). \
             Reply with a single integer.\n\n{summary}\n\nRating:"
        );
        let reply = self.generator.generate(&prompt, 8).await?;
        parse_rating(&reply).ok_or_else(|| AppError::Llm(format!("no rating in reply: {reply:?}")))
    }

    /// Most frequent catalog keyword in `text`; ties go to the earlier entry.
    fn dominant_keyword(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        let mut best: Option<(&str, usize)> = None;
        for keyword in self.keywords.iter().filter(|k| !k.is_empty()) {
            let count = lower.matches(keyword.as_str()).count();
            if count > 0 && best.map_or(true, |(_, c)| count > c) {
                best = Some((keyword, count));
            }
        }
        best.map(|(k, _)| k)
    }

    async fn heat(&self, summary: &str) -> Result<f64> {
        let Some(keyword) = self.dominant_keyword(summary) else {
            return Ok(0.0);
        };
        let mentions = self.store.count_mentions(keyword).await?;
        tracing::debug!(%keyword, mentions, "Heat from stored mentions");
        Ok(clamp_score(mentions as f64 * 10.0))
    }
}

#[async_trait]
impl ScoreStrategy for LlmRated {
    fn name(&self) -> &'static str {
        "llm_rated"
    }

    async fn score(&self, input: &ScoreInput<'_>) -> Result<Scores> {
        let basis = if input.summary.trim().is_empty() {
            input.text
        } else {
            input.summary
        };
        Ok(Scores {
            novelty: self.novelty(basis).await?,
            heat: self.heat(basis).await?,
        })
    }
}

/// First integer in an LLM reply, clamped to 0..=100.
pub fn parse_rating(reply: &str) -> Option<f64> {
    let digits: String = reply
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u64>().ok().map(|n| clamp_score(n as f64))
}

pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na.sqrt() * nb.sqrt())
    }
}

/// Blend of keyword coverage and embedding similarity against the
/// relevance keyword bag.
pub struct RelevanceScorer {
    embedder: Arc<dyn Embedder>,
    keywords: Vec<String>,
}

impl RelevanceScorer {
    pub fn new(embedder: Arc<dyn Embedder>, catalog: &Catalog) -> Self {
        Self {
            embedder,
            keywords: catalog.relevance_keywords.clone(),
        }
    }

    pub fn keyword_ratio(&self, text: &str) -> f64 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let lower = text.to_lowercase();
        let matches = self
            .keywords
            .iter()
            .filter(|k| lower.contains(&k.to_lowercase()))
            .count();
        matches as f64 / self.keywords.len() as f64
    }

    async fn similarity(&self, text: &str) -> Result<f64> {
        let inputs = vec![
            truncate_chars(&text.to_lowercase(), MAX_EMBED_CHARS).to_string(),
            self.keywords.join(" "),
        ];
        let vectors = self.embedder.embed(&inputs).await?;
        match vectors.as_slice() {
            [text_vec, keyword_vec] => Ok(cosine(text_vec, keyword_vec)),
            _ => Err(AppError::Llm("unexpected embedding count".into())),
        }
    }

    pub async fn score(&self, text: &str) -> f64 {
        let similarity = match self.similarity(text).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "Embedding failed, relevance from keywords only");
                0.0
            }
        };
        clamp_score(0.4 * self.keyword_ratio(text) * 100.0 + 0.6 * similarity * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub summary: String,
    pub relevance: f64,
    pub novelty: f64,
    pub heat: f64,
}

/// Summary plus the three scores for one piece of text.
pub struct Analyzer {
    summarizer: Summarizer,
    relevance: RelevanceScorer,
    strategy: Box<dyn ScoreStrategy>,
}

impl Analyzer {
    pub fn new(
        summarizer: Summarizer,
        relevance: RelevanceScorer,
        strategy: Box<dyn ScoreStrategy>,
    ) -> Self {
        tracing::debug!(strategy = strategy.name(), "Analyzer ready");
        Self {
            summarizer,
            relevance,
            strategy,
        }
    }

    /// Never fails: a summary error yields zero scores, a strategy error
    /// zero novelty and heat.
    pub async fn analyze(&self, text: &str, published_date: &str) -> Analysis {
        let summary = self.summarizer.summarize(text).await;
        if is_error_summary(&summary) {
            return Analysis {
                summary,
                relevance: 0.0,
                novelty: 0.0,
                heat: 0.0,
            };
        }

        let relevance = self.relevance.score(text).await;
        let input = ScoreInput {
            text,
            summary: &summary,
            published_date,
        };
        let scores = match self.strategy.score(&input).await {
            Ok(scores) => scores,
            Err(e) => {
                tracing::warn!(strategy = self.strategy.name(), error = %e, "Scoring failed");
                Scores::default()
            }
        };

        Analysis {
            summary,
            relevance,
            novelty: scores.novelty,
            heat: scores.heat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewArticle;
    use chrono::NaiveDate;

    struct FixedReply(Option<&'static str>);

    #[async_trait]
    impl TextGeneration for FixedReply {
        async fn generate(&self, _prompt: &str, _max_new_tokens: u32) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| AppError::Llm("503 Service Unavailable".into()))
        }
    }

    struct FixedVectors(Option<Vec<Vec<f32>>>);

    #[async_trait]
    impl Embedder for FixedVectors {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0
                .clone()
                .ok_or_else(|| AppError::Llm("embedding model offline".into()))
        }
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn heuristic() -> KeywordHeuristic {
        KeywordHeuristic::new(&Catalog::default())
            .unwrap()
            .with_now(fixed_now())
    }

    #[test]
    fn heat_is_deterministic_for_fixed_now() {
        let h = heuristic();
        let text = "Operator announces breaking report on flaring";

        let first = h.heat(text, "2026-10-09 12:00:00");
        let second = h.heat(text, "2026-10-09 12:00:00");

        // announces + breaking + report = 17 of 55; ten days old
        let expected = 0.7 * (17.0 / 55.0) * 100.0 + 30.0 * (1.0 - 10.0 / 30.0);
        assert!((first - expected).abs() < 1e-9);
        assert_eq!(first, second);
        assert!((0.0..=100.0).contains(&first));
    }

    #[test]
    fn heat_recency_edges() {
        let h = heuristic();
        assert_eq!(h.heat("quiet day", "2026-01-01 00:00:00"), 0.0);
        assert_eq!(h.heat("quiet day", "not a date"), 15.0);
        assert_eq!(h.heat("quiet day", "2026-10-19T12:00:00Z"), 30.0);
        assert_eq!(h.heat("quiet day", "2026-12-01 00:00:00"), 30.0);
    }

    #[test]
    fn novelty_blends_indicators_density_and_measurements() {
        let h = heuristic();
        assert_eq!(h.novelty(""), 0.0);

        // no indicators, no capitals, two measurements
        let plain = h.novelty("pressure rose to 300 bar within 2 days");
        assert!((plain - 0.2 * 10.0).abs() < 1e-9);

        let rich = h.novelty("A breakthrough prototype from Aramco Research cut emissions 40 percent");
        assert!(rich > plain);
        assert!(rich <= 100.0);
    }

    #[test]
    fn heuristic_strategy_scores_through_trait() {
        let h = heuristic();
        let text = "Breakthrough prototype launches offshore";
        let scores = tokio_test::block_on(h.score(&ScoreInput {
            text,
            summary: "",
            published_date: "2026-10-19 12:00:00",
        }))
        .unwrap();

        assert_eq!(h.name(), "keyword_heuristic");
        assert_eq!(scores.heat, h.heat(text, "2026-10-19 12:00:00"));
        assert_eq!(scores.novelty, h.novelty(text));
        assert!(scores.novelty > 0.0);
    }

    #[test]
    fn rating_is_first_integer_clamped() {
        assert_eq!(parse_rating("Rating: 72/100"), Some(72.0));
        assert_eq!(parse_rating("I'd say 250"), Some(100.0));
        assert_eq!(parse_rating("no idea"), None);
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn relevance_falls_back_to_keywords_when_embedding_fails() {
        let scorer = RelevanceScorer::new(Arc::new(FixedVectors(None)), &Catalog::default());
        // "oil" and "gas" of ten relevance keywords
        let score = scorer.score("new oil and gas pipeline").await;
        assert!((score - 0.4 * 20.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn relevance_uses_similarity() {
        let vectors = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        let scorer = RelevanceScorer::new(Arc::new(FixedVectors(Some(vectors))), &Catalog::default());
        let score = scorer.score("nothing relevant").await;
        assert!((score - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn llm_rated_scores_from_reply_and_mentions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArticleStore::open(dir.path().join("a.db")).await.unwrap();
        for i in 0..3 {
            store
                .insert(NewArticle {
                    title: format!("Capture plant {i}"),
                    link: format!("https://x/{i}"),
                    full_text: "a carbon capture plant".into(),
                    ..NewArticle::default()
                })
                .await
                .unwrap();
        }

        let strategy = LlmRated::new(
            Arc::new(FixedReply(Some("85"))),
            store,
            &Catalog::default(),
        );
        let scores = strategy
            .score(&ScoreInput {
                text: "",
                summary: "carbon capture pilots and carbon capture hubs",
                published_date: "",
            })
            .await
            .unwrap();

        assert_eq!(scores.novelty, 85.0);
        assert_eq!(scores.heat, 30.0);
    }

    #[tokio::test]
    async fn llm_failure_yields_error_summary_and_zero_scores() {
        let catalog = Catalog::default();
        let generator: Arc<dyn TextGeneration> = Arc::new(FixedReply(None));
        let analyzer = Analyzer::new(
            Summarizer::new(generator, 64),
            RelevanceScorer::new(Arc::new(FixedVectors(None)), &catalog),
            Box::new(heuristic()),
        );

        let analysis = analyzer
            .analyze("Breaking: oil major announces breakthrough", "2026-10-18 00:00:00")
            .await;

        assert!(analysis.summary.starts_with("Error:"));
        assert_eq!(
            (analysis.relevance, analysis.novelty, analysis.heat),
            (0.0, 0.0, 0.0)
        );
    }

    #[tokio::test]
    async fn failing_strategy_keeps_summary_and_relevance() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArticleStore::open(dir.path().join("a.db")).await.unwrap();
        let catalog = Catalog::default();
        let strategy = strategy_for(
            ScoreStrategyKind::LlmRated,
            &catalog,
            Arc::new(FixedReply(Some("no number here"))),
            store,
        )
        .unwrap();
        assert_eq!(strategy.name(), "llm_rated");

        let analyzer = Analyzer::new(
            Summarizer::new(Arc::new(FixedReply(Some("Summary about oil"))), 64),
            RelevanceScorer::new(Arc::new(FixedVectors(None)), &catalog),
            strategy,
        );
        let analysis = analyzer.analyze("oil", "").await;

        assert_eq!(analysis.summary, "Summary about oil");
        assert!(analysis.relevance > 0.0);
        assert_eq!((analysis.novelty, analysis.heat), (0.0, 0.0));
    }
}
