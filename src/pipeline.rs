use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::ai::{
    strategy_for, Analyzer, InferenceClient, RelevanceScorer, Summarizer, STORED_DATE_FORMAT,
};
use crate::catalog::{Catalog, FeedSource, ARXIV_SOURCE};
use crate::config::{ArxivQuery, Config};
use crate::dashboard::RefreshTrigger;
use crate::db::ArticleStore;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::filter::KeywordFilter;
use crate::geo::Gazetteer;
use crate::models::{FeedEntry, NewArticle};
use crate::services::{is_scrape_error, PageScraper};
use crate::text::truncate_chars;

const SNIPPET_CHARS: usize = 300;
const ARXIV_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// What happened to a single feed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Inserted,
    /// Another writer stored the link first.
    Duplicate,
    AlreadyStored,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub feeds: usize,
    pub failed_feeds: usize,
    pub entries: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub errors: usize,
}

impl RunStats {
    fn merge(&mut self, other: RunStats) {
        self.feeds += other.feeds;
        self.failed_feeds += other.failed_feeds;
        self.entries += other.entries;
        self.inserted += other.inserted;
        self.skipped += other.skipped;
        self.rejected += other.rejected;
        self.errors += other.errors;
    }

    fn record(&mut self, outcome: Ingest) {
        match outcome {
            Ingest::Inserted => self.inserted += 1,
            Ingest::Duplicate | Ingest::AlreadyStored => self.skipped += 1,
            Ingest::Rejected => self.rejected += 1,
        }
    }
}

/// Fetch, scrape, filter, analyse and store. One call to [`run_once`]
/// is one ingestion cycle over every catalog feed plus the arXiv query.
///
/// [`run_once`]: Pipeline::run_once
pub struct Pipeline {
    store: ArticleStore,
    catalog: Arc<Catalog>,
    fetcher: FeedFetcher,
    scraper: PageScraper,
    filter: KeywordFilter,
    gazetteer: Gazetteer,
    analyzer: Analyzer,
    arxiv: ArxivQuery,
    max_workers: usize,
    rate_limit_delay: Duration,
    cycle_interval: Duration,
}

impl Pipeline {
    pub fn new(config: &Config, catalog: Arc<Catalog>, store: ArticleStore) -> Result<Self> {
        let client = Arc::new(InferenceClient::new(config)?);
        tracing::debug!(model = client.model(), strategy = ?config.score_strategy, "Building analyzer");
        let strategy = strategy_for(config.score_strategy, &catalog, client.clone(), store.clone())?;
        let analyzer = Analyzer::new(
            Summarizer::new(client.clone(), config.max_new_tokens),
            RelevanceScorer::new(client, &catalog),
            strategy,
        );
        Self::with_analyzer(config, catalog, store, analyzer)
    }

    pub fn with_analyzer(
        config: &Config,
        catalog: Arc<Catalog>,
        store: ArticleStore,
        analyzer: Analyzer,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: FeedFetcher::new(
                Duration::from_secs(config.feed_timeout_secs),
                config.days_limit,
            )?,
            scraper: PageScraper::new(Duration::from_secs(config.page_timeout_secs))?,
            filter: KeywordFilter::from_catalog(&catalog),
            gazetteer: Gazetteer::from_catalog(&catalog),
            analyzer,
            arxiv: config.arxiv.clone(),
            max_workers: config.max_workers.max(1),
            rate_limit_delay: Duration::from_secs(config.rate_limit_delay_secs),
            cycle_interval: Duration::from_secs(config.cycle_interval_secs),
            store,
            catalog,
        })
    }

    pub async fn run_once(&self) -> Result<RunStats> {
        let started = Instant::now();
        self.store.create_table_if_not_exists().await?;

        tracing::info!(
            feeds = self.catalog.feeds.len(),
            workers = self.max_workers,
            "Starting ingestion cycle"
        );

        let feed_jobs: Vec<_> = self
            .catalog
            .feeds
            .iter()
            .map(|feed| self.process_feed(feed))
            .collect();
        let mut stats = stream::iter(feed_jobs)
            .buffer_unordered(self.max_workers)
            .fold(RunStats::default(), |mut total, feed_stats| async move {
                total.merge(feed_stats);
                total
            })
            .await;

        stats.merge(self.process_arxiv().await);

        tracing::info!(
            inserted = stats.inserted,
            skipped = stats.skipped,
            rejected = stats.rejected,
            errors = stats.errors,
            failed_feeds = stats.failed_feeds,
            elapsed = ?started.elapsed(),
            "Ingestion cycle finished"
        );
        Ok(stats)
    }

    /// Repeat [`run_once`](Self::run_once) every `cycle_interval_secs`
    /// until interrupted.
    pub async fn run_forever(&self) -> Result<()> {
        loop {
            if let Err(e) = self.run_once().await {
                tracing::error!(error = %e, "Ingestion cycle failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cycle_interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, stopping");
                    return Ok(());
                }
            }
        }
    }

    async fn process_feed(&self, feed: &FeedSource) -> RunStats {
        let mut stats = RunStats {
            feeds: 1,
            ..RunStats::default()
        };

        match self.fetcher.fetch_feed(&feed.url).await {
            Ok(entries) => {
                tracing::debug!(feed = %feed.name, entries = entries.len(), "Fetched feed");
                stats.merge(self.process_entries(&feed.name, entries).await);
            }
            Err(e) => {
                tracing::warn!(feed = %feed.name, url = %feed.url, error = %e, "Failed to fetch feed");
                stats.failed_feeds += 1;
            }
        }

        tokio::time::sleep(self.rate_limit_delay).await;
        stats
    }

    /// Entries of one feed, in order.
    pub async fn process_entries(&self, source: &str, entries: Vec<FeedEntry>) -> RunStats {
        let mut stats = RunStats::default();
        for entry in entries {
            stats.entries += 1;
            match self.process_entry(source, &entry).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    tracing::warn!(link = %entry.link, error = %e, "Failed to process entry");
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    async fn process_entry(&self, source: &str, entry: &FeedEntry) -> Result<Ingest> {
        if self.store.exists(&entry.link).await? {
            tracing::debug!(link = %entry.link, "Already stored");
            return Ok(Ingest::AlreadyStored);
        }
        let full_text = self.scraper.extract_full_text(&entry.link).await;
        self.ingest_entry(source, entry, full_text).await
    }

    /// Filter, analyse and store an RSS entry whose page has already been
    /// scraped into `full_text`.
    pub async fn ingest_entry(
        &self,
        source: &str,
        entry: &FeedEntry,
        full_text: String,
    ) -> Result<Ingest> {
        let usable_text = if is_scrape_error(&full_text) {
            ""
        } else {
            full_text.as_str()
        };

        if !self.filter.accepts(&entry.title, &entry.summary, usable_text) {
            tracing::debug!(title = %entry.title, "Rejected by keyword filter");
            return Ok(Ingest::Rejected);
        }

        let analysis_text = if usable_text.trim().is_empty() {
            format!("{}. {}", entry.title, entry.summary)
        } else {
            usable_text.to_string()
        };
        let snippet = truncate_chars(&entry.summary, SNIPPET_CHARS).to_string();
        let published_date = entry.published.format(STORED_DATE_FORMAT).to_string();
        let locations = self
            .gazetteer
            .locations(&format!("{snippet} {usable_text}"));

        self.store_analyzed(
            NewArticle {
                title: entry.title.clone(),
                link: entry.link.clone(),
                snippet,
                full_text,
                published_date,
                source: source.to_string(),
                locations,
                ..NewArticle::default()
            },
            &analysis_text,
        )
        .await
    }

    /// arXiv entries skip scraping and the keyword filter; the abstract is
    /// the analysis input.
    pub async fn ingest_arxiv_entry(&self, entry: &FeedEntry) -> Result<Ingest> {
        if self.store.exists(&entry.link).await? {
            return Ok(Ingest::AlreadyStored);
        }

        let snippet = truncate_chars(&entry.summary, SNIPPET_CHARS).to_string();
        let locations = self.gazetteer.locations(&entry.summary);
        let analysis_text = format!("{}. {}", entry.title, entry.summary);

        self.store_analyzed(
            NewArticle {
                title: entry.title.clone(),
                link: entry.link.clone(),
                snippet,
                published_date: entry.published.format(ARXIV_DATE_FORMAT).to_string(),
                source: ARXIV_SOURCE.to_string(),
                locations,
                ..NewArticle::default()
            },
            &analysis_text,
        )
        .await
    }

    async fn store_analyzed(&self, mut article: NewArticle, text: &str) -> Result<Ingest> {
        let analysis = self.analyzer.analyze(text, &article.published_date).await;
        article.summary = Some(analysis.summary);
        article.relevance_score = analysis.relevance;
        article.novelty_score = analysis.novelty;
        article.heat_score = analysis.heat;

        let title = article.title.clone();
        if self.store.insert(article).await? {
            tracing::info!(%title, relevance = analysis.relevance, "Stored article");
            Ok(Ingest::Inserted)
        } else {
            Ok(Ingest::Duplicate)
        }
    }

    async fn process_arxiv(&self) -> RunStats {
        let mut stats = RunStats::default();
        let entries = match self.fetcher.fetch_arxiv(&self.arxiv).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch arXiv");
                stats.failed_feeds += 1;
                return stats;
            }
        };

        tracing::debug!(entries = entries.len(), "Fetched arXiv");
        for entry in entries {
            stats.entries += 1;
            match self.ingest_arxiv_entry(&entry).await {
                Ok(outcome) => stats.record(outcome),
                Err(e) => {
                    tracing::warn!(link = %entry.link, error = %e, "Failed to store arXiv entry");
                    stats.errors += 1;
                }
            }
        }
        stats
    }
}

#[async_trait]
impl RefreshTrigger for Pipeline {
    async fn refresh(&self) -> Result<RunStats> {
        self.run_once().await
    }
}
