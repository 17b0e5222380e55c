use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;

use crate::config::ArxivQuery;
use crate::error::{AppError, Result};
use crate::models::FeedEntry;
use crate::text::{collapse_whitespace, html_to_text};

/// Which timestamp an entry is dated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    /// RSS `pubDate` / Atom `published`, then `updated`.
    Published,
    /// Atom `updated`, then `published` (arXiv revisions).
    Updated,
}

pub struct FeedFetcher {
    client: Client,
    days_limit: i64,
}

impl FeedFetcher {
    pub fn new(timeout: Duration, days_limit: i64) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("foresight/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, days_limit })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Entries published within the configured day window. Broken XML is
    /// logged and yields no entries.
    pub async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>> {
        let bytes = self.fetch_bytes(url).await?;
        match parse_entries(&bytes, self.cutoff(), DateField::Published) {
            Ok(entries) => Ok(entries),
            Err(AppError::FeedParse(e)) => {
                tracing::warn!(%url, error = %e, "Error parsing feed");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Oldest accepted publication time. A window reaching past the
    /// representable range means no cutoff.
    fn cutoff(&self) -> Option<DateTime<Utc>> {
        TimeDelta::try_days(self.days_limit).and_then(|d| Utc::now().checked_sub_signed(d))
    }

    pub async fn fetch_arxiv(&self, query: &ArxivQuery) -> Result<Vec<FeedEntry>> {
        let url = query.url();
        let bytes = self.fetch_bytes(&url).await?;
        parse_entries(&bytes, None, DateField::Updated)
    }
}

/// Parse an RSS/Atom document. Entries with no link or no date are skipped,
/// as are entries dated before `cutoff`.
pub fn parse_entries(
    bytes: &[u8],
    cutoff: Option<DateTime<Utc>>,
    date_field: DateField,
) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_from_feed(entry, date_field))
        .filter(|entry| match cutoff {
            Some(cutoff) => entry.published >= cutoff,
            None => true,
        })
        .collect();

    Ok(entries)
}

fn entry_from_feed(entry: Entry, date_field: DateField) -> Option<FeedEntry> {
    let title = entry
        .title
        .map(|t| collapse_whitespace(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".to_string());

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty());
    let Some(link) = link else {
        tracing::debug!(%title, "Skipping entry without a link");
        return None;
    };

    let published = match date_field {
        DateField::Published => entry.published.or(entry.updated),
        DateField::Updated => entry.updated.or(entry.published),
    };
    let Some(published) = published else {
        tracing::debug!(%title, "Skipping entry (missing date)");
        return None;
    };

    // Try summary first, then fall back to content
    let summary_html = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();

    Some(FeedEntry {
        title,
        link,
        summary: html_to_text(&summary_html),
        published,
    })
}
