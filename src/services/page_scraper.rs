use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::Result;
use crate::text::collapse_whitespace;

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Stored in `full_text` when the page answered with a non-success status.
pub const FETCH_FAILED: &str = "Error: Unable to fetch article";

/// Prefix of the placeholder stored when the request itself failed.
pub const EXTRACT_FAILED_PREFIX: &str = "Error extracting text: ";

/// True for the placeholder strings `extract_full_text` returns on failure.
pub fn is_scrape_error(text: &str) -> bool {
    text == FETCH_FAILED || text.starts_with(EXTRACT_FAILED_PREFIX)
}

pub struct PageScraper {
    client: Client,
}

impl PageScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }

    /// Paragraph text of the page at `url`. Never fails: network errors and
    /// bad statuses come back as an `Error...` placeholder string.
    pub async fn extract_full_text(&self, url: &str) -> String {
        match self.fetch_html(url).await {
            Ok(Some(html)) => extract_paragraph_text(&html),
            Ok(None) => FETCH_FAILED.to_string(),
            Err(e) => {
                tracing::debug!(%url, error = %e, "Error extracting text");
                format!("{EXTRACT_FAILED_PREFIX}{e}")
            }
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            tracing::debug!("Failed to fetch {}: {}", url, response.status());
            return Ok(None);
        }

        Ok(Some(response.text().await?))
    }
}

/// Text of every `<p>` element, ignoring anything inside `<script>` or
/// `<style>`, joined with single spaces.
pub fn extract_paragraph_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(paragraphs) = Selector::parse("p") else {
        return String::new();
    };

    let mut out = String::new();
    for paragraph in document.select(&paragraphs) {
        for node in paragraph.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| matches!(e.name(), "script" | "style"))
            });
            if !hidden {
                out.push_str(text);
            }
        }
        out.push(' ');
    }

    collapse_whitespace(&out)
}
