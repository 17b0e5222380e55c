use std::sync::Arc;

use crate::error::Result;
use crate::text::truncate_chars;

use super::client::TextGeneration;

/// Input beyond this many characters is cut before prompting.
const MAX_INPUT_CHARS: usize = 8000;

pub const ERROR_PREFIX: &str = "Error:";

const SECTION_MARKERS: [&str; 4] = [
    "CORE INNOVATIONS",
    "INDUSTRY IMPACT",
    "STRATEGIC OPPORTUNITIES",
    "EMERGING PLAYERS",
];

pub struct Summarizer {
    generator: Arc<dyn TextGeneration>,
    max_new_tokens: u32,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGeneration>, max_new_tokens: u32) -> Self {
        Self {
            generator,
            max_new_tokens,
        }
    }

    pub async fn generate_summary(&self, text: &str) -> Result<String> {
        let prompt = build_prompt(truncate_chars(text, MAX_INPUT_CHARS));
        self.generator.generate(&prompt, self.max_new_tokens).await
    }

    /// Like [`generate_summary`](Self::generate_summary), but a failure comes
    /// back as an `Error: ...` string instead.
    pub async fn summarize(&self, text: &str) -> String {
        match self.generate_summary(text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Summary generation failed");
                format!("{ERROR_PREFIX} {e}")
            }
        }
    }
}

pub fn is_error_summary(summary: &str) -> bool {
    summary.starts_with(ERROR_PREFIX)
}

fn build_prompt(text: &str) -> String {
    format!(
        r#"You are an advanced AI model specializing in analyzing and summarizing articles related to technology, innovation, and industry trends.
Your task is to generate a detailed summary for ADNOC's strategic needs.

Article text:
{text}

Please provide a comprehensive analysis in the following format:

CORE INNOVATIONS:
- [List key technological innovations and advancements]

INDUSTRY IMPACT:
- [Analyze impact on oil & gas industry]
- [Discuss market implications]

STRATEGIC OPPORTUNITIES:
- [Identify opportunities for ADNOC]
- [Highlight potential applications]

EMERGING PLAYERS:
- [List relevant emerging companies/startups]
- [Focus on non-obvious players]
"#
    )
}

/// A summary split on its section headings. Models do not always follow the
/// requested layout, so every section is optional and anything before the
/// first heading lands in `preamble`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummarySections {
    pub preamble: String,
    pub core_innovations: Option<String>,
    pub industry_impact: Option<String>,
    pub strategic_opportunities: Option<String>,
    pub emerging_players: Option<String>,
}

impl SummarySections {
    pub fn parse(summary: &str) -> Self {
        let mut found: Vec<(usize, usize)> = SECTION_MARKERS
            .iter()
            .enumerate()
            .filter_map(|(idx, marker)| summary.find(marker).map(|pos| (pos, idx)))
            .collect();
        found.sort_unstable();

        let mut sections = Self {
            preamble: summary[..found.first().map_or(summary.len(), |f| f.0)]
                .trim()
                .to_string(),
            ..Self::default()
        };

        for (i, &(pos, idx)) in found.iter().enumerate() {
            let start = pos + SECTION_MARKERS[idx].len();
            let end = found.get(i + 1).map_or(summary.len(), |next| next.0);
            let body = summary[start..end]
                .trim_start()
                .trim_start_matches(':')
                .trim()
                .to_string();

            let slot = match idx {
                0 => &mut sections.core_innovations,
                1 => &mut sections.industry_impact,
                2 => &mut sections.strategic_opportunities,
                _ => &mut sections.emerging_players,
            };
            *slot = Some(body);
        }

        sections
    }

    pub fn is_structured(&self) -> bool {
        self.core_innovations.is_some()
            || self.industry_impact.is_some()
            || self.strategic_opportunities.is_some()
            || self.emerging_players.is_some()
    }
}
