mod client;
mod scoring;
mod summarizer;

pub use client::{Embedder, InferenceClient, TextGeneration};
pub use scoring::{strategy_for, Analyzer, KeywordHeuristic, RelevanceScorer, STORED_DATE_FORMAT};
pub use summarizer::{is_error_summary, Summarizer, SummarySections};
