//! Command-line interface definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::models::{ArticleQuery, DateRange, SortOrder, SourceFilter};

/// Oil & gas technology news ingestion, scoring and search.
///
/// ```sh
/// # One ingestion cycle
/// foresight fetch
///
/// # Keep ingesting every `cycle_interval_secs`
/// foresight fetch --watch
///
/// # Hydrogen news from the last week, hottest first
/// foresight list --search hydrogen --from 2026-10-12 --sort heat
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, scrape, score and store new articles
    Fetch {
        /// Repeat the cycle until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Summarise and score a single PDF or text file
    Summarize {
        /// Input file
        path: PathBuf,
    },

    /// Query stored articles
    List(ListArgs),

    /// Suggest article titles containing the given text
    Suggest { text: String },

    /// Recompute the locations column for every article
    Locations,

    /// Rescale relevance scores so the highest is 100
    Normalize,

    /// Count articles per mentioned country
    Countries(ListArgs),

    /// Create or upgrade the database schema
    Migrate,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Free text matched against title and snippet
    #[arg(short, long)]
    pub search: Option<String>,

    /// all, rss, arxiv or an exact feed name
    #[arg(long, default_value = "all")]
    pub source: SourceFilter,

    /// Category name; repeat to match any of several
    #[arg(long = "category")]
    pub categories: Vec<String>,

    /// First published day (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last published day, inclusive (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// relevance, novelty, heat or date
    #[arg(long, default_value = "relevance")]
    pub sort: SortOrder,

    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Run an ingestion cycle before querying
    #[arg(long)]
    pub refresh: bool,
}

impl ListArgs {
    /// An open end of the date range is filled from the other end, or from
    /// today / the earliest possible day.
    pub fn query(&self) -> ArticleQuery {
        let date_range = match (self.from, self.to) {
            (None, None) => None,
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            (Some(start), None) => Some(DateRange {
                start,
                end: chrono::Local::now().date_naive(),
            }),
            (None, Some(end)) => Some(DateRange {
                start: NaiveDate::default(),
                end,
            }),
        };

        ArticleQuery {
            search: self
                .search
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            source: self.source.clone(),
            categories: self.categories.clone(),
            date_range,
            sort: self.sort,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_watch_flag() {
        let cli = Cli::parse_from(["foresight", "fetch", "--watch"]);
        assert!(matches!(cli.command, Command::Fetch { watch: true }));
        assert!(cli.config.is_none());
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::parse_from(["foresight", "migrate", "--config", "/tmp/f.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/f.toml")));
        assert!(matches!(cli.command, Command::Migrate));
    }

    #[test]
    fn list_arguments_build_query() {
        let cli = Cli::parse_from([
            "foresight",
            "list",
            "--search",
            " hydrogen ",
            "--source",
            "arXiv",
            "--category",
            "Sustainability & Energy Transition",
            "--category",
            "Oil & Gas Industry",
            "--from",
            "2026-10-01",
            "--to",
            "2026-10-18",
            "--sort",
            "heat",
            "-l",
            "20",
        ]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };

        let query = args.query();
        assert_eq!(query.search.as_deref(), Some("hydrogen"));
        assert_eq!(query.source, SourceFilter::Arxiv);
        assert_eq!(query.categories.len(), 2);
        assert_eq!(
            query.date_range,
            Some(DateRange {
                start: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            })
        );
        assert_eq!(query.sort, SortOrder::Heat);
        assert_eq!(query.limit, Some(20));
        assert!(!args.refresh);
    }

    #[test]
    fn list_defaults() {
        let cli = Cli::parse_from(["foresight", "list"]);
        let Command::List(args) = cli.command else {
            panic!("expected list");
        };
        assert_eq!(args.query(), ArticleQuery::default());
    }

    #[test]
    fn bad_sort_is_rejected() {
        assert!(Cli::try_parse_from(["foresight", "list", "--sort", "popularity"]).is_err());
        assert!(Cli::try_parse_from(["foresight", "list", "--from", "yesterday"]).is_err());
    }

    #[test]
    fn summarize_takes_positional_path() {
        let cli = Cli::parse_from(["foresight", "summarize", "report.pdf"]);
        let Command::Summarize { path } = cli.command else {
            panic!("expected summarize");
        };
        assert_eq!(path, PathBuf::from("report.pdf"));
    }
}
