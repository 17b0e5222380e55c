use std::path::Path;
use std::sync::Arc;

use clap::Parser;

mod ai;
mod catalog;
mod cli;
mod config;
mod dashboard;
mod db;
mod error;
mod feed;
mod filter;
mod geo;
mod models;
mod pipeline;
mod services;
mod text;

use ai::{strategy_for, Analyzer, InferenceClient, RelevanceScorer, Summarizer};
use catalog::Catalog;
use cli::{Cli, Command, ListArgs};
use config::Config;
use dashboard::Dashboard;
use db::{ArticleStore, SCHEMA_VERSION};
use error::Result;
use geo::Gazetteer;
use pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG overrides; pipeline progress is logged at info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let catalog = Arc::new(config.catalog()?);

    let store = ArticleStore::open(&config.db_path).await?;
    tracing::debug!(db = %store.path().display(), "Opened article store");

    match cli.command {
        Command::Summarize { path } => summarize_file(&config, &catalog, store, &path).await?,
        Command::Fetch { watch } => {
            let pipeline = Pipeline::new(&config, catalog, store)?;
            if watch {
                pipeline.run_forever().await?;
            } else {
                let stats = pipeline.run_once().await?;
                println!(
                    "Inserted {} new articles ({} already stored, {} filtered out, {} errors)",
                    stats.inserted, stats.skipped, stats.rejected, stats.errors
                );
            }
        }
        Command::List(args) => list(&config, catalog, store, &args).await?,
        Command::Suggest { text } => {
            let dashboard = Dashboard::new(store, catalog);
            for title in dashboard.suggestions(&text).await? {
                println!("{title}");
            }
        }
        Command::Locations => {
            let gazetteer = Gazetteer::from_catalog(&catalog);
            let updated = store
                .rebuild_locations(move |text| gazetteer.locations(text))
                .await?;
            println!("Updated locations for {updated} articles");
        }
        Command::Normalize => {
            let updated = store.normalize_relevance().await?;
            println!("Normalized relevance for {updated} articles");
        }
        Command::Countries(args) => {
            let mut dashboard = open_dashboard(&config, catalog, store, &args)?;
            if args.refresh {
                dashboard.refresh().await?;
            }
            let articles = dashboard.articles(&args.query()).await?;
            let mut counts: Vec<_> = dashboard.country_counts(&articles).into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            for (country, count) in counts {
                println!("{count:>5}  {country}");
            }
        }
        Command::Migrate => {
            println!(
                "{} is at schema version {} ({} articles)",
                store.path().display(),
                SCHEMA_VERSION,
                store.count().await?
            );
        }
    }

    Ok(())
}

fn open_dashboard(
    config: &Config,
    catalog: Arc<Catalog>,
    store: ArticleStore,
    args: &ListArgs,
) -> Result<Dashboard> {
    let dashboard = Dashboard::new(store.clone(), catalog.clone());
    if !args.refresh {
        return Ok(dashboard);
    }
    let pipeline = Pipeline::new(config, catalog, store)?;
    Ok(dashboard.with_trigger(Arc::new(pipeline)))
}

async fn list(
    config: &Config,
    catalog: Arc<Catalog>,
    store: ArticleStore,
    args: &ListArgs,
) -> Result<()> {
    let mut dashboard = open_dashboard(config, catalog, store, args)?;
    if args.refresh {
        let stats = dashboard.refresh().await?;
        eprintln!("Refreshed: {} new articles", stats.inserted);
    }

    let articles = dashboard.articles(&args.query()).await?;
    if articles.is_empty() {
        println!("No articles found.");
        return Ok(());
    }

    for article in articles {
        let card = dashboard.card(article);
        let a = &card.article;
        println!("{}", a.title);
        if !card.categories.is_empty() {
            println!("  [{}]", card.categories.join("] ["));
        }
        println!(
            "  {} | {} | relevance {:>3} | novelty {:>3} | heat {:>3}",
            a.source, a.published_date, card.relevance_bar, card.novelty_bar, card.heat_bar
        );
        if card.sections.is_structured() {
            let core = card.sections.core_innovations.as_deref().unwrap_or("-");
            println!("  Core innovations: {}", core.lines().next().unwrap_or(core));
        } else {
            for line in &card.preview.lead {
                println!("  {line}");
            }
            if card.preview.has_more() {
                println!("  ... continue reading ({} more lines)", card.preview.rest.len());
            }
        }
        if !a.locations.is_empty() {
            println!("  Locations: {}", a.locations);
        }
        println!("  {}", a.link);
        println!();
    }
    Ok(())
}

/// Summary and scores for one local document. Nothing is written to the
/// store; LLM-rated heat only reads mention counts from it.
async fn summarize_file(
    config: &Config,
    catalog: &Catalog,
    store: ArticleStore,
    path: &Path,
) -> Result<()> {
    let text = services::extract_document_text(path)?;
    tracing::info!(path = %path.display(), chars = text.len(), "Extracted document text");

    let client = Arc::new(InferenceClient::new(config)?);
    let analyzer = Analyzer::new(
        Summarizer::new(client.clone(), config.max_new_tokens),
        RelevanceScorer::new(client.clone(), catalog),
        strategy_for(config.score_strategy, catalog, client, store)?,
    );

    let analysis = analyzer.analyze(&text, "").await;
    println!("SUMMARY: {}", analysis.summary);
    println!("RELEVANCE SCORE: {:.2}", analysis.relevance);
    println!("NOVELTY SCORE: {:.2}", analysis.novelty);
    println!("HEAT SCORE: {:.2}", analysis.heat);
    Ok(())
}
