use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Days;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Row};
use tokio_rusqlite::Connection;

use crate::catalog::{Catalog, ARXIV_SOURCE};
use crate::error::Result;
use crate::models::{Article, ArticleQuery, NewArticle, SourceFilter};

use super::schema;

const ARTICLE_COLUMNS: &str = "id, title, link, snippet, summary, full_text, published_date, \
     source, relevance_score, novelty_score, heat_score, locations";

/// Concurrent feed workers each hold their own connection; wait for the
/// writer lock instead of failing with SQLITE_BUSY.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// The `articles` table. Every operation opens its own connection and closes
/// it when done.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    path: PathBuf,
}

impl ArticleStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.create_table_if_not_exists().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).await?;
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await?;
        Ok(conn)
    }

    pub async fn create_table_if_not_exists(&self) -> Result<()> {
        let conn = self.connect().await?;
        conn.call(schema::migrate).await?;
        Ok(())
    }

    /// Insert-or-ignore keyed by `link`. Returns whether a row was written.
    pub async fn insert(&self, article: NewArticle) -> Result<bool> {
        let conn = self.connect().await?;
        let inserted = conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"INSERT OR IGNORE INTO articles
                           (title, link, snippet, summary, full_text, published_date, source,
                            relevance_score, novelty_score, heat_score, locations)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                    params![
                        article.title,
                        article.link,
                        article.snippet,
                        article.summary,
                        article.full_text,
                        article.published_date,
                        article.source,
                        article.relevance_score,
                        article.novelty_score,
                        article.heat_score,
                        article.locations,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn exists(&self, link: &str) -> Result<bool> {
        let link = link.to_string();
        let conn = self.connect().await?;
        let exists = conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE link = ?1",
                    params![link],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    pub async fn count(&self) -> Result<i64> {
        let conn = self.connect().await?;
        let count = conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?))
            .await?;
        Ok(count)
    }

    pub async fn query(&self, query: &ArticleQuery, catalog: &Catalog) -> Result<Vec<Article>> {
        let (sql, values) = build_select(query, catalog);
        let conn = self.connect().await?;
        let articles = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params_from_iter(values.iter()), article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    /// Up to `limit` distinct titles containing `text`, for autocomplete.
    pub async fn title_suggestions(&self, text: &str, limit: usize) -> Result<Vec<String>> {
        let pattern = format!("%{}%", text.trim());
        let limit = limit as i64;
        let conn = self.connect().await?;
        let titles = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT title FROM articles WHERE title LIKE ?1 ORDER BY title LIMIT ?2",
                )?;
                let titles = stmt
                    .query_map(params![pattern, limit], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(titles)
            })
            .await?;
        Ok(titles)
    }

    /// Number of stored articles whose text mentions `term`.
    pub async fn count_mentions(&self, term: &str) -> Result<i64> {
        let pattern = format!("%{term}%");
        let conn = self.connect().await?;
        let count = conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    r#"SELECT COUNT(*) FROM articles
                       WHERE full_text LIKE ?1 OR snippet LIKE ?1 OR summary LIKE ?1"#,
                    params![pattern],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    /// Recompute `locations` for every row from snippet + full text.
    pub async fn rebuild_locations<F>(&self, extract: F) -> Result<usize>
    where
        F: Fn(&str) -> String + Send + 'static,
    {
        let conn = self.connect().await?;
        let updated = conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare("SELECT id, snippet, full_text FROM articles")?;
                    let rows = stmt
                        .query_map([], |row| {
                            Ok((
                                row.get::<_, i64>(0)?,
                                row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                                row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            ))
                        })?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                };

                for (id, snippet, full_text) in &rows {
                    let locations = extract(&format!("{snippet} {full_text}"));
                    tx.execute(
                        "UPDATE articles SET locations = ?1 WHERE id = ?2",
                        params![locations, id],
                    )?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        Ok(updated)
    }

    /// Rescale relevance so the highest stored score becomes 100.
    pub async fn normalize_relevance(&self) -> Result<usize> {
        let conn = self.connect().await?;
        let updated = conn
            .call(|conn| {
                let max: Option<f64> =
                    conn.query_row("SELECT MAX(relevance_score) FROM articles", [], |row| {
                        row.get(0)
                    })?;
                let updated = match max {
                    Some(max) if max > 0.0 => conn.execute(
                        "UPDATE articles SET relevance_score = COALESCE(relevance_score, 0) / ?1 * 100.0",
                        params![max],
                    )?,
                    _ => conn.execute("UPDATE articles SET relevance_score = 0", [])?,
                };
                Ok(updated)
            })
            .await?;
        Ok(updated)
    }
}

/// Builds the filtered, sorted SELECT and its positional parameters.
/// All predicates are AND-ed; category keyword groups are OR-ed inside.
fn build_select(query: &ArticleQuery, catalog: &Catalog) -> (String, Vec<String>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<String> = Vec::new();

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        conditions.push("(title LIKE ? OR snippet LIKE ?)".to_string());
        let pattern = format!("%{search}%");
        values.push(pattern.clone());
        values.push(pattern);
    }

    match &query.source {
        SourceFilter::All => {}
        SourceFilter::Rss => {
            conditions.push("source != ?".to_string());
            values.push(ARXIV_SOURCE.to_string());
        }
        SourceFilter::Arxiv => {
            conditions.push("source = ?".to_string());
            values.push(ARXIV_SOURCE.to_string());
        }
        SourceFilter::Named(name) => {
            conditions.push("source = ?".to_string());
            values.push(name.clone());
        }
    }

    let mut groups = Vec::new();
    for name in &query.categories {
        let Some(category) = catalog.category(name) else {
            tracing::warn!(category = %name, "Ignoring unknown category");
            continue;
        };
        let mut alternatives = Vec::new();
        for keyword in &category.keywords {
            alternatives.push("(title LIKE ? OR snippet LIKE ?)");
            let pattern = format!("%{keyword}%");
            values.push(pattern.clone());
            values.push(pattern);
        }
        if !alternatives.is_empty() {
            groups.push(format!("({})", alternatives.join(" OR ")));
        }
    }
    if !groups.is_empty() {
        conditions.push(format!("({})", groups.join(" OR ")));
    }

    if let Some(range) = query.date_range {
        conditions.push("published_date >= ?".to_string());
        values.push(range.start.format("%Y-%m-%d").to_string());
        if let Some(after_end) = range.end.checked_add_days(Days::new(1)) {
            conditions.push("published_date < ?".to_string());
            values.push(after_end.format("%Y-%m-%d").to_string());
        }
    }

    let mut sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(&format!(" ORDER BY {}, id DESC", query.sort.order_by()));
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    (sql, values)
}

/// Scores were stored as TEXT by some older writers; read anything numeric.
fn score_at(row: &Row, idx: usize) -> rusqlite::Result<f64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(v) => v,
        ValueRef::Integer(v) => v as f64,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

fn text_at(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(row.get::<_, Option<String>>(idx)?.unwrap_or_default())
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        title: text_at(row, 1)?,
        link: text_at(row, 2)?,
        snippet: text_at(row, 3)?,
        summary: row.get(4)?,
        full_text: text_at(row, 5)?,
        published_date: text_at(row, 6)?,
        source: text_at(row, 7)?,
        relevance_score: score_at(row, 8)?,
        novelty_score: score_at(row, 9)?,
        heat_score: score_at(row, 10)?,
        locations: text_at(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateRange, SortOrder};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, ArticleStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArticleStore::open(dir.path().join("articles.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn article(link: &str, title: &str, source: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            link: link.to_string(),
            snippet: String::new(),
            summary: None,
            full_text: String::new(),
            published_date: "2026-10-14 10:00:00".to_string(),
            source: source.to_string(),
            relevance_score: 0.0,
            novelty_score: 0.0,
            heat_score: 0.0,
            locations: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_round_trips_every_field() {
        let (_dir, store) = temp_store().await;
        let new = NewArticle {
            title: "Breakthrough in CO2 capture".to_string(),
            link: "https://x/1".to_string(),
            snippet: "A new sorbent".to_string(),
            summary: Some("CORE INNOVATIONS:\n- sorbent".to_string()),
            full_text: "Full body about carbon capture in Norway".to_string(),
            published_date: "2026-10-14 10:00:00".to_string(),
            source: "Rigzone".to_string(),
            relevance_score: 71.5,
            novelty_score: 40.25,
            heat_score: 88.0,
            locations: "Norway".to_string(),
        };

        assert!(store.insert(new.clone()).await.unwrap());
        let rows = store
            .query(&ArticleQuery::default(), &Catalog::default())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        let got = &rows[0];
        assert_eq!(got.title, new.title);
        assert_eq!(got.link, new.link);
        assert_eq!(got.snippet, new.snippet);
        assert_eq!(got.summary, new.summary);
        assert_eq!(got.full_text, new.full_text);
        assert_eq!(got.published_date, new.published_date);
        assert_eq!(got.source, new.source);
        assert_eq!(got.relevance_score, new.relevance_score);
        assert_eq!(got.novelty_score, new.novelty_score);
        assert_eq!(got.heat_score, new.heat_score);
        assert_eq!(got.locations, new.locations);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_of_one_link_write_once() {
        let (_dir, store) = temp_store().await;

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(article("https://x/shared", &format!("Writer {i}"), "Rigzone"))
                        .await
                })
            })
            .collect();

        let mut written = 0;
        for writer in writers {
            if writer.await.unwrap().unwrap() {
                written += 1;
            }
        }

        assert_eq!(written, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_link_keeps_original_row() {
        let (_dir, store) = temp_store().await;

        assert!(store
            .insert(article("https://x/1", "Breakthrough in CO2 capture", "Rigzone"))
            .await
            .unwrap());
        assert!(!store
            .insert(article("https://x/1", "Something else entirely", "Rigzone"))
            .await
            .unwrap());

        let rows = store
            .query(&ArticleQuery::default(), &Catalog::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Breakthrough in CO2 capture");
        assert!(store.exists("https://x/1").await.unwrap());
        assert!(!store.exists("https://x/2").await.unwrap());
    }

    #[tokio::test]
    async fn arxiv_filter_returns_only_arxiv_rows() {
        let (_dir, store) = temp_store().await;
        store.insert(article("https://x/1", "Feed item", "Rigzone")).await.unwrap();
        store.insert(article("https://x/2", "Paper", ARXIV_SOURCE)).await.unwrap();
        store.insert(article("https://x/3", "Other feed", "BOE Report")).await.unwrap();
        let catalog = Catalog::default();

        let arxiv = store
            .query(
                &ArticleQuery {
                    source: SourceFilter::Arxiv,
                    ..Default::default()
                },
                &catalog,
            )
            .await
            .unwrap();
        assert_eq!(arxiv.len(), 1);
        assert!(arxiv.iter().all(|a| a.source == ARXIV_SOURCE));

        let rss = store
            .query(
                &ArticleQuery {
                    source: SourceFilter::Rss,
                    ..Default::default()
                },
                &catalog,
            )
            .await
            .unwrap();
        assert_eq!(rss.len(), 2);
        assert!(rss.iter().all(|a| a.source != ARXIV_SOURCE));

        let named = store
            .query(
                &ArticleQuery {
                    source: SourceFilter::Named("BOE Report".to_string()),
                    ..Default::default()
                },
                &catalog,
            )
            .await
            .unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].link, "https://x/3");
    }

    #[tokio::test]
    async fn category_and_search_intersect() {
        let (_dir, store) = temp_store().await;
        store
            .insert(article("https://x/1", "Hydrogen hub opens", "Rigzone"))
            .await
            .unwrap();
        store
            .insert(article("https://x/2", "Pipeline tariff dispute", "Rigzone"))
            .await
            .unwrap();
        store
            .insert(article("https://x/3", "Hydrogen pipeline trial", "Rigzone"))
            .await
            .unwrap();
        let catalog = Catalog::default();

        let both = store
            .query(
                &ArticleQuery {
                    search: Some("pipeline".to_string()),
                    categories: vec!["Sustainability & Energy Transition".to_string()],
                    ..Default::default()
                },
                &catalog,
            )
            .await
            .unwrap();

        let links: Vec<_> = both.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["https://x/3"]);
    }

    #[tokio::test]
    async fn date_range_includes_end_day_and_sort_applies() {
        let (_dir, store) = temp_store().await;
        let mut early = article("https://x/1", "Early", "Rigzone");
        early.published_date = "2026-10-01 08:00:00".to_string();
        early.heat_score = 10.0;
        let mut late = article("https://x/2", "Late", "Rigzone");
        late.published_date = "2026-10-14 23:59:00".to_string();
        late.heat_score = 90.0;
        let mut paper = article("https://x/3", "Paper", ARXIV_SOURCE);
        paper.published_date = "2026-10-10T12:00:00Z".to_string();
        paper.heat_score = 50.0;
        for a in [early, late, paper] {
            store.insert(a).await.unwrap();
        }

        let rows = store
            .query(
                &ArticleQuery {
                    date_range: Some(DateRange {
                        start: NaiveDate::from_ymd_opt(2026, 10, 10).unwrap(),
                        end: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
                    }),
                    sort: SortOrder::Heat,
                    ..Default::default()
                },
                &Catalog::default(),
            )
            .await
            .unwrap();

        let titles: Vec<_> = rows.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Late", "Paper"]);
    }

    #[tokio::test]
    async fn suggestions_and_mentions() {
        let (_dir, store) = temp_store().await;
        let mut a = article("https://x/1", "Carbon capture in Texas", "Rigzone");
        a.full_text = "digital twin rollout".to_string();
        store.insert(a).await.unwrap();
        store
            .insert(article("https://x/2", "Carbon pricing update", "Rigzone"))
            .await
            .unwrap();

        let titles = store.title_suggestions("carbon", 5).await.unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(store.count_mentions("digital twin").await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn maintenance_rewrites_locations_and_relevance() {
        let (_dir, store) = temp_store().await;
        let mut a = article("https://x/1", "A", "Rigzone");
        a.full_text = "Drilling in Canada".to_string();
        a.relevance_score = 20.0;
        let mut b = article("https://x/2", "B", "Rigzone");
        b.relevance_score = 40.0;
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let updated = store
            .rebuild_locations(|text| {
                if text.contains("Canada") {
                    "Canada".to_string()
                } else {
                    String::new()
                }
            })
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.normalize_relevance().await.unwrap(), 2);

        let rows = store
            .query(&ArticleQuery::default(), &Catalog::default())
            .await
            .unwrap();
        assert_eq!(rows[0].link, "https://x/2");
        assert_eq!(rows[0].relevance_score, 100.0);
        assert_eq!(rows[1].relevance_score, 50.0);
        assert_eq!(rows[1].locations, "Canada");
        assert_eq!(rows[0].locations, "");
    }

    #[test]
    fn select_without_filters_has_no_where_clause() {
        let (sql, values) = build_select(&ArticleQuery::default(), &Catalog::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("ORDER BY relevance_score DESC, id DESC"));
        assert!(values.is_empty());
    }

    #[test]
    fn unknown_category_adds_no_predicate() {
        let query = ArticleQuery {
            categories: vec!["Basket Weaving".to_string()],
            limit: Some(5),
            ..Default::default()
        };
        let (sql, values) = build_select(&query, &Catalog::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.ends_with("LIMIT 5"));
        assert!(values.is_empty());
    }
}
