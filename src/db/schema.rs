//! Versioned schema for the articles table, tracked in `PRAGMA user_version`.
//!
//! Earlier databases were reshaped by hand (columns dropped and re-added),
//! so every step only adds what is missing and never rebuilds the table.

use rusqlite::Connection;

pub const SCHEMA_VERSION: i64 = 3;

const CREATE_ARTICLES: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT,
    link TEXT UNIQUE,
    snippet TEXT,
    full_text TEXT,
    published_date TEXT,
    source TEXT,
    relevance_score REAL DEFAULT 0,
    novelty_score REAL DEFAULT 0,
    heat_score REAL DEFAULT 0,
    locations TEXT DEFAULT ''
);
"#;

/// Columns some older databases were created without.
const LEGACY_COLUMNS: &[(&str, &str)] = &[
    ("snippet", "TEXT"),
    ("full_text", "TEXT"),
    ("relevance_score", "REAL DEFAULT 0"),
    ("novelty_score", "REAL DEFAULT 0"),
    ("heat_score", "REAL DEFAULT 0"),
    ("locations", "TEXT DEFAULT ''"),
];

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_articles_source ON articles(source);
CREATE INDEX IF NOT EXISTS idx_articles_published_date ON articles(published_date DESC);
"#;

type MigrationResult = std::result::Result<(), tokio_rusqlite::Error>;

pub fn schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

pub fn migrate(conn: &mut Connection) -> MigrationResult {
    let mut current = schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(tokio_rusqlite::Error::Other(
            format!(
                "database schema version {current} is newer than supported version {SCHEMA_VERSION}"
            )
            .into(),
        ));
    }

    while current < SCHEMA_VERSION {
        let next = current + 1;
        let tx = conn.transaction()?;
        match next {
            1 => tx.execute_batch(CREATE_ARTICLES)?,
            2 => add_missing_columns(&tx, LEGACY_COLUMNS)?,
            3 => {
                add_missing_columns(&tx, &[("summary", "TEXT")])?;
                tx.execute_batch(INDEXES)?;
            }
            _ => unreachable!("no migration step for version {next}"),
        }
        tx.pragma_update(None, "user_version", next)?;
        tx.commit()?;
        tracing::debug!(version = next, "Applied schema migration");
        current = next;
    }

    Ok(())
}

fn add_missing_columns(conn: &Connection, columns: &[(&str, &str)]) -> rusqlite::Result<()> {
    let existing = column_names(conn)?;
    for (name, decl) in columns {
        if !existing.iter().any(|c| c == name) {
            conn.execute_batch(&format!("ALTER TABLE articles ADD COLUMN {name} {decl}"))?;
            tracing::info!(column = name, "Added missing articles column");
        }
    }
    Ok(())
}

fn column_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('articles')")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}
