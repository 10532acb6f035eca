use std::path::Path;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use crate::error::CommitError;
use crate::summarizer::GlossaryEntry;

/// Curated tag vocabulary. Seeded once at init; the pipeline itself only
/// ever looks tags up and silently drops anything the model invents.
const TAG_VOCABULARY: [&str; 10] = [
    "verkehr",
    "wohnen",
    "stadtplanung",
    "umwelt",
    "soziales",
    "bildung",
    "kultur",
    "finanzen",
    "sicherheit",
    "verwaltung",
];

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS posts (
            id           INTEGER PRIMARY KEY,
            title        TEXT NOT NULL,
            url          TEXT UNIQUE NOT NULL,
            summary      TEXT NOT NULL,
            kids_summary TEXT NOT NULL,
            image        BLOB,
            created_at   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS hashtags (
            id   INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        );

        CREATE TABLE IF NOT EXISTS post_hashtags (
            post_id    INTEGER NOT NULL REFERENCES posts(id),
            hashtag_id INTEGER NOT NULL REFERENCES hashtags(id),
            PRIMARY KEY (post_id, hashtag_id)
        );

        CREATE TABLE IF NOT EXISTS glossary_entries (
            id          INTEGER PRIMARY KEY,
            post_id     INTEGER NOT NULL REFERENCES posts(id),
            term        TEXT NOT NULL,
            description TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_glossary_post ON glossary_entries(post_id);
        ",
    )?;

    let mut stmt = conn.prepare("INSERT OR IGNORE INTO hashtags (name) VALUES (?1)")?;
    for tag in TAG_VOCABULARY {
        stmt.execute([tag])?;
    }
    Ok(())
}

// ── Commit ──

pub struct NewPost {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub kids_summary: String,
    pub image: Option<Vec<u8>>,
    /// Bulletin date, ISO formatted.
    pub created_at: String,
}

/// Normalize a model-emitted tag for vocabulary lookup: trim, strip one
/// leading `#`, lowercase.
pub fn normalize_tag(raw: &str) -> String {
    raw.trim().trim_start_matches('#').trim().to_lowercase()
}

/// Commit one document's rows as a single unit of work.
///
/// The post insert is idempotent on url; reruns resolve the existing id.
/// Glossary rows for the post are fully replaced, never merged. Tags are
/// looked up by normalized name and unknown ones dropped without error.
pub fn commit_post(
    conn: &Connection,
    post: &NewPost,
    glossary: &[GlossaryEntry],
    tags: &[String],
) -> Result<i64, CommitError> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT OR IGNORE INTO posts (title, url, summary, kids_summary, image, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            post.title,
            post.url,
            post.summary,
            post.kids_summary,
            post.image,
            post.created_at,
        ],
    )?;

    let post_id: i64 = tx
        .query_row("SELECT id FROM posts WHERE url = ?1", [&post.url], |r| {
            r.get(0)
        })
        .optional()?
        .ok_or_else(|| CommitError::PostNotResolved(post.url.clone()))?;

    tx.execute("DELETE FROM glossary_entries WHERE post_id = ?1", [post_id])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO glossary_entries (post_id, term, description) VALUES (?1, ?2, ?3)",
        )?;
        for entry in glossary {
            stmt.execute(rusqlite::params![post_id, entry.term, entry.description])?;
        }
    }

    {
        let mut lookup = tx.prepare("SELECT id FROM hashtags WHERE name = ?1")?;
        let mut link = tx
            .prepare("INSERT OR IGNORE INTO post_hashtags (post_id, hashtag_id) VALUES (?1, ?2)")?;
        for tag in tags {
            let name = normalize_tag(tag);
            if name.is_empty() {
                continue;
            }
            let hashtag_id: Option<i64> = lookup.query_row([&name], |r| r.get(0)).optional()?;
            match hashtag_id {
                Some(id) => {
                    link.execute([post_id, id])?;
                }
                None => debug!(tag = %name, "dropping tag outside the vocabulary"),
            }
        }
    }

    tx.commit()?;
    Ok(post_id)
}

// ── Lookups ──

pub fn hashtag_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM hashtags ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub has_image: bool,
    pub tags: String,
    pub glossary_count: i64,
}

pub fn fetch_posts(conn: &Connection, limit: usize) -> Result<Vec<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.title, p.created_at, p.image IS NOT NULL,
                COALESCE((SELECT GROUP_CONCAT(h.name, ', ')
                          FROM post_hashtags ph JOIN hashtags h ON h.id = ph.hashtag_id
                          WHERE ph.post_id = p.id), ''),
                (SELECT COUNT(*) FROM glossary_entries g WHERE g.post_id = p.id)
         FROM posts p
         ORDER BY p.created_at DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |r| {
            Ok(PostRow {
                id: r.get(0)?,
                title: r.get(1)?,
                created_at: r.get(2)?,
                has_image: r.get(3)?,
                tags: r.get(4)?,
                glossary_count: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub posts: usize,
    pub glossary_entries: usize,
    pub tag_links: usize,
    pub hashtags: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<usize> {
        Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?)
    };
    Ok(Stats {
        posts: count("posts")?,
        glossary_entries: count("glossary_entries")?,
        tag_links: count("post_hashtags")?,
        hashtags: count("hashtags")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn sample_post(url: &str) -> NewPost {
        NewPost {
            title: "Radwege werden ausgebaut".into(),
            url: url.into(),
            summary: "Die Stadt baut das Radwegenetz aus.".into(),
            kids_summary: "Bald gibt es mehr Radwege.".into(),
            image: None,
            created_at: "2024-03-08".into(),
        }
    }

    fn entry(term: &str, description: &str) -> GlossaryEntry {
        GlossaryEntry {
            term: term.into(),
            description: description.into(),
        }
    }

    #[test]
    fn schema_seeds_vocabulary() {
        let conn = test_conn();
        let names = hashtag_names(&conn).unwrap();
        assert_eq!(names.len(), TAG_VOCABULARY.len());
        assert!(names.contains(&"verkehr".to_string()));
        // init is itself idempotent
        init_schema(&conn).unwrap();
        assert_eq!(hashtag_names(&conn).unwrap().len(), TAG_VOCABULARY.len());
    }

    #[test]
    fn commit_is_idempotent_on_url() {
        let conn = test_conn();
        let post = sample_post("https://x.test/ru-2024-03-08.pdf");
        let first = commit_post(&conn, &post, &[], &[]).unwrap();
        let second = commit_post(&conn, &post, &[], &[]).unwrap();
        assert_eq!(first, second);
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.posts, 1);
    }

    #[test]
    fn rerun_does_not_overwrite_post_fields() {
        let conn = test_conn();
        let url = "https://x.test/ru-2024-03-08.pdf";
        commit_post(&conn, &sample_post(url), &[], &[]).unwrap();
        let mut changed = sample_post(url);
        changed.title = "Anderer Titel".into();
        commit_post(&conn, &changed, &[], &[]).unwrap();
        let title: String = conn
            .query_row("SELECT title FROM posts WHERE url = ?1", [url], |r| r.get(0))
            .unwrap();
        assert_eq!(title, "Radwege werden ausgebaut");
    }

    #[test]
    fn glossary_is_fully_replaced() {
        let conn = test_conn();
        let post = sample_post("https://x.test/ru-2024-03-08.pdf");
        let post_id = commit_post(
            &conn,
            &post,
            &[entry("A", "erste"), entry("B", "zweite")],
            &[],
        )
        .unwrap();
        commit_post(&conn, &post, &[entry("C", "dritte")], &[]).unwrap();

        let mut stmt = conn
            .prepare("SELECT term FROM glossary_entries WHERE post_id = ?1 ORDER BY id")
            .unwrap();
        let terms: Vec<String> = stmt
            .query_map([post_id], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(terms, vec!["C"]);
    }

    #[test]
    fn tags_normalize_to_one_hashtag() {
        let conn = test_conn();
        let post = sample_post("https://x.test/ru-2024-03-08.pdf");
        let post_id = commit_post(
            &conn,
            &post,
            &[],
            &["#Verkehr".into(), "verkehr".into(), " VERKEHR ".into()],
        )
        .unwrap();

        let links: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM post_hashtags WHERE post_id = ?1",
                [post_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(links, 1);
        let name: String = conn
            .query_row(
                "SELECT h.name FROM post_hashtags ph JOIN hashtags h ON h.id = ph.hashtag_id
                 WHERE ph.post_id = ?1",
                [post_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(name, "verkehr");
    }

    #[test]
    fn unknown_tags_are_dropped_not_created() {
        let conn = test_conn();
        let before = get_stats(&conn).unwrap().hashtags;
        let post = sample_post("https://x.test/ru-2024-03-08.pdf");
        commit_post(
            &conn,
            &post,
            &[],
            &["#nonexistent_tag_xyz".into(), "  ".into(), "#".into()],
        )
        .unwrap();

        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.hashtags, before);
        assert_eq!(stats.tag_links, 0);
    }

    #[test]
    fn image_bytes_round_trip() {
        let conn = test_conn();
        let mut post = sample_post("https://x.test/ru-2024-03-08.pdf");
        post.image = Some(vec![0x89, 0x50, 0x4e, 0x47]);
        let post_id = commit_post(&conn, &post, &[], &[]).unwrap();
        let stored: Vec<u8> = conn
            .query_row("SELECT image FROM posts WHERE id = ?1", [post_id], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(stored, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn normalize_tag_rules() {
        assert_eq!(normalize_tag("#Verkehr"), "verkehr");
        assert_eq!(normalize_tag(" WOHNEN "), "wohnen");
        assert_eq!(normalize_tag("# kultur"), "kultur");
        assert_eq!(normalize_tag("#"), "");
        assert_eq!(normalize_tag("   "), "");
    }
}
