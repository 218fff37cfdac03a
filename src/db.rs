use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};

use crate::wordpress::Post;
use crate::{FetchError, Result};

/// Handle on the local posts database. Dropping it closes the connection.
pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    /// Open or create the database file along with its parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| FetchError::StoreDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        init(&conn)?;

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite posts by id, all in one transaction.
    pub fn upsert_many(&mut self, posts: &[Post]) -> Result<usize> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare_cached(
                "
                INSERT INTO posts
                (id, date, slug, status, type, link, title, content, excerpt)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(id) DO UPDATE SET
                    date = excluded.date,
                    slug = excluded.slug,
                    status = excluded.status,
                    type = excluded.type,
                    link = excluded.link,
                    title = excluded.title,
                    content = excluded.content,
                    excerpt = excluded.excerpt
                ",
            )?;

            for post in posts {
                stmt.execute(params![
                    post.id,
                    post.date,
                    post.slug,
                    post.status,
                    post.post_type,
                    post.link,
                    post.title,
                    post.content,
                    post.excerpt
                ])?;
            }
        }

        tx.commit()?;

        Ok(posts.len())
    }

    // Read back every stored post
    pub fn fetch_all(&self) -> Result<Vec<Post>> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, date, slug, status, type, link, title, content, excerpt
            FROM posts
            ORDER BY date ASC, id ASC
            ",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Post {
                id: row.get(0)?,
                date: row.get(1)?,
                slug: row.get(2)?,
                status: row.get(3)?,
                post_type: row.get(4)?,
                link: row.get(5)?,
                title: row.get(6)?,
                content: row.get(7)?,
                excerpt: row.get(8)?,
            })
        })?;

        let mut results = Vec::new();
        for post in rows {
            results.push(post?);
        }

        Ok(results)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| FetchError::Store(e))
    }
}

fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;

        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            date TEXT,
            slug TEXT,
            status TEXT,
            type TEXT,
            link TEXT,
            title TEXT,
            content TEXT,
            excerpt TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_posts_date
            ON posts (date);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: i64, title: &str) -> Post {
        Post {
            id,
            date: Some(format!("2024-01-{:02}T09:00:00", id)),
            slug: Some(format!("post-{}", id)),
            status: Some("publish".into()),
            post_type: Some("post".into()),
            link: Some(format!("https://blog.example.com/post-{}/", id)),
            title: Some(title.into()),
            content: Some(format!("<p>{}</p>\n", title)),
            excerpt: Some(format!("<p>{}…</p>", title)),
        }
    }

    #[test]
    fn open_creates_parent_directories_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/posts.db");

        let mut db = Database::open(&path).unwrap();
        db.upsert_many(&[post(1, "First")]).unwrap();
        db.close().unwrap();
        assert!(path.exists());

        let db = Database::open(&path).unwrap();
        assert_eq!(db.fetch_all().unwrap().len(), 1);
    }

    #[test]
    fn open_reports_unusable_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "plain file").unwrap();

        let err = Database::open(&blocker.join("posts.db")).err().unwrap();
        assert!(matches!(&err, FetchError::StoreDirectory { path, .. } if *path == blocker));
        assert!(err.to_string().starts_with("Store directory"));
    }

    #[test]
    fn round_trip_keeps_text_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("posts.db")).unwrap();

        let mut original = post(3, "Ünïcödé &amp; <em>markup</em>");
        original.content = Some("line one\nline two\r\n\ttabbed 日本語".into());
        db.upsert_many(&[original.clone()]).unwrap();

        assert_eq!(db.fetch_all().unwrap(), vec![original]);
    }

    #[test]
    fn upsert_replaces_existing_row() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("posts.db")).unwrap();

        db.upsert_many(&[post(5, "Draft title")]).unwrap();

        let mut updated = post(5, "Final title");
        updated.slug = None;
        db.upsert_many(&[updated.clone()]).unwrap();

        assert_eq!(db.fetch_all().unwrap(), vec![updated]);
    }

    #[test]
    fn upsert_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("posts.db")).unwrap();
        let batch = vec![post(1, "One"), post(2, "Two"), post(3, "Three")];

        assert_eq!(db.upsert_many(&batch).unwrap(), 3);
        let once = db.fetch_all().unwrap();

        db.upsert_many(&batch).unwrap();
        assert_eq!(db.fetch_all().unwrap(), once);
        assert_eq!(once, batch);
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("posts.db")).unwrap();

        assert_eq!(db.upsert_many(&[]).unwrap(), 0);
        assert!(db.fetch_all().unwrap().is_empty());
    }

    #[test]
    fn failed_batch_leaves_no_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("posts.db")).unwrap();
        db.upsert_many(&[post(1, "Kept")]).unwrap();

        db.conn
            .execute_batch(
                "CREATE TRIGGER reject_nine BEFORE INSERT ON posts
                 WHEN NEW.id = 9 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = db
            .upsert_many(&[post(2, "Two"), post(9, "Nine")])
            .unwrap_err();
        assert!(matches!(err, FetchError::Store(_)));

        assert_eq!(db.fetch_all().unwrap(), vec![post(1, "Kept")]);
    }
}
