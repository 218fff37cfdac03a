use std::path::PathBuf;
use tracing::info;

use crate::Result;
use crate::config::Settings;
use crate::db::Database;
use crate::wordpress::WordPressClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing matched the date filter; the database was not opened.
    NothingToDo,
    Stored { count: usize, path: PathBuf },
}

/// One full fetch-and-store pass.
pub async fn run(settings: &Settings) -> Result<SyncOutcome> {
    let client = WordPressClient::new(&settings.wordpress)?;
    let posts = client.fetch_posts().await?;

    if posts.is_empty() {
        info!("No posts found for the given date filter");
        return Ok(SyncOutcome::NothingToDo);
    }

    let mut db = Database::open(&settings.database.path)?;
    let count = db.upsert_many(&posts)?;
    let path = db.path().to_path_buf();
    db.close()?;

    info!("Stored {} posts in {}", count, path.display());

    Ok(SyncOutcome::Stored { count, path })
}
