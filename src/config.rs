use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::{FetchError, Result};

const DEFAULT_PER_PAGE: u32 = 100;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DATABASE_PATH: &str = "data/wp_posts.db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub wordpress: WordPressSettings,
    pub database: DatabaseSettings,
}

/// Everything needed to reach the WordPress REST API.
#[derive(Debug, Clone)]
pub struct WordPressSettings {
    /// Site root without trailing slash
    pub base_url: String,
    pub username: Option<String>,
    pub application_password: Option<String>,
    /// Cutoff as written in the config; normalized when the request is built
    pub date: String,
    pub per_page: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: PathBuf,
}

// File layout, before validation
#[derive(Debug, Deserialize)]
struct RawConfig {
    wordpress: Option<RawWordPress>,
    database: Option<RawDatabase>,
}

#[derive(Debug, Deserialize)]
struct RawWordPress {
    base_url: Option<String>,
    username: Option<String>,
    application_password: Option<String>,
    date: Option<String>,
    per_page: Option<toml::Value>,
    timeout_secs: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    path: Option<PathBuf>,
}

pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(FetchError::ConfigNotFound(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|e| {
        FetchError::ConfigMalformed(format!("failed to read {}: {}", path.display(), e))
    })?;

    parse(&text)
}

pub fn parse(text: &str) -> Result<Settings> {
    let raw: RawConfig =
        toml::from_str(text).map_err(|e| FetchError::ConfigMalformed(e.to_string()))?;

    let (Some(wordpress), Some(database)) = (raw.wordpress, raw.database) else {
        return Err(FetchError::ConfigMalformed(
            "configuration must include [wordpress] and [database] sections".into(),
        ));
    };

    let per_page = positive_integer("per_page", wordpress.per_page, DEFAULT_PER_PAGE.into())?;
    let per_page = u32::try_from(per_page)
        .map_err(|_| FetchError::ConfigInvalid("'per_page' is too large".into()))?;
    let timeout_secs =
        positive_integer("timeout_secs", wordpress.timeout_secs, DEFAULT_TIMEOUT_SECS)?;

    let base_url = required("base_url", wordpress.base_url)?
        .trim()
        .trim_end_matches('/')
        .to_string();
    if base_url.is_empty() {
        return Err(FetchError::ConfigInvalid(
            "'base_url' in the [wordpress] section is empty".into(),
        ));
    }
    match Url::parse(&base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => {
            return Err(FetchError::ConfigInvalid(format!(
                "'base_url' is not an http(s) URL: {}",
                base_url
            )));
        }
    }

    let date = required("date", wordpress.date)?.trim().to_string();
    if date.is_empty() {
        return Err(FetchError::ConfigInvalid(
            "'date' in the [wordpress] section is empty".into(),
        ));
    }

    Ok(Settings {
        wordpress: WordPressSettings {
            base_url,
            username: non_empty(wordpress.username),
            application_password: non_empty(wordpress.application_password),
            date,
            per_page,
            timeout_secs,
        },
        database: DatabaseSettings {
            path: database
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH)),
        },
    })
}

fn required(key: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| FetchError::ConfigMalformed(format!("missing '{}' in [wordpress]", key)))
}

fn positive_integer(key: &str, value: Option<toml::Value>, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(toml::Value::Integer(n)) if n > 0 => Ok(n as u64),
        Some(other) => Err(FetchError::ConfigInvalid(format!(
            "'{}' must be a positive integer, got {}",
            key, other
        ))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
