use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::WordPressSettings;
use crate::{FetchError, Result};

const POSTS_ENDPOINT: &str = "/wp-json/wp/v2/posts";
const MAX_PER_PAGE: u32 = 100;
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";
const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Requested projection, keeps payloads small
const FIELDS: &[&str] = &[
    "id",
    "date",
    "slug",
    "status",
    "type",
    "link",
    "title.rendered",
    "content.rendered",
    "excerpt.rendered",
];

/// Flat view of one WordPress post, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub date: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
    pub post_type: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
}

// Body of a WordPress REST error response
#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

pub struct WordPressClient {
    http: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    date: String,
    per_page: u32,
}

impl WordPressClient {
    pub fn new(settings: &WordPressSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let credentials = match (&settings.username, &settings.application_password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        };

        Ok(Self {
            http,
            endpoint: format!("{}{}", settings.base_url, POSTS_ENDPOINT),
            credentials,
            date: settings.date.clone(),
            per_page: settings.per_page.min(MAX_PER_PAGE),
        })
    }

    /// Fetch every post dated on or after the cutoff, oldest first.
    pub async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let after = format_after(&self.date)?;
        info!("Fetching posts from {} after {}", self.endpoint, after);

        let mut posts = Vec::new();
        let mut page = 1u32;

        while let Some(items) = self.fetch_page(&after, page).await? {
            debug!("Fetched {} posts from page {}", items.len(), page);
            for item in &items {
                posts.push(extract_post(item)?);
            }
            page += 1;
        }

        Ok(posts)
    }

    /// Returns `None` once the listing is exhausted.
    async fn fetch_page(&self, after: &str, page: u32) -> Result<Option<Vec<Value>>> {
        let page_param = page.to_string();
        let per_page_param = self.per_page.to_string();
        let fields = FIELDS.join(",");

        let mut request = self.http.get(&self.endpoint).query(&[
            ("after", after),
            ("page", page_param.as_str()),
            ("per_page", per_page_param.as_str()),
            ("orderby", "date"),
            ("order", "asc"),
            ("_fields", fields.as_str()),
        ]);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        debug!("GET {} page={}", self.endpoint, page);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::BAD_REQUEST {
            if let Ok(error) = serde_json::from_str::<ApiError>(&body) {
                if error.code.as_deref() == Some(INVALID_PAGE_CODE) {
                    warn!("Page {} is past the last page, stopping", page);
                    return Ok(None);
                }
                return Err(FetchError::RemoteRequestFailed(format!(
                    "HTTP {} on page {}: {} {}",
                    status,
                    page,
                    error.code.unwrap_or_default(),
                    error.message.unwrap_or_default()
                )));
            }
        }

        if !status.is_success() {
            return Err(FetchError::RemoteRequestFailed(format!(
                "HTTP {} on page {} of {}",
                status, page, self.endpoint
            )));
        }

        let items: Vec<Value> = serde_json::from_str(&body).map_err(|e| {
            FetchError::RemoteRequestFailed(format!(
                "page {} is not a JSON array of posts: {}",
                page, e
            ))
        })?;

        if items.is_empty() {
            return Ok(None);
        }

        Ok(Some(items))
    }
}

/// Normalize the configured cutoff to the `after` query format.
pub fn format_after(date: &str) -> Result<String> {
    let date = date.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.naive_local().format(WIRE_DATE_FORMAT).to_string());
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(date, format) {
            return Ok(parsed.format(WIRE_DATE_FORMAT).to_string());
        }
    }

    // hour only, e.g. 2024-01-01T08
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&format!("{}:00", date), format) {
            return Ok(parsed.format(WIRE_DATE_FORMAT).to_string());
        }
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.format(WIRE_DATE_FORMAT).to_string())
        .ok_or_else(|| FetchError::DateFormatInvalid(date.to_string()))
}

pub fn extract_post(item: &Value) -> Result<Post> {
    let id = get_path(item, &["id"])
        .and_then(Value::as_i64)
        .ok_or_else(|| {
            FetchError::RemoteRequestFailed(format!("post without an integer id: {}", item))
        })?;

    Ok(Post {
        id,
        date: text_at(item, &["date"]),
        slug: text_at(item, &["slug"]),
        status: text_at(item, &["status"]),
        post_type: text_at(item, &["type"]),
        link: text_at(item, &["link"]),
        title: text_at(item, &["title", "rendered"]),
        content: text_at(item, &["content", "rendered"]),
        excerpt: text_at(item, &["excerpt", "rendered"]),
    })
}

/// Walk nested objects by key, `None` when any step is missing or not an object.
pub fn get_path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

fn text_at(value: &Value, keys: &[&str]) -> Option<String> {
    match get_path(value, keys)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
