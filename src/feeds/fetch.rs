//! RSS/Atom retrieval and normalization into [`RawEntry`].
//!
//! For each feed only the first entries (30 by default) are considered.
//! Entries are dropped when they have no link, no published/updated
//! timestamp, or a timestamp older than the cutoff. Any network or parse
//! failure turns into an empty list in [`fetch_entries`]; one broken feed
//! never affects the others.
//!
//! # Thumbnails
//!
//! Resolved in order:
//! 1. an image media enclosure (`media:content`, `<enclosure>`, Atom `rel="enclosure"`)
//! 2. a `media:thumbnail`
//! 3. the first `<img src>` in the summary, then in the content body

use std::io::Cursor;

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::{Limits, Settings};
use crate::error::FetchError;
use crate::feeds::FeedSource;
use crate::models::{FeedTask, RawEntry};
use crate::utils::{fingerprint, strip_html, truncate_chars};

static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP implementation of [`FeedSource`].
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        Ok(Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(settings.feed_timeout)
                .build()?,
        })
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let res = self.client.get(url).send().await?;
        if !res.status().is_success() {
            return Err(FetchError::Status(res.status()));
        }
        Ok(res.bytes().await?.to_vec())
    }
}

/// Fetch one feed and normalize its recent entries.
///
/// Never fails: errors are logged and produce an empty list.
#[instrument(level = "info", skip_all, fields(feed = %task.feed.name))]
pub async fn fetch_entries<S: FeedSource>(
    source: &S,
    task: &FeedTask,
    cutoff: DateTime<Utc>,
    limits: &Limits,
) -> Vec<RawEntry> {
    let document = match source.fetch_document(&task.feed.url).await {
        Ok(d) => d,
        Err(e) => {
            warn!(url = %task.feed.url, error = %e, "Feed fetch failed");
            return Vec::new();
        }
    };
    match parse_feed(&document, task, cutoff, limits) {
        Ok(entries) => {
            debug!(count = entries.len(), "Parsed feed");
            entries
        }
        Err(e) => {
            warn!(url = %task.feed.url, error = %e, "Feed parse failed");
            Vec::new()
        }
    }
}

/// Parse a feed document into entries published at or after `cutoff`.
pub fn parse_feed(
    document: &[u8],
    task: &FeedTask,
    cutoff: DateTime<Utc>,
    limits: &Limits,
) -> Result<Vec<RawEntry>, FetchError> {
    let feed = feed_rs::parser::parse(Cursor::new(document))?;

    let entries = feed
        .entries
        .iter()
        .take(limits.max_entries_per_feed)
        .filter_map(|entry| normalize_entry(entry, task, cutoff, limits))
        .collect();
    Ok(entries)
}

fn normalize_entry(
    entry: &Entry,
    task: &FeedTask,
    cutoff: DateTime<Utc>,
    limits: &Limits,
) -> Option<RawEntry> {
    let published = entry.published.or(entry.updated)?;
    if published < cutoff {
        return None;
    }
    let link = select_entry_link(entry)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| strip_html(&t.content))
        .unwrap_or_default();
    let summary_html = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .unwrap_or_default();
    // Strip first so markup never eats into the character budget.
    let summary = truncate_chars(&strip_html(&summary_html), limits.summary_chars);

    Some(RawEntry {
        id: fingerprint(&link),
        title_en: title,
        summary_en: summary,
        thumbnail: resolve_thumbnail(entry, &link).unwrap_or_default(),
        link,
        source: task.feed.name.clone(),
        category: task.category.clone(),
        date_obj: published,
        date: published.format("%Y.%m.%d").to_string(),
    })
}

fn select_entry_link(entry: &Entry) -> Option<String> {
    let alternate = entry.links.iter().find(|l| {
        !l.href.trim().is_empty()
            && l
                .rel
                .as_deref()
                .is_none_or(|r| r.eq_ignore_ascii_case("alternate"))
    });
    if let Some(link) = alternate.or_else(|| entry.links.iter().find(|l| !l.href.trim().is_empty())) {
        return Some(link.href.trim().to_string());
    }
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }
    None
}

fn resolve_thumbnail(entry: &Entry, link: &str) -> Option<String> {
    let raw = media_enclosure(entry)
        .or_else(|| media_thumbnail(entry))
        .or_else(|| {
            let summary = entry.summary.as_ref().map(|s| s.content.as_str());
            let body = entry.content.as_ref().and_then(|c| c.body.as_deref());
            summary.into_iter().chain(body).find_map(first_img_src)
        })?;
    Some(absolutize(&raw, link))
}

fn media_enclosure(entry: &Entry) -> Option<String> {
    let from_media = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .find_map(|c| {
            let url = c.url.as_ref()?.as_str();
            let is_image = match &c.content_type {
                Some(mime) => mime.to_string().starts_with("image/"),
                None => has_image_extension(url),
            };
            is_image.then(|| url.to_string())
        });
    from_media.or_else(|| {
        entry.links.iter().find_map(|l| {
            let enclosure = l.rel.as_deref().is_some_and(|r| r.eq_ignore_ascii_case("enclosure"));
            let image = l
                .media_type
                .as_deref()
                .map_or_else(|| has_image_extension(&l.href), |t| t.starts_with("image/"));
            (enclosure && image).then(|| l.href.clone())
        })
    })
}

fn media_thumbnail(entry: &Entry) -> Option<String> {
    entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.trim())
        .find(|uri| !uri.is_empty())
        .map(str::to_string)
}

fn first_img_src(html: &str) -> Option<String> {
    if !html.contains("<img") {
        return None;
    }
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&IMG_SELECTOR)
        .filter_map(|img| img.value().attr("src"))
        .map(str::trim)
        .find(|src| !src.is_empty())
        .map(str::to_string)
}

fn has_image_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// Resolve protocol-relative and relative image URLs against the entry link.
fn absolutize(src: &str, link: &str) -> String {
    match Url::parse(src) {
        Ok(url) => url.to_string(),
        Err(_) => Url::parse(link)
            .and_then(|base| base.join(src))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| src.to_string()),
    }
}
