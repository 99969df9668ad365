//! Feed routing and retrieval.
//!
//! Configured feeds are split into two tracks by URL:
//!
//! | Track | Matched by | Used for |
//! |-------|------------|----------|
//! | Community | URL contains a community-domain token | buzz keyword extraction |
//! | News | everything else | pre-filter, scoring, publication |
//!
//! Inactive feeds are skipped before routing. Retrieval lives in [`fetch`];
//! the [`FeedSource`] trait is the network seam so stages can run against
//! canned feed documents.

pub mod fetch;

use crate::error::FetchError;
use crate::models::{Channels, FeedTask, Track};

/// Lowercase URL fragments identifying community sites.
pub const COMMUNITY_TOKENS: [&str; 7] = [
    "reddit",
    "v2ex",
    "hacker news",
    "ycombinator",
    "clien",
    "dcinside",
    "blind",
];

/// Fetches the raw bytes of a feed document.
pub trait FeedSource {
    async fn fetch_document(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Active feeds split by track, each list in `channels.json` order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Routed {
    pub community: Vec<FeedTask>,
    pub news: Vec<FeedTask>,
}

pub fn classify(url: &str) -> Track {
    let url = url.to_lowercase();
    if COMMUNITY_TOKENS.iter().any(|t| url.contains(t)) {
        Track::Community
    } else {
        Track::News
    }
}

pub fn route(channels: &Channels) -> Routed {
    let mut routed = Routed::default();
    for (category, feeds) in channels {
        for feed in feeds.iter().filter(|f| f.active) {
            let task = FeedTask {
                category: category.clone(),
                feed: feed.clone(),
            };
            match classify(&feed.url) {
                Track::Community => routed.community.push(task),
                Track::News => routed.news.push(task),
            }
        }
    }
    routed
}
