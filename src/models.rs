//! Data models flowing through the sensing pipeline.
//!
//! An entry is born as a [`RawEntry`] in the fetcher, gains a lexical score
//! as a [`Candidate`] in the pre-filter, and leaves the deep scorer as a
//! [`ScoredItem`], which is what the digest serializes.
//!
//! Field names match the JSON consumed by the presentation layer, so the
//! serialized digest keeps `snake_case` keys such as `title_en` and
//! `date_obj`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// One configured feed inside `channels.json`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// `channels.json`: category name to its ordered feeds.
///
/// Categories iterate in file order, feeds in list order. That order decides
/// which copy of a duplicated link survives and which community titles reach
/// the buzz prompt. A category repeated in the file is merged into its first
/// occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channels {
    categories: Vec<(String, Vec<FeedConfig>)>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append feeds to `category`, adding the category last if it is new.
    pub fn insert(&mut self, category: impl Into<String>, feeds: Vec<FeedConfig>) {
        let category = category.into();
        match self.categories.iter_mut().find(|(name, _)| *name == category) {
            Some((_, existing)) => existing.extend(feeds),
            None => self.categories.push((category, feeds)),
        }
    }

    pub fn push(&mut self, category: &str, feed: FeedConfig) {
        self.insert(category, vec![feed]);
    }

    pub fn get(&self, category: &str) -> Option<&[FeedConfig]> {
        self.categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, feeds)| feeds.as_slice())
    }

    pub fn get_mut(&mut self, category: &str) -> Option<&mut Vec<FeedConfig>> {
        self.categories
            .iter_mut()
            .find(|(name, _)| name == category)
            .map(|(_, feeds)| feeds)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (String, Vec<FeedConfig>)> {
        self.categories.iter()
    }
}

impl<'a> IntoIterator for &'a Channels {
    type Item = &'a (String, Vec<FeedConfig>);
    type IntoIter = std::slice::Iter<'a, (String, Vec<FeedConfig>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'de> Deserialize<'de> for Channels {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ChannelsVisitor;

        impl<'de> Visitor<'de> for ChannelsVisitor {
            type Value = Channels;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping category names to feed lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Channels, A::Error> {
                let mut channels = Channels::new();
                while let Some((category, feeds)) = map.next_entry::<String, Vec<FeedConfig>>()? {
                    channels.insert(category, feeds);
                }
                Ok(channels)
            }
        }

        deserializer.deserialize_map(ChannelsVisitor)
    }
}

/// Which half of the pipeline a feed belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    /// Online communities; only their titles are used, to extract buzz.
    Community,
    /// Curated outlets; their entries are scored and published.
    News,
}

/// A feed together with the category it was configured under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTask {
    pub category: String,
    pub feed: FeedConfig,
}

/// A normalized feed entry, as produced by the fetcher.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RawEntry {
    /// First 12 hex characters of MD5(link).
    pub id: String,
    pub title_en: String,
    /// Plain text, at most 300 characters.
    pub summary_en: String,
    pub link: String,
    /// Display name of the feed the entry came from.
    pub source: String,
    pub category: String,
    pub date_obj: DateTime<Utc>,
    /// `YYYY.MM.DD`
    pub date: String,
    /// Image URL or empty.
    pub thumbnail: String,
}

/// A news entry that went through the local pre-filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub entry: RawEntry,
    pub pre_score: i64,
    pub is_tier1: bool,
}

/// A published digest row.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub entry: RawEntry,
    pub pre_score: i64,
    pub is_tier1: bool,
    /// Always within `0..=100`.
    pub score: u8,
    pub insight_title: String,
    pub core_summary: String,
    /// Uppercase, deduplicated.
    pub keywords: Vec<String>,
    pub community_buzz: bool,
    pub buzz_words: Vec<String>,
    pub content_type: String,
}

pub const CONTENT_TYPE_NEWS: &str = "news";

/// Trending community keywords for the day, persisted as `morning_buzz.json`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BuzzSnapshot {
    /// ISO-8601 timestamp of the run that produced the snapshot.
    pub date: String,
    /// Uppercase keywords.
    pub keywords: Vec<String>,
}
