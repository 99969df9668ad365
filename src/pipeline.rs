//! Stage coordinator.
//!
//! ```text
//! channels ─► route ─┬─► community feeds ─► fetch (10 wide) ─► buzz extraction ─► morning_buzz.json
//!                    │                                                │
//!                    └─► news feeds ─► fetch (20 wide) ─► pre-filter ─► scoring (5 wide) ─► fusion ─► rank ─► today_news.json
//!                                                                                                         └► archive/
//! ```
//!
//! Stages run strictly one after another. Inside a stage, workers run on a
//! bounded `buffer_unordered` pool; each worker returns its own results
//! tagged with its input position and the coordinator reassembles them in
//! input order, so scheduling never leaks into the output.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, Utc};
use futures::stream::{self, StreamExt};
use tracing::{info, instrument, warn};

use crate::api::AskAsync;
use crate::buzz::{extract_buzz, fuse};
use crate::config::{Limits, Settings};
use crate::error::PublishError;
use crate::feeds::fetch::fetch_entries;
use crate::feeds::{FeedSource, route};
use crate::models::{BuzzSnapshot, Channels, FeedTask, RawEntry};
use crate::outputs::json::{load_buzz, rank, write_buzz, write_digest};
use crate::prefilter::select_candidates;
use crate::prompts::{Prompts, learned_rules_text};
use crate::scoring::{ScoringContext, score_all};
use crate::translate::Translate;

/// Counts from one run, logged by `main`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub community_feeds: usize,
    pub news_feeds: usize,
    pub community_entries: usize,
    pub news_entries: usize,
    pub buzz_keywords: usize,
    pub candidates: usize,
    pub published: usize,
    pub community_buzz_items: usize,
    pub archive_path: PathBuf,
}

/// Drop entries whose id was already seen; the first occurrence wins.
pub fn dedup_by_id(entries: Vec<RawEntry>) -> Vec<RawEntry> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Fetch every feed of a track on a pool of `width` workers.
///
/// Entries come back in feed order, then entry order, with duplicate ids
/// removed.
#[instrument(level = "info", skip_all, fields(feeds = tasks.len(), width = width))]
pub async fn fetch_track<S: FeedSource>(
    source: &S,
    tasks: &[FeedTask],
    width: usize,
    cutoff: DateTime<Utc>,
    limits: &Limits,
) -> Vec<RawEntry> {
    let mut per_feed: Vec<(usize, Vec<RawEntry>)> = stream::iter(tasks.iter().enumerate())
        .map(|(i, task)| async move { (i, fetch_entries(source, task, cutoff, limits).await) })
        .buffer_unordered(width.max(1))
        .collect()
        .await;
    per_feed.sort_by_key(|(i, _)| *i);

    let fetched: Vec<RawEntry> = per_feed.into_iter().flat_map(|(_, v)| v).collect();
    let total = fetched.len();
    let entries = dedup_by_id(fetched);
    info!(
        entries = entries.len(),
        duplicates = total - entries.len(),
        "Fetched track"
    );
    entries
}

/// Keywords of a snapshot written earlier on the same local date as
/// `run_start`. Anything older is ignored.
pub async fn same_day_buzz(path: &Path, run_start: DateTime<Utc>) -> Vec<String> {
    let Some(snapshot) = load_buzz(path).await else {
        return Vec::new();
    };
    let today = run_start.with_timezone(&Local).date_naive();
    match DateTime::parse_from_rfc3339(&snapshot.date) {
        Ok(taken) if taken.with_timezone(&Local).date_naive() == today => {
            info!(
                keywords = snapshot.keywords.len(),
                taken = %snapshot.date,
                "Reusing today's buzz snapshot"
            );
            snapshot.keywords
        }
        _ => {
            info!(taken = %snapshot.date, "Buzz snapshot is not from today; continuing without buzz");
            Vec::new()
        }
    }
}

pub struct Pipeline<'a, S, L, T> {
    settings: &'a Settings,
    prompts: &'a Prompts,
    learned_rules: String,
    source: &'a S,
    llm: &'a L,
    translator: &'a T,
}

impl<'a, S, L, T> Pipeline<'a, S, L, T>
where
    S: FeedSource,
    L: AskAsync,
    T: Translate,
{
    pub fn new(
        settings: &'a Settings,
        prompts: &'a Prompts,
        learned_preferences: &[String],
        source: &'a S,
        llm: &'a L,
        translator: &'a T,
    ) -> Self {
        Self {
            settings,
            prompts,
            learned_rules: learned_rules_text(learned_preferences),
            source,
            llm,
            translator,
        }
    }

    /// Run every stage once and publish.
    ///
    /// Only a failure to write the digest is returned; every other problem
    /// degrades the output instead.
    #[instrument(level = "info", skip_all, fields(run_start = %run_start))]
    pub async fn run(
        &self,
        channels: &Channels,
        run_start: DateTime<Utc>,
    ) -> Result<RunReport, PublishError> {
        let limits = &self.settings.limits;
        let cutoff = run_start - Duration::days(limits.lookback_days);
        let routed = route(channels);
        info!(
            community = routed.community.len(),
            news = routed.news.len(),
            %cutoff,
            "Routed feeds"
        );

        // ---- Community track ----
        let community = fetch_track(
            self.source,
            &routed.community,
            limits.community_fetch_width,
            cutoff,
            limits,
        )
        .await;

        let buzz = match extract_buzz(self.llm, &community, limits).await {
            Ok(keywords) => {
                let snapshot = BuzzSnapshot {
                    date: run_start.to_rfc3339(),
                    keywords,
                };
                if let Err(e) = write_buzz(&snapshot, &self.settings.buzz_path()).await {
                    warn!(error = %e, "Failed to persist buzz snapshot");
                }
                snapshot.keywords
            }
            Err(e) => {
                warn!(error = %e, "Buzz extraction failed");
                same_day_buzz(&self.settings.buzz_path(), run_start).await
            }
        };

        // ---- News track ----
        let news = fetch_track(
            self.source,
            &routed.news,
            limits.news_fetch_width,
            cutoff,
            limits,
        )
        .await;
        let news_entries = news.len();

        let candidates = select_candidates(news, &self.learned_rules, limits.candidate_cap);
        let candidate_count = candidates.len();

        let ctx = ScoringContext {
            filter_prompt: &self.prompts.filter,
            learned_rules: &self.learned_rules,
            limits,
        };
        let mut scored = score_all(self.llm, self.translator, &ctx, candidates).await;

        fuse(&mut scored, &buzz);
        rank(&mut scored);

        let date = run_start.with_timezone(&Local).date_naive();
        let archive_path = write_digest(
            &scored,
            &self.settings.digest_path(),
            &self.settings.archive_dir(),
            date,
        )
        .await?;

        Ok(RunReport {
            community_feeds: routed.community.len(),
            news_feeds: routed.news.len(),
            community_entries: community.len(),
            news_entries,
            buzz_keywords: buzz.len(),
            candidates: candidate_count,
            published: scored.len(),
            community_buzz_items: scored.iter().filter(|s| s.community_buzz).count(),
            archive_path,
        })
    }
}
