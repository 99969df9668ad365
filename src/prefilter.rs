//! Local lexical pre-filter.
//!
//! Caps the number of news items sent to the LLM. Each item earns two points
//! per seed term found in its lowercased title and summary, plus ten points
//! when its source is a Tier-1 outlet. The top items by
//! `(pre_score desc, date_obj desc)` survive.
//!
//! The ten-point bonus means a Tier-1 item outranks any other item with
//! fewer than five seed-term hits.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use crate::models::{Candidate, RawEntry};

/// Outlet names whose items get the Tier-1 bonus and boost.
pub const TIER1_SOURCES: [&str; 11] = [
    "techcrunch",
    "verge",
    "wired",
    "bloomberg",
    "cnbc",
    "wsj",
    "reuters",
    "engadget",
    "nikkei",
    "gizmodo",
    "the information",
];

pub const SEED_TERMS: [&str; 11] = [
    "ai", "apple", "meta", "google", "wearable", "ring", "glass", "robot", "ux", "release",
    "launch",
];

const POINTS_PER_TERM: i64 = 2;
const TIER1_BONUS: i64 = 10;

pub fn is_tier1(source: &str) -> bool {
    let source = source.to_lowercase();
    TIER1_SOURCES.iter().any(|t| source.contains(t))
}

/// Seed terms plus the whitespace-separated tokens of the learned rules.
pub fn keyword_set(learned_rules: &str) -> BTreeSet<String> {
    SEED_TERMS
        .iter()
        .map(|t| t.to_string())
        .chain(learned_rules.split_whitespace().map(str::to_lowercase))
        .collect()
}

pub fn pre_score(entry: &RawEntry, keywords: &BTreeSet<String>) -> (i64, bool) {
    let text = format!("{} {}", entry.title_en, entry.summary_en).to_lowercase();
    let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count() as i64;
    let tier1 = is_tier1(&entry.source);
    let score = POINTS_PER_TERM * hits + if tier1 { TIER1_BONUS } else { 0 };
    (score, tier1)
}

/// Score every entry and keep the best `cap`.
///
/// The sort is stable, so equal keys keep their input order and running the
/// filter on its own output changes nothing.
#[instrument(level = "info", skip_all, fields(pool = entries.len(), cap = cap))]
pub fn select_candidates(entries: Vec<RawEntry>, learned_rules: &str, cap: usize) -> Vec<Candidate> {
    let keywords = keyword_set(learned_rules);
    let mut candidates: Vec<Candidate> = entries
        .into_iter()
        .map(|entry| {
            let (pre_score, is_tier1) = pre_score(&entry, &keywords);
            Candidate {
                entry,
                pre_score,
                is_tier1,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.pre_score
            .cmp(&a.pre_score)
            .then_with(|| b.entry.date_obj.cmp(&a.entry.date_obj))
    });
    candidates.truncate(cap);

    info!(
        kept = candidates.len(),
        tier1 = candidates.iter().filter(|c| c.is_tier1).count(),
        "Pre-filter selected candidates"
    );
    candidates
}
