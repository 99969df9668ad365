//! Community buzz: extraction from community titles and fusion into news scores.
//!
//! Extraction joins up to 100 community titles into one prompt and asks for
//! the most-mentioned products, companies and technologies. Fusion then
//! rewards every scored news item whose keywords overlap that list with five
//! points per shared keyword, capped at 100.

use std::collections::BTreeSet;

use tracing::{info, instrument};

use crate::api::{AskAsync, ask_json};
use crate::config::Limits;
use crate::error::LlmError;
use crate::models::{RawEntry, ScoredItem};
use crate::scoring::normalize_keywords;

const POINTS_PER_BUZZ_WORD: usize = 5;

pub fn build_buzz_prompt(titles: &[&str], keyword_count: usize) -> String {
    let mut prompt = format!(
        "Below are post titles collected this morning from online tech communities.\n\
         Identify the {keyword_count} products, companies or technologies mentioned most often.\n\
         Respond with a single JSON object and nothing else: {{\"keywords\": [\"...\"]}}\n\n[Titles]\n"
    );
    for title in titles {
        prompt.push_str("- ");
        prompt.push_str(title);
        prompt.push('\n');
    }
    prompt
}

/// Ask the LLM for today's trending keywords.
///
/// Uses at most `buzz_title_limit` entries in the order given. An empty
/// community track yields an empty list without calling the model.
#[instrument(level = "info", skip_all, fields(entries = entries.len()))]
pub async fn extract_buzz<L: AskAsync>(
    llm: &L,
    entries: &[RawEntry],
    limits: &Limits,
) -> Result<Vec<String>, LlmError> {
    let titles: Vec<&str> = entries
        .iter()
        .map(|e| e.title_en.trim())
        .filter(|t| !t.is_empty())
        .take(limits.buzz_title_limit)
        .collect();
    if titles.is_empty() {
        info!("No community titles; buzz is empty");
        return Ok(Vec::new());
    }

    let prompt = build_buzz_prompt(&titles, limits.buzz_keyword_count);
    let value = ask_json(llm, &prompt).await?;
    let mut keywords = normalize_keywords(value.get("keywords"));
    keywords.truncate(limits.buzz_keyword_count);
    info!(titles = titles.len(), keywords = ?keywords, "Extracted community buzz");
    Ok(keywords)
}

/// Boost items whose keywords overlap the buzz list and mark them.
pub fn fuse(items: &mut [ScoredItem], buzz: &[String]) {
    let buzz: BTreeSet<&str> = buzz.iter().map(String::as_str).collect();
    let mut boosted = 0usize;

    for item in items.iter_mut() {
        let overlap: BTreeSet<String> = item
            .keywords
            .iter()
            .map(|k| k.to_uppercase())
            .filter(|k| buzz.contains(k.as_str()))
            .collect();

        if overlap.is_empty() {
            item.community_buzz = false;
            item.buzz_words.clear();
            continue;
        }

        let bonus = POINTS_PER_BUZZ_WORD * overlap.len();
        item.score = (item.score as usize + bonus).min(100) as u8;
        item.community_buzz = true;
        // BTreeSet iterates sorted.
        item.buzz_words = overlap.into_iter().collect();
        boosted += 1;
    }
    info!(boosted, buzz_keywords = buzz.len(), "Fused community buzz");
}
