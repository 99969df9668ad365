//! Deep scoring of pre-filtered candidates.
//!
//! One LLM call per candidate returns `{score, insight_title, core_summary,
//! keywords}`. Headline and summary are then translated into the display
//! language. Tier-1 items scoring 80 or more get a five-point boost.
//!
//! Any LLM failure (transport, quota, prose instead of JSON, missing score)
//! produces a fallback item: score 40, original title and summary, no
//! keywords. Fallback items still get translated, boosted and fused, and
//! simply sink in the ranking.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use rand::{Rng, rng};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::api::{AskAsync, ask_json};
use crate::config::Limits;
use crate::models::{CONTENT_TYPE_NEWS, Candidate, RawEntry, ScoredItem};
use crate::translate::{Translate, translate_or_keep};
use crate::utils::truncate_chars;

pub const FALLBACK_SCORE: u8 = 40;
const TIER1_BOOST_THRESHOLD: u8 = 80;
const TIER1_BOOST: u8 = 5;

/// Prompt inputs shared by every scoring call.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub filter_prompt: &'a str,
    /// Learned rules, one per line. May be empty.
    pub learned_rules: &'a str,
    pub limits: &'a Limits,
}

/// What the model said about one item, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub score: u8,
    pub insight_title: Option<String>,
    pub core_summary: Option<String>,
    pub keywords: Vec<String>,
}

pub fn build_prompt(ctx: &ScoringContext<'_>, entry: &RawEntry) -> String {
    let mut prompt = ctx.filter_prompt.to_string();

    let rules: Vec<&str> = ctx
        .learned_rules
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if !rules.is_empty() {
        prompt.push_str("\n\n[Operator preferences]\n");
        prompt.push_str(
            "The operator has learned to value the following. Award at least 80 points to any item matching one of these rules:\n",
        );
        for rule in rules {
            prompt.push_str("- ");
            prompt.push_str(rule);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!(
        "\n\n[News item to evaluate]\nSource: {}\nLink: {}\nTitle: {}\nSummary: {}\n",
        entry.source,
        entry.link,
        entry.title_en,
        truncate_chars(&entry.summary_en, ctx.limits.prompt_summary_chars)
    ));
    prompt
}

/// Coerce a JSON score into `0..=100`.
///
/// Accepts integers, floats (truncated) and numeric strings.
pub fn coerce_score(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?
        }
        _ => return None,
    };
    Some(n.clamp(0, 100) as u8)
}

/// Validate the model's JSON. `None` when no usable score is present.
pub fn parse_assessment(value: &Value) -> Option<Assessment> {
    let score = coerce_score(value.get("score")?)?;
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    Some(Assessment {
        score,
        insight_title: text("insight_title"),
        core_summary: text("core_summary"),
        keywords: normalize_keywords(value.get("keywords")),
    })
}

/// Uppercase, trimmed, first occurrence wins.
pub fn normalize_keywords(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(|k| k.trim().to_uppercase())
                .filter(|k| !k.is_empty())
                .unique()
                .collect()
        })
        .unwrap_or_default()
}

pub fn apply_tier_boost(score: u8, is_tier1: bool) -> u8 {
    if is_tier1 && score >= TIER1_BOOST_THRESHOLD {
        score.saturating_add(TIER1_BOOST).min(100)
    } else {
        score
    }
}

/// Score, translate and boost one candidate. Never fails.
#[instrument(level = "debug", skip_all, fields(id = %candidate.entry.id))]
pub async fn score_candidate<L: AskAsync, T: Translate>(
    llm: &L,
    translator: &T,
    ctx: &ScoringContext<'_>,
    candidate: Candidate,
) -> ScoredItem {
    let prompt = build_prompt(ctx, &candidate.entry);
    let assessment = match ask_json(llm, &prompt).await {
        Ok(value) => {
            let parsed = parse_assessment(&value);
            if parsed.is_none() {
                warn!(source = %candidate.entry.source, "Model JSON lacked a usable score; using fallback");
            }
            parsed
        }
        Err(e) => {
            warn!(source = %candidate.entry.source, error = %e, "Scoring call failed; using fallback");
            None
        }
    };

    let Candidate {
        entry,
        pre_score,
        is_tier1,
    } = candidate;

    let (score, title, summary, keywords) = match assessment {
        Some(a) => (
            a.score,
            a.insight_title.unwrap_or_else(|| entry.title_en.clone()),
            a.core_summary.unwrap_or_else(|| entry.summary_en.clone()),
            a.keywords,
        ),
        None => (
            FALLBACK_SCORE,
            entry.title_en.clone(),
            entry.summary_en.clone(),
            Vec::new(),
        ),
    };

    let insight_title = translate_or_keep(translator, &title).await;
    let core_summary = translate_or_keep(translator, &summary).await;
    let score = apply_tier_boost(score, is_tier1);
    debug!(score, is_tier1, "Scored candidate");

    ScoredItem {
        entry,
        pre_score,
        is_tier1,
        score,
        insight_title,
        core_summary,
        keywords,
        community_buzz: false,
        buzz_words: Vec::new(),
        content_type: CONTENT_TYPE_NEWS.to_string(),
    }
}

async fn jitter(bounds: (u64, u64)) {
    let (lo, hi) = (bounds.0.min(bounds.1), bounds.0.max(bounds.1));
    if hi == 0 {
        return;
    }
    let ms: u64 = rng().random_range(lo..=hi);
    sleep(Duration::from_millis(ms)).await;
}

/// Score all candidates on a bounded worker pool.
///
/// Each worker sleeps a random jitter before its LLM call. Results come
/// back in candidate order regardless of completion order.
#[instrument(level = "info", skip_all, fields(candidates = candidates.len()))]
pub async fn score_all<L: AskAsync, T: Translate>(
    llm: &L,
    translator: &T,
    ctx: &ScoringContext<'_>,
    candidates: Vec<Candidate>,
) -> Vec<ScoredItem> {
    let width = ctx.limits.scoring_width.max(1);
    info!(width, "Starting deep scoring");

    let mut results: Vec<(usize, ScoredItem)> = stream::iter(candidates.into_iter().enumerate())
        .map(|(i, candidate)| async move {
            jitter(ctx.limits.scoring_jitter_ms).await;
            (i, score_candidate(llm, translator, ctx, candidate).await)
        })
        .buffer_unordered(width)
        .collect()
        .await;
    results.sort_by_key(|(i, _)| *i);

    let scored: Vec<ScoredItem> = results.into_iter().map(|(_, item)| item).collect();
    info!(
        scored = scored.len(),
        without_keywords = scored.iter().filter(|s| s.keywords.is_empty()).count(),
        "Deep scoring complete"
    );
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, TranslateError};
    use crate::utils::fingerprint;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    struct Canned(&'static str);

    impl AskAsync for Canned {
        async fn ask(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    struct Down;

    impl AskAsync for Down {
        async fn ask(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::EmptyResponse)
        }
    }

    struct Prefix;

    impl Translate for Prefix {
        async fn translate(&self, text: &str) -> Result<String, TranslateError> {
            Ok(format!("ko:{text}"))
        }
    }

    struct NoTranslate;

    impl Translate for NoTranslate {
        async fn translate(&self, _text: &str) -> Result<String, TranslateError> {
            Err(TranslateError::Malformed)
        }
    }

    fn candidate(source: &str, is_tier1: bool) -> Candidate {
        let link = "https://www.theverge.com/apple-ar-glasses".to_string();
        let date_obj = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        Candidate {
            entry: RawEntry {
                id: fingerprint(&link),
                title_en: "Apple unveils AR glasses".into(),
                summary_en: "s".repeat(250),
                link,
                source: source.into(),
                category: "Tech".into(),
                date_obj,
                date: "2026.10.17".into(),
                thumbnail: String::new(),
            },
            pre_score: 14,
            is_tier1,
        }
    }

    fn limits() -> Limits {
        Limits {
            scoring_jitter_ms: (0, 0),
            ..Limits::default()
        }
    }

    #[test]
    fn prompt_includes_rules_and_truncated_summary() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "Smart rings\n\nVision Pro",
            limits: &limits,
        };
        let prompt = build_prompt(&ctx, &candidate("The Verge", true).entry);
        assert!(prompt.starts_with("BRIEF"));
        assert!(prompt.contains("at least 80 points"));
        assert!(prompt.contains("- Smart rings\n- Vision Pro\n"));
        assert!(prompt.contains("Source: The Verge"));
        assert!(prompt.contains(&format!("Summary: {}\n", "s".repeat(200))));
        assert!(!prompt.contains(&"s".repeat(201)));
    }

    #[test]
    fn prompt_without_rules_has_no_preference_section() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "",
            limits: &limits,
        };
        let prompt = build_prompt(&ctx, &candidate("Blog", false).entry);
        assert!(!prompt.contains("[Operator preferences]"));
    }

    #[test]
    fn score_coercion() {
        assert_eq!(coerce_score(&json!(85)), Some(85));
        assert_eq!(coerce_score(&json!(72.9)), Some(72));
        assert_eq!(coerce_score(&json!(" 64 ")), Some(64));
        assert_eq!(coerce_score(&json!(140)), Some(100));
        assert_eq!(coerce_score(&json!(-3)), Some(0));
        assert_eq!(coerce_score(&json!("high")), None);
        assert_eq!(coerce_score(&json!(null)), None);
    }

    #[test]
    fn keywords_are_uppercased_and_deduplicated() {
        let kw = normalize_keywords(Some(&json!(["apple", " Apple ", "Vision Pro", 3, ""])));
        assert_eq!(kw, vec!["APPLE".to_string(), "VISION PRO".to_string()]);
        assert!(normalize_keywords(Some(&json!("apple"))).is_empty());
    }

    #[test]
    fn tier_boost_only_at_threshold() {
        assert_eq!(apply_tier_boost(85, true), 90);
        assert_eq!(apply_tier_boost(98, true), 100);
        assert_eq!(apply_tier_boost(79, true), 79);
        assert_eq!(apply_tier_boost(85, false), 85);
    }

    #[tokio::test]
    async fn successful_scoring_is_translated_and_boosted() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "",
            limits: &limits,
        };
        let llm = Canned(
            r#"Here: {"score": 85, "insight_title": "Apple bets on AR", "core_summary": "Glasses ship next year.", "keywords": ["apple", "AR"]}"#,
        );
        let item = score_candidate(&llm, &Prefix, &ctx, candidate("The Verge", true)).await;
        assert_eq!(item.score, 90);
        assert_eq!(item.insight_title, "ko:Apple bets on AR");
        assert_eq!(item.core_summary, "ko:Glasses ship next year.");
        assert_eq!(item.keywords, vec!["APPLE", "AR"]);
        assert_eq!(item.pre_score, 14);
        assert_eq!(item.content_type, "news");
    }

    #[tokio::test]
    async fn llm_failure_falls_back() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "",
            limits: &limits,
        };
        let item = score_candidate(&Down, &NoTranslate, &ctx, candidate("Blog", false)).await;
        assert_eq!(item.score, FALLBACK_SCORE);
        assert_eq!(item.insight_title, "Apple unveils AR glasses");
        assert_eq!(item.core_summary, "s".repeat(250));
        assert!(item.keywords.is_empty());
    }

    #[tokio::test]
    async fn json_without_score_falls_back() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "",
            limits: &limits,
        };
        let llm = Canned(r#"{"insight_title": "x", "keywords": ["apple"]}"#);
        let item = score_candidate(&llm, &NoTranslate, &ctx, candidate("Blog", false)).await;
        assert_eq!(item.score, FALLBACK_SCORE);
        assert!(item.keywords.is_empty());
        assert_eq!(item.insight_title, "Apple unveils AR glasses");
    }

    #[tokio::test]
    async fn score_all_preserves_candidate_order() {
        let limits = limits();
        let ctx = ScoringContext {
            filter_prompt: "BRIEF",
            learned_rules: "",
            limits: &limits,
        };
        let mut candidates = Vec::new();
        for i in 0..12 {
            let mut c = candidate("Blog", false);
            c.entry.link = format!("https://news.example/{i}");
            c.entry.id = fingerprint(&c.entry.link);
            candidates.push(c);
        }
        let expected: Vec<_> = candidates.iter().map(|c| c.entry.id.clone()).collect();
        let llm = Canned(r#"{"score": 50, "keywords": []}"#);
        let scored = score_all(&llm, &NoTranslate, &ctx, candidates).await;
        let got: Vec<_> = scored.iter().map(|s| s.entry.id.clone()).collect();
        assert_eq!(got, expected);
        assert!(scored.iter().all(|s| s.score == 50));
    }
}
