//! Editorial brief, persona and operator-learned preferences.
//!
//! The two prompt texts ship as constants and can be replaced by files in
//! `prompts/` (`persona.txt`, `default_filter.txt`). Both are opaque to the
//! pipeline. `learned_preferences.json` is an optional array of rules that
//! the scoring prompt gives priority to.

use std::path::Path;

use tracing::{debug, info, warn};

pub const PERSONA_PROMPT: &str = "You are a senior technology analyst preparing a morning briefing for a product \
strategy team working on consumer hardware, wearables and AI-powered devices. You read quickly, \
separate signal from noise, and always answer in strict JSON.";

pub const DEFAULT_FILTER_PROMPT: &str = "Evaluate the news item below for a morning briefing on consumer technology.

Scoring guide (0-100):
- 90-100: launches, major releases or strategic moves by leading platform companies (Apple, Google, Meta, Samsung, OpenAI) in AI, wearables, smart glasses, rings or robotics.
- 70-89: meaningful product, research or market news in those areas, including notable UX changes.
- 40-69: general technology news with indirect relevance.
- 0-39: rumors without substance, promotions, deals, opinion pieces or unrelated topics.

Respond with a single JSON object and nothing else:
{\"score\": <integer 0-100>, \"insight_title\": \"<one-line headline stating why this matters>\", \"core_summary\": \"<two or three sentence summary>\", \"keywords\": [\"<product, company or technology>\", ...]}";

/// The prompt texts used by the scorer and the LLM client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub persona: String,
    pub filter: String,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            persona: PERSONA_PROMPT.to_string(),
            filter: DEFAULT_FILTER_PROMPT.to_string(),
        }
    }
}

impl Prompts {
    /// Built-in prompts, each replaced by its file in `dir` when that file
    /// exists and is not blank.
    pub fn load(dir: &Path) -> Self {
        let mut prompts = Self::default();
        if let Some(text) = read_override(&dir.join("persona.txt")) {
            prompts.persona = text;
        }
        if let Some(text) = read_override(&dir.join("default_filter.txt")) {
            prompts.filter = text;
        }
        prompts
    }
}

fn read_override(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            info!(path = %path.display(), "Using prompt override");
            Some(text)
        }
        Ok(_) => None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No prompt override");
            None
        }
    }
}

/// Read the operator-curated rules. Missing or malformed files yield none.
pub fn load_learned_preferences(path: &Path) -> Vec<String> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No learned preferences");
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(rules) => {
            let rules: Vec<String> = rules
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect();
            info!(count = rules.len(), "Loaded learned preferences");
            rules
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed learned preferences");
            Vec::new()
        }
    }
}

/// Join rules into the single learned-rules string shared by the pre-filter
/// and the scoring prompt.
pub fn learned_rules_text(rules: &[String]) -> String {
    rules.join("\n")
}
