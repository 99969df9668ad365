//! LLM interaction.
//!
//! - [`AskAsync`]: the seam every LLM consumer is written against
//! - [`GeminiClient`]: the production implementation (Gemini `generateContent`)
//! - [`ask_json`]: ask and pull the first balanced `{...}` block out of the
//!   answer, since models like to wrap JSON in prose or code fences
//!
//! No retries happen here. Callers fall back to default values
//! on any error, and the scorer's jitter is the only rate-limit measure.

use std::time::Instant;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::error::LlmError;
use crate::utils::truncate_for_log;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Trait for async LLM interaction.
///
/// Implementations are shared by reference across concurrent workers, so
/// `ask` takes `&self` and must not rely on exclusive access.
pub trait AskAsync {
    /// Send a prompt and return the model's raw text answer.
    async fn ask(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Gemini client sending the persona as the system instruction.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    persona: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(settings: &Settings, persona: &str) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(settings.llm_timeout).build()?,
            api_key: settings.gemini_api_key.clone(),
            model: settings.gemini_model.clone(),
            persona: persona.to_string(),
        })
    }

    /// The key travels in a header so it never appears in a URL, and so
    /// never in a logged `reqwest::Error`.
    fn request(&self, prompt: &str) -> RequestBuilder {
        let url = format!("{}/{}:generateContent", GEMINI_ENDPOINT, self.model);
        let body = GenerateRequest {
            system_instruction: Content {
                parts: vec![Part {
                    text: &self.persona,
                }],
            },
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.2,
            },
        };

        self.client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
    }
}

impl AskAsync for GeminiClient {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &str) -> Result<String, LlmError> {
        let t0 = Instant::now();
        let res = self.request(prompt).send().await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&body, 300), "Gemini returned an error");
            return Err(LlmError::Status { status, body });
        }

        let parsed: GenerateResponse = res.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            response_preview = %truncate_for_log(&text, 200),
            "Gemini answered"
        );
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Ask the model and decode the first JSON object in its answer.
pub async fn ask_json<L: AskAsync>(llm: &L, prompt: &str) -> Result<Value, LlmError> {
    let answer = llm.ask(prompt).await?;
    let Some(block) = extract_json_object(&answer) else {
        debug!(response_preview = %truncate_for_log(&answer, 300), "No JSON object in answer");
        return Err(LlmError::NoJsonObject);
    };
    Ok(serde_json::from_str(block)?)
}

/// Return the first balanced `{...}` substring of `text`.
///
/// Braces inside JSON string literals are not counted. An object that never
/// closes yields `None`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl AskAsync for Canned {
        async fn ask(&self, _prompt: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn client(key: &str) -> GeminiClient {
        let dir = std::env::temp_dir();
        let mut settings = Settings::with_defaults(dir, key);
        settings.llm_timeout = std::time::Duration::from_millis(1);
        GeminiClient::new(&settings, "persona").unwrap()
    }

    #[test]
    fn api_key_is_sent_as_header_not_query() {
        let req = client("SECRET-KEY-123").request("hello").build().unwrap();
        assert!(!req.url().as_str().contains("SECRET-KEY-123"));
        assert!(req.url().query().is_none());
        assert_eq!(req.headers()[API_KEY_HEADER], "SECRET-KEY-123");
        assert!(req.url().path().ends_with("/gemini-2.0-flash:generateContent"));
    }

    #[test]
    fn request_body_carries_persona_and_prompt() {
        let req = client("k").request("hello").build().unwrap();
        let body: Value = serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "persona");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn transport_errors_do_not_leak_the_key() {
        let err = client("SECRET-KEY-123").ask("hello").await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{err:?}").contains("SECRET-KEY-123"));
    }

    #[test]
    fn extracts_object_surrounded_by_prose() {
        let text = "Sure! Here you go:\n```json\n{\"score\": 85, \"keywords\": [\"apple\"]}\n```\nAnything else?";
        assert_eq!(
            extract_json_object(text),
            Some("{\"score\": 85, \"keywords\": [\"apple\"]}")
        );
    }

    #[test]
    fn extracts_first_of_several_objects() {
        let text = r#"{"a": {"b": 1}} {"c": 2}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let text = r#"{"insight_title": "Why } matters \" {", "score": 1} tail"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"insight_title": "Why } matters \" {", "score": 1}"#)
        );
    }

    #[test]
    fn unbalanced_or_missing_object_is_none() {
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object(r#"{"score": 85"#), None);
    }

    #[tokio::test]
    async fn ask_json_decodes_embedded_object() {
        let llm = Canned("Result: {\"keywords\": [\"Apple\", \"Ring\"]} done");
        let value = ask_json(&llm, "prompt").await.unwrap();
        assert_eq!(value["keywords"][1], "Ring");
    }

    #[tokio::test]
    async fn ask_json_reports_missing_object() {
        let llm = Canned("I cannot help with that.");
        let err = ask_json(&llm, "prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::NoJsonObject));
    }

    #[tokio::test]
    async fn ask_json_reports_invalid_json() {
        let llm = Canned("{score: 85}");
        let err = ask_json(&llm, "prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Json(_)));
    }
}
