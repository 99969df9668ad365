//! Translation of headlines and summaries into the display language.
//!
//! Source language is always auto-detected. A failed translation is never
//! fatal: [`translate_or_keep`] hands back the original text.

use reqwest::Client;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::config::Settings;
use crate::error::TranslateError;
use crate::utils::truncate_for_log;

const GOOGLE_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

pub trait Translate {
    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

/// Client for the public Google translate endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTranslator {
    client: Client,
    target: String,
}

impl GoogleTranslator {
    pub fn new(settings: &Settings) -> Result<Self, TranslateError> {
        Ok(Self {
            client: Client::builder().timeout(settings.translate_timeout).build()?,
            target: settings.display_language.clone(),
        })
    }

    fn request(&self, text: &str) -> reqwest::RequestBuilder {
        let url = format!(
            "{}?client=gtx&sl=auto&tl={}&dt=t&q={}",
            GOOGLE_TRANSLATE_ENDPOINT,
            urlencoding::encode(&self.target),
            urlencoding::encode(text)
        );
        self.client.get(url)
    }
}

impl Translate for GoogleTranslator {
    #[instrument(level = "debug", skip_all, fields(target = %self.target))]
    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let res = self.request(text).send().await?;
        if !res.status().is_success() {
            return Err(TranslateError::Status(res.status()));
        }
        let body: Value = res.json().await?;
        parse_google_response(&body)
    }
}

/// The endpoint answers `[[["chunk", "source", ...], ...], ...]`; the
/// translation is the concatenation of the first element of every chunk.
fn parse_google_response(body: &Value) -> Result<String, TranslateError> {
    let chunks = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or(TranslateError::Malformed)?;
    let text: String = chunks
        .iter()
        .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(TranslateError::Malformed);
    }
    Ok(text)
}

/// Translate `text`, or return it unchanged if translation fails.
pub async fn translate_or_keep<T: Translate>(translator: &T, text: &str) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    match translator.translate(text).await {
        Ok(translated) => translated,
        Err(e) => {
            warn!(error = %e, text = %truncate_for_log(text, 80), "Translation failed; keeping source text");
            text.to_string()
        }
    }
}
