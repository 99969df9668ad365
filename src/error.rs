//! Error categories for the sensing pipeline.
//!
//! Only [`ConfigError`] and [`PublishError`] ever reach `main`. The others are
//! absorbed by the stage that produced them: a failed feed yields no entries,
//! a failed LLM call yields fallback values, a failed translation leaves the
//! text as it was.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal problems detected before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is missing or empty")]
    MissingCredential(&'static str),

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot parse {path}: {source}")]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Per-feed failures. Never propagated past the fetch stage.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("feed could not be parsed: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// Failures talking to the LLM or making sense of its answer.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("llm responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("llm response carried no text")]
    EmptyResponse,

    #[error("no JSON object found in llm response")]
    NoJsonObject,

    #[error("llm JSON did not decode: {0}")]
    Json(#[from] serde_json::Error),
}

/// Translation failures; the caller keeps the untranslated text.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translate request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translator responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("translator response was not understood")]
    Malformed,
}

/// Writing the digest, archive or buzz snapshot failed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl PublishError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PublishError::Io {
            path: path.into(),
            source,
        }
    }
}
