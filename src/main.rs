//! # Morning Sensing
//!
//! A once-a-day technology briefing. Reads a curated list of RSS/Atom feeds,
//! learns what online communities are talking about, ranks the news by
//! relevance with an LLM and publishes a JSON digest for a separate viewer.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... morning_sensing
//! ```
//!
//! All files are resolved against the working directory, or against
//! `MORNING_SENSING_HOME` when it is set.
//!
//! ## Architecture
//!
//! 1. **Routing**: split active feeds into community and news tracks
//! 2. **Buzz**: fetch community feeds (10 at a time), extract trending keywords
//! 3. **Pre-filter**: fetch news feeds (20 at a time), keep the best 150 locally
//! 4. **Scoring**: one LLM call per candidate (5 at a time), then translation
//! 5. **Output**: fuse buzz, rank and write `today_news.json` plus an archive copy

use chrono::{DateTime, Utc};
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod buzz;
mod cli;
mod config;
mod error;
mod feeds;
mod models;
mod outputs;
mod pipeline;
mod prefilter;
mod prompts;
mod scoring;
mod translate;
mod utils;

use api::GeminiClient;
use cli::Cli;
use config::{Settings, load_channels};
use feeds::fetch::HttpFeedSource;
use pipeline::{Pipeline, RunReport};
use prompts::{Prompts, load_learned_preferences};
use translate::GoogleTranslator;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "morning_sensing starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let report = run(|name| std::env::var(name).ok(), Utc::now()).await?;

    let elapsed = start_time.elapsed();
    info!(
        community_feeds = report.community_feeds,
        news_feeds = report.news_feeds,
        community_entries = report.community_entries,
        news_entries = report.news_entries,
        buzz_keywords = report.buzz_keywords,
        candidates = report.candidates,
        published = report.published,
        community_buzz_items = report.community_buzz_items,
        archive = %report.archive_path.display(),
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Validate configuration, wire the real collaborators and run the pipeline.
///
/// The credential and `channels.json` are checked before any network
/// request or file write.
async fn run<F>(env: F, run_start: DateTime<Utc>) -> Result<RunReport, Box<dyn Error>>
where
    F: Fn(&str) -> Option<String>,
{
    let settings = Settings::from_lookup(env).inspect_err(|e| {
        error!(error = %e, "Configuration error");
    })?;
    info!(
        base_dir = %settings.base_dir.display(),
        model = %settings.gemini_model,
        language = %settings.display_language,
        "Loaded settings"
    );

    let channels = load_channels(&settings.channels_path()).inspect_err(|e| {
        error!(error = %e, "Cannot load channel list");
    })?;
    let prompts = Prompts::load(&settings.prompts_dir());
    let learned = load_learned_preferences(&settings.preferences_path());

    // ---- Collaborators ----
    let source = HttpFeedSource::new(&settings)?;
    let llm = GeminiClient::new(&settings, &prompts.persona)?;
    let translator = GoogleTranslator::new(&settings)?;

    let pipeline = Pipeline::new(&settings, &prompts, &learned, &source, &llm, &translator);
    pipeline.run(&channels, run_start).await.map_err(|e| {
        error!(error = %e, "Failed to publish digest");
        e.into()
    })
}
