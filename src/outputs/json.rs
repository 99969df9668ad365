//! JSON output for the presentation layer.
//!
//! All files are pretty-printed with non-ASCII text left as is, and written
//! to a temporary sibling first, then renamed into place, so readers never
//! see a half-written digest. Re-running overwrites the same files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::PublishError;
use crate::models::{BuzzSnapshot, ScoredItem};
use crate::utils::ensure_dir;

/// Order the digest by score, newest first among equal scores.
///
/// Stable, so items equal on both keys keep their incoming order.
pub fn rank(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.entry.date_obj.cmp(&a.entry.date_obj))
    });
}

pub fn archive_file_name(date: NaiveDate) -> String {
    format!("morning_sensing_{}.json", date.format("%Y-%m-%d"))
}

#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PublishError> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)
            .await
            .map_err(|e| PublishError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, json)
        .await
        .map_err(|e| PublishError::io(&tmp, e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| PublishError::io(path, e))?;
    Ok(())
}

/// Write the ranked digest and its dated archive copy.
///
/// Returns the archive path.
#[instrument(level = "info", skip_all, fields(items = items.len()))]
pub async fn write_digest(
    items: &[ScoredItem],
    digest_path: &Path,
    archive_dir: &Path,
    date: NaiveDate,
) -> Result<PathBuf, PublishError> {
    write_json(digest_path, items).await?;
    info!(path = %digest_path.display(), "Wrote digest");

    let archive_path = archive_dir.join(archive_file_name(date));
    write_json(&archive_path, items).await?;
    info!(path = %archive_path.display(), "Wrote archive copy");
    Ok(archive_path)
}

#[instrument(level = "info", skip_all, fields(keywords = snapshot.keywords.len()))]
pub async fn write_buzz(snapshot: &BuzzSnapshot, path: &Path) -> Result<(), PublishError> {
    write_json(path, snapshot).await?;
    info!(path = %path.display(), "Wrote buzz snapshot");
    Ok(())
}

/// Read a previously written buzz snapshot. Missing or unreadable files
/// yield `None`.
pub async fn load_buzz(path: &Path) -> Option<BuzzSnapshot> {
    let content = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No buzz snapshot on disk");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed buzz snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CONTENT_TYPE_NEWS, RawEntry};
    use chrono::{DateTime, TimeZone, Utc};

    fn item(id: &str, score: u8, date_obj: DateTime<Utc>, title: &str) -> ScoredItem {
        ScoredItem {
            entry: RawEntry {
                id: id.into(),
                title_en: title.into(),
                summary_en: String::new(),
                link: format!("https://news.example/{id}"),
                source: "Wired".into(),
                category: "Tech".into(),
                date_obj,
                date: date_obj.format("%Y.%m.%d").to_string(),
                thumbnail: String::new(),
            },
            pre_score: 10,
            is_tier1: true,
            score,
            insight_title: "스마트 링 출시".into(),
            core_summary: String::new(),
            keywords: Vec::new(),
            community_buzz: false,
            buzz_words: Vec::new(),
            content_type: CONTENT_TYPE_NEWS.into(),
        }
    }

    #[test]
    fn rank_by_score_then_recency() {
        let older = Utc.with_ymd_and_hms(2026, 10, 16, 0, 0, 0).unwrap();
        let newer = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        let mut items = vec![
            item("a", 70, newer, "a"),
            item("b", 90, older, "b"),
            item("c", 70, older, "c"),
            item("d", 90, newer, "d"),
        ];
        rank(&mut items);
        let ids: Vec<_> = items.iter().map(|i| i.entry.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn archive_name_uses_calendar_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(archive_file_name(date), "morning_sensing_2026-10-18.json");
    }

    #[tokio::test]
    async fn digest_and_archive_are_identical_and_keep_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let digest = dir.path().join("today_news.json");
        let archive_dir = dir.path().join("archive");
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let items = vec![item("a", 90, Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap(), "Ring")];

        let archive = write_digest(&items, &digest, &archive_dir, date).await.unwrap();
        let a = std::fs::read_to_string(&digest).unwrap();
        let b = std::fs::read_to_string(&archive).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("스마트 링 출시"));
        assert!(a.contains("\n  {"));
        assert!(!dir.path().join("today_news.json.tmp").exists());

        let back: Vec<ScoredItem> = serde_json::from_str(&a).unwrap();
        assert_eq!(back, items);
    }

    #[tokio::test]
    async fn empty_digest_is_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let digest = dir.path().join("today_news.json");
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        write_digest(&[], &digest, &dir.path().join("archive"), date).await.unwrap();
        assert_eq!(std::fs::read_to_string(&digest).unwrap(), "[]");
    }

    #[tokio::test]
    async fn buzz_snapshot_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("morning_buzz.json");
        let snapshot = BuzzSnapshot {
            date: "2026-10-18T12:00:00+00:00".into(),
            keywords: vec!["APPLE".into(), "RING".into()],
        };
        write_buzz(&snapshot, &path).await.unwrap();
        let back: BuzzSnapshot = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(load_buzz(&path).await, Some(snapshot));
    }

    #[tokio::test]
    async fn missing_or_malformed_buzz_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("morning_buzz.json");
        assert!(load_buzz(&path).await.is_none());
        std::fs::write(&path, "{\"keywords\": ").unwrap();
        assert!(load_buzz(&path).await.is_none());
    }
}
