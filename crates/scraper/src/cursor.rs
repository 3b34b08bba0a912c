//! The "last processed announcement" cursor file — a small JSON marker each
//! scraper reads on startup and rewrites after every successful pass, so a
//! restart resumes from where it left off instead of re-fetching from day 1.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScraperError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub news_id: String,
    pub headline: String,
}

/// Read the cursor file at `path`, if it exists. A missing file means "first
/// run" and is not an error.
pub fn load(path: impl AsRef<Path>) -> Result<Option<Cursor>, ScraperError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Overwrite the cursor file with `cursor`, creating parent directories as
/// needed. Called once per fetch pass, after the newest item has been queued.
pub fn save(path: impl AsRef<Path>, cursor: &Cursor) -> Result<(), ScraperError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_string_pretty(cursor)?;
    std::fs::write(path, raw)?;
    Ok(())
}

/// `true` if `candidate` is the same announcement already recorded by the
/// cursor — compares `news_id` then falls back to an exact headline match,
/// mirroring the original's "announcements_are_equal" de-dup fallback for
/// feeds that recycle ids.
pub fn is_same_as_cursor(cursor: &Cursor, news_id: &str, headline: &str) -> bool {
    cursor.news_id == news_id || (cursor.headline == headline && !headline.is_empty())
}

/// Today's UTC date in BSE's `strPrevDate`/`strToDate` format (`YYYYMMDD`).
pub fn today_bse_date() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

/// Today's UTC date in NSE's `from_date`/`to_date` format (`DD-MM-YYYY`).
pub fn today_nse_date() -> String {
    Utc::now().format("%d-%m-%Y").to_string()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cursor_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_announcement_bse.json");
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn saved_cursor_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest_announcement_bse.json");
        let cursor = Cursor { news_id: "N001".to_string(), headline: "Board Meeting Outcome".to_string() };
        save(&path, &cursor).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded, cursor);
    }

    #[test]
    fn is_same_as_cursor_falls_back_to_headline_match() {
        let cursor = Cursor { news_id: "N001".to_string(), headline: "Board Meeting Outcome".to_string() };
        assert!(is_same_as_cursor(&cursor, "N002", "Board Meeting Outcome"));
        assert!(!is_same_as_cursor(&cursor, "N002", "Different headline"));
    }
}
