//! "Ensure PDF" step of the replay flow (§4.11): download a filing's
//! attachment to local disk if it isn't there already, and record its page
//! count. `downloaded_pdf_file`/`pdf_pages`/`pdf_downloaded_at` are
//! checkpoint columns no other stage writes — AIWorker classifies straight
//! from an in-memory byte stream (`ai_worker::classify_via_llm`) and never
//! persists the PDF, so the replayer is the first and only writer of these
//! three columns.

use std::path::{Path, PathBuf};

use chrono::Utc;
use pipeline_checkpoint::{CheckpointDb, CheckpointRow, CheckpointUpdate};
use serde_json::Value;

use crate::error::ReplayerError;

/// Mirrors `BseFeed`'s `ATTACHMENT_BASE` — BSE's raw feed row only carries
/// the bare filename (`ATTACHMENTNAME`), never a full URL.
const BSE_ATTACHMENT_BASE: &str = "https://www.bseindia.com/xml-data/corpfiling/AttachLive/";

/// Best-effort attachment URL resolution from a checkpoint row's stored
/// `raw_json`. NSE rows carry `attchmntFile` as an absolute URL already;
/// BSE rows carry only `ATTACHMENTNAME` and need the base prefix.
fn resolve_pdf_url(raw: &Value) -> Option<String> {
    if let Some(url) = raw.get("attchmntFile").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        return Some(url.to_string());
    }
    if let Some(name) = raw.get("ATTACHMENTNAME").and_then(|v| v.as_str()).filter(|s| !s.is_empty()) {
        return Some(format!("{BSE_ATTACHMENT_BASE}{name}"));
    }
    None
}

fn local_path(pdf_dir: &str, news_id: &str) -> PathBuf {
    Path::new(pdf_dir).join(format!("{news_id}.pdf"))
}

/// `pdf-extract` returns all text as one string; pages are delimited by
/// form-feed characters (`\x0C`), the same split the teacher's `ingest`
/// crate uses. A PDF with no form feeds (or no extractable text at all,
/// e.g. a scanned image) counts as one page.
fn count_pages(bytes: &[u8]) -> Result<i64, ReplayerError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| ReplayerError::PdfExtract(e.to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(1);
    }
    if trimmed.contains('\x0C') {
        let pages = trimmed.split('\x0C').filter(|p| !p.trim().is_empty()).count();
        return Ok(pages.max(1) as i64);
    }
    Ok(1)
}

/// Ensures the row's PDF (if it has one) is present on disk, downloading it
/// and updating the checkpoint row's PDF columns if this is the first time.
/// Returns `None` when the row carries no attachment at all — the caller
/// falls back to text classification.
pub async fn ensure_pdf(
    client: &reqwest::Client,
    checkpoint: &CheckpointDb,
    row: &CheckpointRow,
    pdf_dir: &str,
) -> Result<Option<PathBuf>, ReplayerError> {
    if let Some(existing) = &row.downloaded_pdf_file {
        let path = PathBuf::from(existing);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let raw: Value = serde_json::from_str(&row.raw_json)?;
    let Some(url) = resolve_pdf_url(&raw) else { return Ok(None) };

    std::fs::create_dir_all(pdf_dir)?;
    let path = local_path(pdf_dir, &row.news_id);

    let bytes = client.get(&url).send().await?.error_for_status()?.bytes().await?;
    tokio::fs::write(&path, &bytes).await?;

    let pages = count_pages(&bytes).unwrap_or_else(|e| {
        tracing::warn!(news_id = %row.news_id, error = %e, "page count failed, leaving pdf_pages unset");
        0
    });

    checkpoint
        .update_checkpoint(
            row.news_id.clone(),
            CheckpointUpdate {
                downloaded_pdf_file: Some(path.to_string_lossy().into_owned()),
                pdf_pages: if pages > 0 { Some(pages) } else { None },
                pdf_downloaded_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_nse_absolute_url_over_bse_filename() {
        let raw = serde_json::json!({ "attchmntFile": "https://nsearchives.nseindia.com/x.pdf", "ATTACHMENTNAME": "y.pdf" });
        assert_eq!(resolve_pdf_url(&raw).as_deref(), Some("https://nsearchives.nseindia.com/x.pdf"));
    }

    #[test]
    fn builds_bse_url_from_bare_filename() {
        let raw = serde_json::json!({ "ATTACHMENTNAME": "abc123.pdf" });
        assert_eq!(
            resolve_pdf_url(&raw).as_deref(),
            Some("https://www.bseindia.com/xml-data/corpfiling/AttachLive/abc123.pdf")
        );
    }

    #[test]
    fn no_attachment_resolves_to_none() {
        let raw = serde_json::json!({ "HEADLINE": "no attachment here" });
        assert!(resolve_pdf_url(&raw).is_none());
    }
}
