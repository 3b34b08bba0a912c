//! Exchange-agnostic shapes the BSE and NSE fetchers normalize into, so the
//! shared run-loop (`run.rs`) never has to know which exchange it's driving.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One announcement as scraped, before it becomes a [`pipeline_core::Announcement`].
#[derive(Debug, Clone)]
pub struct FetchedItem {
    pub news_id: String,
    pub security_id: String,
    pub company_name: String,
    pub headline: String,
    pub event_datetime: DateTime<Utc>,
    pub attachment_name: Option<String>,
    pub pdf_url: Option<String>,
    pub isin: Option<String>,
    pub symbol: Option<String>,
    /// The untouched row as returned by the exchange feed, carried through to
    /// `AiProcessingPayload.announcement` and the checkpoint DB's `raw_json`.
    pub raw: Value,
}

impl FetchedItem {
    pub fn has_attachment(&self) -> bool {
        self.attachment_name.as_deref().is_some_and(|a| a.to_lowercase().ends_with(".pdf"))
            || self.pdf_url.is_some()
    }
}
