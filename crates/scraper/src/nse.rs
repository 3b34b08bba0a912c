//! NSE (National Stock Exchange) feed adapter — a cookie-bearing warm-up
//! sequence followed by the `corporate-announcements` API call, grounded on
//! `NseScraper._initialize_session`/`fetch_data` in the original scraper.
//! NSE fronts its API with bot detection that rejects any request lacking
//! cookies from a prior page visit, hence the session dance below.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScraperError;
use crate::feed::FetchedItem;

const HOMEPAGE_URL: &str = "https://www.nseindia.com/";
const MARKET_DATA_URL: &str = "https://www.nseindia.com/market-data";
const FILINGS_PAGE_URL: &str = "https://www.nseindia.com/companies-listing/corporate-filings-announcements";
const API_URL: &str = "https://www.nseindia.com/api/corporate-announcements";

#[derive(Debug, Deserialize)]
struct NseResponseEnvelope {
    #[serde(default)]
    data: Vec<Value>,
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Accept",
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert("Cache-Control", HeaderValue::from_static("max-age=0"));
    headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));
    headers
}

pub struct NseFeed {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl NseFeed {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36")
            .default_headers(browser_headers())
            .cookie_store(true)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout, max_retries })
    }

    /// Three-page warm-up that seeds the session's cookie jar before the API
    /// will answer: the homepage, the market-data landing page, then the
    /// corporate-filings-announcements page itself.
    async fn initialize_session(&self) -> Result<(), ScraperError> {
        tracing::debug!("visiting NSE homepage");
        self.client
            .get(HOMEPAGE_URL)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!("visiting NSE market-data page");
        self.client
            .get(MARKET_DATA_URL)
            .header("Referer", HOMEPAGE_URL)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        tracing::debug!("visiting NSE corporate-filings-announcements page");
        self.client
            .get(FILINGS_PAGE_URL)
            .header("Referer", MARKET_DATA_URL)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Warm up the session, then call `corporate-announcements` for
    /// `[from_date, to_date]`, retrying the whole sequence (not just the API
    /// call) on failure — a stale cookie jar needs a fresh warm-up, not just
    /// a fresh request.
    pub async fn fetch_data(&self, from_date: &str, to_date: &str) -> Result<Vec<FetchedItem>, ScraperError> {
        let mut last_err = None;
        for attempt in 1..=self.max_retries {
            match self.try_fetch(from_date, to_date).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    tracing::warn!(attempt, max = self.max_retries, error = %e, "NSE fetch_data attempt failed");
                    last_err = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ScraperError::BadResponse("NSE fetch_data exhausted retries".into())))
    }

    async fn try_fetch(&self, from_date: &str, to_date: &str) -> Result<Vec<FetchedItem>, ScraperError> {
        self.initialize_session()
            .await
            .map_err(|e| ScraperError::SessionWarmup(e.to_string()))?;

        let resp = self
            .client
            .get(API_URL)
            .header("Accept", "application/json, text/plain, */*")
            .header("Referer", FILINGS_PAGE_URL)
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .query(&[("index", "equities"), ("from_date", from_date), ("to_date", to_date)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let envelope: NseResponseEnvelope = resp.json().await?;
        Ok(envelope.data.into_iter().filter_map(Self::to_fetched_item).collect())
    }

    fn to_fetched_item(row: Value) -> Option<FetchedItem> {
        let symbol = row.get("symbol").and_then(|v| v.as_str())?.to_string();
        let headline = row.get("attchmntText").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let pdf_url = row
            .get("attchmntFile")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let company_name = row.get("sm_name").and_then(|v| v.as_str()).unwrap_or(&symbol).to_string();
        let isin = row.get("sm_isin").and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(str::to_string);
        let sort_date = row.get("sort_date").and_then(|v| v.as_str()).unwrap_or_default();
        let event_datetime = parse_nse_datetime(sort_date).unwrap_or_else(Utc::now);

        // NSE's feed carries no stable numeric id; the (symbol, sort_date)
        // pair is effectively unique per announcement and doubles as our
        // `news_id` — the same role BSE's `NEWSID` plays.
        let news_id = format!("{symbol}:{sort_date}");

        let attachment_name = pdf_url
            .as_ref()
            .and_then(|u| u.rsplit('/').next())
            .map(str::to_string);

        Some(FetchedItem {
            news_id,
            security_id: symbol.clone(),
            company_name,
            headline,
            event_datetime,
            attachment_name,
            pdf_url,
            isin,
            symbol: Some(symbol),
            raw: row,
        })
    }
}

fn parse_nse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    for fmt in ["%d-%b-%Y %H:%M:%S", "%d-%b-%Y"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            if let Some(dt) = Utc.from_local_datetime(&naive).single() {
                return Some(dt);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fetched_item_derives_news_id_from_symbol_and_date() {
        let row = serde_json::json!({
            "symbol": "RELIANCE",
            "attchmntText": "Board Meeting Outcome",
            "attchmntFile": "https://nsearchives.nseindia.com/corporate/RELIANCE_123.pdf",
            "sm_name": "Reliance Industries Limited",
            "sm_isin": "INE002A01018",
            "sort_date": "29-Jul-2026 10:30:00"
        });
        let item = NseFeed::to_fetched_item(row).unwrap();
        assert_eq!(item.news_id, "RELIANCE:29-Jul-2026 10:30:00");
        assert_eq!(item.isin.as_deref(), Some("INE002A01018"));
        assert!(item.has_attachment());
    }

    #[test]
    fn missing_symbol_is_skipped() {
        let row = serde_json::json!({ "attchmntText": "x" });
        assert!(NseFeed::to_fetched_item(row).is_none());
    }
}
