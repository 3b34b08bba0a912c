//! BSE (Bombay Stock Exchange) feed adapter — `AnnSubCategoryGetData` plus
//! the companion `ComHeadernew` ISIN lookup, grounded on `BseScraper` in the
//! original scraper.

use std::time::Duration;

use chrono::{NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ScraperError;
use crate::feed::FetchedItem;

const ANNOUNCEMENTS_URL: &str = "https://api.bseindia.com/BseIndiaAPI/api/AnnSubCategoryGetData/w";
const ISIN_URL: &str = "https://api.bseindia.com/BseIndiaAPI/api/ComHeadernew/w";
const ATTACHMENT_BASE: &str = "https://www.bseindia.com/xml-data/corpfiling/AttachLive/";

#[derive(Debug, Deserialize)]
struct BseEnvelope {
    #[serde(default, rename = "Table")]
    table: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct IsinResponse {
    #[serde(rename = "ISIN", default)]
    isin: Option<String>,
}

pub struct BseFeed {
    client: reqwest::Client,
    timeout: Duration,
    max_retries: u32,
}

impl BseFeed {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0")
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout, max_retries })
    }

    /// `GET AnnSubCategoryGetData` for the `[prev_date, to_date]` window,
    /// retrying on transport error up to `max_retries` times with a fixed
    /// 5-second wait, mirroring `BseScraper.fetch_data`.
    pub async fn fetch_data(&self, prev_date: &str, to_date: &str) -> Result<Vec<FetchedItem>, ScraperError> {
        let mut last_err = None;
        for attempt in 1..=self.max_retries {
            match self.try_fetch(prev_date, to_date).await {
                Ok(items) => return Ok(items),
                Err(e) => {
                    tracing::warn!(attempt, max = self.max_retries, error = %e, "BSE fetch_data attempt failed");
                    last_err = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ScraperError::BadResponse("BSE fetch_data exhausted retries".into())))
    }

    async fn try_fetch(&self, prev_date: &str, to_date: &str) -> Result<Vec<FetchedItem>, ScraperError> {
        let resp = self
            .client
            .get(ANNOUNCEMENTS_URL)
            .header("Referer", "https://www.bseindia.com/")
            .header("Origin", "https://www.bseindia.com")
            .query(&[
                ("pageno", "1"),
                ("strCat", "-1"),
                ("strPrevDate", prev_date),
                ("strScrip", ""),
                ("strSearch", "P"),
                ("strToDate", to_date),
                ("strType", "C"),
                ("subcategory", "-1"),
            ])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let envelope: BseEnvelope = resp.json().await?;
        if envelope.table.is_empty() {
            tracing::debug!("BSE feed returned no announcements for window");
        }

        Ok(envelope.table.into_iter().filter_map(Self::to_fetched_item).collect())
    }

    fn to_fetched_item(row: Value) -> Option<FetchedItem> {
        let news_id = row.get("NEWSID")?.as_str()?.to_string();
        let scrip_cd = row.get("SCRIP_CD").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let headline = row.get("HEADLINE").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let company_name = row
            .get("SLONGNAME")
            .or_else(|| row.get("SNAME"))
            .and_then(|v| v.as_str())
            .unwrap_or(&scrip_cd)
            .to_string();
        let attachment_name = row
            .get("ATTACHMENTNAME")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let pdf_url = attachment_name.as_ref().map(|name| format!("{ATTACHMENT_BASE}{name}"));

        let date_raw = row.get("NEWS_DT").and_then(|v| v.as_str()).unwrap_or_default();
        let event_datetime = parse_bse_datetime(date_raw).unwrap_or_else(Utc::now);

        Some(FetchedItem {
            news_id,
            security_id: scrip_cd,
            company_name,
            headline,
            event_datetime,
            attachment_name,
            pdf_url,
            isin: None,
            symbol: None,
            raw: row,
        })
    }

    /// ISIN lookup for a BSE scrip code, retried up to `self.max_retries`
    /// times with a fixed 5-second wait (mirrors `get_isin`). `"N/A"` from the
    /// feed is treated as "no ISIN", not an error.
    pub async fn get_isin(&self, scrip_cd: &str) -> Result<Option<String>, ScraperError> {
        if scrip_cd.is_empty() {
            return Ok(None);
        }
        let mut last_err = None;
        for attempt in 1..=self.max_retries {
            let result = self
                .client
                .get(ISIN_URL)
                .query(&[("quotetype", "EQ"), ("scripcode", scrip_cd), ("seriesid", "")])
                .header("Referer", "https://www.bseindia.com/")
                .header("Origin", "https://www.bseindia.com")
                .timeout(self.timeout)
                .send()
                .await
                .and_then(|r| r.error_for_status());

            match result {
                Ok(resp) => match resp.json::<IsinResponse>().await {
                    Ok(body) => {
                        return Ok(body.isin.filter(|i| i != "N/A" && !i.is_empty()));
                    }
                    Err(e) => last_err = Some(ScraperError::Http(e)),
                },
                Err(e) => {
                    tracing::warn!(attempt, scrip_cd, error = %e, "ISIN lookup attempt failed");
                    last_err = Some(ScraperError::Http(e));
                }
            }
            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
        tracing::error!(scrip_cd, "failed to get ISIN after all retries");
        Err(last_err.unwrap_or(ScraperError::BadResponse("ISIN lookup exhausted retries".into())))
    }
}

fn parse_bse_datetime(raw: &str) -> Option<chrono::DateTime<Utc>> {
    let trimmed = raw.split('.').next().unwrap_or(raw);
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .and_then(|naive| Utc.from_local_datetime(&naive).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_fetched_item_builds_attachment_url_from_name() {
        let row = serde_json::json!({
            "NEWSID": "N001",
            "SCRIP_CD": "500325",
            "HEADLINE": "Board Meeting Outcome",
            "SLONGNAME": "Reliance Industries Ltd",
            "ATTACHMENTNAME": "abc123.pdf",
            "NEWS_DT": "2026-07-29T10:30:00.000"
        });
        let item = BseFeed::to_fetched_item(row).unwrap();
        assert_eq!(item.news_id, "N001");
        assert_eq!(item.pdf_url.as_deref(), Some("https://www.bseindia.com/xml-data/corpfiling/AttachLive/abc123.pdf"));
        assert!(item.has_attachment());
    }

    #[test]
    fn missing_newsid_is_skipped() {
        let row = serde_json::json!({ "SCRIP_CD": "1" });
        assert!(BseFeed::to_fetched_item(row).is_none());
    }

    #[test]
    fn parses_bse_timestamp_with_fractional_seconds() {
        let dt = parse_bse_datetime("2026-07-29T10:30:00.000").unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2026-07-29");
    }
}
