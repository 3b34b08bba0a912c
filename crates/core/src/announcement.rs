use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::Category;
use crate::error::CoreError;

/// The exchange an announcement originated from. Used only to namespace
/// `corp_id` derivation — everything downstream is exchange-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Bse,
    Nse,
}

impl Exchange {
    fn prefix(&self) -> &'static str {
        match self {
            Exchange::Bse => "bse:",
            Exchange::Nse => "nse:",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exchange::Bse => write!(f, "BSE"),
            Exchange::Nse => write!(f, "NSE"),
        }
    }
}

impl std::str::FromStr for Exchange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bse" => Ok(Exchange::Bse),
            "nse" => Ok(Exchange::Nse),
            other => Err(CoreError::UnknownExchange(other.to_string())),
        }
    }
}

/// The fixed namespace UUID every `corp_id` is derived relative to. Chosen once
/// and never changed — changing it would silently re-key every existing filing.
/// Corresponds to the "URL" namespace referenced by the idempotency rule.
pub const CORP_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x14, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

/// Deterministically derive the pipeline-wide identity of an announcement.
/// `corp_id = UUIDv5(CORP_ID_NAMESPACE, "bse:"|"nse:" + news_id)`. Any two
/// stages that compute this for the same `(exchange, news_id)` pair agree.
pub fn derive_corp_id(exchange: Exchange, news_id: &str) -> Uuid {
    let name = format!("{}{}", exchange.prefix(), news_id);
    Uuid::new_v5(&CORP_ID_NAMESPACE, name.as_bytes())
}

/// One exchange-published filing, as captured by a scraper. Created once and
/// mutated only through checkpoint-column updates (see `checkpoint` crate)
/// until inserted into Store; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    /// Exchange-native identifier, globally unique per exchange.
    pub news_id: String,
    pub exchange: Exchange,
    /// Pure function of `(exchange, news_id)`. See [`derive_corp_id`].
    pub corp_id: Uuid,
    pub security_id: String,
    pub isin: Option<String>,
    pub symbol: Option<String>,
    pub company_name: String,
    pub event_datetime: DateTime<Utc>,
    pub raw_headline: String,
    /// Filename of an attached PDF, if any.
    pub attachment_name: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Announcement {
    pub fn new(
        exchange: Exchange,
        news_id: impl Into<String>,
        security_id: impl Into<String>,
        company_name: impl Into<String>,
        raw_headline: impl Into<String>,
        event_datetime: DateTime<Utc>,
    ) -> Self {
        let news_id = news_id.into();
        let corp_id = derive_corp_id(exchange, &news_id);
        Self {
            news_id,
            exchange,
            corp_id,
            security_id: security_id.into(),
            isin: None,
            symbol: None,
            company_name: company_name.into(),
            event_datetime,
            raw_headline: raw_headline.into(),
            attachment_name: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment_name.as_deref().is_some_and(|a| !a.is_empty())
    }
}

/// `sentiment` field of a [`Classification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

/// Financial figures extracted for one reporting period, carried as the
/// `findata` field of a [`Classification`]. Stored as a JSON string on the
/// wire (job payloads, Store rows) but modeled here as a typed struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinData {
    pub period: Option<String>,
    pub sales_current: Option<String>,
    pub sales_previous_year: Option<String>,
    pub pat_current: Option<String>,
    pub pat_previous_year: Option<String>,
}

impl FinData {
    pub fn is_empty(&self) -> bool {
        self.period.is_none()
            && self.sales_current.is_none()
            && self.sales_previous_year.is_none()
            && self.pat_current.is_none()
            && self.pat_previous_year.is_none()
    }
}

/// The structured record the Classifier returns. `category` must lie in the
/// closed [`Category`] enum or the result is rejected by the caller (AIWorker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub headline: String,
    /// Markdown summary.
    pub summary: String,
    pub findata: FinData,
    pub individual_investor_list: Vec<String>,
    pub company_investor_list: Vec<String>,
    pub sentiment: Sentiment,
}

/// Raw Classifier response before category validation — `category` may be
/// `"Error"` or any other string outside the closed enum, which is exactly
/// what AIWorker needs to detect and handle.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClassification {
    pub category: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub findata: FinData,
    #[serde(default)]
    pub individual_investor_list: Vec<String>,
    #[serde(default)]
    pub company_investor_list: Vec<String>,
    #[serde(default = "default_sentiment")]
    pub sentiment: Sentiment,
}

fn default_sentiment() -> Sentiment {
    Sentiment::Neutral
}

impl RawClassification {
    /// True if the Classifier reported its own internal failure.
    pub fn is_error_literal(&self) -> bool {
        self.category == Category::ERROR_LITERAL
    }

    /// Validate `category` against the closed enum, turning this into a
    /// usable [`Classification`]. Returns `Err` for `"Error"` and for any
    /// string outside the 48-value set.
    pub fn validate(self) -> Result<Classification, CoreError> {
        let category: Category = self.category.parse()?;
        Ok(Classification {
            category,
            headline: self.headline,
            summary: self.summary,
            findata: self.findata,
            individual_investor_list: self.individual_investor_list,
            company_investor_list: self.company_investor_list,
            sentiment: self.sentiment,
        })
    }
}

/// The row ultimately inserted into Store's `corporatefilings` table.
/// One-to-one with [`Announcement`] via `corp_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFiling {
    pub corp_id: Uuid,
    pub news_id: String,
    pub security_id: String,
    pub isin: Option<String>,
    pub symbol: Option<String>,
    pub company_name: String,
    pub category: Category,
    pub headline: String,
    pub ai_summary: String,
    pub original_summary: String,
    pub sentiment: Sentiment,
    pub event_date: DateTime<Utc>,
    pub file_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corp_id_is_deterministic_for_same_exchange_and_news_id() {
        let a = derive_corp_id(Exchange::Bse, "N001");
        let b = derive_corp_id(Exchange::Bse, "N001");
        assert_eq!(a, b);
    }

    #[test]
    fn corp_id_differs_across_exchanges_for_same_news_id() {
        let bse = derive_corp_id(Exchange::Bse, "N001");
        let nse = derive_corp_id(Exchange::Nse, "N001");
        assert_ne!(bse, nse);
    }

    #[test]
    fn raw_classification_rejects_error_literal() {
        let raw = RawClassification {
            category: "Error".to_string(),
            headline: String::new(),
            summary: String::new(),
            findata: FinData::default(),
            individual_investor_list: vec![],
            company_investor_list: vec![],
            sentiment: Sentiment::Neutral,
        };
        assert!(raw.is_error_literal());
        assert!(raw.validate().is_err());
    }

    #[test]
    fn raw_classification_accepts_a_known_category() {
        let raw = RawClassification {
            category: "Financial Results".to_string(),
            headline: "Board Meeting Outcome Q1".to_string(),
            summary: "summary".to_string(),
            findata: FinData::default(),
            individual_investor_list: vec![],
            company_investor_list: vec![],
            sentiment: Sentiment::Positive,
        };
        let classified = raw.validate().expect("known category must validate");
        assert_eq!(classified.category, Category::FinancialResults);
    }
}
