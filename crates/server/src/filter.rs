//! The §4.8 intake filter: decides whether an accepted filing is pushed to
//! room `"all"` or silently dropped from the push channel. Checkpoint and
//! Store already have the row by the time this runs — the filter only
//! governs the WebSocket fan-out, never persistence.

use pipeline_core::{Category, StoredFiling};

/// Categories the push channel never forwards, even though Store keeps the
/// row. `Category::ERROR_LITERAL` can't actually reach here since
/// `StoredFiling::category` is already a validated [`Category`], but the
/// check is kept to mirror the rule as specified.
pub fn should_broadcast(filing: &StoredFiling) -> bool {
    if filing.corp_id.is_nil() {
        return false;
    }
    if filing.category == Category::ProceduralAdministrative || filing.category.as_str() == Category::ERROR_LITERAL {
        return false;
    }
    if filing.ai_summary.trim().is_empty() && filing.original_summary.trim().is_empty() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn base_filing() -> StoredFiling {
        StoredFiling {
            corp_id: Uuid::new_v4(),
            news_id: "N1".into(),
            security_id: "500325".into(),
            isin: None,
            symbol: None,
            company_name: "Acme Ltd".into(),
            category: Category::FinancialResults,
            headline: "Board Meeting Outcome".into(),
            ai_summary: "Quarterly results approved.".into(),
            original_summary: String::new(),
            sentiment: pipeline_core::Sentiment::Positive,
            event_date: Utc::now(),
            file_url: None,
        }
    }

    #[test]
    fn accepts_a_normal_filing() {
        assert!(should_broadcast(&base_filing()));
    }

    #[test]
    fn rejects_nil_corp_id() {
        let mut filing = base_filing();
        filing.corp_id = Uuid::nil();
        assert!(!should_broadcast(&filing));
    }

    #[test]
    fn rejects_procedural_administrative() {
        let mut filing = base_filing();
        filing.category = Category::ProceduralAdministrative;
        assert!(!should_broadcast(&filing));
    }

    #[test]
    fn rejects_blank_summaries() {
        let mut filing = base_filing();
        filing.ai_summary = "   ".into();
        filing.original_summary = "".into();
        assert!(!should_broadcast(&filing));
    }

    #[test]
    fn keeps_filing_with_only_original_summary() {
        let mut filing = base_filing();
        filing.ai_summary = String::new();
        filing.original_summary = "Please refer to the original document.".into();
        assert!(should_broadcast(&filing));
    }
}
