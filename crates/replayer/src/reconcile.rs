//! Per-row reconciliation (§4.11): ensure PDF, classify (with the
//! negative-keyword shortcut), update checkpoints, insert to Store, mark
//! sent. Mirrors `pipeline::ai_worker`/`pipeline::store_worker`'s shape but
//! works directly off a [`CheckpointRow`] instead of a queued job, since the
//! whole point of replay is to recover rows a job never reached.

use chrono::{DateTime, Utc};
use pipeline_checkpoint::{CheckpointDb, CheckpointRow, CheckpointUpdate};
use pipeline_core::{
    derive_corp_id, matches_negative_keyword, Category, Exchange, FinData, RawClassification, Sentiment, StoredFiling,
    PROCEDURAL_SHORTCUT_SUMMARY,
};
use pipeline_llm::{ClassificationInput, ClassifierClient};
use pipeline_store::StoreClient;
use serde_json::Value;

use crate::error::ReplayerError;
use crate::pdf;

/// BSE rows carry `NEWSID`; NSE rows never do (their stable id is
/// `symbol:sort_date`, assembled by the scraper, not present verbatim in the
/// raw row). Absence of `NEWSID` is the cheapest reliable tell.
fn infer_exchange(raw: &Value) -> Exchange {
    if raw.get("NEWSID").is_some() {
        Exchange::Bse
    } else {
        Exchange::Nse
    }
}

fn extract_company_name(raw: &Value, fallback: &str) -> String {
    raw.get("SLONGNAME")
        .or_else(|| raw.get("SNAME"))
        .or_else(|| raw.get("sm_name"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn extract_isin(raw: &Value) -> Option<String> {
    raw.get("sm_isin").or_else(|| raw.get("isin")).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn extract_symbol(raw: &Value) -> Option<String> {
    raw.get("symbol").and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(str::to_string)
}

fn extract_event_date(raw: &Value, fallback: DateTime<Utc>) -> DateTime<Utc> {
    raw.get("NEWS_DT")
        .or_else(|| raw.get("sort_date"))
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(fallback)
}

fn procedural_shortcut(headline: &str) -> RawClassification {
    RawClassification {
        category: Category::ProceduralAdministrative.as_str().to_string(),
        headline: headline.to_string(),
        summary: PROCEDURAL_SHORTCUT_SUMMARY.to_string(),
        findata: FinData::default(),
        individual_investor_list: Vec::new(),
        company_investor_list: Vec::new(),
        sentiment: Sentiment::Neutral,
    }
}

/// `None` means the row was skipped outright (`--no-ai` with no shortcut
/// match) — the caller leaves it for a future AI-enabled pass rather than
/// inventing a classification.
async fn classify_row(
    classifier: &ClassifierClient,
    row: &CheckpointRow,
    pdf_path: Option<&std::path::Path>,
    skip_llm: bool,
) -> Result<Option<RawClassification>, ReplayerError> {
    if matches_negative_keyword(&row.headline) {
        tracing::debug!(news_id = %row.news_id, "negative-keyword shortcut, skipping Classifier call");
        return Ok(Some(procedural_shortcut(&row.headline)));
    }

    if skip_llm {
        tracing::debug!(news_id = %row.news_id, "--no-ai set and no shortcut match, leaving row for a later pass");
        return Ok(None);
    }

    if let Some(path) = pdf_path {
        let bytes = tokio::fs::read(path).await?;
        let raw = classifier.classify(ClassificationInput::Pdf { bytes: &bytes }).await?;
        return Ok(Some(raw));
    }

    let raw = classifier.classify(ClassificationInput::Text { headline: &row.headline, body: &row.raw_json }).await?;
    Ok(Some(raw))
}

/// Reconciles one checkpoint row end to end. Returns `Ok(())` whether or not
/// any work actually happened — a row already present in Store is a no-op
/// past the checkpoint catch-up, not an error.
pub async fn reconcile_row(
    client: &reqwest::Client,
    checkpoint: &CheckpointDb,
    store: &StoreClient,
    classifier: &ClassifierClient,
    row: &CheckpointRow,
    pdf_dir: &str,
    skip_llm: bool,
) -> Result<(), ReplayerError> {
    let raw: Value = serde_json::from_str(&row.raw_json)?;
    let exchange = infer_exchange(&raw);
    let corp_id = derive_corp_id(exchange, &row.news_id);

    if store.filing_exists(corp_id).await? {
        tracing::info!(news_id = %row.news_id, "already in Store, catching up checkpoint only");
        checkpoint
            .update_checkpoint(
                row.news_id.clone(),
                CheckpointUpdate {
                    ai_processed: Some(true),
                    sent_to_supabase: Some(true),
                    sent_to_supabase_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;
        return Ok(());
    }

    let pdf_path = pdf::ensure_pdf(client, checkpoint, row, pdf_dir).await?;
    let Some(raw_classification) = classify_row(classifier, row, pdf_path.as_deref(), skip_llm).await? else {
        return Ok(());
    };
    let classification = raw_classification.validate()?;

    checkpoint
        .update_checkpoint(
            row.news_id.clone(),
            CheckpointUpdate {
                ai_processed: Some(true),
                ai_summary: Some(classification.summary.clone()),
                ai_processed_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .await?;

    let isin = extract_isin(&raw);
    let event_date = extract_event_date(&raw, row.fetched_at);
    let filing = StoredFiling {
        corp_id,
        news_id: row.news_id.clone(),
        security_id: row.scrip_cd.clone(),
        isin: isin.clone(),
        symbol: extract_symbol(&raw),
        company_name: extract_company_name(&raw, &row.scrip_cd),
        category: classification.category,
        headline: classification.headline.clone(),
        ai_summary: classification.summary.clone(),
        original_summary: row.headline.clone(),
        sentiment: classification.sentiment,
        event_date,
        file_url: pdf_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
    };

    store.insert_filing(&filing).await?;

    if let Some(isin) = &isin {
        if !classification.findata.is_empty() {
            store.upsert_findata(corp_id, isin, &classification).await?;
        }
    }

    store.increment_category_count(event_date.date_naive(), classification.category).await?;

    checkpoint
        .update_checkpoint(
            row.news_id.clone(),
            CheckpointUpdate { sent_to_supabase: Some(true), sent_to_supabase_at: Some(Utc::now()), ..Default::default() },
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_bse_from_newsid_presence() {
        let raw = serde_json::json!({ "NEWSID": "N1" });
        assert_eq!(infer_exchange(&raw), Exchange::Bse);
    }

    #[test]
    fn infers_nse_when_newsid_absent() {
        let raw = serde_json::json!({ "symbol": "RELIANCE" });
        assert_eq!(infer_exchange(&raw), Exchange::Nse);
    }

    #[test]
    fn company_name_falls_back_when_no_name_field_present() {
        let raw = serde_json::json!({});
        assert_eq!(extract_company_name(&raw, "500325"), "500325");
    }

    #[test]
    fn procedural_shortcut_matches_ai_worker_placeholder() {
        let raw = procedural_shortcut("Closure of Trading Window");
        assert_eq!(raw.summary, PROCEDURAL_SHORTCUT_SUMMARY);
        assert_eq!(raw.category, Category::ProceduralAdministrative.as_str());
    }
}
