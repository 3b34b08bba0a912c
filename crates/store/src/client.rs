//! Thin wrapper around the cloud Store (Postgres) for exactly the
//! operations the pipeline needs (§4.10). No ORM — plain `sqlx::query`/
//! `query_as`, the way this workspace's `IngestionSourceStore` talks to
//! Postgres: stateless unit struct, async methods taking `&PgPool`.

use chrono::{DateTime, NaiveDate, Utc};
use pipeline_core::{Category, Classification, Sentiment, StoredFiling};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::{is_unique_violation, StoreError};

/// Outcome of an idempotent filing insert — both are "success" to the
/// caller, but distinguishing them lets StoreWorker log accurately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Financial figures for one `(isin, period)`, as read back from
/// `financial_results`.
#[derive(Debug, Clone, Default)]
pub struct FinancialRow {
    pub sales_current: Option<String>,
    pub sales_previous_year: Option<String>,
    pub pat_current: Option<String>,
    pub pat_previous_year: Option<String>,
}

impl FinancialRow {
    fn is_blank(field: &Option<String>) -> bool {
        field.as_deref().map(str::trim).is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone)]
pub struct InvestorLink {
    pub corp_id: Uuid,
    pub investor_id: Uuid,
    pub investor_name: String,
    pub verified: bool,
}

pub struct StoreClient {
    pool: PgPool,
}

impl StoreClient {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config.database_url.clone().unwrap_or_default();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Idempotency shield used by AIWorker step 4 — checks for an existing
    /// row before doing any classification work at all.
    pub async fn filing_exists(&self, corp_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM corporatefilings WHERE corp_id = $1")
            .bind(corp_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Idempotent insert of a filing. Duplicate `corp_id` is
    /// [`InsertOutcome::AlreadyExists`], not an error.
    pub async fn insert_filing(&self, filing: &StoredFiling) -> Result<InsertOutcome, StoreError> {
        let result = sqlx::query(
            "INSERT INTO corporatefilings \
                (corp_id, newsid, security_id, isin, symbol, company_name, category, \
                 headline, ai_summary, original_summary, sentiment, event_date, file_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(filing.corp_id)
        .bind(&filing.news_id)
        .bind(&filing.security_id)
        .bind(&filing.isin)
        .bind(&filing.symbol)
        .bind(&filing.company_name)
        .bind(filing.category.as_str())
        .bind(&filing.headline)
        .bind(&filing.ai_summary)
        .bind(&filing.original_summary)
        .bind(sentiment_str(filing.sentiment))
        .bind(filing.event_date)
        .bind(&filing.file_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Findata upsert with missing-fields-only overwrite (§4.10): lookup by
    /// `(isin, period)`; if found, UPDATE only the fields that are blank on
    /// the existing row and non-blank in `classification.findata`; never
    /// overwrite a non-blank value. If not found, INSERT — but only after
    /// verifying `corp_id` exists in `corporatefilings` (FK).
    pub async fn upsert_findata(
        &self,
        corp_id: Uuid,
        isin: &str,
        classification: &Classification,
    ) -> Result<(), StoreError> {
        let findata = &classification.findata;
        if findata.is_empty() {
            return Ok(());
        }
        let period = findata.period.clone().unwrap_or_default();

        let existing = sqlx::query(
            "SELECT sales_current, sales_previous_year, pat_current, pat_previous_year \
             FROM financial_results WHERE isin = $1 AND period = $2",
        )
        .bind(isin)
        .bind(&period)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some(row) => {
                let current = FinancialRow {
                    sales_current: row.try_get("sales_current").ok(),
                    sales_previous_year: row.try_get("sales_previous_year").ok(),
                    pat_current: row.try_get("pat_current").ok(),
                    pat_previous_year: row.try_get("pat_previous_year").ok(),
                };

                let mut sets = Vec::new();
                let mut bind_sales_current = None;
                let mut bind_sales_prev = None;
                let mut bind_pat_current = None;
                let mut bind_pat_prev = None;

                if FinancialRow::is_blank(&current.sales_current) && findata.sales_current.is_some() {
                    sets.push("sales_current = $3");
                    bind_sales_current = findata.sales_current.clone();
                }
                if FinancialRow::is_blank(&current.sales_previous_year) && findata.sales_previous_year.is_some() {
                    sets.push("sales_previous_year = $4");
                    bind_sales_prev = findata.sales_previous_year.clone();
                }
                if FinancialRow::is_blank(&current.pat_current) && findata.pat_current.is_some() {
                    sets.push("pat_current = $5");
                    bind_pat_current = findata.pat_current.clone();
                }
                if FinancialRow::is_blank(&current.pat_previous_year) && findata.pat_previous_year.is_some() {
                    sets.push("pat_previous_year = $6");
                    bind_pat_prev = findata.pat_previous_year.clone();
                }

                if sets.is_empty() {
                    return Ok(());
                }

                let sql = format!(
                    "UPDATE financial_results SET {} WHERE isin = $1 AND period = $2",
                    sets.join(", ")
                );
                sqlx::query(&sql)
                    .bind(isin)
                    .bind(&period)
                    .bind(bind_sales_current)
                    .bind(bind_sales_prev)
                    .bind(bind_pat_current)
                    .bind(bind_pat_prev)
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                if !self.filing_exists(corp_id).await? {
                    return Err(StoreError::MissingParentFiling(corp_id));
                }
                sqlx::query(
                    "INSERT INTO financial_results \
                        (corp_id, isin, period, sales_current, sales_previous_year, pat_current, pat_previous_year) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(corp_id)
                .bind(isin)
                .bind(&period)
                .bind(&findata.sales_current)
                .bind(&findata.sales_previous_year)
                .bind(&findata.pat_current)
                .bind(&findata.pat_previous_year)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    /// Read-modify-write on the per-day `announcement_categories` counter
    /// (§4.10). Racy under concurrent StoreWorkers for the same date — an
    /// accepted risk per §9, not fixed here.
    pub async fn increment_category_count(&self, date: NaiveDate, category: Category) -> Result<(), StoreError> {
        let column = category.column_name();
        let exists = sqlx::query("SELECT 1 FROM announcement_categories WHERE day = $1")
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_some() {
            let sql = format!(
                "UPDATE announcement_categories SET {column} = COALESCE({column}, 0) + 1 WHERE day = $1"
            );
            sqlx::query(&sql).bind(date).execute(&self.pool).await?;
        } else {
            let sql = format!("INSERT INTO announcement_categories (day, {column}) VALUES ($1, 1)");
            sqlx::query(&sql).bind(date).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Looks up a name in `smart_investors`/`investor_aliases`. Returns the
    /// resolved investor id if found.
    pub async fn resolve_investor(&self, name: &str) -> Result<Option<Uuid>, StoreError> {
        let row = sqlx::query("SELECT id FROM smart_investors WHERE lower(name) = lower($1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(row) = row {
            return Ok(Some(row.try_get("id")?));
        }

        let row = sqlx::query("SELECT investor_id FROM investor_aliases WHERE lower(alias) = lower($1)")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("investor_id")?)),
            None => Ok(None),
        }
    }

    /// Creates a row in `unverified_investors` for a name that resolved to
    /// nothing, returning its freshly generated id.
    pub async fn create_unverified_investor(&self, name: &str) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO unverified_investors (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    /// Bulk insert of investor link rows into `investorCorp`. Duplicate
    /// `(corp_id, investor_id)` is tolerated, not an error.
    pub async fn insert_investor_links(&self, links: &[InvestorLink]) -> Result<(), StoreError> {
        for link in links {
            let result = sqlx::query(
                "INSERT INTO \"investorCorp\" (corp_id, investor_id, investor_name, verified) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(link.corp_id)
            .bind(link.investor_id)
            .bind(&link.investor_name)
            .bind(link.verified)
            .execute(&self.pool)
            .await;

            if let Err(e) = result {
                if !is_unique_violation(&e) {
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

fn sentiment_str(s: Sentiment) -> &'static str {
    match s {
        Sentiment::Positive => "Positive",
        Sentiment::Negative => "Negative",
        Sentiment::Neutral => "Neutral",
    }
}

/// Timestamp helper shared by callers assembling [`StoredFiling`] rows.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_detection_treats_whitespace_as_blank() {
        assert!(FinancialRow::is_blank(&None));
        assert!(FinancialRow::is_blank(&Some("   ".to_string())));
        assert!(!FinancialRow::is_blank(&Some("123".to_string())));
    }
}
