//! Adapter for the cloud Store (§4.10) — the externally hosted relational
//! database the pipeline writes filings, findata, and investor links into.

mod client;
mod config;
mod error;

pub use client::{now, FinancialRow, InsertOutcome, InvestorLink, StoreClient};
pub use config::StoreConfig;
pub use error::{is_unique_violation, StoreError};
