//! Notifier trait definition and shared error types.

use std::collections::HashMap;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Additional metadata (e.g., severity, rule name).
    pub metadata: HashMap<String, String>,
}

/// Rich context passed to notifiers for template rendering and delivery —
/// one classified filing (§4.11).
#[derive(Debug, Clone, serde::Serialize)]
pub struct NotificationContext {
    pub corp_id: String,
    pub company_name: String,
    pub symbol: Option<String>,
    pub isin: Option<String>,
    pub category: String,
    pub headline: String,
    pub summary: String,
    pub sentiment: String,
    pub individual_investor_list: Vec<String>,
    pub company_investor_list: Vec<String>,
    pub event_datetime: String,
    pub file_url: Option<String>,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        let test_notification = Notification {
            subject: "[TEST] Filing notification channel test".to_string(),
            body: "This is a test notification — no filing was actually classified.".to_string(),
            metadata: HashMap::from([
                ("corp_id".to_string(), "test-corp-id".to_string()),
                ("category".to_string(), "Procedural/Administrative".to_string()),
            ]),
        };
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel (e.g., "webhook", "email").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub entity_key: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
