//! Gemini-backed filing classifier (§6): upload the filing's PDF (or fall
//! back to raw text), ask for a structured classification, and hand back
//! an unvalidated [`RawClassification`] for the caller to validate.
//!
//! Mirrors the three-step shape of this workspace's other Gemini-touching
//! tools — upload, generate, parse — with a per-endpoint minimum delay
//! between calls rather than a token-bucket, since the quota this guards
//! against is a simple per-second cap.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::Engine;
use pipeline_core::{Category, RawClassification, Sentiment};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ClassifierConfig;

const UPLOAD_ENDPOINT: &str = "https://generativelanguage.googleapis.com/upload/v1beta/files";
const GENERATE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier not configured: GEMINI_API_KEY is empty")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("file upload timed out after {0:?}")]
    UploadTimeout(Duration),
    #[error("generation timed out after {0:?}")]
    GenerateTimeout(Duration),
    #[error("Gemini API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse classification response: {0}")]
    Parse(String),
}

/// One call's worth of source material — either an uploaded PDF or the
/// announcement's plain-text fallback, never both (§6, §9).
pub enum ClassificationInput<'a> {
    Pdf { bytes: &'a [u8] },
    Text { headline: &'a str, body: &'a str },
}

/// Self-describing structured response shape requested from Gemini —
/// mirrors [`RawClassification`] field-for-field so `serde_json` does the
/// parsing work for us.
#[derive(Debug, Deserialize)]
struct GeminiClassification {
    category: String,
    headline: String,
    summary: String,
    findata: Option<FinDataFields>,
    #[serde(default)]
    individual_investor_list: Vec<String>,
    #[serde(default)]
    company_investor_list: Vec<String>,
    sentiment: String,
}

#[derive(Debug, Deserialize)]
struct FinDataFields {
    period: Option<String>,
    sales_current: Option<String>,
    sales_previous_year: Option<String>,
    pat_current: Option<String>,
    pat_previous_year: Option<String>,
}

/// Per-process sliding-window rate limiter (§6, §9): a bounded deque of call
/// timestamps on a monotonic clock, never wall-clock. A call is allowed
/// immediately once fewer than `rpm` calls remain inside the trailing
/// 60-second window; otherwise it waits until the oldest call in the window
/// ages out. Enforced independently per endpoint (upload, generate), mirroring
/// how the two Gemini endpoints are throttled separately upstream.
struct RateGate {
    rpm: u32,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    fn new(rpm: u32) -> Self {
        Self { rpm: rpm.max(1), window: Duration::from_secs(60), calls: Mutex::new(VecDeque::new()) }
    }

    async fn wait(&self) {
        loop {
            let sleep_for = {
                let mut calls = self.calls.lock().expect("rate gate mutex poisoned");
                let now = Instant::now();
                while calls.front().is_some_and(|&t| now.duration_since(t) >= self.window) {
                    calls.pop_front();
                }
                if calls.len() < self.rpm as usize {
                    calls.push_back(now);
                    None
                } else {
                    let oldest = *calls.front().expect("len >= rpm >= 1 implies non-empty");
                    Some(self.window - now.duration_since(oldest))
                }
            };
            match sleep_for {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

pub struct ClassifierClient {
    client: reqwest::Client,
    config: ClassifierConfig,
    upload_gate: RateGate,
    generate_gate: RateGate,
}

impl ClassifierClient {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_gate: RateGate::new(config.rate_limit_rpm),
            generate_gate: RateGate::new(config.rate_limit_rpm),
            config,
        }
    }

    fn ensure_configured(&self) -> Result<(), ClassifierError> {
        if self.config.api_key.is_empty() {
            return Err(ClassifierError::NotConfigured);
        }
        Ok(())
    }

    /// Classifies one announcement, dispatching to the PDF or text path.
    pub async fn classify(
        &self,
        input: ClassificationInput<'_>,
    ) -> Result<RawClassification, ClassifierError> {
        self.ensure_configured()?;
        match input {
            ClassificationInput::Pdf { bytes } => self.classify_pdf(bytes).await,
            ClassificationInput::Text { headline, body } => {
                self.classify_text(headline, body).await
            }
        }
    }

    async fn classify_pdf(&self, bytes: &[u8]) -> Result<RawClassification, ClassifierError> {
        let file_uri = self.upload_pdf(bytes).await?;
        let prompt = classification_prompt();
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "file_data": { "mime_type": "application/pdf", "file_uri": file_uri } },
                ],
            }],
            "generationConfig": { "response_mime_type": "application/json" },
        });
        let raw = self.generate(body).await?;
        parse_response(&raw)
    }

    async fn classify_text(
        &self,
        headline: &str,
        body_text: &str,
    ) -> Result<RawClassification, ClassifierError> {
        let prompt = format!(
            "{}\n\nAnnouncement to classify:\nHeadline: {}\n\nContent: {}",
            classification_prompt(),
            headline,
            body_text,
        );
        let request_body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "response_mime_type": "application/json" },
        });
        let raw = self.generate(request_body).await?;
        parse_response(&raw)
    }

    /// Uploads a PDF via Gemini's resumable Files API and returns the
    /// `file_uri` to reference from `generateContent`.
    async fn upload_pdf(&self, bytes: &[u8]) -> Result<String, ClassifierError> {
        self.upload_gate.wait().await;

        let start = json!({ "file": { "display_name": "filing.pdf" } });
        let timeout = Duration::from_secs(self.config.upload_timeout_secs);

        let start_resp = tokio::time::timeout(
            timeout,
            self.client
                .post(UPLOAD_ENDPOINT)
                .query(&[("key", self.config.api_key.as_str())])
                .header("X-Goog-Upload-Protocol", "resumable")
                .header("X-Goog-Upload-Command", "start")
                .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
                .header("X-Goog-Upload-Header-Content-Type", "application/pdf")
                .json(&start)
                .send(),
        )
        .await
        .map_err(|_| ClassifierError::UploadTimeout(timeout))??;

        let status = start_resp.status().as_u16();
        if status >= 300 {
            let body = start_resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Api { status, body });
        }
        let upload_url = start_resp
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ClassifierError::Parse("missing x-goog-upload-url header".into()))?
            .to_string();

        let upload_resp = tokio::time::timeout(
            timeout,
            self.client
                .post(&upload_url)
                .header("X-Goog-Upload-Command", "upload, finalize")
                .header("X-Goog-Upload-Offset", "0")
                .header("Content-Length", bytes.len().to_string())
                .body(bytes.to_vec())
                .send(),
        )
        .await
        .map_err(|_| ClassifierError::UploadTimeout(timeout))??;

        let status = upload_resp.status().as_u16();
        if status >= 300 {
            let body = upload_resp.text().await.unwrap_or_default();
            return Err(ClassifierError::Api { status, body });
        }

        let parsed: Value = upload_resp.json().await?;
        parsed["file"]["uri"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClassifierError::Parse("missing file.uri in upload response".into()))
    }

    async fn generate(&self, body: Value) -> Result<String, ClassifierError> {
        self.generate_gate.wait().await;

        let url = format!("{}/{}:generateContent", GENERATE_ENDPOINT, self.config.model);
        let timeout = Duration::from_secs(self.config.generate_timeout_secs);

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&url)
                .query(&[("key", self.config.api_key.as_str())])
                .json(&body)
                .send(),
        )
        .await
        .map_err(|_| ClassifierError::GenerateTimeout(timeout))??;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api { status, body });
        }

        let resp: Value = response.json().await?;
        resp["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ClassifierError::Parse("missing candidates[0].content.parts[0].text".into())
            })
    }
}

/// Strips an optional ```json fenced code block before parsing — Gemini
/// sometimes wraps JSON output in markdown even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

fn parse_response(text: &str) -> Result<RawClassification, ClassifierError> {
    let text = strip_code_fence(text);
    let parsed: GeminiClassification = serde_json::from_str(text)
        .map_err(|e| ClassifierError::Parse(format!("{e}: {text}")))?;

    let findata = parsed.findata.unwrap_or(FinDataFields {
        period: None,
        sales_current: None,
        sales_previous_year: None,
        pat_current: None,
        pat_previous_year: None,
    });

    Ok(RawClassification {
        category: parsed.category,
        headline: parsed.headline,
        summary: parsed.summary,
        findata: pipeline_core::FinData {
            period: findata.period,
            sales_current: findata.sales_current,
            sales_previous_year: findata.sales_previous_year,
            pat_current: findata.pat_current,
            pat_previous_year: findata.pat_previous_year,
        },
        individual_investor_list: parsed.individual_investor_list,
        company_investor_list: parsed.company_investor_list,
        sentiment: parse_sentiment(&parsed.sentiment),
    })
}

/// Gemini is asked for exactly "Positive"/"Negative"/"Neutral" but answers
/// case-insensitively in practice; anything unrecognized defaults to
/// [`Sentiment::Neutral`] rather than rejecting the whole classification.
fn parse_sentiment(s: &str) -> Sentiment {
    match s.trim().to_ascii_lowercase().as_str() {
        "positive" => Sentiment::Positive,
        "negative" => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

/// Builds the classification instruction from the closed category set in
/// [`pipeline_core::Category`] rather than hard-coding the list a second
/// time here.
fn classification_prompt() -> String {
    let categories = Category::ALL_CATEGORIES
        .iter()
        .map(|c| format!("- {}", c.as_str()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are classifying a corporate filing announcement from an Indian stock exchange.\n\
         Pick exactly one category from this fixed list (use the exact text):\n{categories}\n\n\
         Return ONLY a JSON object with these fields, no preamble and no markdown fence:\n\
         category (string, one of the list above), headline (string), summary (string, 2-4 \
         sentences), findata (object with period, sales_current, sales_previous_year, \
         pat_current, pat_previous_year — use null for anything not disclosed), \
         individual_investor_list (array of strings), company_investor_list (array of \
         strings), sentiment (one of: Positive, Negative, Neutral)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn leaves_bare_json_untouched() {
        let bare = "{\"a\": 1}";
        assert_eq!(strip_code_fence(bare), bare);
    }

    #[test]
    fn parses_full_classification_payload() {
        let text = r#"{
            "category": "Financial Results",
            "headline": "Q1 results announced",
            "summary": "The company reported higher revenue.",
            "findata": {
                "period": "Q1FY25",
                "sales_current": "100",
                "sales_previous_year": "90",
                "pat_current": "10",
                "pat_previous_year": "8"
            },
            "individual_investor_list": ["Jane Doe"],
            "company_investor_list": [],
            "sentiment": "Positive"
        }"#;
        let parsed = parse_response(text).expect("valid payload parses");
        assert_eq!(parsed.category, "Financial Results");
        assert_eq!(parsed.sentiment, Sentiment::Positive);
        assert_eq!(parsed.individual_investor_list, vec!["Jane Doe".to_string()]);
    }

    #[test]
    fn rate_gate_allows_calls_up_to_rpm_without_waiting() {
        let gate = RateGate::new(2);
        let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
        rt.block_on(async {
            let start = Instant::now();
            gate.wait().await;
            gate.wait().await;
            assert!(start.elapsed() < Duration::from_millis(50));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn rate_gate_blocks_once_window_is_full() {
        let gate = std::sync::Arc::new(RateGate::new(1));
        gate.wait().await;

        let start = Instant::now();
        let gate2 = gate.clone();
        let handle = tokio::spawn(async move { gate2.wait().await });

        tokio::time::advance(Duration::from_secs(61)).await;
        handle.await.expect("task did not panic");
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
