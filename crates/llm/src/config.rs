use pipeline_core::config::{profiled_env_opt, profiled_env_or, profiled_env_u64};
use serde::{Deserialize, Serialize};

/// Settings for the fallback chat-style [`crate::provider::LlmProvider`]
/// backends (`create_provider`) — kept around for callers that just need
/// plain text completion, independent of [`ClassifierConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "gemini"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o-mini"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-3-5-sonnet-20241022"),
            gemini_api_key: profiled_env_opt(p, "GEMINI_API_KEY"),
            gemini_model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.5-flash"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3"),
        }
    }
}

/// Settings for [`crate::classifier::ClassifierClient`] — the Gemini-backed
/// multimodal filing classifier (§6, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub api_key: String,
    pub model: String,
    /// Per-process requests-per-minute cap, enforced independently for the
    /// upload and generate endpoints by a sliding-window limiter over a
    /// monotonic clock (§6, §9 — "do not use wall-clock").
    pub rate_limit_rpm: u32,
    pub upload_timeout_secs: u64,
    pub generate_timeout_secs: u64,
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        Self::from_env_profiled(&pipeline_core::config::active_profile())
    }

    pub fn from_env_profiled(p: &str) -> Self {
        Self {
            api_key: profiled_env_opt(p, "GEMINI_API_KEY").unwrap_or_default(),
            model: profiled_env_or(p, "GEMINI_MODEL", "gemini-2.5-flash"),
            rate_limit_rpm: profiled_env_u64(p, "GEMINI_RATE_LIMIT_RPM", 60) as u32,
            upload_timeout_secs: profiled_env_u64(p, "GEMINI_UPLOAD_TIMEOUT_SECS", 120),
            generate_timeout_secs: profiled_env_u64(p, "GEMINI_GENERATE_TIMEOUT_SECS", 300),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            model = %self.model,
            configured = !self.api_key.is_empty(),
            rate_limit_rpm = self.rate_limit_rpm,
            "classifier config loaded"
        );
    }
}
