//! Minijinja template rendering for notification messages.
//!
//! Renders notification subject and body templates using minijinja,
//! with access to company metadata and the classified filing.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use crate::traits::NotifyError;

/// Context data available to notification templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TemplateContext {
    /// The company the filing belongs to.
    pub company: CompanyContext,
    /// The classified filing itself.
    pub filing: FilingContext,
    /// Event type: `"trigger"` or `"resolve"`.
    pub event: String,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

/// Company metadata exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CompanyContext {
    /// Company name.
    pub name: String,
    /// Optional NSE/BSE ticker symbol.
    pub symbol: Option<String>,
    /// Optional ISIN.
    pub isin: Option<String>,
}

/// Classified filing data exposed to templates.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FilingContext {
    /// `corp_id` of the filing.
    pub corp_id: String,
    /// Classification category.
    pub category: String,
    /// Classifier-generated headline.
    pub headline: String,
    /// Classifier-generated summary.
    pub summary: String,
    /// Sentiment label (e.g. `"Positive"`, `"Negative"`, `"Neutral"`).
    pub sentiment: String,
    /// Individual investors mentioned in the filing.
    pub individual_investor_list: Vec<String>,
    /// Company investors mentioned in the filing.
    pub company_investor_list: Vec<String>,
    /// Link to the original filing document, if any.
    pub file_url: Option<String>,
}

/// Renders notification templates using minijinja.
///
/// A fresh [`minijinja::Environment`] is created per render call since
/// templates are dynamic strings, not pre-registered files.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    /// Create a new template renderer.
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Build a configured minijinja environment with custom filters and globals.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();

        // Register custom filters
        env.add_filter("round", round_filter);

        // `lower` and `upper` are built-in with the "builtins" feature,
        // but we register explicit versions to guarantee availability.
        env.add_filter("lower", lower_filter);
        env.add_filter("upper", upper_filter);

        // Register global `env()` function for environment variable access
        env.add_function("env", env_function);

        env
    }

    /// Render a template string with the given context.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template is invalid or
    /// rendering fails (e.g., type errors, undefined variables in strict mode).
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    ///
    /// This does not evaluate the template — it only checks syntax.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Template`] if the template has syntax errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        // Parse the template to check for syntax errors without evaluating.
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

/// Custom filter: lowercase a string.
fn lower_filter(value: String) -> String {
    value.to_lowercase()
}

/// Custom filter: uppercase a string.
fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

/// Global function: read an environment variable by name.
///
/// Returns the variable value, or an empty string if not found
/// (with a warning logged via tracing).
fn env_function(name: String) -> String {
    match std::env::var(&name) {
        Ok(val) => val,
        Err(_) => {
            tracing::warn!(var = %name, "Environment variable not found, returning empty string");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a sample context for testing.
    fn sample_context() -> TemplateContext {
        TemplateContext {
            company: CompanyContext {
                name: "Acme Industries Ltd".to_string(),
                symbol: Some("ACME".to_string()),
                isin: Some("INE000A00001".to_string()),
            },
            filing: FilingContext {
                corp_id: "corp-12345".to_string(),
                category: "Financial Results".to_string(),
                headline: "Q1 FY25 results announced".to_string(),
                summary: "Revenue grew 12% year on year.".to_string(),
                sentiment: "Positive".to_string(),
                individual_investor_list: vec!["Jane Doe".to_string()],
                company_investor_list: vec!["Acme Capital".to_string()],
                file_url: Some("https://example.com/filing.pdf".to_string()),
            },
            event: "trigger".to_string(),
            now: "2026-02-16T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn render_basic_template() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "Alert: {{ company.name }} — {{ filing.headline }}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Alert: Acme Industries Ltd — Q1 FY25 results announced");
    }

    #[test]
    fn render_investor_list_access() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "Investor: {{ filing.individual_investor_list[0] }}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Investor: Jane Doe");
    }

    #[test]
    fn render_upper_lower_filters() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let upper_tpl = "{{ filing.sentiment | upper }}";
        let lower_tpl = "{{ filing.sentiment | lower }}";

        assert_eq!(renderer.render(upper_tpl, &ctx).unwrap(), "POSITIVE");
        assert_eq!(renderer.render(lower_tpl, &ctx).unwrap(), "positive");
    }

    #[test]
    fn render_round_filter() {
        let renderer = TemplateRenderer::new();
        let template = "{{ 0.987654 | round(2) }}";
        let result = renderer.render(template, &TemplateContext {
            company: CompanyContext { name: String::new(), symbol: None, isin: None },
            filing: FilingContext {
                corp_id: String::new(),
                category: String::new(),
                headline: String::new(),
                summary: String::new(),
                sentiment: String::new(),
                individual_investor_list: vec![],
                company_investor_list: vec![],
                file_url: None,
            },
            event: String::new(),
            now: String::new(),
        }).unwrap();
        assert_eq!(result, "0.99");
    }

    #[test]
    fn render_env_function() {
        std::env::set_var("PIPELINE_NOTIFY_TEST_VAR", "hello_notify");

        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "Env: {{ env('PIPELINE_NOTIFY_TEST_VAR') }}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Env: hello_notify");

        std::env::remove_var("PIPELINE_NOTIFY_TEST_VAR");
    }

    #[test]
    fn render_env_missing_returns_empty() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "Env: [{{ env('DEFINITELY_NOT_SET_XYZ') }}]";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Env: []");
    }

    #[test]
    fn invalid_template_produces_error() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "{{ unclosed";
        let result = renderer.render(template, &ctx);
        assert!(result.is_err());

        match result.unwrap_err() {
            NotifyError::Template(msg) => {
                assert!(!msg.is_empty(), "Error message should not be empty");
            }
            other => panic!("Expected Template error, got: {:?}", other),
        }
    }

    #[test]
    fn validate_valid_template() {
        let renderer = TemplateRenderer::new();
        assert!(renderer.validate("Hello {{ company.name }}").is_ok());
    }

    #[test]
    fn validate_invalid_template() {
        let renderer = TemplateRenderer::new();
        let result = renderer.validate("{{ unclosed");
        assert!(result.is_err());
    }

    #[test]
    fn render_optional_fields() {
        let renderer = TemplateRenderer::new();
        let mut ctx = sample_context();
        ctx.company.symbol = None;

        let template = "Symbol: {{ company.symbol }}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Symbol: none");
    }

    #[test]
    fn render_event_and_timestamp() {
        let renderer = TemplateRenderer::new();
        let ctx = sample_context();

        let template = "[{{ now }}] Event: {{ event }}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "[2026-02-16T12:00:00Z] Event: trigger");
    }

    #[test]
    fn render_investor_list_iteration() {
        let renderer = TemplateRenderer::new();
        let mut ctx = sample_context();
        ctx.filing.individual_investor_list = vec!["Jane Doe".to_string(), "John Smith".to_string()];

        let template = "{% for name in filing.individual_investor_list %}{{ name }}{% if not loop.last %}, {% endif %}{% endfor %}";
        let result = renderer.render(template, &ctx).unwrap();
        assert_eq!(result, "Jane Doe, John Smith");
    }
}
