//! Configuration for an extraction run.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across page workers, log them, and diff two
//! runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for one roll-extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use rolltab::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .concurrency(4)
///     .skip_trailing(0)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rasterization DPI. Range: 72–600. Default: 300.
    ///
    /// Enrollment rolls are dense small-print tables; 300 DPI keeps the
    /// serial numbers and photo-id strings legible to the vision model.
    /// Lower values save upload bytes but cost transcription accuracy.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels.
    /// Default: 3000.
    ///
    /// A safety cap independent of DPI so an oversized scan can never make
    /// pdfium allocate an unbounded bitmap.
    pub max_rendered_pixels: u32,

    /// Number of concurrent extraction-service calls. Default: 4.
    ///
    /// Per-page requests are independent; only the reconciler needs them
    /// back in order. Raise this if your provider's rate limits allow,
    /// lower it on 429 errors.
    pub concurrency: usize,

    /// Vision model identifier, e.g. "gpt-4.1-mini". If None, uses the
    /// provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama"). If None along
    /// with `provider`, the provider is auto-detected from the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Transcription wants determinism; anything creative worsens accuracy.
    pub temperature: f32,

    /// Maximum tokens the service may generate per page. Default: 4096.
    ///
    /// A full roll page is 30-odd rows of 8 quoted fields; 4096 covers it
    /// with room to spare. Too low silently truncates the CSV mid-row.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient service failure. Default: 2.
    ///
    /// Re-sending the same page and instruction is idempotent, so bounded
    /// retry is safe. Permanent errors (bad API key) are not worth
    /// retrying but are cheap to re-attempt once.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff).
    /// Default: 500. Doubles after each attempt: 500 ms → 1 s → 2 s.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom extraction instruction. If None, uses
    /// [`crate::prompts::EXTRACTION_INSTRUCTION`].
    pub instruction: Option<String>,

    /// How many trailing document pages to exclude from extraction.
    /// Default: 1.
    ///
    /// The rolls this tool was built for end with a non-data cover page,
    /// so the final page is skipped by default. This is a heuristic about
    /// the input corpus, not an inspected property of the page — set it to
    /// 0 for documents where every page carries data.
    pub skip_trailing: usize,

    /// Tie-break for records sharing a serial number. Default:
    /// [`DuplicatePolicy::FirstWins`].
    pub duplicates: DuplicatePolicy,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-service-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional progress callback; fires around each page and the run.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 3000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 2,
            retry_backoff_ms: 500,
            password: None,
            instruction: None,
            skip_trailing: 1,
            duplicates: DuplicatePolicy::default(),
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("skip_trailing", &self.skip_trailing)
            .field("duplicates", &self.duplicates)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.config.instruction = Some(text.into());
        self
    }

    pub fn skip_trailing(mut self, n: usize) -> Self {
        self.config.skip_trailing = n;
        self
    }

    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.config.duplicates = policy;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(ExtractError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig(
                "concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Tie-break policy when two records carry the same serial number.
///
/// Records are never merged field-by-field; one whole record wins and the
/// rest are reported as anomalies. The source order is eligible-page
/// position first, then per-page row order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first occurrence in page order. (default)
    #[default]
    FirstWins,
    /// Keep the last occurrence in page order.
    LastWins,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.skip_trailing, 1);
        assert_eq!(c.duplicates, DuplicatePolicy::FirstWins);
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = ExtractionConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn skip_trailing_zero_is_allowed() {
        let c = ExtractionConfig::builder().skip_trailing(0).build().unwrap();
        assert_eq!(c.skip_trailing, 0);
    }
}
