//! The extraction-service call: send one page image plus the fixed
//! instruction, get raw text back.
//!
//! This module is intentionally thin — the whole output contract lives in
//! [`crate::prompts`] so it can change without touching retry or
//! error-handling logic here. Whatever the service returns is handed to
//! the normalizer untrusted; nothing here inspects the text.
//!
//! ## Retry strategy
//!
//! HTTP 429 / 503 errors are transient and frequent under concurrent load.
//! Exponential backoff (`retry_backoff_ms * 2^attempt`) avoids the
//! thundering-herd problem where N workers retry simultaneously against a
//! recovering endpoint. Re-sending the same page and instruction is
//! idempotent, so bounded retry is always safe.

use crate::config::ExtractionConfig;
use crate::error::PageError;
use crate::prompts::EXTRACTION_INSTRUCTION;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// The raw service output for one page, success or failure.
pub struct RawPageText {
    /// 1-based position within the eligible page sequence.
    pub position: usize,
    /// 0-based index of the page in the source document.
    pub source_page: usize,
    /// Raw text as returned by the service; empty on failure.
    pub text: String,
    pub duration_ms: u64,
    pub retries: u8,
    /// Set when every attempt failed; the page is excluded from the merge.
    pub error: Option<PageError>,
}

/// Send one page image to the extraction service.
///
/// ## Message layout
///
/// 1. **System message** — the fixed extraction instruction (or the
///    caller's override)
/// 2. **User message** — the page PNG as a base64 image attachment with
///    empty text; vision APIs require a user turn, the image carries all
///    the content
///
/// ## Return value
///
/// Always returns a `RawPageText` — never propagates an error upward, so
/// a single bad page doesn't abort the run. Callers check `error` to
/// decide whether the page enters the merge.
pub async fn extract_page(
    provider: &Arc<dyn LLMProvider>,
    position: usize,
    source_page: usize,
    image_data: ImageData,
    config: &ExtractionConfig,
) -> RawPageText {
    let start = Instant::now();
    let instruction = config
        .instruction
        .as_deref()
        .unwrap_or(EXTRACTION_INSTRUCTION);

    let messages = vec![
        ChatMessage::system(instruction),
        ChatMessage::user_with_images("", vec![image_data]),
    ];

    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<String> = None;
    let mut timed_out = false;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                position, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} chars in {:?} ({} in / {} out tokens)",
                    position,
                    response.content.len(),
                    duration,
                    response.prompt_tokens,
                    response.completion_tokens
                );

                return RawPageText {
                    position,
                    source_page,
                    text: response.content,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                    error: None,
                };
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!(
                    "Page {}: attempt {} failed — {}",
                    position,
                    attempt + 1,
                    err_msg
                );
                timed_out = false;
                last_err = Some(err_msg);
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    position,
                    attempt + 1,
                    config.api_timeout_secs
                );
                timed_out = true;
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
            }
        }
    }

    // All retries exhausted
    let duration = start.elapsed();
    let error = if timed_out {
        PageError::Timeout {
            page: position,
            secs: config.api_timeout_secs,
        }
    } else {
        PageError::ServiceFailed {
            page: position,
            retries: config.max_retries as u8,
            detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
        }
    };

    RawPageText {
        position,
        source_page,
        text: String::new(),
        duration_ms: duration.as_millis() as u64,
        retries: config.max_retries as u8,
        error: Some(error),
    }
}

/// Build `CompletionOptions` from the run config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.1));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
