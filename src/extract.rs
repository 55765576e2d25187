//! Run orchestration: resolve the input, rasterize, extract every page
//! concurrently, reconcile, and package.
//!
//! This module wires the pipeline stages together and owns the run-level
//! policy: per-page failures are collected, never propagated; only
//! document-level failures and a run that yields zero usable records are
//! fatal. See [`crate::error`] for the two-tier error taxonomy.

use crate::archive;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, PageOutcome, RunStats};
use crate::pipeline::encode::{self, EncodedPage};
use crate::pipeline::{input, normalize, render, select, service};
use crate::table::{Anomaly, AnomalyKind, PageTable};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract the roll table from a PDF file, URL, or image bundle.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str` — Local file path or HTTP/HTTPS URL. A PDF is rasterized;
///   a ZIP image bundle from an earlier run is re-imported directly.
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` even when some pages failed — check
/// `output.stats.failed_pages` and `output.anomalies` for partial-success
/// detail.
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal conditions:
/// - File not found / not a PDF or bundle / corrupt document
/// - No eligible pages after the trailing skip
/// - No provider configured
/// - Zero usable records across the whole run ([`ExtractError::NoData`])
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);

    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let source_path = resolved.path().to_path_buf();

    let provider = resolve_provider(config).await?;

    // Page sourcing differs by input kind; everything downstream of the
    // encoded pages is shared.
    let render_start = Instant::now();
    let (encoded, render_failures, total_pages, rebundle) = match resolved.kind() {
        input::SourceKind::Pdf => {
            let total = render::page_count(&source_path, config.password.as_deref()).await?;
            info!("PDF has {} pages", total);

            let indices = select::eligible_indices(total, config.skip_trailing)?;

            let (rendered, mut failures) =
                render::render_pages(&source_path, config, &indices).await?;

            let mut encoded = Vec::with_capacity(rendered.len());
            for page in &rendered {
                match encode::encode_page(page) {
                    Ok(e) => encoded.push(e),
                    Err(e) => {
                        warn!("Failed to encode page {}: {}", page.position, e);
                        failures.push(render::RenderFailure {
                            position: page.position,
                            source_page: page.source_page,
                            detail: format!("PNG encoding failed: {}", e),
                        });
                    }
                }
            }
            (encoded, failures, total, true)
        }
        input::SourceKind::ImageBundle => {
            let encoded = archive::read_image_archive(&source_path)?;
            if encoded.is_empty() {
                return Err(ExtractError::EmptyDocument);
            }
            info!("Image bundle re-imported: {} pages", encoded.len());
            // Selection already happened when the bundle was produced, and
            // repackaging re-imported pages would just duplicate the input.
            let total = encoded.len();
            (encoded, Vec::new(), total, false)
        }
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let eligible_pages = encoded.len() + render_failures.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(eligible_pages);
    }

    // Package the bundle before the service phase so the images survive
    // even if the caller aborts on a later error.
    let image_bundle = if rebundle && !encoded.is_empty() {
        Some(archive::package_images(&encoded)?)
    } else {
        None
    };

    let service_start = Instant::now();
    let mut works = process_concurrent(&provider, &encoded, eligible_pages, config).await;
    let service_duration_ms = service_start.elapsed().as_millis() as u64;

    for failure in render_failures {
        works.push(PageWork::render_failure(failure));
    }
    // buffer_unordered returns in completion order; page order is the
    // contract for duplicate resolution and reporting.
    works.sort_by_key(|w| w.outcome.position);

    let mut pages = Vec::with_capacity(works.len());
    let mut tables = Vec::new();
    let mut anomalies = Vec::new();
    for work in works {
        pages.push(work.outcome);
        if let Some(table) = work.table {
            tables.push(table);
        }
        anomalies.extend(work.anomalies);
    }

    let (merged, merge_anomalies) = crate::pipeline::reconcile::reconcile(&tables, config.duplicates);
    anomalies.extend(merge_anomalies);

    if merged.is_empty() {
        return Err(ExtractError::NoData {
            pages: eligible_pages,
        });
    }

    let extracted = pages.iter().filter(|p| p.error.is_none()).count();
    let failed = pages.len() - extracted;
    let placeholder_rows = merged.placeholder_count();
    let stats = RunStats {
        total_pages,
        eligible_pages,
        extracted_pages: extracted,
        failed_pages: failed,
        data_rows: merged.len() - placeholder_rows,
        placeholder_rows,
        min_serial: Some(merged.min_serial),
        max_serial: Some(merged.max_serial),
        render_duration_ms,
        service_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {}/{} pages, serials {}..={}, {} anomalies, {}ms total",
        extracted,
        eligible_pages,
        merged.min_serial,
        merged.max_serial,
        anomalies.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(eligible_pages, merged.len());
    }

    Ok(ExtractionOutput {
        table: merged,
        pages,
        anomalies,
        stats,
        image_bundle,
    })
}

/// Extract a document and write the artifacts directly to files.
///
/// The CSV always lands at `csv_path`; the image bundle is written to
/// `images_path` when given and the run produced one. Writes are atomic
/// (temp file + rename) to prevent partial artifacts.
pub async fn extract_to_files(
    input_str: impl AsRef<str>,
    csv_path: impl AsRef<Path>,
    images_path: Option<&Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let output = extract(input_str, config).await?;

    let csv_bytes = archive::package_table(&output.table)?;
    write_artifact(csv_path.as_ref(), &csv_bytes).await?;

    if let (Some(path), Some(bundle)) = (images_path, output.image_bundle.as_deref()) {
        write_artifact(path, bundle).await?;
    }

    Ok(output)
}

/// Extract from PDF bytes already in memory.
///
/// Writes the bytes to a managed [`tempfile`] (pdfium needs a filesystem
/// path) and cleans it up automatically on return or panic. Use this when
/// the document comes from a database or network stream rather than disk.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `extract` returns
    extract(&path, config).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// One page's contribution to the run: outcome for the report, table rows
/// for the reconciler, anomalies for the operator.
struct PageWork {
    outcome: PageOutcome,
    table: Option<PageTable>,
    anomalies: Vec<Anomaly>,
}

impl PageWork {
    fn render_failure(failure: render::RenderFailure) -> Self {
        let error = crate::error::PageError::RenderFailed {
            page: failure.position,
            detail: failure.detail.clone(),
        };
        Self {
            outcome: PageOutcome {
                position: failure.position,
                source_page: failure.source_page,
                rows: 0,
                duration_ms: 0,
                retries: 0,
                error: Some(error),
            },
            table: None,
            anomalies: vec![
                Anomaly::new(AnomalyKind::RenderFailed, failure.detail)
                    .with_page(failure.position),
            ],
        }
    }
}

/// Send every page to the service concurrently and normalize the results.
async fn process_concurrent(
    provider: &Arc<dyn LLMProvider>,
    pages: &[EncodedPage],
    total: usize,
    config: &ExtractionConfig,
) -> Vec<PageWork> {
    stream::iter(pages.iter().map(|page| {
        let provider = Arc::clone(provider);
        let position = page.position;
        let source_page = page.source_page;
        let img = page.data.clone();
        let config = config.clone();
        async move {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_start(position, total);
            }
            let raw = service::extract_page(&provider, position, source_page, img, &config).await;

            match raw.error {
                None => {
                    let (table, anomalies) = normalize::normalize_page(raw.position, &raw.text);
                    let rows = table.records.len();
                    debug!("Page {}: {} rows after normalization", position, rows);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_complete(position, total, rows);
                    }
                    PageWork {
                        outcome: PageOutcome {
                            position,
                            source_page,
                            rows,
                            duration_ms: raw.duration_ms,
                            retries: raw.retries,
                            error: None,
                        },
                        table: Some(table),
                        anomalies,
                    }
                }
                Some(error) => {
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_page_error(position, total, error.to_string());
                    }
                    PageWork {
                        outcome: PageOutcome {
                            position,
                            source_page,
                            rows: 0,
                            duration_ms: raw.duration_ms,
                            retries: raw.retries,
                            error: Some(error.clone()),
                        },
                        table: None,
                        anomalies: vec![
                            Anomaly::new(AnomalyKind::ServiceFailed, error.to_string())
                                .with_page(position),
                        ],
                    }
                }
            }
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// Atomic write: temp file in the target directory, then rename.
async fn write_artifact(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ExtractError::OutputWriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the extraction provider, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the provider entirely; used as-is. Useful in tests or
///    when the caller needs custom middleware.
///
/// 2. **Named provider + model** (`config.provider_name`) — the factory
///    reads the corresponding API key (`OPENAI_API_KEY`, etc.) from the
///    environment.
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    both set means the provider and model were chosen at the execution
///    environment level (shell script, CI). Checked before full
///    auto-detection so the model choice is honoured even when multiple
///    API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans the known API-key variables and picks the first available
///    provider.
async fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
        return create_vision_provider(name, model);
    }

    // 3) Environment pair, honoured before auto-detection
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when its key is present, so users holding
    // multiple provider keys get a predictable default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-mini");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ExtractError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DuplicatePolicy;

    #[test]
    fn render_failure_work_carries_error_and_anomaly() {
        let work = PageWork::render_failure(render::RenderFailure {
            position: 4,
            source_page: 3,
            detail: "bad page object".to_string(),
        });
        assert_eq!(work.outcome.position, 4);
        assert!(work.outcome.error.is_some());
        assert!(work.table.is_none());
        assert_eq!(work.anomalies.len(), 1);
        assert_eq!(work.anomalies[0].kind, AnomalyKind::RenderFailed);
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let config = ExtractionConfig::builder()
            .duplicates(DuplicatePolicy::FirstWins)
            .build()
            .unwrap();
        let result = extract("/no/such/roll.pdf", &config).await;
        assert!(matches!(result, Err(ExtractError::FileNotFound { .. })));
    }
}
