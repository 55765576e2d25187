//! Input resolution: normalise a user-supplied path or URL to a local file
//! and classify it as a PDF or a previously produced image bundle.
//!
//! ## Why download to a temp file?
//!
//! pdfium requires a file-system path — it cannot stream from a byte
//! buffer. Downloading to a `TempDir` gives us a path pdfium can open
//! while ensuring cleanup happens automatically when `ResolvedInput` is
//! dropped, even if the process panics. Magic bytes are validated before
//! returning so callers get a meaningful error rather than a pdfium crash.

use crate::error::ExtractError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// What kind of source the resolved file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A PDF document to rasterize.
    Pdf,
    /// A ZIP image bundle produced by an earlier run, re-imported as the
    /// page source (rasterization is skipped).
    ImageBundle,
}

/// The resolved input — either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: SourceKind },
    /// Input was a URL; file downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until the run completes.
    Downloaded {
        path: PathBuf,
        kind: SourceKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedInput::Local { kind, .. } => *kind,
            ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify a file by its first four bytes.
fn classify_magic(path: &Path, magic: [u8; 4]) -> Result<SourceKind, ExtractError> {
    if &magic == b"%PDF" {
        Ok(SourceKind::Pdf)
    } else if magic[..2] == *b"PK" {
        Ok(SourceKind::ImageBundle)
    } else {
        Err(ExtractError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        })
    }
}

/// Resolve the input string to a local file.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, ExtractError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ExtractError::FileNotFound { path });
    }

    let kind = match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() {
                classify_magic(&path, magic)?
            } else {
                return Err(ExtractError::NotAPdf {
                    path,
                    magic: [0; 4],
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound { path });
        }
    };

    debug!("Resolved local input: {} ({:?})", path.display(), kind);
    Ok(ResolvedInput::Local { path, kind })
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| ExtractError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if bytes.len() < 4 {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("response too short ({} bytes)", bytes.len()),
        });
    }
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[..4]);
    let kind = classify_magic(&file_path, magic)?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| ExtractError::Internal(format!("failed to write temp file: {}", e)))?;

    info!("Downloaded to: {} ({:?})", file_path.display(), kind);

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/roll.pdf"));
        assert!(is_url("http://example.com/roll.pdf"));
        assert!(!is_url("/tmp/roll.pdf"));
        assert!(!is_url("roll.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn classifies_pdf_magic() {
        let kind = classify_magic(Path::new("x.pdf"), *b"%PDF").unwrap();
        assert_eq!(kind, SourceKind::Pdf);
    }

    #[test]
    fn classifies_zip_magic() {
        let kind = classify_magic(Path::new("x.zip"), [0x50, 0x4B, 0x03, 0x04]).unwrap();
        assert_eq!(kind, SourceKind::ImageBundle);
    }

    #[test]
    fn rejects_unknown_magic() {
        assert!(matches!(
            classify_magic(Path::new("x.bin"), *b"\x89PNG"),
            Err(ExtractError::NotAPdf { .. })
        ));
    }

    #[test]
    fn local_non_pdf_file_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello world, definitely not a document").unwrap();
        let result = resolve_local(f.path().to_str().unwrap());
        assert!(matches!(result, Err(ExtractError::NotAPdf { .. })));
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = resolve_local("/definitely/not/a/real/file.pdf");
        assert!(matches!(result, Err(ExtractError::FileNotFound { .. })));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(extract_filename("https://host/a/b/roll.pdf"), "roll.pdf");
        assert_eq!(extract_filename("https://host/"), "downloaded.pdf");
    }
}
