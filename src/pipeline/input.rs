//! Input resolution: normalise a user-supplied path, URL or byte buffer to a
//! local PDF file.
//!
//! pdfium opens documents from a file-system path, so URLs and in-memory
//! buffers are written to a `TempDir` that lives as long as the
//! [`ResolvedInput`]. Every input is checked for the `%PDF` magic and for the
//! configured size limit before any parsing starts.

use crate::config::ExtractionConfig;
use crate::error::TakeoffError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// The resolved input: a local path or a temp file holding downloaded bytes.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, size: u64 },
    /// Input was a URL or a byte buffer, written to a temp directory.
    /// The `TempDir` is kept alive until processing completes.
    Temporary {
        path: PathBuf,
        size: u64,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } => path,
            ResolvedInput::Temporary { path, .. } => path,
        }
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            ResolvedInput::Local { size, .. } | ResolvedInput::Temporary { size, .. } => *size,
        }
    }

    /// Display name: the file name component of the path.
    pub fn file_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file.
///
/// URLs are downloaded to a temporary directory; local files are checked
/// for existence, readability, size and PDF magic bytes.
pub async fn resolve_input(
    input: &str,
    config: &ExtractionConfig,
) -> Result<ResolvedInput, TakeoffError> {
    if input.trim().is_empty() {
        return Err(TakeoffError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, config).await
    } else {
        resolve_local(Path::new(input), config.max_file_bytes)
    }
}

/// Write an in-memory PDF to a temp file so pdfium can open it.
pub async fn resolve_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &ExtractionConfig,
) -> Result<ResolvedInput, TakeoffError> {
    let name = sanitize_file_name(file_name);
    check_size(Path::new(&name), bytes.len() as u64, config.max_file_bytes)?;
    check_magic(Path::new(&name), bytes)?;
    write_temp(&name, bytes).await
}

/// Resolve a local file path, validating existence, size and magic bytes.
fn resolve_local(path: &Path, max_bytes: u64) -> Result<ResolvedInput, TakeoffError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(TakeoffError::FileNotFound { path });
    }
    if path.is_dir() {
        return Err(TakeoffError::InvalidInput {
            input: path.display().to_string(),
        });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TakeoffError::PermissionDenied { path });
        }
        Err(_) => return Err(TakeoffError::FileNotFound { path }),
    };

    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    check_size(&path, size, max_bytes)?;

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    (&mut file)
        .take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| TakeoffError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    check_magic(&path, &head)?;

    debug!("Resolved local PDF: {} ({} bytes)", path.display(), size);
    Ok(ResolvedInput::Local { path, size })
}

/// Download a URL to a temporary directory.
async fn download_url(url: &str, config: &ExtractionConfig) -> Result<ResolvedInput, TakeoffError> {
    let timeout_secs = config.download_timeout_secs;
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| TakeoffError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            TakeoffError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    };

    let response = client.get(url).send().await.map_err(classify)?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);

    if let Some(len) = response.content_length() {
        check_size(Path::new(&filename), len, config.max_file_bytes)?;
    }

    let bytes = response.bytes().await.map_err(classify)?;
    check_size(Path::new(&filename), bytes.len() as u64, config.max_file_bytes)?;
    check_magic(Path::new(&filename), &bytes)?;

    let resolved = write_temp(&filename, &bytes).await?;
    info!("Downloaded {} bytes to: {}", bytes.len(), resolved.path().display());
    Ok(resolved)
}

async fn write_temp(file_name: &str, bytes: &[u8]) -> Result<ResolvedInput, TakeoffError> {
    let temp_dir = TempDir::new().map_err(|e| TakeoffError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(file_name);

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| TakeoffError::Internal(format!("Failed to write temp file: {}", e)))?;

    Ok(ResolvedInput::Temporary {
        path,
        size: bytes.len() as u64,
        _temp_dir: temp_dir,
    })
}

fn check_size(path: &Path, size: u64, limit: u64) -> Result<(), TakeoffError> {
    if size > limit {
        return Err(TakeoffError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit,
        });
    }
    Ok(())
}

fn check_magic(path: &Path, head: &[u8]) -> Result<(), TakeoffError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(TakeoffError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

/// Last non-empty URL path segment that looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return sanitize_file_name(last);
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

/// Keep only the final path component so a name cannot escape the temp dir.
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "..")
        .unwrap_or_else(|| "document.pdf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url("https://x.com/a/plans.pdf"), "plans.pdf");
        assert_eq!(filename_from_url("https://x.com/a/"), "downloaded.pdf");
        assert_eq!(filename_from_url("https://x.com/download"), "downloaded.pdf");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("plans.pdf"), "plans.pdf");
        assert_eq!(sanitize_file_name(""), "document.pdf");
    }

    #[test]
    fn local_pdf_resolves() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "plans.pdf", b"%PDF-1.7\n...");
        let resolved = resolve_local(&path, 1024).unwrap();
        assert_eq!(resolved.path(), path.as_path());
        assert_eq!(resolved.size(), 12);
        assert_eq!(resolved.file_name(), "plans.pdf");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_local(Path::new("/no/such/file.pdf"), 1024).unwrap_err();
        assert!(matches!(err, TakeoffError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_with_magic() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.pdf", b"PK\x03\x04zip");
        match resolve_local(&path, 1024).unwrap_err() {
            TakeoffError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn short_file_is_not_a_pdf() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "tiny.pdf", b"%P");
        assert!(matches!(
            resolve_local(&path, 1024).unwrap_err(),
            TakeoffError::NotAPdf { .. }
        ));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "big.pdf", b"%PDF-1.4 0123456789");
        match resolve_local(&path, 10).unwrap_err() {
            TakeoffError::FileTooLarge { size, limit, .. } => {
                assert_eq!(size, 19);
                assert_eq!(limit, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let config = ExtractionConfig::default();
        assert!(matches!(
            resolve_input("  ", &config).await.unwrap_err(),
            TakeoffError::InvalidInput { .. }
        ));
    }

    #[tokio::test]
    async fn bytes_are_written_to_temp_file() {
        let config = ExtractionConfig::default();
        let resolved = resolve_bytes(b"%PDF-1.5 body", "sheet.pdf", &config)
            .await
            .unwrap();
        assert!(resolved.path().exists());
        assert_eq!(resolved.file_name(), "sheet.pdf");
        assert_eq!(std::fs::read(resolved.path()).unwrap(), b"%PDF-1.5 body");

        let path = resolved.path().to_path_buf();
        drop(resolved);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn non_pdf_bytes_are_rejected() {
        let config = ExtractionConfig::default();
        assert!(matches!(
            resolve_bytes(b"hello", "x.pdf", &config).await.unwrap_err(),
            TakeoffError::NotAPdf { .. }
        ));
    }
}
