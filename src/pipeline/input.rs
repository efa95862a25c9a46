//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! URLs are downloaded into a `TempDir` that lives inside [`ResolvedInput`],
//! so the file is removed when the run finishes, even on panic. The `%PDF`
//! magic bytes are checked before returning so callers get a meaningful
//! error rather than a parser failure deep inside lopdf.

use crate::error::ExtractionError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input, either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the `TempDir` keeps the download alive.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<ResolvedInput, ExtractionError> {
    if input.trim().is_empty() {
        return Err(ExtractionError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

/// Validate a local path: it must exist, be readable and start with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, ExtractionError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(ExtractionError::FileNotFound { path });
    }

    let mut f = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractionError::PermissionDenied { path });
        }
        Err(_) => return Err(ExtractionError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(ExtractionError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, ExtractionError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| ExtractionError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ExtractionError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(ExtractionError::NotAPdf {
            path: PathBuf::from(url),
            magic,
        });
    }

    let temp_dir = TempDir::new().map_err(|e| failed(format!("temp dir: {e}")))?;
    let file_path = temp_dir.path().join(filename_from_url(url));
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| failed(format!("failed to write temp file: {e}")))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());
    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
