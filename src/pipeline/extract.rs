//! Text extraction: read every page of a PDF into a [`Document`].
//!
//! lopdf parsing is CPU-bound and synchronous, so the work runs inside
//! `tokio::task::spawn_blocking` to keep the async workers free.
//!
//! Pages that fail to decode or yield no text are skipped (and listed in
//! [`Document::skipped_pages`]); only a document with no text at all is an
//! error.

use crate::error::ExtractionError;
use lopdf::Document as PdfDocument;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Separator placed between consecutive pages in the combined text.
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Text of one non-empty page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-indexed page number in the PDF.
    pub number: usize,
    pub text: String,
}

/// The full extracted text of one PDF.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    /// Page count reported by the PDF.
    pub total_pages: usize,
    /// Non-empty pages in document order.
    pub pages: Vec<PageText>,
    /// 1-indexed numbers of pages with no extractable text.
    pub skipped_pages: Vec<usize>,
    text: String,
    /// Byte offset of each entry of `pages` within `text`.
    page_starts: Vec<usize>,
}

impl Document {
    /// Assemble a document from `(page_number, raw_text)` pairs.
    ///
    /// Text is trimmed and line endings normalised; empty pages are recorded
    /// as skipped.
    pub fn from_pages(total_pages: usize, raw: impl IntoIterator<Item = (usize, String)>) -> Self {
        let mut pages = Vec::new();
        let mut skipped_pages = Vec::new();
        for (number, text) in raw {
            let text = text.replace("\r\n", "\n").replace('\r', "\n");
            let text = text.trim();
            if text.is_empty() {
                skipped_pages.push(number);
            } else {
                pages.push(PageText {
                    number,
                    text: text.to_string(),
                });
            }
        }

        let mut text = String::new();
        let mut page_starts = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push_str(PAGE_SEPARATOR);
            }
            page_starts.push(text.len());
            text.push_str(&page.text);
        }

        Self {
            total_pages,
            pages,
            skipped_pages,
            text,
            page_starts,
        }
    }

    /// Combined text of all non-empty pages.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page number containing the given byte offset of [`Document::text`].
    pub fn page_at(&self, offset: usize) -> Option<usize> {
        if self.pages.is_empty() {
            return None;
        }
        let idx = match self.page_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(0) => 0,
            Err(i) => i - 1,
        };
        self.pages.get(idx).map(|p| p.number)
    }
}

/// Extract the text of every page of the PDF at `path`.
pub async fn extract_document(
    path: &Path,
    password: Option<&str>,
) -> Result<Document, ExtractionError> {
    let path_buf = path.to_path_buf();
    let pwd = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_blocking(&path_buf, pwd.as_deref()))
        .await
        .map_err(|e| ExtractionError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("extraction task panicked: {e}"),
        })?
}

fn extract_blocking(path: &Path, password: Option<&str>) -> Result<Document, ExtractionError> {
    let mut pdf = PdfDocument::load(path).map_err(|e| classify_load_error(path, &e, password))?;

    if pdf.is_encrypted() {
        debug!("PDF is encrypted, attempting to decrypt");
        match password {
            Some(pwd) => pdf.decrypt(pwd).map_err(|_| ExtractionError::WrongPassword {
                path: path.to_path_buf(),
            })?,
            // Owner-password-only files open with an empty user password.
            None => pdf.decrypt("").map_err(|_| ExtractionError::PasswordRequired {
                path: path.to_path_buf(),
            })?,
        }
    }

    let page_numbers: Vec<u32> = pdf.get_pages().keys().copied().collect();
    let total_pages = page_numbers.len();
    info!("Processing {} pages...", total_pages);

    let mut raw = Vec::with_capacity(total_pages);
    for (i, &number) in page_numbers.iter().enumerate() {
        if i % 50 == 0 {
            info!("Processing page {}/{}", i + 1, total_pages);
        }
        match pdf.extract_text(&[number]) {
            Ok(text) => raw.push((number as usize, text)),
            Err(e) => {
                warn!("Page {}: text extraction failed, skipping: {}", number, e);
                raw.push((number as usize, String::new()));
            }
        }
    }

    let document = Document::from_pages(total_pages, raw);
    for number in &document.skipped_pages {
        warn!("Page {}: no extractable text, skipped", number);
    }
    if document.is_empty() {
        return Err(ExtractionError::NoExtractableText {
            path: path.to_path_buf(),
            pages: total_pages,
        });
    }

    info!(
        "Extracted {} chars from {}/{} pages",
        document.char_count(),
        document.pages.len(),
        total_pages
    );
    Ok(document)
}

/// Map a lopdf load failure onto the extraction taxonomy.
fn classify_load_error(path: &Path, e: &lopdf::Error, password: Option<&str>) -> ExtractionError {
    let detail = e.to_string();
    let lower = detail.to_lowercase();
    let path: PathBuf = path.to_path_buf();
    if lower.contains("password") || lower.contains("decrypt") || lower.contains("encrypt") {
        if password.is_some() {
            ExtractionError::WrongPassword { path }
        } else {
            ExtractionError::PasswordRequired { path }
        }
    } else {
        ExtractionError::CorruptPdf { path, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from_pages(
            4,
            vec![
                (1, "First page.\r\n".to_string()),
                (2, "   ".to_string()),
                (3, "Third page.".to_string()),
                (4, String::new()),
            ],
        )
    }

    #[test]
    fn empty_pages_are_skipped() {
        let d = doc();
        assert_eq!(d.total_pages, 4);
        assert_eq!(d.pages.len(), 2);
        assert_eq!(d.skipped_pages, vec![2, 4]);
        assert_eq!(d.text(), "First page.\n\nThird page.");
    }

    #[test]
    fn page_at_maps_offsets() {
        let d = doc();
        assert_eq!(d.page_at(0), Some(1));
        assert_eq!(d.page_at(5), Some(1));
        let third = d.text().find("Third").unwrap();
        assert_eq!(d.page_at(third), Some(3));
        assert_eq!(d.page_at(d.text().len() - 1), Some(3));
    }

    #[test]
    fn page_at_on_empty_document() {
        let d = Document::from_pages(1, vec![(1, String::new())]);
        assert!(d.is_empty());
        assert_eq!(d.page_at(0), None);
    }

    #[test]
    fn char_count_counts_chars_not_bytes() {
        let d = Document::from_pages(1, vec![(1, "perché".to_string())]);
        assert_eq!(d.char_count(), 6);
    }

    #[tokio::test]
    async fn garbage_after_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not a pdf body").unwrap();
        let err = extract_document(&path, None).await;
        assert!(
            matches!(
                err,
                Err(ExtractionError::CorruptPdf { .. } | ExtractionError::NoExtractableText { .. })
            ),
            "got {err:?}"
        );
    }
}
