//! Error types for the edgequake-pdf2quiz library.
//!
//! Failures are split by how far they reach:
//!
//! * [`QuizError`] is **fatal**: the run cannot proceed at all (unreadable
//!   PDF, model server not reachable at startup, output not writable).
//!   Returned as `Err(QuizError)` from the top-level pipeline functions.
//!
//! * [`BackendError`] is **per unit**: one model call failed after the retry
//!   policy gave up. The chunk or question is skipped, counted, and the run
//!   continues.
//!
//! * [`MalformedQuestion`] and [`NoRelevantContext`] are **per record**: a
//!   question block could not be recovered from model text, or a question
//!   shares no vocabulary with the document. Both are reported in the run
//!   statistics and never abort anything.

use crate::question::Letter;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2quiz library.
#[derive(Debug, Error)]
pub enum QuizError {
    /// The input PDF could not be turned into text.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The health check before the first model call could not connect.
    #[error("Model server at '{url}' is not reachable: {detail}\nStart the server (e.g. `ollama serve`) or pass --base-url.")]
    BackendUnreachable { url: String, detail: String },

    /// An existing questions file could not be read.
    #[error("Failed to read questions file '{path}': {source}")]
    QuestionsFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The questions file was read but held no valid Aiken block.
    #[error("No valid Aiken questions found in '{path}' ({dropped} malformed blocks)")]
    EmptyQuestionsFile { path: PathBuf, dropped: usize },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output path points at the file being read.
    #[error("Refusing to overwrite the input file '{path}'\nChoose a different --output path.")]
    OutputWouldOverwriteInput { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a PDF could not be read into a [`crate::pipeline::extract::Document`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Every page was empty after text extraction (scanned images, etc.).
    #[error("PDF '{path}' contains no extractable text ({pages} pages checked)")]
    NoExtractableText { path: PathBuf, pages: usize },
}

/// A failed call to the model server.
#[derive(Debug, Clone, Error, Serialize)]
pub enum BackendError {
    /// The HTTP connection could not be established.
    #[error("model server unavailable at {url}: {detail}")]
    Unavailable { url: String, detail: String },

    /// The call did not complete within the configured timeout.
    #[error("model call timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The server answered with a non-success HTTP status.
    #[error("model server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server answered 2xx but the body is not a completion.
    #[error("unexpected response from model server: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Whether the retry policy may try this call again.
    ///
    /// Connection failures, timeouts, `429` and `5xx` are transient; any
    /// other status (bad request, unknown model) and malformed bodies are
    /// surfaced immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Unavailable { .. } | BackendError::Timeout { .. } => true,
            BackendError::Status { status, .. } => *status == 429 || *status >= 500,
            BackendError::InvalidResponse(_) => false,
        }
    }
}

/// Why a question block was dropped by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MalformedReason {
    /// Options and/or an answer appeared without any stem text.
    MissingStem,
    /// Fewer than four options were present.
    MissingOptions { found: usize },
    /// The same option letter appeared twice.
    DuplicateOption(Letter),
    /// Four options but no `ANSWER:` line before the next question.
    MissingAnswer,
    /// An option text is empty.
    EmptyOption(Letter),
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedReason::MissingStem => write!(f, "missing question stem"),
            MalformedReason::MissingOptions { found } => {
                write!(f, "expected 4 options, found {found}")
            }
            MalformedReason::DuplicateOption(l) => write!(f, "duplicate option {l}"),
            MalformedReason::MissingAnswer => write!(f, "missing ANSWER line"),
            MalformedReason::EmptyOption(l) => write!(f, "option {l} is empty"),
        }
    }
}

/// A question block that could not be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("question block {block}: {reason}")]
pub struct MalformedQuestion {
    /// 1-indexed position of the block within the parsed text.
    pub block: usize,
    pub reason: MalformedReason,
}

/// No chunk shares a significant word with the question.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no relevant context among {chunks} chunks")]
pub struct NoRelevantContext {
    pub chunks: usize,
}
