//! Setup shared by every pipeline: load the source PDF, connect to the
//! model server, guard the output path.

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::pipeline::chunk::{chunk_document, Chunk};
use crate::pipeline::extract::{extract_document, Document};
use crate::pipeline::input::{resolve_input, ResolvedInput};
use crate::pipeline::llm::ModelClient;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// The extracted and chunked source document for one run.
pub(crate) struct Source {
    pub document: Document,
    pub chunks: Vec<Chunk>,
    /// Keeps a downloaded PDF alive until the run ends.
    input: ResolvedInput,
}

impl Source {
    pub fn path(&self) -> &Path {
        self.input.path()
    }
}

pub(crate) async fn load_source(input: &str, config: &QuizConfig) -> Result<Source, QuizError> {
    let resolved = resolve_input(input, config.download_timeout_secs).await?;
    let document = extract_document(resolved.path(), config.password.as_deref()).await?;
    let chunks = chunk_document(&document, config.chunk_size);
    info!(
        "Split {} chars into {} chunks of at most {} chars",
        document.char_count(),
        chunks.len(),
        config.chunk_size
    );
    Ok(Source {
        document,
        chunks,
        input: resolved,
    })
}

/// Build the model client and, unless disabled, check that the server is up.
pub(crate) async fn connect(config: &QuizConfig) -> Result<ModelClient, QuizError> {
    let client = ModelClient::new(&config.backend)?;
    if config.check_backend {
        client.health_check().await?;
        info!(
            "Model server reachable at {} (model: {})",
            client.base_url(),
            client.model()
        );
    }
    Ok(client)
}

pub(crate) fn progress(config: &QuizConfig) -> ProgressCallback {
    config
        .progress_callback
        .clone()
        .unwrap_or_else(|| Arc::new(NoopProgressCallback))
}

/// Refuse to write `output` when it names the file being read.
pub(crate) fn ensure_distinct(input: &Path, output: &Path) -> Result<(), QuizError> {
    let same = match (canonical(input), canonical(output)) {
        (Some(a), Some(b)) => a == b,
        _ => input == output,
    };
    if same {
        return Err(QuizError::OutputWouldOverwriteInput {
            path: output.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet.
fn canonical(path: &Path) -> Option<PathBuf> {
    if let Ok(p) = std::fs::canonicalize(path) {
        return Some(p);
    }
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir = std::fs::canonicalize(parent).ok()?;
    Some(dir.join(path.file_name()?))
}
