//! Question generation: PDF in, Aiken file out.
//!
//! Chunks are sent to the model one at a time, in document order. Each
//! reply is parsed and its questions appended (and flushed) to the output
//! file before the next chunk is sent, so an interrupted run keeps all
//! completed work. A chunk whose model call fails is logged, counted and
//! skipped; the run itself only fails for fatal errors (unreadable PDF,
//! unreachable server, unwritable output).

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::output::{DocumentInfo, GenerationStats, UnitFailure};
use crate::pipeline::aiken::AikenWriter;
use crate::pipeline::chunk::Chunk;
use crate::pipeline::parse::parse_questions;
use crate::prompts;
use crate::session::{connect, ensure_distinct, load_source, progress};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generate questions from a PDF file or URL into an Aiken file.
///
/// # Arguments
/// * `input`: local PDF path or HTTP/HTTPS URL
/// * `output`: Aiken file to create (truncated if it exists)
/// * `config`: run configuration
///
/// # Returns
/// `Ok(GenerationStats)` once every chunk has been attempted, even if some
/// or all model calls failed (see `stats.backend_failures`).
///
/// # Errors
/// Returns `Err(QuizError)` only for fatal errors:
/// - PDF missing, unreadable, encrypted or without text
/// - model server unreachable at startup
/// - output file cannot be written, or would overwrite the PDF
pub async fn generate(
    input: impl AsRef<str>,
    output: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<GenerationStats, QuizError> {
    let start = Instant::now();
    let input = input.as_ref();
    let output = output.as_ref();
    info!("Starting question generation: {}", input);

    let source = load_source(input, config).await?;
    ensure_distinct(source.path(), output)?;
    let client = connect(config).await?;
    let cb = progress(config);

    let (eligible, too_small): (Vec<&Chunk>, Vec<&Chunk>) = source
        .chunks
        .iter()
        .partition(|c| c.char_count() >= config.min_chunk_chars);
    for chunk in &too_small {
        warn!(
            "Chunk {} skipped: {} chars is below the minimum of {}",
            chunk.index + 1,
            chunk.char_count(),
            config.min_chunk_chars
        );
    }

    let mut stats = GenerationStats {
        total_pages: source.document.total_pages,
        skipped_pages: source.document.skipped_pages.len(),
        total_chunks: source.chunks.len(),
        skipped_chunks: too_small.len(),
        questions_requested: eligible.len() * config.questions_per_chunk,
        output: output.to_path_buf(),
        ..Default::default()
    };

    let mut writer = AikenWriter::create(output).await?;
    let total = eligible.len();
    cb.on_run_start(total);

    for (i, chunk) in eligible.iter().enumerate() {
        let unit = i + 1;
        cb.on_unit_start(unit, total);
        debug!(
            "Chunk {}/{}: {} chars from page {:?}",
            unit,
            total,
            chunk.char_count(),
            chunk.page
        );

        let prompt =
            prompts::generate_prompt(&chunk.text, config.questions_per_chunk, &config.language);
        match client.complete(&prompt, config.backend.temperature).await {
            Ok(reply) => {
                let batch = parse_questions(&reply, Some(config.questions_per_chunk));
                cb.on_questions(unit, &batch.records);
                writer.append(&batch.records).await?;
                info!(
                    "Chunk {}/{}: {} questions ({} dropped)",
                    unit,
                    total,
                    batch.records.len(),
                    batch.dropped_count()
                );
                stats.processed_chunks += 1;
                stats.malformed.extend(batch.dropped);
                cb.on_unit_complete(unit, total, batch.records.len());
            }
            Err(e) => {
                warn!("Chunk {}/{} skipped: {}", unit, total, e);
                cb.on_unit_error(unit, total, &e.to_string());
                stats.backend_failures.push(UnitFailure { unit, error: e });
            }
        }
    }

    stats.questions_written = writer.written();
    stats.duration_ms = start.elapsed().as_millis() as u64;
    cb.on_run_complete(total, stats.processed_chunks);

    info!(
        "Generation complete: {} questions from {}/{} chunks in {}ms ({} failed, {} malformed blocks)",
        stats.questions_written,
        stats.processed_chunks,
        total,
        stats.duration_ms,
        stats.backend_failures.len(),
        stats.malformed.len()
    );
    Ok(stats)
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    input: impl AsRef<str>,
    output: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<GenerationStats, QuizError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QuizError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(input, output, config))
}

/// Describe a PDF and how it would be chunked.
///
/// Does not contact the model server.
pub async fn inspect(input: impl AsRef<str>, config: &QuizConfig) -> Result<DocumentInfo, QuizError> {
    let source = load_source(input.as_ref(), config).await?;
    let eligible = source
        .chunks
        .iter()
        .filter(|c| c.char_count() >= config.min_chunk_chars)
        .count();
    Ok(DocumentInfo {
        total_pages: source.document.total_pages,
        text_pages: source.document.pages.len(),
        skipped_pages: source.document.skipped_pages.clone(),
        chars: source.document.char_count(),
        chunk_size: config.chunk_size,
        chunks: source.chunks.len(),
        eligible_chunks: eligible,
    })
}
