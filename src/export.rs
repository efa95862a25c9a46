//! GIFT export: Aiken questions plus model-written feedback per option.

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::output::{GiftStats, UnitFailure};
use crate::pipeline::aiken::read_questions;
use crate::pipeline::context::ContextIndex;
use crate::pipeline::gift::{complete_feedback, format_gift, parse_feedback, write_batches};
use crate::prompts;
use crate::session::{connect, ensure_distinct, load_source, progress};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Convert `questions_file` to GIFT, with feedback grounded in the PDF.
///
/// Questions with no relevant chunk, and questions whose model call fails,
/// get the fallback feedback for every option instead of being dropped.
pub async fn export_gift(
    input: impl AsRef<str>,
    questions_file: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<GiftStats, QuizError> {
    let start = Instant::now();
    let questions_file = questions_file.as_ref();
    let output = output.as_ref();
    ensure_distinct(questions_file, output)?;

    let batch = read_questions(questions_file).await?;
    let source = load_source(input.as_ref(), config).await?;
    let client = connect(config).await?;
    let index = ContextIndex::new(&source.chunks);
    let cb = progress(config);
    let fallback = prompts::fallback_feedback(&config.language);

    let mut stats = GiftStats {
        total_questions: batch.records.len(),
        malformed_input: batch.dropped_count(),
        ..Default::default()
    };

    let total = batch.records.len();
    let mut blocks = Vec::with_capacity(total);
    cb.on_run_start(total);

    for (i, question) in batch.records.iter().enumerate() {
        let unit = i + 1;
        cb.on_unit_start(unit, total);

        let feedback = match index.select(question) {
            Err(e) => {
                warn!("Question {}/{} unverified: {}", unit, total, e);
                stats.unverified.push(unit);
                Default::default()
            }
            Ok(context) => {
                let prompt = prompts::feedback_prompt(question, &context.chunk.text, &config.language);
                match client
                    .complete(&prompt, config.backend.review_temperature)
                    .await
                {
                    Ok(reply) => parse_feedback(&reply),
                    Err(e) => {
                        warn!("Question {}/{}: no feedback: {}", unit, total, e);
                        cb.on_unit_error(unit, total, &e.to_string());
                        stats.backend_failures.push(UnitFailure { unit, error: e });
                        Default::default()
                    }
                }
            }
        };

        let missing = feedback.iter().filter(|f| f.is_none()).count();
        if missing == 0 {
            stats.full_feedback += 1;
        } else {
            debug!("Question {}/{}: {} options use fallback feedback", unit, total, missing);
            stats.fallback_feedback += 1;
        }

        blocks.push(format_gift(unit, question, &complete_feedback(feedback, fallback)));
        if stats.backend_failures.last().map(|f| f.unit) != Some(unit) {
            cb.on_unit_complete(unit, total, 1);
        }
    }

    stats.files = write_batches(output, &blocks, config.gift_batch_size).await?;
    stats.duration_ms = start.elapsed().as_millis() as u64;
    cb.on_run_complete(total, total - stats.backend_failures.len());
    info!(
        "GIFT export complete: {} questions in {} file(s), {}ms",
        total,
        stats.files.len(),
        stats.duration_ms
    );
    Ok(stats)
}
