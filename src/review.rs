//! Second pass: check existing questions against the source document.
//!
//! For each question the most relevant chunk is chosen with
//! [`ContextIndex`], the model is asked to approve or rewrite the question
//! against it, and the result is written to a new Aiken file. The input
//! file is never modified.
//!
//! Per question:
//!
//! ```text
//! pending ─▶ scored ─▶ judged ─▶ unchanged | replaced | unparseable
//!              │          └────▶ failed (backend error)
//!              └───────────────▶ unverified (no context)
//! ```
//!
//! Every outcome except `replaced` writes the original question back.

use crate::config::QuizConfig;
use crate::error::{BackendError, NoRelevantContext, QuizError};
use crate::output::{ReviewOutcome, UnitFailure, ValidationStats};
use crate::pipeline::aiken::{read_questions, AikenWriter};
use crate::pipeline::context::ContextIndex;
use crate::pipeline::llm::ModelClient;
use crate::pipeline::parse::{parse_verdict, Verdict};
use crate::prompts;
use crate::question::QuestionRecord;
use crate::session::{connect, ensure_distinct, load_source, progress};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What reviewing one question produced.
#[derive(Debug, Clone)]
pub enum Review {
    /// The model approved the question.
    Unchanged,
    /// The model returned a different question.
    Replaced(QuestionRecord),
    /// No chunk is relevant to the question.
    Unverified(NoRelevantContext),
    /// The model call failed after all retries.
    Failed(BackendError),
    /// The reply held neither an approval nor a question.
    Unparseable,
}

impl Review {
    pub fn outcome(&self) -> ReviewOutcome {
        match self {
            Review::Unchanged => ReviewOutcome::Unchanged,
            Review::Replaced(_) => ReviewOutcome::Replaced,
            Review::Unverified(_) => ReviewOutcome::Unverified,
            Review::Failed(_) => ReviewOutcome::Failed,
            Review::Unparseable => ReviewOutcome::Unparseable,
        }
    }

    /// The question to keep: the replacement, or else the original.
    pub fn resolve(self, original: QuestionRecord) -> QuestionRecord {
        match self {
            Review::Replaced(q) => q,
            _ => original,
        }
    }
}

/// Review one question against the indexed chunks.
pub async fn review_question(
    client: &ModelClient,
    index: &ContextIndex<'_>,
    question: &QuestionRecord,
    config: &QuizConfig,
) -> Review {
    let context = match index.select(question) {
        Ok(m) => m,
        Err(e) => return Review::Unverified(e),
    };
    debug!(
        "Context: chunk {} (verbatim: {}, overlap: {})",
        context.chunk.index + 1,
        context.score.verbatim,
        context.score.overlap
    );

    let prompt = prompts::review_prompt(
        question,
        &context.chunk.text,
        config.review_mode,
        &config.language,
    );
    let reply = match client
        .complete(&prompt, config.backend.review_temperature)
        .await
    {
        Ok(r) => r,
        Err(e) => return Review::Failed(e),
    };

    match parse_verdict(&reply) {
        Verdict::Approved => Review::Unchanged,
        Verdict::Replaced(q) if &q == question => Review::Unchanged,
        Verdict::Replaced(q) => Review::Replaced(q),
        Verdict::Unparseable => {
            debug!("Unparseable review reply: {:?}", reply);
            Review::Unparseable
        }
    }
}

/// Validate (or improve) the questions in `questions_file` against the PDF.
///
/// Writes every question, reviewed or not, to `output` in input order.
///
/// # Errors
/// Fatal only when the PDF or questions file cannot be read, the server is
/// unreachable at startup, or `output` cannot be written (including when it
/// is the questions file itself).
pub async fn validate(
    input: impl AsRef<str>,
    questions_file: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<ValidationStats, QuizError> {
    let start = Instant::now();
    let questions_file = questions_file.as_ref();
    let output = output.as_ref();
    ensure_distinct(questions_file, output)?;

    let batch = read_questions(questions_file).await?;
    info!(
        "Loaded {} questions from {} ({} malformed)",
        batch.records.len(),
        questions_file.display(),
        batch.dropped_count()
    );

    let source = load_source(input.as_ref(), config).await?;
    let client = connect(config).await?;
    let index = ContextIndex::new(&source.chunks);
    let cb = progress(config);

    let mut stats = ValidationStats {
        total_questions: batch.records.len(),
        malformed_input: batch.dropped_count(),
        output: output.to_path_buf(),
        ..Default::default()
    };

    let mut writer = AikenWriter::create(output).await?;
    let total = batch.records.len();
    cb.on_run_start(total);

    for (i, question) in batch.records.into_iter().enumerate() {
        let unit = i + 1;
        cb.on_unit_start(unit, total);

        let review = review_question(&client, &index, &question, config).await;
        let outcome = review.outcome();
        stats.record(outcome);
        match &review {
            Review::Unverified(e) => {
                warn!("Question {}/{} unverified: {}", unit, total, e);
                stats.unverified.push(unit);
            }
            Review::Failed(e) => {
                warn!("Question {}/{} kept unreviewed: {}", unit, total, e);
                cb.on_unit_error(unit, total, &e.to_string());
                stats.backend_failures.push(UnitFailure {
                    unit,
                    error: e.clone(),
                });
            }
            Review::Unparseable => {
                warn!("Question {}/{}: reply not understood, original kept", unit, total);
            }
            Review::Unchanged | Review::Replaced(_) => {
                debug!("Question {}/{}: {:?}", unit, total, outcome);
            }
        }

        let kept = review.resolve(question);
        if outcome == ReviewOutcome::Replaced {
            cb.on_questions(unit, std::slice::from_ref(&kept));
        }
        writer.append(std::slice::from_ref(&kept)).await?;
        if outcome != ReviewOutcome::Failed {
            cb.on_unit_complete(unit, total, 1);
        }
    }

    stats.questions_written = writer.written();
    stats.duration_ms = start.elapsed().as_millis() as u64;
    cb.on_run_complete(total, total - stats.backend_failures.len());

    info!(
        "Review complete: {} unchanged, {} replaced, {} unverified, {} failed, {} unparseable in {}ms",
        stats.unchanged,
        stats.replaced,
        stats.unverified.len(),
        stats.backend_failures.len(),
        stats.unparseable,
        stats.duration_ms
    );
    Ok(stats)
}
