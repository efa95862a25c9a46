//! Translation pass: rewrite an Aiken file in another language.
//!
//! One model call per question. The reply is read with the question parser
//! and the original answer letter is always kept, whatever the model wrote
//! on its `ANSWER:` line. A failed call or a reply without a question keeps
//! the original question.

use crate::config::QuizConfig;
use crate::error::QuizError;
use crate::output::{TranslationStats, UnitFailure};
use crate::pipeline::aiken::{read_questions, AikenWriter};
use crate::pipeline::parse::parse_questions;
use crate::prompts;
use crate::session::{connect, ensure_distinct, progress};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Translate every question in `questions_file` into `config.language`.
pub async fn translate(
    questions_file: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &QuizConfig,
) -> Result<TranslationStats, QuizError> {
    let start = Instant::now();
    let questions_file = questions_file.as_ref();
    let output = output.as_ref();
    ensure_distinct(questions_file, output)?;

    let batch = read_questions(questions_file).await?;
    let client = connect(config).await?;
    let cb = progress(config);
    info!(
        "Translating {} questions into {}",
        batch.records.len(),
        config.language.name()
    );

    let mut stats = TranslationStats {
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

        let prompt = prompts::translate_prompt(&question, &config.language);
        let kept = match client
            .complete(&prompt, config.backend.review_temperature)
            .await
        {
            Ok(reply) => match parse_questions(&reply, Some(1)).records.into_iter().next() {
                Some(translated) => {
                    stats.translated += 1;
                    let translated = translated.with_answer(question.answer());
                    cb.on_questions(unit, std::slice::from_ref(&translated));
                    translated
                }
                None => {
                    warn!("Question {}/{}: no question in reply, original kept", unit, total);
                    stats.unparseable += 1;
                    question
                }
            },
            Err(e) => {
                warn!("Question {}/{} not translated: {}", unit, total, e);
                cb.on_unit_error(unit, total, &e.to_string());
                stats.backend_failures.push(UnitFailure { unit, error: e });
                question
            }
        };

        writer.append(std::slice::from_ref(&kept)).await?;
        if stats.backend_failures.last().map(|f| f.unit) != Some(unit) {
            cb.on_unit_complete(unit, total, 1);
        }
    }

    stats.questions_written = writer.written();
    stats.duration_ms = start.elapsed().as_millis() as u64;
    cb.on_run_complete(total, total - stats.backend_failures.len());
    info!(
        "Translation complete: {}/{} translated in {}ms",
        stats.translated, total, stats.duration_ms
    );
    Ok(stats)
}
