//! Run reports returned by the pipeline entry points.
//!
//! Every pipeline finishes with one of these structs, even when every model
//! call failed: skipped and dropped units are counted here rather than
//! turned into errors. All of them serialise with `serde` for `--json`.

use crate::error::{BackendError, MalformedQuestion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A unit of work that was skipped, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    /// 1-indexed chunk or question number.
    pub unit: usize,
    pub error: BackendError,
}

/// Result of a `generate` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationStats {
    /// Page count reported by the PDF.
    pub total_pages: usize,
    /// Pages without extractable text.
    pub skipped_pages: usize,
    /// Chunks produced by the chunker.
    pub total_chunks: usize,
    /// Chunks below the minimum size, never sent to the model.
    pub skipped_chunks: usize,
    /// Chunks whose model call succeeded.
    pub processed_chunks: usize,
    /// Chunks whose model call failed after all retries.
    pub backend_failures: Vec<UnitFailure>,
    /// Question blocks dropped by the parser.
    pub malformed: Vec<MalformedQuestion>,
    /// Questions written to the output file.
    pub questions_written: usize,
    /// Questions requested in total (`questions_per_chunk` × chunks sent).
    pub questions_requested: usize,
    pub output: PathBuf,
    pub duration_ms: u64,
}

/// What the review pass did with one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    /// The model approved the question.
    Unchanged,
    /// The model supplied a corrected or improved question.
    Replaced,
    /// No chunk shares a word with the question; kept as is.
    Unverified,
    /// The model call failed; kept as is.
    Failed,
    /// The reply was neither an approval nor a question; kept as is.
    Unparseable,
}

/// Result of a `validate` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationStats {
    /// Valid questions read from the input file.
    pub total_questions: usize,
    /// Blocks in the input file that could not be parsed.
    pub malformed_input: usize,
    pub unchanged: usize,
    pub replaced: usize,
    /// 1-indexed numbers of questions with no relevant context.
    pub unverified: Vec<usize>,
    pub backend_failures: Vec<UnitFailure>,
    pub unparseable: usize,
    pub questions_written: usize,
    pub output: PathBuf,
    pub duration_ms: u64,
}

impl ValidationStats {
    pub(crate) fn record(&mut self, outcome: ReviewOutcome) {
        match outcome {
            ReviewOutcome::Unchanged => self.unchanged += 1,
            ReviewOutcome::Replaced => self.replaced += 1,
            ReviewOutcome::Unparseable => self.unparseable += 1,
            // Tracked with their unit number by the caller.
            ReviewOutcome::Unverified | ReviewOutcome::Failed => {}
        }
    }
}

/// Result of a `translate` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranslationStats {
    pub total_questions: usize,
    pub malformed_input: usize,
    pub translated: usize,
    pub backend_failures: Vec<UnitFailure>,
    /// Replies that held no question; the original was kept.
    pub unparseable: usize,
    pub questions_written: usize,
    pub output: PathBuf,
    pub duration_ms: u64,
}

/// Result of a `gift` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GiftStats {
    pub total_questions: usize,
    pub malformed_input: usize,
    /// Questions with model-written feedback for every option.
    pub full_feedback: usize,
    /// Questions where at least one option fell back to the default text.
    pub fallback_feedback: usize,
    /// 1-indexed numbers of questions with no relevant context.
    pub unverified: Vec<usize>,
    pub backend_failures: Vec<UnitFailure>,
    /// Files written, in order.
    pub files: Vec<PathBuf>,
    pub duration_ms: u64,
}

/// What `inspect` reports about a PDF.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub total_pages: usize,
    pub text_pages: usize,
    /// 1-indexed numbers of pages without extractable text.
    pub skipped_pages: Vec<usize>,
    pub chars: usize,
    pub chunk_size: usize,
    pub chunks: usize,
    /// Chunks at or above `min_chunk_chars`.
    pub eligible_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_outcome_serialises_snake_case() {
        let json = serde_json::to_string(&ReviewOutcome::Unverified).unwrap();
        assert_eq!(json, "\"unverified\"");
    }

    #[test]
    fn record_counts_outcomes() {
        let mut stats = ValidationStats::default();
        stats.record(ReviewOutcome::Unchanged);
        stats.record(ReviewOutcome::Replaced);
        stats.record(ReviewOutcome::Replaced);
        stats.record(ReviewOutcome::Unparseable);
        stats.record(ReviewOutcome::Failed);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.replaced, 2);
        assert_eq!(stats.unparseable, 1);
    }

    #[test]
    fn generation_stats_to_json() {
        let stats = GenerationStats {
            total_chunks: 3,
            backend_failures: vec![UnitFailure {
                unit: 2,
                error: BackendError::Timeout { elapsed_ms: 100 },
            }],
            ..Default::default()
        };
        let v: serde_json::Value = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["total_chunks"], 3);
        assert_eq!(v["backend_failures"][0]["unit"], 2);
    }
}
