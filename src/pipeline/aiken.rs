//! Aiken output: format questions and write them to disk incrementally.
//!
//! ```text
//! <stem>
//! A. <option>
//! B. <option>
//! C. <option>
//! D. <option>
//! ANSWER: <letter>
//! ```
//!
//! Blocks are separated by exactly one blank line. [`AikenWriter`] flushes
//! after every append, so an interrupted run keeps every question written so
//! far.

use crate::error::QuizError;
use crate::pipeline::parse::{parse_aiken, ParsedBatch};
use crate::question::{Letter, QuestionRecord};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Aiken lines cannot contain line breaks.
fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Format one question as an Aiken block ending in a newline.
pub fn format_question(question: &QuestionRecord) -> String {
    let mut out = one_line(question.stem());
    out.push('\n');
    for letter in Letter::ALL {
        out.push_str(&format!("{}. {}\n", letter, one_line(question.option(letter))));
    }
    out.push_str(&format!("ANSWER: {}\n", question.answer()));
    out
}

/// Format a sequence of questions, one blank line between blocks.
pub fn format_questions(questions: &[QuestionRecord]) -> String {
    questions
        .iter()
        .map(format_question)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read an Aiken file back into records.
///
/// Malformed blocks are reported in the batch; a file with no valid block
/// at all is an error.
pub async fn read_questions(path: &Path) -> Result<ParsedBatch, QuizError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| QuizError::QuestionsFileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
    let batch = parse_aiken(&text);
    if batch.records.is_empty() {
        return Err(QuizError::EmptyQuestionsFile {
            path: path.to_path_buf(),
            dropped: batch.dropped_count(),
        });
    }
    debug!(
        "Read {} questions from {} ({} malformed)",
        batch.records.len(),
        path.display(),
        batch.dropped_count()
    );
    Ok(batch)
}

/// Append-only Aiken file, flushed after every write.
#[derive(Debug)]
pub struct AikenWriter {
    file: tokio::fs::File,
    path: PathBuf,
    written: usize,
}

impl AikenWriter {
    /// Create (or truncate) the file at `path`, creating parent directories.
    pub async fn create(path: &Path) -> Result<Self, QuizError> {
        let fail = |e| QuizError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
        let file = tokio::fs::File::create(path).await.map_err(fail)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Append questions and flush them to disk.
    pub async fn append(&mut self, questions: &[QuestionRecord]) -> Result<(), QuizError> {
        if questions.is_empty() {
            return Ok(());
        }
        let mut text = String::new();
        for q in questions {
            if self.written > 0 || !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format_question(q));
        }
        self.file
            .write_all(text.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;
        self.file.flush().await.map_err(|e| self.write_error(e))?;
        self.written += questions.len();
        Ok(())
    }

    /// Questions written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> QuizError {
        QuizError::OutputWriteFailed {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(stem: &str, answer: Letter) -> QuestionRecord {
        QuestionRecord::new(
            stem,
            ["Berlin".into(), "Paris".into(), "Madrid".into(), "Rome".into()],
            answer,
        )
        .unwrap()
    }

    #[test]
    fn format_is_exact() {
        let text = format_question(&q("What is the capital of France?", Letter::B));
        assert_eq!(
            text,
            "What is the capital of France?\nA. Berlin\nB. Paris\nC. Madrid\nD. Rome\nANSWER: B\n"
        );
    }

    #[test]
    fn blocks_separated_by_one_blank_line() {
        let text = format_questions(&[q("One?", Letter::A), q("Two?", Letter::D)]);
        assert!(text.contains("ANSWER: A\n\nTwo?\n"));
        assert!(!text.contains("\n\n\n"));
        assert!(text.ends_with("ANSWER: D\n"));
    }

    #[test]
    fn line_breaks_inside_fields_are_flattened() {
        let text = format_question(&q("Multi\nline\r\nstem?", Letter::C));
        assert!(text.starts_with("Multi line stem?\nA. "));
    }

    #[test]
    fn format_then_parse_roundtrip() {
        let original = vec![
            q("What is the capital of France?", Letter::B),
            q("Which city hosted the 1992 Olympics?", Letter::C),
            q("C. S. Lewis wrote which series?", Letter::A),
            q("In Python, what is 2**10?", Letter::D),
            q("Q3 revenue grew by how much?", Letter::B),
            q("# of moons of Mars?", Letter::C),
            q("Answer: a or b?", Letter::A),
        ];
        let parsed = parse_aiken(&format_questions(&original));
        assert_eq!(parsed.dropped_count(), 0, "dropped: {:?}", parsed.dropped);
        assert_eq!(parsed.records, original);
    }

    /// Single-line field text, already in the whitespace form Aiken keeps.
    fn field() -> impl Strategy<Value = String> {
        "[A-Za-z0-9#*?:.()%\\-][A-Za-z0-9 #*?:.()%\\-]{0,40}"
            .prop_map(|s| one_line(&s))
            .prop_filter("non-empty", |s| !s.is_empty())
    }

    fn record() -> impl Strategy<Value = QuestionRecord> {
        (field(), [field(), field(), field(), field()], 0usize..4).prop_map(
            |(stem, options, answer)| {
                QuestionRecord::new(stem, options, Letter::ALL[answer]).unwrap()
            },
        )
    }

    proptest! {
        #[test]
        fn every_record_survives_format_then_parse(
            records in prop::collection::vec(record(), 1..5)
        ) {
            let parsed = parse_aiken(&format_questions(&records));
            prop_assert_eq!(parsed.dropped_count(), 0);
            prop_assert_eq!(parsed.records, records);
        }
    }

    #[tokio::test]
    async fn writer_appends_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("quiz.txt");
        let mut writer = AikenWriter::create(&path).await.unwrap();
        writer.append(&[q("One?", Letter::A)]).await.unwrap();

        // Already on disk before the writer is dropped.
        let partial = std::fs::read_to_string(&path).unwrap();
        assert_eq!(partial, format_question(&q("One?", Letter::A)));

        writer.append(&[]).await.unwrap();
        writer
            .append(&[q("Two?", Letter::B), q("Three?", Letter::C)])
            .await
            .unwrap();
        assert_eq!(writer.written(), 3);

        let full = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            full,
            format_questions(&[q("One?", Letter::A), q("Two?", Letter::B), q("Three?", Letter::C)])
        );
    }

    #[tokio::test]
    async fn read_questions_reports_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.txt");
        let text = format!(
            "{}\nBroken?\nA. x\nB. y\nANSWER: A\n",
            format_question(&q("Good?", Letter::A))
        );
        std::fs::write(&path, text).unwrap();
        let batch = read_questions(&path).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.dropped_count(), 1);
    }

    #[tokio::test]
    async fn read_questions_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "nothing useful here\n").unwrap();
        assert!(matches!(
            read_questions(&path).await,
            Err(QuizError::EmptyQuestionsFile { dropped: 0, .. })
        ));
        assert!(matches!(
            read_questions(&dir.path().join("missing.txt")).await,
            Err(QuizError::QuestionsFileRead { .. })
        ));
    }
}
