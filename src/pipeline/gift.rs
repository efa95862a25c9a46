//! GIFT export: Moodle's richer quiz format, with per-option feedback.
//!
//! ```text
//! ::Q1:: What is the capital of France? {
//! 	~Berlin # Berlin is the capital of Germany.
//! 	=Paris # The text says so.
//! 	~Madrid # ...
//! 	~Rome # ...
//! }
//! ```
//!
//! Feedback comes from the model as `FEEDBACK_A:` … `FEEDBACK_D:` lines;
//! anything missing is filled with a fallback sentence. Large exports are
//! split into several files of at most `batch_size` questions.

use crate::error::QuizError;
use crate::pipeline::parse::clean_line;
use crate::question::{Letter, QuestionRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::info;

static RE_FEEDBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^FEEDBACK[_\s]?([A-D])\s*[:.\-]\s*(.*)$").unwrap());

/// Feedback text per option, in A–D order.
pub type OptionFeedback = [Option<String>; 4];

/// Extract `FEEDBACK_<letter>:` lines from a model reply.
///
/// Lines after a feedback label are treated as its continuation until the
/// next label. Text before the first label is ignored.
pub fn parse_feedback(reply: &str) -> OptionFeedback {
    let mut feedback: OptionFeedback = Default::default();
    let mut current: Option<Letter> = None;

    for raw in reply.lines() {
        let line = clean_line(raw);
        let text = match RE_FEEDBACK.captures(&line) {
            Some(caps) => {
                current = caps[1].chars().next().and_then(Letter::from_char);
                caps[2].trim().to_string()
            }
            None => line,
        };
        let Some(letter) = current else { continue };
        if text.is_empty() {
            continue;
        }
        let slot = &mut feedback[letter.index()];
        match slot {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(&text);
            }
            None => *slot = Some(text),
        }
    }
    feedback
}

/// Fill gaps in `feedback` with `fallback`.
pub fn complete_feedback(feedback: OptionFeedback, fallback: &str) -> [String; 4] {
    feedback.map(|f| f.unwrap_or_else(|| fallback.to_string()))
}

/// Escape GIFT control characters.
pub fn escape_gift(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.split_whitespace().collect::<Vec<_>>().join(" ").chars() {
        if matches!(c, '~' | '=' | '#' | '{' | '}' | ':' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Format question number `n` (1-indexed) as a GIFT block.
pub fn format_gift(n: usize, question: &QuestionRecord, feedback: &[String; 4]) -> String {
    let mut out = format!("::Q{}:: {} {{\n", n, escape_gift(question.stem()));
    for letter in Letter::ALL {
        let marker = if letter == question.answer() { '=' } else { '~' };
        out.push_str(&format!(
            "\t{}{} # {}\n",
            marker,
            escape_gift(question.option(letter)),
            escape_gift(&feedback[letter.index()])
        ));
    }
    out.push_str("}\n");
    out
}

/// Output file for each batch.
///
/// A single batch keeps `output` as is; several become `<stem>_1.<ext>`,
/// `<stem>_2.<ext>`, … with `gift` as the default extension.
pub fn batch_paths(output: &Path, total: usize, batch_size: usize) -> Vec<PathBuf> {
    let batches = total.div_ceil(batch_size.max(1)).max(1);
    if batches == 1 {
        return vec![output.to_path_buf()];
    }
    let stem = output
        .file_stem()
        .map_or_else(|| "questions".into(), |s| s.to_string_lossy().into_owned());
    let ext = output
        .extension()
        .map_or_else(|| "gift".into(), |s| s.to_string_lossy().into_owned());
    (1..=batches)
        .map(|i| output.with_file_name(format!("{stem}_{i}.{ext}")))
        .collect()
}

/// Write GIFT blocks to one or more files; returns the paths written.
pub async fn write_batches(
    output: &Path,
    blocks: &[String],
    batch_size: usize,
) -> Result<Vec<PathBuf>, QuizError> {
    let batch_size = batch_size.max(1);
    let paths = batch_paths(output, blocks.len(), batch_size);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| QuizError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
    }

    let mut chunks = blocks.chunks(batch_size);
    for (i, path) in paths.iter().enumerate() {
        let batch = chunks.next().unwrap_or(&[]);
        tokio::fs::write(path, batch.join("\n"))
            .await
            .map_err(|e| QuizError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        let first = i * batch_size;
        info!(
            "Saved questions {}-{} to {}",
            (first + 1).min(blocks.len()),
            first + batch.len(),
            path.display()
        );
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q() -> QuestionRecord {
        QuestionRecord::new(
            "What is 2 + 2 = ?",
            ["3".into(), "4".into(), "5 {approx}".into(), "22".into()],
            Letter::B,
        )
        .unwrap()
    }

    #[test]
    fn parses_feedback_lines() {
        let reply = "\
Here is the feedback:
FEEDBACK_A: Wrong, 2 + 2 is not 3.
FEEDBACK_B: Correct.
**FEEDBACK_C:** Wrong.
It is not five.
FEEDBACK_D: Wrong, that is concatenation.";
        let fb = parse_feedback(reply);
        assert_eq!(fb[0].as_deref(), Some("Wrong, 2 + 2 is not 3."));
        assert_eq!(fb[1].as_deref(), Some("Correct."));
        assert_eq!(fb[2].as_deref(), Some("Wrong. It is not five."));
        assert_eq!(fb[3].as_deref(), Some("Wrong, that is concatenation."));
    }

    #[test]
    fn missing_feedback_uses_fallback() {
        let fb = parse_feedback("FEEDBACK_B: Correct.");
        let full = complete_feedback(fb, "See the source text.");
        assert_eq!(full[0], "See the source text.");
        assert_eq!(full[1], "Correct.");
    }

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_gift("a=b~c#d{e}f:g\\h"), "a\\=b\\~c\\#d\\{e\\}f\\:g\\\\h");
        assert_eq!(escape_gift("line\nbreak"), "line break");
    }

    #[test]
    fn formats_block() {
        let fb = complete_feedback(parse_feedback("FEEDBACK_B: Right: 4."), "See text.");
        let block = format_gift(7, &q(), &fb);
        assert_eq!(
            block,
            "::Q7:: What is 2 + 2 \\= ? {\n\
             \t~3 # See text.\n\
             \t=4 # Right\\: 4.\n\
             \t~5 \\{approx\\} # See text.\n\
             \t~22 # See text.\n\
             }\n"
        );
    }

    #[test]
    fn single_batch_keeps_name() {
        let paths = batch_paths(Path::new("out/quiz.gift"), 10, 500);
        assert_eq!(paths, vec![PathBuf::from("out/quiz.gift")]);
        assert_eq!(batch_paths(Path::new("quiz.gift"), 0, 500).len(), 1);
    }

    #[test]
    fn multiple_batches_are_suffixed() {
        let paths = batch_paths(Path::new("out/quiz.gift"), 5, 2);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("out/quiz_1.gift"),
                PathBuf::from("out/quiz_2.gift"),
                PathBuf::from("out/quiz_3.gift"),
            ]
        );
        let bare = batch_paths(Path::new("quiz"), 3, 2);
        assert_eq!(bare[1], PathBuf::from("quiz_2.gift"));
    }

    #[tokio::test]
    async fn writes_batches_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("quiz.gift");
        let blocks: Vec<String> = (1..=3).map(|i| format!("::Q{i}:: s {{\n}}\n")).collect();
        let paths = write_batches(&output, &blocks, 2).await.unwrap();
        assert_eq!(paths.len(), 2);
        let first = std::fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(first, "::Q1:: s {\n}\n\n::Q2:: s {\n}\n");
        let second = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(second, "::Q3:: s {\n}\n");
        assert!(!output.exists());
    }
}
