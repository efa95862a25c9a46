//! Prompt templates for every model task.
//!
//! All wording sent to the model lives here, so a change to the expected
//! reply layout is made in one place next to the parser that reads it.
//! Templates use `{placeholder}` markers filled by the `*_prompt` builders.
//!
//! Every template asks for plain Aiken blocks (stem, `A.`–`D.`, `ANSWER:`)
//! because that is what [`crate::pipeline::parse`] recovers; the target
//! language only changes what the questions are written in, never the labels.

use crate::config::{Language, ReviewMode};
use crate::pipeline::aiken::format_question;
use crate::question::QuestionRecord;

/// Keyword a review reply starts with when the question needs no change.
pub const APPROVED_KEYWORD: &str = "APPROVED";

/// Generate `{count}` questions from `{text}`.
pub const GENERATE_TEMPLATE: &str = r#"You are an expert teacher writing a multiple-choice exam about the text below.

Rules:
1. Write exactly {count} multiple-choice questions, in {language}.
2. Every question must be answerable from the text alone.
3. Each question has exactly 4 options (A, B, C, D) and exactly one correct option.
4. Use this EXACT format for every question:

[Question text, with no number or letter prefix]
A. [First option]
B. [Second option]
C. [Third option]
D. [Fourth option]
ANSWER: [A, B, C or D]

Formatting rules:
- Never start the question text with "A." or any other option letter
- Each option starts with exactly "A.", "B.", "C." or "D.", in that order
- Never repeat an option letter
- Keep the labels "A." to "D." and "ANSWER:" in English whatever the language
- Leave exactly one blank line between questions
- Do not add explanations, headings or any other text

Example:
Which city is the capital of France?
A. Lyon
B. Paris
C. Marseille
D. Nice
ANSWER: B

Text:
"""
{text}
""""#;

/// Check a question against `{context}`; approve or correct it.
pub const VALIDATE_TEMPLATE: &str = r#"You are an expert examiner. Check this multiple-choice question against the source text.

Question:
{question}

Source text:
"""
{context}
"""

If the question is correct and its marked answer is supported by the source text, reply with the single word APPROVED.
Otherwise reply ONLY with the corrected question, in {language}, in this exact format:
[Question text]
A. [Option]
B. [Option]
C. [Option]
D. [Option]
ANSWER: [A, B, C or D]"#;

/// Like [`VALIDATE_TEMPLATE`], but also rewrite for clarity.
pub const IMPROVE_TEMPLATE: &str = r#"You are an expert examiner. Analyse and improve this multiple-choice question using the source text.

Question:
{question}

Source text:
"""
{context}
"""

If the question is correct, clear and precise, reply with the single word APPROVED.
Otherwise reply ONLY with an improved version, in {language}, that tests the same concept, is supported by the source text and uses this exact format:
[Question text]
A. [Option]
B. [Option]
C. [Option]
D. [Option]
ANSWER: [A, B, C or D]"#;

/// Translate one question into `{language}`.
pub const TRANSLATE_TEMPLATE: &str = r#"Translate this multiple-choice question into {language}.

{question}

Rules:
- Translate the question text and all four options faithfully
- Keep the option order and the labels "A.", "B.", "C.", "D." and "ANSWER:" unchanged
- Keep the same answer letter
- Reply ONLY with the translated question in the same format"#;

/// Ask for one feedback line per option, grounded in `{context}`.
pub const FEEDBACK_TEMPLATE: &str = r#"You are an expert examiner. Write feedback for every option of this multiple-choice question, in {language}, quoting the source text where possible.

Question:
{question}

Source text:
"""
{context}
"""

Rules:
- For the correct option, explain why it is right, quoting the source text
- For each wrong option, explain why it is wrong, quoting the source text
- Never refer to the other options by letter
- One line per option, in exactly this format:

FEEDBACK_A: [feedback for option A]
FEEDBACK_B: [feedback for option B]
FEEDBACK_C: [feedback for option C]
FEEDBACK_D: [feedback for option D]"#;

/// Prompt asking for `count` questions about `text`.
pub fn generate_prompt(text: &str, count: usize, language: &Language) -> String {
    GENERATE_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{language}", language.name())
        .replace("{text}", text)
}

/// Prompt asking the model to validate or improve `question` against `context`.
pub fn review_prompt(
    question: &QuestionRecord,
    context: &str,
    mode: ReviewMode,
    language: &Language,
) -> String {
    let template = match mode {
        ReviewMode::Validate => VALIDATE_TEMPLATE,
        ReviewMode::Improve => IMPROVE_TEMPLATE,
    };
    template
        .replace("{question}", format_question(question).trim_end())
        .replace("{language}", language.name())
        .replace("{context}", context)
}

pub fn translate_prompt(question: &QuestionRecord, language: &Language) -> String {
    TRANSLATE_TEMPLATE
        .replace("{question}", format_question(question).trim_end())
        .replace("{language}", language.name())
}

pub fn feedback_prompt(question: &QuestionRecord, context: &str, language: &Language) -> String {
    FEEDBACK_TEMPLATE
        .replace("{question}", format_question(question).trim_end())
        .replace("{language}", language.name())
        .replace("{context}", context)
}

/// Feedback used for options the model gave none for.
pub fn fallback_feedback(language: &Language) -> &'static str {
    match language {
        Language::Italian => "Consultare il testo di riferimento per il contenuto completo.",
        _ => "See the source text for the full explanation.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Letter;

    fn q() -> QuestionRecord {
        QuestionRecord::new(
            "What is the capital of France?",
            ["Berlin".into(), "Paris".into(), "Madrid".into(), "Rome".into()],
            Letter::B,
        )
        .unwrap()
    }

    #[test]
    fn generate_prompt_fills_placeholders() {
        let p = generate_prompt("Paris is the capital of France.", 3, &Language::Italian);
        assert!(p.contains("exactly 3 multiple-choice questions, in Italian"));
        assert!(p.contains("Paris is the capital of France."));
        assert!(p.contains("ANSWER:"));
        assert!(!p.contains('{'), "unfilled placeholder in: {p}");
    }

    #[test]
    fn review_prompt_embeds_question_and_context() {
        let p = review_prompt(&q(), "CONTEXT TEXT", ReviewMode::Validate, &Language::English);
        assert!(p.contains("What is the capital of France?\nA. Berlin"));
        assert!(p.contains("ANSWER: B"));
        assert!(p.contains("CONTEXT TEXT"));
        assert!(p.contains(APPROVED_KEYWORD));
        assert!(p.contains("corrected question"));
    }

    #[test]
    fn improve_mode_asks_for_rewrite() {
        let p = review_prompt(&q(), "ctx", ReviewMode::Improve, &Language::English);
        assert!(p.contains("improved version"));
        assert!(p.contains("same concept"));
    }

    #[test]
    fn translate_prompt_names_language() {
        let p = translate_prompt(&q(), &Language::Other("German".into()));
        assert!(p.contains("into German"));
        assert!(p.contains("D. Rome"));
    }

    #[test]
    fn feedback_prompt_lists_labels() {
        let p = feedback_prompt(&q(), "ctx", &Language::English);
        for label in ["FEEDBACK_A:", "FEEDBACK_B:", "FEEDBACK_C:", "FEEDBACK_D:"] {
            assert!(p.contains(label));
        }
    }

    #[test]
    fn fallback_is_localised() {
        assert!(fallback_feedback(&Language::Italian).starts_with("Consultare"));
        assert!(fallback_feedback(&Language::English).starts_with("See"));
    }
}
