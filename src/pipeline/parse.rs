//! Question parser: recover [`QuestionRecord`]s from loosely formatted text.
//!
//! Model output rarely matches the requested layout exactly. Instead of one
//! big regex over the whole reply, every line is classified by shape
//! ([`Line`]) and fed through a small block state machine:
//!
//! ```text
//! text ─▶ stem ─▶ options ─▶ ANSWER ─▶ Ok(record)
//!                    │
//!                    └─ text / end of input ─▶ Malformed(reason)
//! ```
//!
//! The first non-blank line of a block is always its stem, whatever it looks
//! like; option and answer shapes are only recognised after it.
//!
//! Noise tolerated in model replies ([`parse_questions`]):
//! - numbering prefixes (`1.`, `Q1:`, `Question 1:`, `Domanda 1:`)
//! - Markdown bold around words, headings, code fences
//! - a preamble separated from the first question by a blank line
//! - trailing commentary after the last answer
//!
//! Aiken files ([`parse_aiken`]) are read literally: only label variants are
//! accepted, so every record [`format_question`] writes comes back unchanged.
//!
//! Both accept option labels in either case with `.`, `)`, `]` or `:`
//! (`A.`, `b)`, `(C)`) and answer lines spelled `ANSWER:`, `Answer:`,
//! `Correct answer:` or `RISPOSTA:`. A block that cannot be completed is
//! dropped and reported as a [`MalformedQuestion`]; it never aborts the
//! batch.
//!
//! [`format_question`]: crate::pipeline::aiken::format_question

use crate::error::{MalformedQuestion, MalformedReason};
use crate::question::{Letter, QuestionRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

// ── Line shapes ──────────────────────────────────────────────────────────────

static RE_OPTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-•]\s*)?\(?([A-Da-d])[.):\]](?:\s+(.*))?$").unwrap());

static RE_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:correct\s+answer|answer|risposta(?:\s+corretta)?)\s*(?:is\s*)?:\s*\(?([a-d])\b",
    )
    .unwrap()
});

static RE_NUMBERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:question|domanda|q)\s*\d+\s*(?:[.):\-]\s*|$)|\d+\s*[.)]\s+)").unwrap()
});

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#+\s+").unwrap());

/// `**` opening bold at the start of a word.
static RE_BOLD_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|\s)\*\*").unwrap());

/// `**` closing bold at the end of a word.
static RE_BOLD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(\s|$)").unwrap());

/// Words that mark an approving review reply.
const APPROVAL_WORDS: [&str; 4] = ["APPROVED", "APPROVATA", "APPROVATO", "OK"];

/// Classification of one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Blank,
    Option(Letter, String),
    Answer(Letter),
    /// Stem text; `numbered` when a question number was stripped from it.
    Text { text: String, numbered: bool },
}

/// Where the text being parsed comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// Free-form model output.
    Reply,
    /// An Aiken file, usually one this crate wrote.
    Aiken,
}

/// Strip Markdown decoration that models add around otherwise valid lines.
///
/// `**` is only removed at word edges, so `2**10` survives.
pub(crate) fn clean_line(raw: &str) -> String {
    let s = RE_BOLD_OPEN.replace_all(raw.trim(), "$1");
    let s = RE_BOLD_CLOSE.replace_all(&s, "$1");
    let s = RE_HEADING.replace(s.trim(), "");
    s.trim().to_string()
}

/// Classify one line; `block_start` is true while the block has no stem yet.
fn classify(raw: &str, source: Source, block_start: bool) -> Line {
    let line = match source {
        Source::Reply => clean_line(raw),
        Source::Aiken => raw.trim().to_string(),
    };
    if line.is_empty() || (source == Source::Reply && line.starts_with("```")) {
        return Line::Blank;
    }
    if block_start && source == Source::Aiken {
        return Line::Text {
            text: line,
            numbered: false,
        };
    }

    if let Some(letter) = RE_ANSWER
        .captures(&line)
        .and_then(|c| c[1].chars().next())
        .and_then(Letter::from_char)
    {
        return Line::Answer(letter);
    }

    if let Some(caps) = RE_OPTION.captures(&line).filter(|_| !block_start) {
        if let Some(letter) = caps[1].chars().next().and_then(Letter::from_char) {
            let text = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();
            return Line::Option(letter, text);
        }
    }

    match RE_NUMBERING.find(&line).filter(|_| source == Source::Reply) {
        Some(m) => Line::Text {
            text: line[m.end()..].trim().to_string(),
            numbered: true,
        },
        None => Line::Text {
            text: line,
            numbered: false,
        },
    }
}

// ── Block state machine ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PendingBlock {
    stem: Vec<String>,
    /// A blank line followed stem-only text; more text replaces the stem.
    stem_closed: bool,
    options: [Option<String>; 4],
    duplicate: Option<Letter>,
}

impl PendingBlock {
    fn has_options(&self) -> bool {
        self.options.iter().any(Option::is_some)
    }

    fn is_empty(&self) -> bool {
        self.stem.is_empty() && !self.has_options()
    }

    fn option_count(&self) -> usize {
        self.options.iter().filter(|o| o.is_some()).count()
    }

    fn push_stem(&mut self, text: String) {
        if !text.is_empty() {
            self.stem.push(text);
        }
    }

    fn set_option(&mut self, letter: Letter, text: String) {
        let slot = &mut self.options[letter.index()];
        if slot.is_some() {
            self.duplicate.get_or_insert(letter);
        } else {
            *slot = Some(text);
        }
    }

    /// Turn the collected lines into a record.
    fn finish(self, answer: Option<Letter>) -> Result<QuestionRecord, MalformedReason> {
        if let Some(letter) = self.duplicate {
            return Err(MalformedReason::DuplicateOption(letter));
        }
        let found = self.option_count();
        if found < 4 {
            return Err(MalformedReason::MissingOptions { found });
        }
        if self.stem.is_empty() {
            return Err(MalformedReason::MissingStem);
        }
        let answer = answer.ok_or(MalformedReason::MissingAnswer)?;
        let options = self.options.map(Option::unwrap_or_default);
        QuestionRecord::new(self.stem.join(" "), options, answer)
    }
}

/// Records recovered from one piece of text, plus the blocks that were not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedBatch {
    pub records: Vec<QuestionRecord>,
    pub dropped: Vec<MalformedQuestion>,
}

impl ParsedBatch {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

struct Parser {
    source: Source,
    block: PendingBlock,
    blocks_seen: usize,
    batch: ParsedBatch,
}

impl Parser {
    fn new(source: Source) -> Self {
        Self {
            source,
            block: PendingBlock::default(),
            blocks_seen: 0,
            batch: ParsedBatch::default(),
        }
    }

    fn close(&mut self, answer: Option<Letter>) {
        let block = std::mem::take(&mut self.block);
        self.blocks_seen += 1;
        match block.finish(answer) {
            Ok(record) => self.batch.records.push(record),
            Err(reason) => {
                let malformed = MalformedQuestion {
                    block: self.blocks_seen,
                    reason,
                };
                warn!("Dropping {}", malformed);
                self.batch.dropped.push(malformed);
            }
        }
    }

    fn feed(&mut self, raw: &str) {
        let block_start = self.block.is_empty();
        match classify(raw, self.source, block_start) {
            Line::Blank => {
                if !self.block.stem.is_empty() && !self.block.has_options() {
                    self.block.stem_closed = true;
                }
            }
            Line::Text { text, numbered } => {
                if self.block.has_options() {
                    // Options were never closed by an answer line.
                    self.close(None);
                } else if (self.block.stem_closed || numbered || self.after_lead_in())
                    && !self.block.stem.is_empty()
                {
                    debug!("Discarding text before question: {:?}", self.block.stem);
                    self.block = PendingBlock::default();
                }
                self.block.push_stem(text);
            }
            Line::Option(letter, text) => self.block.set_option(letter, text),
            Line::Answer(letter) => {
                if self.block.is_empty() {
                    debug!("Ignoring answer line outside a question block");
                } else {
                    self.close(Some(letter));
                }
            }
        }
    }

    /// A reply line ending in `:` introduces what follows ("Corrected version:").
    fn after_lead_in(&self) -> bool {
        self.source == Source::Reply
            && self.block.stem.last().is_some_and(|l| l.ends_with(':'))
    }

    fn end(mut self) -> ParsedBatch {
        if self.block.has_options() {
            self.close(None);
        } else if !self.block.stem.is_empty() {
            debug!("Ignoring trailing text: {:?}", self.block.stem);
        }
        self.batch
    }
}

fn parse(text: &str, source: Source) -> ParsedBatch {
    let mut parser = Parser::new(source);
    for raw in text.lines() {
        parser.feed(raw);
    }
    parser.end()
}

/// Parse every question block in a model reply.
///
/// `expected` is the number of questions that were asked for; a shortfall is
/// logged but never an error.
pub fn parse_questions(text: &str, expected: Option<usize>) -> ParsedBatch {
    let batch = parse(text, Source::Reply);

    if let Some(n) = expected {
        if batch.records.len() != n {
            debug!(
                "Expected {} questions, parsed {} ({} dropped)",
                n,
                batch.records.len(),
                batch.dropped_count()
            );
        }
    }
    batch
}

// ── Review replies ───────────────────────────────────────────────────────────

/// What a validation or improvement reply amounts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The model accepted the question as it is.
    Approved,
    /// The model supplied a corrected or rewritten question.
    Replaced(QuestionRecord),
    /// Neither an approval nor a parsable question.
    Unparseable,
}

/// Parse an Aiken file's contents, without the model-reply cleanup.
pub fn parse_aiken(text: &str) -> ParsedBatch {
    parse(text, Source::Aiken)
}

/// Interpret a review reply.
///
/// A question block anywhere in the reply is the replacement, even after an
/// approving word ("OK, corrected version: ..."). Without one, the reply
/// approves when its first non-blank line starts with an approval word
/// (`APPROVED`, Italian `APPROVATA`/`APPROVATO`, or `OK`), ignoring case,
/// quotes and Markdown.
pub fn parse_verdict(reply: &str) -> Verdict {
    if let Some(record) = parse_questions(reply, Some(1)).records.into_iter().next() {
        return Verdict::Replaced(record);
    }
    if let Some(first) = reply.lines().map(clean_line).find(|l| !l.is_empty()) {
        let word: String = first
            .trim_start_matches(|c: char| !c.is_alphanumeric())
            .chars()
            .take_while(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        if APPROVAL_WORDS.contains(&word.as_str()) {
            return Verdict::Approved;
        }
    }
    Verdict::Unparseable
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
What is the capital of France?
A. Berlin
B. Paris
C. Madrid
D. Rome
ANSWER: B
";

    #[test]
    fn parses_single_block() {
        let batch = parse_questions(WELL_FORMED, Some(1));
        assert_eq!(batch.dropped_count(), 0);
        assert_eq!(batch.records.len(), 1);
        let q = &batch.records[0];
        assert_eq!(q.stem(), "What is the capital of France?");
        assert_eq!(q.option(Letter::B), "Paris");
        assert_eq!(q.answer(), Letter::B);
    }

    #[test]
    fn tolerates_numbering_and_label_variants() {
        let text = "\
Here are your questions:

1. Which river flows through Rome?
a) Seine
b) Tiber
c) Thames
d) Danube
Answer: b

**Question 2:** Which city is the capital of Germany?
(A) Munich
(B) Hamburg
(C) Berlin
(D) Cologne
**ANSWER: C**

Q3: What is the largest planet?
A: Jupiter
B: Mars
C: Venus
D: Earth
Correct answer: A

I hope these questions help!
";
        let batch = parse_questions(text, Some(3));
        assert_eq!(batch.dropped_count(), 0, "dropped: {:?}", batch.dropped);
        let stems: Vec<&str> = batch.records.iter().map(|q| q.stem()).collect();
        assert_eq!(
            stems,
            vec![
                "Which river flows through Rome?",
                "Which city is the capital of Germany?",
                "What is the largest planet?",
            ]
        );
        let answers: Vec<Letter> = batch.records.iter().map(|q| q.answer()).collect();
        assert_eq!(answers, vec![Letter::B, Letter::C, Letter::A]);
        assert_eq!(batch.records[1].option(Letter::C), "Berlin");
    }

    #[test]
    fn counts_good_and_malformed_blocks() {
        // Two good blocks, one with three options, one without an answer.
        let text = "\
First question?
A. a1
B. b1
C. c1
D. d1
ANSWER: A

Short question?
A. a2
B. b2
C. c2
ANSWER: B

No answer here?
A. a3
B. b3
C. c3
D. d3

Last question?
A. a4
B. b4
C. c4
D. d4
ANSWER: D
";
        let batch = parse_questions(text, Some(4));
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.dropped_count(), 2);
        assert_eq!(
            batch.dropped[0].reason,
            MalformedReason::MissingOptions { found: 3 }
        );
        assert_eq!(batch.dropped[1].reason, MalformedReason::MissingAnswer);
        assert_eq!(batch.records[1].stem(), "Last question?");
    }

    #[test]
    fn duplicate_option_is_malformed() {
        let text = "Q?\nA. x\nB. y\nB. z\nC. w\nD. v\nANSWER: A\n";
        let batch = parse_questions(text, None);
        assert!(batch.records.is_empty());
        assert_eq!(
            batch.dropped[0].reason,
            MalformedReason::DuplicateOption(Letter::B)
        );
    }

    #[test]
    fn leading_option_line_is_the_stem() {
        let text = "A. x\nB. y\nC. z\nD. w\nANSWER: C\n";
        let batch = parse_questions(text, None);
        assert_eq!(
            batch.dropped[0].reason,
            MalformedReason::MissingOptions { found: 3 }
        );
    }

    #[test]
    fn stem_shaped_like_an_option_or_numbering_survives() {
        let text = "\
C. S. Lewis wrote which series?
A. Narnia
B. Discworld
C. Earthsea
D. Dune
ANSWER: A

Q3 revenue grew by how much?
A. 2**x
B. 5%
C. 10%
D. 20%
ANSWER: C
";
        let batch = parse_questions(text, Some(2));
        assert_eq!(batch.dropped_count(), 0, "dropped: {:?}", batch.dropped);
        assert_eq!(batch.records[0].stem(), "C. S. Lewis wrote which series?");
        assert_eq!(batch.records[0].option(Letter::C), "Earthsea");
        assert_eq!(batch.records[1].stem(), "Q3 revenue grew by how much?");
        assert_eq!(batch.records[1].option(Letter::A), "2**x");
    }

    #[test]
    fn bold_is_stripped_only_at_word_edges() {
        assert_eq!(clean_line("**Question 2:** Which one?"), "Question 2: Which one?");
        assert_eq!(clean_line("**ANSWER: C**"), "ANSWER: C");
        assert_eq!(clean_line("In Python, what is 2**10?"), "In Python, what is 2**10?");
        assert_eq!(clean_line("### Question 1"), "Question 1");
    }

    #[test]
    fn aiken_text_is_read_literally() {
        let text = "\
# of moons of Mars?
A. **one**
B. Two
C. Q1: three
D. ANSWER: none
ANSWER: B

Answer: a or b?
A. a
B. b
C. both
D. neither
ANSWER: C
";
        let batch = parse_aiken(text);
        assert_eq!(batch.dropped_count(), 0, "dropped: {:?}", batch.dropped);
        let q = &batch.records[0];
        assert_eq!(q.stem(), "# of moons of Mars?");
        assert_eq!(q.option(Letter::A), "**one**");
        assert_eq!(q.option(Letter::C), "Q1: three");
        assert_eq!(q.option(Letter::D), "ANSWER: none");
        assert_eq!(q.answer(), Letter::B);
        assert_eq!(batch.records[1].stem(), "Answer: a or b?");
        assert_eq!(batch.records[1].answer(), Letter::C);
    }

    #[test]
    fn empty_option_is_malformed() {
        let text = "Q?\nA. x\nB.\nC. z\nD. w\nANSWER: C\n";
        let batch = parse_questions(text, None);
        assert_eq!(
            batch.dropped[0].reason,
            MalformedReason::EmptyOption(Letter::B)
        );
    }

    #[test]
    fn unterminated_block_at_end_is_dropped() {
        let text = format!("{WELL_FORMED}\nAnother?\nA. 1\nB. 2\n");
        let batch = parse_questions(&text, None);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(
            batch.dropped[0].reason,
            MalformedReason::MissingOptions { found: 2 }
        );
        assert_eq!(batch.dropped[0].block, 2);
    }

    #[test]
    fn code_fences_and_crlf_are_ignored() {
        let text = "```\r\nWhat is 2+2?\r\nA. 3\r\nB. 4\r\nC. 5\r\nD. 22\r\nANSWER: B\r\n```\r\n";
        let batch = parse_questions(text, Some(1));
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].option(Letter::D), "22");
    }

    #[test]
    fn answer_word_inside_text_is_not_an_answer() {
        let text = "Answer the following: which is a mammal?\nA. Shark\nB. Dolphin\nC. Trout\nD. Eel\nANSWER: B\n";
        let batch = parse_questions(text, None);
        assert_eq!(batch.records.len(), 1);
        assert!(batch.records[0].stem().starts_with("Answer the following"));
    }

    #[test]
    fn italian_answer_label() {
        let text = "Qual è la capitale d'Italia?\nA. Milano\nB. Roma\nC. Napoli\nD. Torino\nRISPOSTA: B\n";
        let batch = parse_questions(text, None);
        assert_eq!(batch.records[0].answer(), Letter::B);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert_eq!(parse_questions("", Some(2)), ParsedBatch::default());
        assert_eq!(parse_questions("Sorry, I cannot help.", None), ParsedBatch::default());
    }

    #[test]
    fn verdict_approved_variants() {
        for reply in ["APPROVED", "**APPROVED**", "Approved.", "\"APPROVATA\"", "OK", "\n\n approvato - nothing to change"] {
            assert_eq!(parse_verdict(reply), Verdict::Approved, "reply: {reply:?}");
        }
    }

    #[test]
    fn verdict_replacement() {
        match parse_verdict(WELL_FORMED) {
            Verdict::Replaced(q) => assert_eq!(q.answer(), Letter::B),
            other => panic!("expected replacement, got {other:?}"),
        }
    }

    #[test]
    fn verdict_unparseable() {
        assert_eq!(
            parse_verdict("The question looks mostly fine but could be clearer."),
            Verdict::Unparseable
        );
        assert_eq!(parse_verdict(""), Verdict::Unparseable);
    }

    #[test]
    fn correction_after_approval_word_is_a_replacement() {
        let ok_then_fix = format!("OK, the marked answer is wrong. Corrected version:\n\n{WELL_FORMED}");
        let approved_then_fix = format!("Approved with one fix:\n{WELL_FORMED}");
        for reply in [ok_then_fix, approved_then_fix] {
            match parse_verdict(&reply) {
                Verdict::Replaced(q) => {
                    assert_eq!(q.stem(), "What is the capital of France?");
                    assert_eq!(q.answer(), Letter::B);
                }
                other => panic!("expected replacement for {reply:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn okay_prefix_is_not_approval() {
        // "Okay" is not the word "OK".
        assert_eq!(parse_verdict("Okay, here is my analysis."), Verdict::Unparseable);
    }
}
