//! Context selection: find the chunk a question was most likely drawn from.
//!
//! ## Scoring
//!
//! Text is tokenised into lowercase runs of Unicode alphanumerics. A token is
//! *significant* when it is not a stopword (English or Italian) and is either
//! at least three characters long or made only of digits, so years and
//! article numbers count while "of" and "la" do not.
//!
//! Each chunk gets a [`ContextScore`]:
//! 1. `verbatim`: the whitespace-normalised stem appears in the chunk,
//!    ignoring case.
//! 2. `overlap`: how many distinct significant tokens of the stem and
//!    options also occur in the chunk.
//!
//! Scores compare lexicographically, so a verbatim match beats any overlap.
//! Ties go to the earliest chunk. If no chunk shares a single significant
//! token with the question there is no context to judge it against, and
//! [`NoRelevantContext`] is returned.

use crate::error::NoRelevantContext;
use crate::pipeline::chunk::Chunk;
use crate::question::QuestionRecord;
use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    // English
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "has", "had", "her",
    "was", "one", "our", "out", "his", "how", "its", "who", "did", "yes", "she", "him", "they",
    "them", "than", "that", "this", "these", "those", "with", "from", "into", "what", "which",
    "when", "where", "why", "will", "would", "should", "could", "there", "their", "then", "been",
    "being", "have", "does", "also", "only", "other", "such", "each", "some", "more", "most",
    "about", "following", "true", "false", "none", "both", "whom", "whose", "were", "your",
    // Italian
    "che", "chi", "del", "della", "delle", "dei", "degli", "dello", "nel", "nella", "nelle",
    "nei", "negli", "nello", "con", "per", "tra", "fra", "sul", "sulla", "sui", "una", "uno",
    "gli", "le", "dal", "dalla", "dai", "alla", "alle", "agli", "allo", "sono", "come", "non",
    "più", "anche", "quale", "quali", "quando", "dove", "essere", "stato", "stata", "questo",
    "questa", "quello", "quella", "seguenti", "vero", "falso", "cosa", "suo", "sua", "loro",
];

/// Significant tokens of `text`, deduplicated.
pub fn significant_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= 3 || t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn normalise(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// How well one chunk matches one question. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ContextScore {
    pub verbatim: bool,
    pub overlap: usize,
}

/// The chunk chosen as context for a question.
#[derive(Debug, Clone, Copy)]
pub struct ContextMatch<'a> {
    pub chunk: &'a Chunk,
    pub score: ContextScore,
}

/// Pre-tokenised chunk text, built once per run and reused for every
/// question.
#[derive(Debug)]
pub struct ContextIndex<'a> {
    entries: Vec<IndexedChunk<'a>>,
}

#[derive(Debug)]
struct IndexedChunk<'a> {
    chunk: &'a Chunk,
    normalised: String,
    tokens: HashSet<String>,
}

impl<'a> ContextIndex<'a> {
    pub fn new(chunks: &'a [Chunk]) -> Self {
        let entries = chunks
            .iter()
            .map(|chunk| IndexedChunk {
                chunk,
                normalised: normalise(&chunk.text),
                tokens: significant_tokens(&chunk.text),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pick the best chunk for `question`.
    pub fn select(&self, question: &QuestionRecord) -> Result<ContextMatch<'a>, NoRelevantContext> {
        let stem = normalise(question.stem());
        let wanted = significant_tokens(&question.searchable_text());

        let mut best: Option<ContextMatch<'a>> = None;
        for entry in &self.entries {
            let score = ContextScore {
                verbatim: !stem.is_empty() && entry.normalised.contains(&stem),
                overlap: wanted.intersection(&entry.tokens).count(),
            };
            // Strict comparison keeps the earliest chunk on ties.
            if best.map_or(true, |b| score > b.score) {
                best = Some(ContextMatch {
                    chunk: entry.chunk,
                    score,
                });
            }
        }

        best.filter(|m| m.score.verbatim || m.score.overlap > 0)
            .ok_or(NoRelevantContext {
                chunks: self.entries.len(),
            })
    }
}

/// One-off selection without keeping an index around.
pub fn select_context<'a>(
    question: &QuestionRecord,
    chunks: &'a [Chunk],
) -> Result<ContextMatch<'a>, NoRelevantContext> {
    ContextIndex::new(chunks).select(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunk::chunk_text;
    use crate::question::Letter;

    fn question(stem: &str, options: [&str; 4]) -> QuestionRecord {
        QuestionRecord::new(stem, options.map(String::from), Letter::A).unwrap()
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, t)| Chunk {
                index,
                text: t.to_string(),
                offset: 0,
                page: None,
            })
            .collect()
    }

    #[test]
    fn tokens_drop_stopwords_and_short_words() {
        let t = significant_tokens("What is the capital of France? Article 5 of the 1948 law.");
        assert!(t.contains("capital"));
        assert!(t.contains("france"));
        assert!(t.contains("5"));
        assert!(t.contains("1948"));
        assert!(!t.contains("the"));
        assert!(!t.contains("of"));
        assert!(!t.contains("what"));
    }

    #[test]
    fn tokens_handle_accents() {
        let t = significant_tokens("Qual è la città più popolosa della Lombardia?");
        assert!(t.contains("città"));
        assert!(t.contains("lombardia"));
        assert!(!t.contains("della"));
        assert!(!t.contains("più"));
    }

    #[test]
    fn verbatim_stem_selects_its_chunk() {
        let c = chunks(&[
            "Rivers of Europe include the Danube and the Rhine.",
            "Which organ pumps blood through the body? The heart does.",
            "Mountains of Asia include Everest.",
        ]);
        let q = question(
            "Which organ pumps blood through the body?",
            ["Heart", "Liver", "Lung", "Kidney"],
        );
        let m = select_context(&q, &c).unwrap();
        assert_eq!(m.chunk.index, 1);
        assert!(m.score.verbatim);
    }

    #[test]
    fn verbatim_beats_higher_overlap() {
        let c = chunks(&[
            "Paris Berlin Madrid Rome capital France Germany Spain Italy",
            "Name the capital city. Some text.",
        ]);
        let q = question("Name the capital city.", ["Paris", "Berlin", "Madrid", "Rome"]);
        assert_eq!(select_context(&q, &c).unwrap().chunk.index, 1);
    }

    #[test]
    fn highest_overlap_wins() {
        let c = chunks(&[
            "Photosynthesis happens in plants.",
            "Photosynthesis converts sunlight into chemical energy inside chloroplasts.",
        ]);
        let q = question(
            "Where does photosynthesis convert sunlight?",
            ["Chloroplasts", "Mitochondria", "Nucleus", "Ribosomes"],
        );
        let m = select_context(&q, &c).unwrap();
        assert_eq!(m.chunk.index, 1);
        assert!(!m.score.verbatim);
        assert_eq!(m.score.overlap, 3);
    }

    #[test]
    fn ties_go_to_earliest_chunk() {
        let c = chunks(&["Volcano lava.", "Volcano ash.", "Volcano rock."]);
        let q = question("Volcano?", ["x1", "x2", "x3", "x4"]);
        let m = select_context(&q, &c).unwrap();
        assert_eq!(m.chunk.index, 0);
        assert_eq!(m.score.overlap, 1);
    }

    #[test]
    fn zero_overlap_is_no_relevant_context() {
        let c = chunks(&["Glaciers carve valleys.", "Tides follow the moon."]);
        let q = question(
            "Who wrote Hamlet?",
            ["Shakespeare", "Dante", "Goethe", "Cervantes"],
        );
        let err = select_context(&q, &c).unwrap_err();
        assert_eq!(err.chunks, 2);
    }

    #[test]
    fn no_chunks_is_no_relevant_context() {
        let q = question("Anything?", ["a1", "b2", "c3", "d4"]);
        assert_eq!(select_context(&q, &[]).unwrap_err().chunks, 0);
    }

    #[test]
    fn index_is_reusable_across_questions() {
        let c = chunk_text(
            "Paris is the capital of France.\n\nBerlin is the capital of Germany.",
            35,
        );
        let index = ContextIndex::new(&c);
        assert_eq!(index.len(), 2);
        let paris = question("Capital of France?", ["Paris", "Lyon", "Nice", "Lille"]);
        let berlin = question("Capital of Germany?", ["Berlin", "Bonn", "Köln", "Jena"]);
        assert_eq!(index.select(&paris).unwrap().chunk.index, 0);
        assert_eq!(index.select(&berlin).unwrap().chunk.index, 1);
    }
}
