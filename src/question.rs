//! The structured multiple-choice question shared by every pipeline stage.

use crate::error::MalformedReason;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four option labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
}

impl Letter {
    /// All labels in Aiken order.
    pub const ALL: [Letter; 4] = [Letter::A, Letter::B, Letter::C, Letter::D];

    /// Parse a label, accepting either case.
    pub fn from_char(c: char) -> Option<Letter> {
        match c.to_ascii_uppercase() {
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Letter::A => 'A',
            Letter::B => 'B',
            Letter::C => 'C',
            Letter::D => 'D',
        }
    }

    /// 0-based position of the option this label names.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A multiple-choice question with exactly four options.
///
/// Construction goes through [`QuestionRecord::new`], so every value in the
/// program has a non-empty stem, four non-empty options and an answer that
/// names one of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    stem: String,
    options: [String; 4],
    answer: Letter,
}

impl QuestionRecord {
    /// Build a record, trimming whitespace and rejecting empty parts.
    pub fn new(
        stem: impl Into<String>,
        options: [String; 4],
        answer: Letter,
    ) -> Result<Self, MalformedReason> {
        let stem = stem.into().trim().to_string();
        if stem.is_empty() {
            return Err(MalformedReason::MissingStem);
        }
        let options = options.map(|o| o.trim().to_string());
        if let Some(letter) = Letter::ALL
            .into_iter()
            .find(|l| options[l.index()].is_empty())
        {
            return Err(MalformedReason::EmptyOption(letter));
        }
        Ok(Self {
            stem,
            options,
            answer,
        })
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn options(&self) -> &[String; 4] {
        &self.options
    }

    pub fn option(&self, letter: Letter) -> &str {
        &self.options[letter.index()]
    }

    pub fn answer(&self) -> Letter {
        self.answer
    }

    /// Same question with a different correct option.
    pub fn with_answer(mut self, answer: Letter) -> Self {
        self.answer = answer;
        self
    }

    /// Stem and options joined with spaces; the text scored for context.
    pub fn searchable_text(&self) -> String {
        let mut s = self.stem.clone();
        for o in &self.options {
            s.push(' ');
            s.push_str(o);
        }
        s
    }
}
