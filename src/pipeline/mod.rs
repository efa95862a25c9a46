//! Pipeline stages for PDF-to-quiz generation and review.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own; the entry points in [`crate::generate`], [`crate::review`],
//! [`crate::translate`] and [`crate::export`] wire them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ llm ──▶ parse ──▶ aiken
//! (URL/path) (lopdf)   (≤ N chars) (HTTP) (records) (file)
//!
//! aiken file ──▶ parse ──▶ context ──▶ llm ──▶ parse ──▶ aiken | gift
//!                          (best chunk)
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local PDF
//! 2. [`extract`]: per-page text; runs in `spawn_blocking` because lopdf is
//!    synchronous
//! 3. [`chunk`]: split the text at paragraph/sentence boundaries
//! 4. [`llm`]: the only stage with network I/O; owns the retry policy
//! 5. [`parse`]: tolerant line-shape parser for model replies and Aiken files
//! 6. [`aiken`]: format and incrementally write Aiken files
//! 7. [`context`]: lexical-overlap selection of the chunk a question is about
//! 8. [`gift`]: GIFT formatting, feedback parsing, batched output

pub mod aiken;
pub mod chunk;
pub mod context;
pub mod extract;
pub mod gift;
pub mod input;
pub mod llm;
pub mod parse;
