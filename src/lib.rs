//! # edgequake-pdf2quiz
//!
//! Turn PDF documents into multiple-choice quizzes with a local LLM.
//!
//! The text of a PDF is split into chunks, each chunk is sent to a model
//! served by a local [Ollama](https://ollama.com) instance, and the
//! questions it writes back are parsed and saved in the plain-text
//! [Aiken](https://docs.moodle.org/en/Aiken_format) format. A second pass
//! re-checks saved questions against the most relevant part of the source
//! text and approves or rewrites them.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Extract  per-page text via lopdf (spawn_blocking)
//!  ├─ 3. Chunk    ≤ chunk_size chars, split at paragraph/sentence breaks
//!  ├─ 4. Model    one sequential call per chunk, bounded retries
//!  ├─ 5. Parse    tolerant line-shape parser → QuestionRecord
//!  └─ 6. Output   Aiken file, flushed after every chunk
//!
//! Aiken file ─▶ context selection ─▶ model review ─▶ new Aiken file
//!                                  ╰─▶ feedback ────▶ GIFT file(s)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2quiz::{generate, QuizConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = QuizConfig::builder()
//!         .model("llama3.2")
//!         .questions_per_chunk(2)
//!         .build()?;
//!     let stats = generate("document.pdf", "questions.txt", &config).await?;
//!     eprintln!(
//!         "{} questions from {} chunks ({} failed)",
//!         stats.questions_written,
//!         stats.processed_chunks,
//!         stats.backend_failures.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2quiz` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2quiz = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod export;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod question;
pub mod review;
mod session;
pub mod translate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BackendConfig, Language, QuizConfig, QuizConfigBuilder, RetryPolicy, ReviewMode};
pub use error::{BackendError, ExtractionError, MalformedQuestion, MalformedReason, NoRelevantContext, QuizError};
pub use export::export_gift;
pub use generate::{generate, generate_sync, inspect};
pub use output::{
    DocumentInfo, GenerationStats, GiftStats, ReviewOutcome, TranslationStats, UnitFailure,
    ValidationStats,
};
pub use progress::{NoopProgressCallback, ProgressCallback, QuizProgressCallback};
pub use question::{Letter, QuestionRecord};
pub use review::validate;
pub use translate::translate;
