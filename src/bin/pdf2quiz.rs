//! CLI binary for edgequake-pdf2quiz.
//!
//! A thin shim over the library crate that maps CLI flags to `QuizConfig`,
//! runs one pipeline and prints its summary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdf2quiz::pipeline::aiken::format_question;
use edgequake_pdf2quiz::{
    export_gift, generate, inspect, translate, validate, GiftStats, Language, ProgressCallback,
    QuestionRecord, QuizConfig, QuizProgressCallback, ReviewMode, TranslationStats,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a bar at the bottom plus one log line per unit.
struct CliProgressCallback {
    bar: ProgressBar,
    /// "chunks" or "questions".
    unit_name: &'static str,
    show_questions: bool,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new(unit_name: &'static str, show_questions: bool) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            unit_name,
            show_questions,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed(&self, unit: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&unit))
            .map_or(0, |t| t.elapsed().as_millis());
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl QuizProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_units: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_length(total_units as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Working");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_units} {}…", self.unit_name))
        ));
    }

    fn on_unit_start(&self, unit: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(unit, Instant::now());
        }
        self.bar.set_message(format!("#{unit}"));
    }

    fn on_unit_complete(&self, unit: usize, total: usize, questions: usize) {
        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {:<14}  {}",
            green("✓"),
            unit,
            total,
            dim(&format!("{questions} questions")),
            self.elapsed(unit),
        ));
        self.bar.inc(1);
    }

    fn on_unit_error(&self, unit: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {}  {}",
            red("✗"),
            unit,
            total,
            red(&msg),
            self.elapsed(unit),
        ));
        self.bar.inc(1);
    }

    fn on_questions(&self, _unit: usize, questions: &[QuestionRecord]) {
        if self.show_questions {
            for q in questions {
                self.bar.println(format_question(q));
            }
        }
    }

    fn on_run_complete(&self, total_units: usize, success_count: usize) {
        let failed = total_units.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} {} processed",
                green("✔"),
                bold(&success_count.to_string()),
                self.unit_name
            );
        } else {
            eprintln!(
                "{} {}/{} {} processed  ({} failed)",
                if failed == total_units { red("✘") } else { yellow("⚠") },
                bold(&success_count.to_string()),
                total_units,
                self.unit_name,
                red(&failed.to_string()),
            );
        }
    }
}

/// Echoes questions to stderr when the progress bar is off.
struct QuestionEcho;

impl QuizProgressCallback for QuestionEcho {
    fn on_questions(&self, unit: usize, questions: &[QuestionRecord]) {
        for q in questions {
            eprintln!("{}\n{}", dim(&format!("── #{unit}")), format_question(q));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Two questions per 8000-char chunk
  pdf2quiz generate document.pdf -o questions.txt

  # Italian questions from a downloaded PDF, smaller chunks
  pdf2quiz --language it generate https://example.org/law.pdf --chunk-size 4000

  # Check and improve generated questions against the source
  pdf2quiz validate document.pdf questions.txt -o questions_improved.txt

  # Correct only, without rewriting for style
  pdf2quiz validate --mode validate document.pdf questions.txt

  # Translate an Aiken file into Italian
  pdf2quiz --language it translate questions.txt -o domande.txt

  # Moodle GIFT with per-option feedback, 500 questions per file
  pdf2quiz gift document.pdf questions_improved.txt -o questions.gift

  # Page and chunk counts without calling the model
  pdf2quiz inspect document.pdf

SETUP:
  1. Install Ollama:   https://ollama.com
  2. Pull a model:     ollama pull llama3.2
  3. Start server:     ollama serve
  4. Generate:         pdf2quiz generate document.pdf

ENVIRONMENT VARIABLES:
  Every flag can be set as PDF2QUIZ_<FLAG>, e.g. PDF2QUIZ_MODEL=mistral.
  RUST_LOG overrides the log filter.
"#;

/// Generate and review multiple-choice quizzes from PDFs with a local LLM.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2quiz",
    version,
    about = "Generate multiple-choice quizzes (Aiken/GIFT) from PDFs with a local LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Model name as known to the server.
    #[arg(long, global = true, env = "PDF2QUIZ_MODEL", default_value = "llama3.2")]
    model: String,

    /// Model server root URL.
    #[arg(
        long,
        global = true,
        env = "PDF2QUIZ_BASE_URL",
        default_value = "http://localhost:11434"
    )]
    base_url: String,

    /// Per-call model timeout in seconds.
    #[arg(long, global = true, env = "PDF2QUIZ_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Retries per model call on transient failures.
    #[arg(long, global = true, env = "PDF2QUIZ_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Generation temperature (0.0–2.0).
    #[arg(long, global = true, env = "PDF2QUIZ_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Language of the questions: en, it, or any language name.
    #[arg(long, global = true, env = "PDF2QUIZ_LANGUAGE", default_value = "en")]
    language: String,

    /// Maximum characters per chunk.
    #[arg(long, global = true, env = "PDF2QUIZ_CHUNK_SIZE", default_value_t = 8000)]
    chunk_size: usize,

    /// Chunks shorter than this are skipped during generation.
    #[arg(long, global = true, env = "PDF2QUIZ_MIN_CHUNK_CHARS", default_value_t = 0)]
    min_chunk_chars: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, global = true, env = "PDF2QUIZ_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "PDF2QUIZ_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Skip the model-server check before the first call.
    #[arg(long, global = true, env = "PDF2QUIZ_NO_HEALTH_CHECK")]
    no_health_check: bool,

    /// Print each question as it is produced.
    #[arg(short, long, global = true, env = "PDF2QUIZ_SHOW_QUESTIONS")]
    show_questions: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long, global = true, env = "PDF2QUIZ_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF2QUIZ_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2QUIZ_DEBUG")]
    debug: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2QUIZ_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate questions from a PDF into an Aiken file.
    Generate {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Aiken output file.
        #[arg(short, long, env = "PDF2QUIZ_OUTPUT", default_value = "questions.txt")]
        output: PathBuf,

        /// Questions requested per chunk (1–20).
        #[arg(short = 'n', long, env = "PDF2QUIZ_COUNT", default_value_t = 2)]
        count: usize,
    },

    /// Check (and optionally improve) an Aiken file against its source PDF.
    Validate {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Existing Aiken questions file; never modified.
        questions: PathBuf,

        /// Aiken output file.
        #[arg(short, long, env = "PDF2QUIZ_OUTPUT", default_value = "questions_improved.txt")]
        output: PathBuf,

        /// validate: correct wrong questions only; improve: also rewrite for clarity.
        #[arg(long, env = "PDF2QUIZ_MODE", value_enum, default_value = "improve")]
        mode: ModeArg,
    },

    /// Translate an Aiken file into --language.
    Translate {
        /// Existing Aiken questions file; never modified.
        questions: PathBuf,

        /// Aiken output file.
        #[arg(
            short,
            long,
            env = "PDF2QUIZ_OUTPUT",
            default_value = "questions_translated.txt"
        )]
        output: PathBuf,
    },

    /// Convert an Aiken file to GIFT with per-option feedback.
    Gift {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,

        /// Existing Aiken questions file.
        questions: PathBuf,

        /// GIFT output file; suffixed _1, _2, … when split.
        #[arg(short, long, env = "PDF2QUIZ_OUTPUT", default_value = "questions.gift")]
        output: PathBuf,

        /// Questions per GIFT file.
        #[arg(long, env = "PDF2QUIZ_BATCH_SIZE", default_value_t = 500)]
        batch_size: usize,
    },

    /// Print page, text and chunk counts without calling the model.
    Inspect {
        /// Local PDF file path or HTTP/HTTPS URL.
        input: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Validate,
    Improve,
}

impl From<ModeArg> for ReviewMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Validate => ReviewMode::Validate,
            ModeArg::Improve => ReviewMode::Improve,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would fight with the progress bar; it reports per-unit
    // results itself.
    let is_inspect = matches!(cli.command, Command::Inspect { .. });
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !is_inspect;
    let filter = if cli.debug {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let unit_name = match cli.command {
        Command::Generate { .. } => "chunks",
        _ => "questions",
    };
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new(unit_name, cli.show_questions) as Arc<dyn QuizProgressCallback>)
    } else if cli.show_questions && !cli.quiet {
        Some(Arc::new(QuestionEcho))
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    match &cli.command {
        Command::Generate { input, output, .. } => {
            let stats = generate(input, output, &config)
                .await
                .context("Question generation failed")?;
            if cli.json {
                print_json(&stats)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} questions from {}/{} chunks  {}ms  →  {}",
                    status_mark(stats.backend_failures.is_empty() && stats.malformed.is_empty()),
                    stats.questions_written,
                    stats.processed_chunks,
                    stats.total_chunks - stats.skipped_chunks,
                    stats.duration_ms,
                    bold(&output.display().to_string()),
                );
                eprintln!(
                    "   {} backend failures  /  {} malformed blocks  /  {} small chunks skipped  /  {} empty pages",
                    dim(&stats.backend_failures.len().to_string()),
                    dim(&stats.malformed.len().to_string()),
                    dim(&stats.skipped_chunks.to_string()),
                    dim(&stats.skipped_pages.to_string()),
                );
            }
        }
        Command::Validate {
            input,
            questions,
            output,
            ..
        } => {
            let stats = validate(input, questions, output, &config)
                .await
                .context("Question review failed")?;
            if cli.json {
                print_json(&stats)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} questions  {}ms  →  {}",
                    status_mark(stats.backend_failures.is_empty() && stats.unverified.is_empty()),
                    stats.questions_written,
                    stats.duration_ms,
                    bold(&output.display().to_string()),
                );
                eprintln!(
                    "   {} unchanged  /  {} replaced  /  {} unverified  /  {} failed  /  {} unparseable",
                    dim(&stats.unchanged.to_string()),
                    dim(&stats.replaced.to_string()),
                    dim(&stats.unverified.len().to_string()),
                    dim(&stats.backend_failures.len().to_string()),
                    dim(&stats.unparseable.to_string()),
                );
            }
        }
        Command::Translate { questions, output } => {
            let stats = translate(questions, output, &config)
                .await
                .context("Translation failed")?;
            if cli.json {
                print_json(&stats)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {}/{} translated into {}  {}ms  →  {}",
                    status_mark(stats.translated == stats.total_questions),
                    stats.translated,
                    stats.total_questions,
                    config.language.name(),
                    stats.duration_ms,
                    bold(&output.display().to_string()),
                );
                eprintln!("{}", translation_breakdown(&stats));
            }
        }
        Command::Gift {
            input, questions, output, ..
        } => {
            let stats = export_gift(input, questions, output, &config)
                .await
                .context("GIFT export failed")?;
            if cli.json {
                print_json(&stats)?;
            } else if !cli.quiet {
                eprintln!(
                    "{}  {} questions  ({} with fallback feedback)  {}ms",
                    status_mark(stats.fallback_feedback == 0),
                    stats.total_questions,
                    stats.fallback_feedback,
                    stats.duration_ms,
                );
                eprintln!("{}", gift_breakdown(&stats));
                for file in &stats.files {
                    eprintln!("   →  {}", bold(&file.display().to_string()));
                }
            }
        }
        Command::Inspect { input } => {
            let info = inspect(input, &config)
                .await
                .context("Failed to inspect PDF")?;
            if cli.json {
                print_json(&info)?;
            } else {
                println!("File:          {}", input);
                println!("Pages:         {}", info.total_pages);
                println!("Text pages:    {}", info.text_pages);
                if !info.skipped_pages.is_empty() {
                    println!("Empty pages:   {:?}", info.skipped_pages);
                }
                println!("Characters:    {}", info.chars);
                println!("Chunks:        {} (≤ {} chars)", info.chunks, info.chunk_size);
                if config.min_chunk_chars > 0 {
                    println!(
                        "Eligible:      {} (≥ {} chars)",
                        info.eligible_chunks, config.min_chunk_chars
                    );
                }
            }
        }
    }

    Ok(())
}

fn status_mark(clean: bool) -> String {
    if clean {
        green("✔")
    } else {
        yellow("⚠")
    }
}

fn translation_breakdown(stats: &TranslationStats) -> String {
    format!(
        "   {} failed  /  {} unparseable  /  {} malformed in input",
        dim(&stats.backend_failures.len().to_string()),
        dim(&stats.unparseable.to_string()),
        dim(&stats.malformed_input.to_string()),
    )
}

fn gift_breakdown(stats: &GiftStats) -> String {
    format!(
        "   {} unverified  /  {} failed  /  {} malformed in input",
        dim(&stats.unverified.len().to_string()),
        dim(&stats.backend_failures.len().to_string()),
        dim(&stats.malformed_input.to_string()),
    )
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise report")?
    );
    Ok(())
}

/// Map CLI args to `QuizConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<QuizConfig> {
    let mut builder = QuizConfig::builder()
        .model(&cli.model)
        .base_url(&cli.base_url)
        .request_timeout(Duration::from_secs(cli.timeout))
        .max_retries(cli.max_retries)
        .temperature(cli.temperature)
        .language(Language::parse(&cli.language))
        .chunk_size(cli.chunk_size)
        .min_chunk_chars(cli.min_chunk_chars)
        .download_timeout_secs(cli.download_timeout)
        .check_backend(!cli.no_health_check);

    match &cli.command {
        Command::Generate { count, .. } => builder = builder.questions_per_chunk(*count),
        Command::Validate { mode, .. } => builder = builder.review_mode((*mode).into()),
        Command::Gift { batch_size, .. } => builder = builder.gift_batch_size(*batch_size),
        Command::Translate { .. } | Command::Inspect { .. } => {}
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_pdf2quiz::{BackendError, UnitFailure};

    fn timeout(unit: usize) -> UnitFailure {
        UnitFailure {
            unit,
            error: BackendError::Timeout { elapsed_ms: 120_000 },
        }
    }

    #[test]
    fn translation_summary_counts_failures() {
        let stats = TranslationStats {
            backend_failures: vec![timeout(2), timeout(5)],
            unparseable: 1,
            ..Default::default()
        };
        let line = translation_breakdown(&stats);
        assert!(line.contains(&format!("{} failed", dim("2"))), "{line}");
        assert!(line.contains(&format!("{} unparseable", dim("1"))), "{line}");
    }

    #[test]
    fn gift_summary_counts_unverified_and_failures() {
        let stats = GiftStats {
            unverified: vec![1, 3, 4],
            backend_failures: vec![timeout(2)],
            ..Default::default()
        };
        let line = gift_breakdown(&stats);
        assert!(line.contains(&format!("{} unverified", dim("3"))), "{line}");
        assert!(line.contains(&format!("{} failed", dim("1"))), "{line}");
    }
}
