//! Progress-callback trait for per-unit pipeline events.
//!
//! A *unit* is one model call: a chunk during generation, a question during
//! review, translation or GIFT export. Inject an
//! [`Arc<dyn QuizProgressCallback>`] via
//! [`crate::config::QuizConfigBuilder::progress_callback`] to receive events
//! as the pipeline works through them in document order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2quiz::{QuizConfig, QuizProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl QuizProgressCallback for CountingCallback {
//!     fn on_unit_complete(&self, unit: usize, total: usize, questions: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Unit {}/{} done ({} questions)", unit, total, questions);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = QuizConfig::builder()
//!     .progress_callback(counter as Arc<dyn QuizProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::question::QuestionRecord;
use std::sync::Arc;

/// Called by the pipelines as they process each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Units are processed one at a time, but the trait is
/// `Send + Sync` so a callback can be shared with other tasks.
pub trait QuizProgressCallback: Send + Sync {
    /// Called once before the first unit.
    ///
    /// # Arguments
    /// * `total_units`: number of units that will be processed
    fn on_run_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called just before the model request for a unit is sent.
    fn on_unit_start(&self, unit: usize, total_units: usize) {
        let _ = (unit, total_units);
    }

    /// Called when a unit succeeds.
    ///
    /// # Arguments
    /// * `unit`: 1-indexed unit number
    /// * `total`: total units
    /// * `questions`: questions written for this unit
    fn on_unit_complete(&self, unit: usize, total_units: usize, questions: usize) {
        let _ = (unit, total_units, questions);
    }

    /// Called when a unit fails after all retries, or is skipped.
    fn on_unit_error(&self, unit: usize, total_units: usize, error: &str) {
        let _ = (unit, total_units, error);
    }

    /// Called with the questions a unit produced, before they are written.
    fn on_questions(&self, unit: usize, questions: &[QuestionRecord]) {
        let _ = (unit, questions);
    }

    /// Called once after all units have been attempted.
    ///
    /// # Arguments
    /// * `total_units`: units attempted
    /// * `success_count`: units that completed without error
    fn on_run_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl QuizProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::QuizConfig`].
pub type ProgressCallback = Arc<dyn QuizProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::Letter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        questions: AtomicUsize,
        completed_total: AtomicUsize,
    }

    impl QuizProgressCallback for TrackingCallback {
        fn on_unit_start(&self, _unit: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _unit: usize, _total: usize, _questions: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _unit: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_questions(&self, _unit: usize, questions: &[QuestionRecord]) {
            self.questions.fetch_add(questions.len(), Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, success_count: usize) {
            self.completed_total.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5);
        cb.on_unit_start(1, 5);
        cb.on_unit_complete(1, 5, 2);
        cb.on_unit_error(2, 5, "timeout");
        cb.on_questions(1, &[]);
        cb.on_run_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        let q = QuestionRecord::new(
            "Q?",
            ["a".into(), "b".into(), "c".into(), "d".into()],
            Letter::A,
        )
        .unwrap();

        tracker.on_unit_start(1, 2);
        tracker.on_questions(1, &[q.clone(), q]);
        tracker.on_unit_complete(1, 2, 2);
        tracker.on_unit_start(2, 2);
        tracker.on_unit_error(2, 2, "model call timed out");
        tracker.on_run_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.questions.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completed_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn QuizProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_unit_complete(1, 10, 0);
    }
}
