//! Thread-safe diagnostic accumulator.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Collects diagnostics from any number of threads, in emission order.
///
/// Per-severity counters are atomics, so `has_errors` and `count` never take
/// the lock.
#[derive(Default)]
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    counts: [AtomicUsize; 3],
}

impl DiagnosticSink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Records one diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        self.counts[diag.severity.slot()].fetch_add(1, Ordering::Relaxed);
        self.list().push(diag);
    }

    /// Records every diagnostic of `diags`, in order.
    pub fn extend(&self, diags: impl IntoIterator<Item = Diagnostic>) {
        for diag in diags {
            self.emit(diag);
        }
    }

    /// Number of diagnostics emitted with exactly `severity`. Draining with
    /// [`take_all`](Self::take_all) does not reset the counts.
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.slot()].load(Ordering::Relaxed)
    }

    /// Number of errors emitted.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Returns `true` once any error was emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Highest severity emitted so far.
    pub fn worst(&self) -> Option<Severity> {
        [Severity::Error, Severity::Warning, Severity::Note]
            .into_iter()
            .find(|&s| self.count(s) > 0)
    }

    /// Removes and returns everything collected.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.list())
    }

    /// A copy of everything collected.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.list().clone()
    }
}
