//! Progress tracking and cancellation shared between an analysis and its caller

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Called with the new integer percentage (1..=100) whenever it advances
pub type ProgressListener = Arc<dyn Fn(u8) + Send + Sync>;

/// Progress tracking for long-running analyses
#[derive(Clone)]
pub struct AnalysisProgress {
    /// Completed trials
    completed: Arc<AtomicUsize>,
    /// Total trials
    total: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    /// Last percentage handed to the listener
    last_percent: Arc<AtomicUsize>,
    listener: Option<ProgressListener>,
}

impl AnalysisProgress {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            completed: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(total)),
            cancelled: Arc::new(AtomicBool::new(false)),
            last_percent: Arc::new(AtomicUsize::new(0)),
            listener: None,
        }
    }

    /// Create from existing atomics (for worker integration)
    pub fn from_atomics(
        completed: Arc<AtomicUsize>,
        total: Arc<AtomicUsize>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            completed,
            total,
            cancelled,
            last_percent: Arc::new(AtomicUsize::new(0)),
            listener: None,
        }
    }

    #[must_use]
    pub fn with_listener(mut self, listener: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Completion as an integer percentage. An empty analysis reports 0.
    #[must_use]
    pub fn percent(&self) -> u8 {
        percent_of(self.completed(), self.total())
    }

    pub fn increment(&self) {
        self.add(1);
    }

    /// Record `n` finished trials and notify the listener if the percentage moved
    pub fn add(&self, n: usize) {
        let done = self.completed.fetch_add(n, Ordering::Relaxed) + n;
        let Some(listener) = &self.listener else {
            return;
        };
        let pct = percent_of(done, self.total());
        let previous = self.last_percent.fetch_max(usize::from(pct), Ordering::Relaxed);
        if usize::from(pct) > previous {
            listener(pct);
        }
    }

    /// Start over with a new total
    pub fn reset(&self, total: usize) {
        self.completed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.last_percent.store(0, Ordering::Relaxed);
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (done.min(total) * 100 / total) as u8
}

impl Default for AnalysisProgress {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for AnalysisProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisProgress")
            .field("completed", &self.completed())
            .field("total", &self.total())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_listener_fires_only_when_percent_advances() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = AnalysisProgress::new(400).with_listener(move |p| {
            sink.lock().unwrap().push(p);
        });

        for _ in 0..400 {
            progress.increment();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.first(), Some(&1));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_shared_atomics_see_cancel() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let progress = AnalysisProgress::from_atomics(
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(10)),
            cancelled.clone(),
        );
        cancelled.store(true, Ordering::Relaxed);
        assert!(progress.is_cancelled());
    }

    #[test]
    fn test_percent_empty_and_reset() {
        let progress = AnalysisProgress::new(0);
        assert_eq!(progress.percent(), 0);
        progress.reset(4);
        progress.add(3);
        assert_eq!(progress.percent(), 75);
    }
}
