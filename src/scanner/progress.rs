use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, warn};
use rayon::prelude::*;
use tokio::sync::broadcast;

/// Progress of one data source's pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub source: String,
    pub percentage: u8,
}

pub type ProgressSender = broadcast::Sender<ProgressEvent>;
pub type ProgressReceiver = broadcast::Receiver<ProgressEvent>;

/// Create the channel pipelines publish progress on
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    broadcast::channel(256)
}

/// Fire-and-forget progress publisher for one source
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    source: String,
    sender: Option<ProgressSender>,
}

impl ProgressReporter {
    pub fn new(source: impl Into<String>, sender: ProgressSender) -> Self {
        Self {
            source: source.into(),
            sender: Some(sender),
        }
    }

    /// A reporter that publishes nothing
    pub fn silent(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sender: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Publish `completed / total * 100`, truncated
    pub fn report(&self, completed: usize, total: usize) {
        let Some(sender) = &self.sender else {
            return;
        };
        let percentage = percentage(completed, total);
        // No receivers is not an error for a fire-and-forget signal
        let _ = sender.send(ProgressEvent {
            source: self.source.clone(),
            percentage,
        });
    }
}

fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (completed.min(total) * 100 / total) as u8
}

/// Runs work items in parallel and reports progress after each completion
#[derive(Debug)]
pub struct ProgressTracker {
    reporter: ProgressReporter,
    pool: Option<rayon::ThreadPool>,
}

impl ProgressTracker {
    /// Create a tracker; `threads` sizes a dedicated pool, `None` uses all cores but one
    pub fn new(reporter: ProgressReporter, threads: Option<usize>) -> Self {
        let threads = threads.unwrap_or_else(|| {
            let available = num_cpus::get();
            let used = std::cmp::max(1, available.saturating_sub(1));
            debug!("Using {} threads for parallel scanning (available: {})", used, available);
            used
        });

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Failed to build thread pool, using the global pool: {}", e);
                None
            }
        };

        Self { reporter, pool }
    }

    /// Map `operation` over `items` in parallel, keeping input order.
    ///
    /// Progress is published after every item under a lock, so the
    /// percentages a receiver sees for this source never decrease.
    pub fn track_parallel_progress<T, F, R>(&self, items: &[T], operation: F) -> Vec<R>
    where
        T: Sync,
        F: Fn(&T) -> R + Sync + Send,
        R: Send,
    {
        let total = items.len();
        let completed = Mutex::new(0usize);

        let run = || {
            items
                .par_iter()
                .map(|item| {
                    let result = operation(item);
                    let mut done = completed.lock().unwrap_or_else(|e| e.into_inner());
                    *done += 1;
                    self.reporter.report(*done, total);
                    result
                })
                .collect::<Vec<_>>()
        };

        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}

/// Draw one progress bar per source until every sender is gone
pub async fn draw_progress(mut receiver: ProgressReceiver, sources: Vec<String>) {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template("{prefix:>14} [{bar:40.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");

    let bars: HashMap<String, ProgressBar> = sources
        .into_iter()
        .map(|source| {
            let bar = multi.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(source.clone());
            (source, bar)
        })
        .collect();

    loop {
        match receiver.recv().await {
            Ok(event) => {
                if let Some(bar) = bars.get(&event.source) {
                    bar.set_position(u64::from(event.percentage));
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Progress display skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    for bar in bars.values() {
        bar.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_percentage_truncates() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 66);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(0, 0), 100);
    }

    #[test]
    fn test_tracker_preserves_order_and_reports_monotonically() {
        let (sender, mut receiver) = progress_channel();
        let tracker = ProgressTracker::new(ProgressReporter::new("local_folder", sender), Some(4));

        let items: Vec<usize> = (0..7).collect();
        let results = tracker.track_parallel_progress(&items, |n| n * 10);
        assert_eq!(results, vec![0, 10, 20, 30, 40, 50, 60]);

        let mut seen = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            assert_eq!(event.source, "local_folder");
            seen.push(event.percentage);
        }
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "not monotonic: {seen:?}");
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_silent_reporter_sends_nothing() {
        let tracker = ProgressTracker::new(ProgressReporter::silent("x"), Some(1));
        let results = tracker.track_parallel_progress(&["a", "b"], |s| s.len());
        assert_eq!(results, vec![1, 1]);
    }
}
