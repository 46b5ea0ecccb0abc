use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Per-direction throughput tracker.
///
/// Each relay owns one and calls [`ThroughputMeter::observe`] every cycle.
/// Nothing happens until the logging interval has elapsed; then one line is
/// emitted with the record count, elapsed seconds, and records per second,
/// and the window restarts from zero.
pub struct ThroughputMeter {
    label: String,
    interval: Duration,
    window_start: Instant,
    count: u64,
}

impl ThroughputMeter {
    #[must_use]
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            window_start: Instant::now(),
            count: 0,
        }
    }

    /// Records counted so far in the current window.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Add processed records to the current window.
    pub fn add(&mut self, records: u64) {
        self.count += records;
    }

    /// Log one throughput line and reset the window if the interval has
    /// elapsed. A no-op otherwise, so calling every cycle is cheap.
    pub fn observe(&mut self, queue_depth: usize) {
        let elapsed = self.window_start.elapsed();
        if elapsed < self.interval {
            return;
        }

        let elapsed_secs = elapsed.as_secs_f64();
        let rate = self.count as f64 / elapsed_secs;
        info!(
            topic = %self.label,
            queue_depth,
            processed = self.count,
            elapsed_secs = %format_args!("{elapsed_secs:.2}"),
            msg_per_sec = %format_args!("{rate:.2}"),
            "Throughput"
        );

        self.window_start = Instant::now();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_observe_is_noop_within_interval() {
        let mut meter = ThroughputMeter::new("events", Duration::from_secs(60));
        meter.add(5);

        meter.observe(3);
        let first_window = meter.window_start;
        tokio::time::advance(Duration::from_secs(30)).await;
        meter.observe(3);

        assert_eq!(meter.count(), 5);
        assert_eq!(meter.window_start, first_window);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_resets_after_interval() {
        let mut meter = ThroughputMeter::new("events", Duration::from_secs(60));
        meter.add(120);

        tokio::time::advance(Duration::from_secs(61)).await;
        meter.observe(0);

        assert_eq!(meter.count(), 0);
        assert!(meter.window_start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_counts_accumulate_within_window() {
        let mut meter = ThroughputMeter::new("events", Duration::from_secs(60));

        meter.add(10);
        tokio::time::advance(Duration::from_secs(10)).await;
        meter.observe(0);
        meter.add(15);

        assert_eq!(meter.count(), 25);
    }
}
