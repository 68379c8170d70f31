use tokio::time::Duration;
use tokio::time::Instant;

/// Minimum stale-prefix length before the backing vector is compacted.
/// Compaction additionally requires the prefix to outweigh the live tail so
/// a burst followed by silence does not shuffle the vector on every call.
const COMPACT_MIN_STALE: usize = 100;

/// Sliding-window event counter exposing a hysteretic high-rate signal.
///
/// [`RateTracker::record`] appends a timestamp and lazily evicts entries
/// older than the window; [`RateTracker::is_high_rate`] reports the signal
/// as of the last `record`. The signal turns on only when the in-window
/// count exceeds `high_threshold` and turns off only when it drops below
/// the strictly lower `low_threshold`, so a rate hovering between the two
/// thresholds does not oscillate. Callers construct it with
/// `low_threshold < high_threshold`.
///
/// Pure and synchronous: no I/O, no suspension, time is always passed in.
#[derive(Debug)]
pub struct RateTracker {
    window: Duration,
    high_threshold: usize,
    low_threshold: usize,
    timestamps: Vec<Instant>,
    stale: usize,
    high_rate: bool,
}

impl RateTracker {
    pub fn new(window: Duration, high_threshold: usize, low_threshold: usize) -> Self {
        Self {
            window,
            high_threshold,
            low_threshold,
            timestamps: Vec::new(),
            stale: 0,
            high_rate: false,
        }
    }

    /// Record one event at `now` and re-evaluate the high-rate signal.
    pub fn record(&mut self, now: Instant) {
        if let Some(horizon) = now.checked_sub(self.window) {
            while self
                .timestamps
                .get(self.stale)
                .is_some_and(|ts| *ts < horizon)
            {
                self.stale += 1;
            }
        }
        if self.stale > COMPACT_MIN_STALE && self.stale > self.timestamps.len() / 2 {
            self.timestamps.drain(..self.stale);
            self.stale = 0;
        }
        self.timestamps.push(now);

        let current = self.current_rate();
        if self.high_rate {
            if current < self.low_threshold {
                self.high_rate = false;
            }
        } else if current > self.high_threshold {
            self.high_rate = true;
        }
    }

    /// High-rate signal as of the last [`RateTracker::record`] call.
    pub fn is_high_rate(&self) -> bool {
        self.high_rate
    }

    /// Number of events inside the trailing window as of the last record.
    pub fn current_rate(&self) -> usize {
        self.timestamps.len() - self.stale
    }

    /// Drop all recorded history and clear the signal.
    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.stale = 0;
        self.high_rate = false;
    }
}
