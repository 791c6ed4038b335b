use crate::metrics::{round_rate, SecondBuckets, CHARS_PER_WORD};
use crate::time_series::HistorySeries;
use std::time::Duration;

/// Upper bound of the sliding window, in seconds.
pub const MAX_WINDOW_SECS: u64 = 3;

/// Rates over the trailing window ending at one elapsed second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSample {
    pub window_secs: u64,
    pub wpm: u32,
    pub raw_wpm: u32,
    pub errors: u32,
    pub active: bool,
}

fn window_rate(sum: u32, window_secs: u64) -> u32 {
    round_rate(sum as f64 / window_secs as f64 / CHARS_PER_WORD * 60.0)
}

/// Samples the window `[elapsed - w + 1, elapsed]` where `w` grows from one
/// second up to [`MAX_WINDOW_SECS`].
pub fn sample_window(buckets: &SecondBuckets, elapsed_secs: u64) -> WindowSample {
    let window_secs = MAX_WINDOW_SECS.min(elapsed_secs + 1);
    let sum = buckets.sum(elapsed_secs + 1 - window_secs, elapsed_secs);

    WindowSample {
        window_secs,
        wpm: window_rate(sum.correct, window_secs),
        raw_wpm: window_rate(sum.total, window_secs),
        errors: sum.errors,
        active: sum.correct > 0 || sum.total > 0,
    }
}

/// Highest speed seen so far, fed by both the tick window and single words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstTracker {
    best: u32,
}

impl BurstTracker {
    pub fn best(&self) -> u32 {
        self.best
    }

    /// Raises the record if `candidate` beats it.
    pub fn offer(&mut self, candidate: u32) -> bool {
        if candidate > self.best {
            self.best = candidate;
            true
        } else {
            false
        }
    }

    /// Speed of a single word typed over `took`. A zero interval has no
    /// defined speed and is skipped.
    pub fn offer_word(&mut self, word_chars: usize, took: Duration) -> bool {
        let minutes = took.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return false;
        }
        self.offer(round_rate(word_chars as f64 / CHARS_PER_WORD / minutes))
    }
}

/// Runs the per-tick window step: appends a sample when the window saw any
/// typing and lifts the burst record to the recent peak.
pub fn record_tick(
    buckets: &SecondBuckets,
    history: &mut HistorySeries,
    burst: &mut BurstTracker,
    elapsed_secs: u64,
) -> Option<WindowSample> {
    let sample = sample_window(buckets, elapsed_secs);
    if !sample.active {
        return None;
    }
    if !history.push_speed(sample.wpm, sample.raw_wpm, sample.errors) {
        return None;
    }
    let peak = history.recent_peak(sample.window_secs as usize);
    history.push_burst(peak);
    burst.offer(peak);
    Some(sample)
}
