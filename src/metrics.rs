use crate::consistency::consistency;
use std::collections::BTreeMap;
use std::time::Duration;

/// Characters per "word" in every speed figure.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Rounds a rate for display. Non-finite input (a zero-length interval) yields 0.
pub fn round_rate(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// Typed characters normalised to words per minute.
pub fn per_minute(chars: u32, elapsed_minutes: f64) -> u32 {
    if elapsed_minutes <= 0.0 {
        return 0;
    }
    round_rate(chars as f64 / CHARS_PER_WORD / elapsed_minutes)
}

pub fn accuracy(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 100;
    }
    round_rate(correct as f64 / total as f64 * 100.0)
}

fn minutes(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() / 60.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCounters {
    pub correct_chars: u32,
    pub total_chars: u32,
    pub current_word_errors: u32,
    pub total_errors: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondCounts {
    pub correct: u32,
    pub total: u32,
    pub errors: u32,
}

impl SecondCounts {
    fn is_empty(&self) -> bool {
        self.correct == 0 && self.total == 0 && self.errors == 0
    }
}

/// Character counts keyed by elapsed second. Absent seconds read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecondBuckets {
    seconds: BTreeMap<u64, SecondCounts>,
}

impl SecondBuckets {
    pub fn get(&self, second: u64) -> SecondCounts {
        self.seconds.get(&second).copied().unwrap_or_default()
    }

    /// Sums the inclusive range `[first, last]`.
    pub fn sum(&self, first: u64, last: u64) -> SecondCounts {
        self.seconds
            .range(first..=last)
            .fold(SecondCounts::default(), |acc, (_, c)| SecondCounts {
                correct: acc.correct + c.correct,
                total: acc.total + c.total,
                errors: acc.errors + c.errors,
            })
    }

    pub fn len(&self) -> usize {
        self.seconds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    fn update(&mut self, second: u64, f: impl FnOnce(&mut SecondCounts)) {
        let counts = self.seconds.entry(second).or_default();
        f(counts);
        // drop zeroed entries so an undone keystroke leaves no trace
        if counts.is_empty() {
            self.seconds.remove(&second);
        }
    }
}

/// Running counters, per-second buckets and error timestamps of one test.
///
/// Every mutation goes through the `record_*`/`undo_*` pairs so the
/// counters and the bucket of the same second always move together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub counters: RunningCounters,
    pub buckets: SecondBuckets,
    pub error_seconds: Vec<u64>,
}

impl Tally {
    pub fn record_correct(&mut self, second: u64) {
        self.counters.total_chars += 1;
        self.counters.correct_chars += 1;
        self.buckets.update(second, |c| {
            c.total += 1;
            c.correct += 1;
        });
    }

    pub fn record_error(&mut self, second: u64) {
        self.counters.total_chars += 1;
        self.counters.current_word_errors += 1;
        self.counters.total_errors += 1;
        self.buckets.update(second, |c| {
            c.total += 1;
            c.errors += 1;
        });
        self.error_seconds.push(second);
    }

    /// Takes back a correct character, charged against `second` rather than
    /// the second it was typed in.
    pub fn undo_correct(&mut self, second: u64) {
        self.undo_total(second);
        if self.counters.correct_chars > 0 {
            self.counters.correct_chars -= 1;
            self.buckets
                .update(second, |c| c.correct = c.correct.saturating_sub(1));
        }
    }

    pub fn undo_error(&mut self, second: u64) {
        self.undo_total(second);
        if self.counters.current_word_errors > 0 {
            self.counters.current_word_errors -= 1;
            self.counters.total_errors = self.counters.total_errors.saturating_sub(1);
            self.buckets
                .update(second, |c| c.errors = c.errors.saturating_sub(1));
            if self.error_seconds.last() == Some(&second) {
                self.error_seconds.pop();
            }
        }
    }

    fn undo_total(&mut self, second: u64) {
        if self.counters.total_chars > 0 {
            self.counters.total_chars -= 1;
            self.buckets
                .update(second, |c| c.total = c.total.saturating_sub(1));
        }
    }

    /// Starts error counting afresh for the next word.
    pub fn next_word(&mut self) {
        self.counters.current_word_errors = 0;
    }

    pub fn instant_wpm(&self, elapsed: Option<Duration>) -> u32 {
        elapsed
            .map(|e| per_minute(self.counters.correct_chars, minutes(e)))
            .unwrap_or(0)
    }

    pub fn instant_raw_wpm(&self, elapsed: Option<Duration>) -> u32 {
        elapsed
            .map(|e| per_minute(self.counters.total_chars, minutes(e)))
            .unwrap_or(0)
    }

    pub fn accuracy(&self) -> u32 {
        accuracy(self.counters.correct_chars, self.counters.total_chars)
    }
}

/// Result of a finished test, computed once at the end timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalStats {
    pub wpm: u32,
    pub raw_wpm: u32,
    pub accuracy: u32,
    pub burst_wpm: u32,
    pub total_errors: u32,
    pub consistency: u32,
    pub test_duration: u32,
}

impl FinalStats {
    /// `elapsed` is `None` when the test never started; the selected
    /// duration is used instead so the division stays defined.
    pub fn compute(
        tally: &Tally,
        elapsed: Option<Duration>,
        burst_wpm: u32,
        wpm_history: &[u32],
        test_duration: u32,
    ) -> Self {
        let elapsed_minutes = elapsed
            .map(minutes)
            .unwrap_or(test_duration as f64 / 60.0);
        let counters = &tally.counters;

        Self {
            wpm: per_minute(counters.correct_chars, elapsed_minutes),
            raw_wpm: per_minute(counters.total_chars, elapsed_minutes),
            accuracy: tally.accuracy(),
            burst_wpm,
            total_errors: counters.total_errors,
            consistency: consistency(wpm_history),
            test_duration,
        }
    }
}
