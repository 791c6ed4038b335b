use crate::metrics::Tally;
use crate::window::BurstTracker;
use std::time::Instant;
use tracing::trace;

pub const WORD_SEPARATOR: char = ' ';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharStatus {
    Correct,
    Incorrect,
}

/// A target word and, once committed, the status of each typed position.
///
/// `char_statuses` can be longer than `text` when the typed word overran it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordSlot {
    pub text: String,
    pub char_statuses: Vec<CharStatus>,
}

impl WordSlot {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            char_statuses: Vec::new(),
        }
    }

    /// True once statuses are filled in: after a commit, or for the partly
    /// typed word when the test ends.
    pub fn has_statuses(&self) -> bool {
        !self.char_statuses.is_empty()
    }
}

/// Shape of the change between two successive input values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputDiff {
    Commit,
    Append { index: usize, ch: char },
    Remove { index: usize, ch: char },
    Unchanged,
    Unsupported,
}

/// Classifies `next` against `previous`. Only end-of-word appends and
/// deletions are understood; anything else (paste, mid-word edits) is
/// `Unsupported`.
pub fn classify(previous: &str, next: &str) -> InputDiff {
    if next.ends_with(WORD_SEPARATOR) {
        return InputDiff::Commit;
    }
    if previous == next {
        return InputDiff::Unchanged;
    }
    let prev_len = previous.chars().count();
    let next_len = next.chars().count();

    if next_len == prev_len + 1 && next.starts_with(previous) {
        if let Some(ch) = next.chars().last() {
            return InputDiff::Append { index: prev_len, ch };
        }
    }
    if prev_len == next_len + 1 && previous.starts_with(next) {
        if let Some(ch) = previous.chars().last() {
            return InputDiff::Remove { index: next_len, ch };
        }
    }
    InputDiff::Unsupported
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Finalization has begun.
    Ending,
    /// The test is over and has not been re-initialised.
    Finished,
    /// No text has been loaded yet.
    NotReady,
    Unchanged,
    UnsupportedShape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputOutcome {
    Appended { correct: bool },
    Removed { was_correct: bool },
    Committed { correct: u32, incorrect: u32 },
    Ignored(IgnoreReason),
}

/// The word list of the current text plus the cursor into it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Passage {
    words: Vec<WordSlot>,
    cursor: usize,
}

impl Passage {
    pub fn from_text(text: &str) -> Self {
        Self {
            words: text.split(WORD_SEPARATOR).map(WordSlot::new).collect(),
            cursor: 0,
        }
    }

    pub fn current(&self) -> Option<&WordSlot> {
        self.words.get(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn words(&self) -> &[WordSlot] {
        &self.words
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.words.len()
    }

    fn current_mut(&mut self) -> Option<&mut WordSlot> {
        self.words.get_mut(self.cursor)
    }
}

fn target_char(target: &str, index: usize) -> Option<char> {
    target.chars().nth(index)
}

/// Turns successive raw values of the "current word" field into character
/// events against the target word.
///
/// Side effects stay within the tally, the passage's word slots and the
/// burst record; tick history is never touched from here.
#[derive(Clone, Debug, Default)]
pub struct InputProcessor {
    value: String,
    passage: Passage,
    tally: Tally,
    word_started_at: Option<Instant>,
}

impl InputProcessor {
    pub fn new(text: &str) -> Self {
        Self {
            passage: Passage::from_text(text),
            ..Self::default()
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Word-level burst timing starts here (test start, then each commit).
    pub fn start_word_clock(&mut self, at: Instant) {
        self.word_started_at = Some(at);
    }

    /// Swaps in a fresh text once the current one has been typed through.
    /// Counters and buckets carry over.
    pub fn load_text(&mut self, text: &str) {
        self.passage = Passage::from_text(text);
    }

    pub fn process(
        &mut self,
        next: &str,
        now: Instant,
        second: u64,
        burst: &mut BurstTracker,
    ) -> InputOutcome {
        let Some(target) = self.passage.current().map(|w| w.text.clone()) else {
            return InputOutcome::Ignored(IgnoreReason::NotReady);
        };

        let outcome = match classify(&self.value, next) {
            InputDiff::Commit => return self.commit(&target, now, second, burst),
            InputDiff::Append { index, ch } => {
                let correct = target_char(&target, index) == Some(ch);
                if correct {
                    self.tally.record_correct(second);
                } else {
                    self.tally.record_error(second);
                }
                InputOutcome::Appended { correct }
            }
            InputDiff::Remove { index, ch } => {
                let was_correct = target_char(&target, index) == Some(ch);
                if was_correct {
                    self.tally.undo_correct(second);
                } else {
                    self.tally.undo_error(second);
                }
                InputOutcome::Removed { was_correct }
            }
            InputDiff::Unchanged => return InputOutcome::Ignored(IgnoreReason::Unchanged),
            InputDiff::Unsupported => {
                trace!(previous = %self.value, next, "ignoring unsupported input edit");
                return InputOutcome::Ignored(IgnoreReason::UnsupportedShape);
            }
        };
        self.value = next.to_string();
        outcome
    }

    fn commit(
        &mut self,
        target: &str,
        now: Instant,
        second: u64,
        burst: &mut BurstTracker,
    ) -> InputOutcome {
        let typed: Vec<char> = self.value.trim().chars().collect();
        let expected: Vec<char> = target.chars().collect();

        if let Some(started) = self.word_started_at {
            burst.offer_word(typed.len(), now.saturating_duration_since(started));
        }
        self.word_started_at = Some(now);

        // the separator is produced by the commit itself
        self.tally.record_correct(second);

        let mut statuses = Vec::with_capacity(typed.len().max(expected.len()));
        let (mut correct, mut incorrect) = (0, 0);
        for i in 0..typed.len().max(expected.len()) {
            if i < typed.len() && i < expected.len() && typed[i] == expected[i] {
                self.tally.record_correct(second);
                statuses.push(CharStatus::Correct);
                correct += 1;
            } else {
                self.tally.record_error(second);
                statuses.push(CharStatus::Incorrect);
                incorrect += 1;
            }
        }

        if let Some(slot) = self.passage.current_mut() {
            slot.char_statuses = statuses;
        }
        self.passage.cursor += 1;
        self.tally.next_word();
        self.value.clear();

        InputOutcome::Committed { correct, incorrect }
    }

    /// Marks the partly typed word for display at the end of a test without
    /// touching any counter.
    pub fn mark_partial_word(&mut self) {
        let typed: Vec<char> = self.value.chars().collect();
        if typed.is_empty() {
            return;
        }
        if let Some(slot) = self.passage.current_mut() {
            let expected: Vec<char> = slot.text.chars().collect();
            slot.char_statuses = typed
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if expected.get(i) == Some(c) {
                        CharStatus::Correct
                    } else {
                        CharStatus::Incorrect
                    }
                })
                .collect();
        }
    }
}
