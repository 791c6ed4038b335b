use crate::input::{IgnoreReason, InputOutcome, InputProcessor, WordSlot, WORD_SEPARATOR};
use crate::metrics::{FinalStats, RunningCounters};
use crate::persistence::{Persistence, TestResult};
use crate::runtime::{Clock, Scheduler, TimerHandle, TICK_PERIOD};
use crate::session::{TestSession, TestState};
use crate::text_source::TextSource;
use crate::time_series::{HistorySeries, TickSample};
use crate::window::{record_tick, BurstTracker};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// Notifications delivered to subscribers after each mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    StateChanged(TestState),
    InputApplied(InputOutcome),
    Ticked { time_left: u32 },
    Finished(FinalStats),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&EngineEvent)>;

/// Point-in-time view of the engine for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub state: TestState,
    pub selected_duration_secs: u32,
    pub time_left_secs: u32,
    pub wpm: u32,
    pub raw_wpm: u32,
    pub accuracy: u32,
    pub burst_wpm: u32,
    pub counters: RunningCounters,
    pub word_index: usize,
    pub current_word: Option<String>,
    pub input_value: String,
    pub samples: usize,
    pub last_sample: Option<TickSample>,
}

/// Word count bounds for each generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLength {
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for TextLength {
    fn default() -> Self {
        Self {
            min_words: 80,
            max_words: 100,
        }
    }
}

/// Owns one timed typing test from text generation to the final result.
///
/// Ticks and input are delivered by the caller's event loop, one at a time.
/// The `ending` latch is set before anything else in [`TypingEngine::end_test`]
/// so input or ticks that arrive during finalization are dropped.
pub struct TypingEngine {
    session: TestSession,
    source: TextSource,
    text_length: TextLength,
    input: Option<InputProcessor>,
    history: HistorySeries,
    burst: BurstTracker,
    ending: bool,
    final_stats: Option<FinalStats>,
    timer: Option<TimerHandle>,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn Scheduler>,
    persistence: Option<Persistence>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl fmt::Debug for TypingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingEngine")
            .field("session", &self.session)
            .field("ending", &self.ending)
            .field("timer", &self.timer)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl TypingEngine {
    pub fn new(
        source: TextSource,
        clock: impl Clock + 'static,
        scheduler: impl Scheduler + 'static,
    ) -> Self {
        Self {
            session: TestSession::new(30),
            source,
            text_length: TextLength::default(),
            input: None,
            history: HistorySeries::default(),
            burst: BurstTracker::default(),
            ending: false,
            final_stats: None,
            timer: None,
            clock: Box::new(clock),
            scheduler: Box::new(scheduler),
            persistence: None,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn with_persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_text_length(mut self, text_length: TextLength) -> Self {
        self.text_length = text_length;
        self
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.session.set_duration(secs);
        self
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&EngineEvent) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: EngineEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(&event);
        }
    }

    fn transition(&mut self, state: TestState) {
        if self.session.state != state {
            debug!(from = %self.session.state, to = %state, "test state changed");
            self.session.state = state;
            self.emit(EngineEvent::StateChanged(state));
        }
    }

    /// Changes the test length. Ignored while a test is running.
    pub fn set_time(&mut self, secs: u32) {
        if matches!(self.session.state, TestState::Running | TestState::Ending) || secs == 0 {
            return;
        }
        self.session.set_duration(secs);
    }

    /// Prepares a fresh test: stops any running timer, loads the word pool
    /// on first use and resets every counter and series.
    pub fn init_test(&mut self) {
        self.cancel_timer();
        self.ending = false;
        self.final_stats = None;

        if !self.source.is_loaded() {
            self.source.load();
        }
        let text = self
            .source
            .generate(self.text_length.min_words, self.text_length.max_words);

        self.input = Some(InputProcessor::new(&text));
        self.history = HistorySeries::default();
        self.burst = BurstTracker::default();
        self.session.reset();
        self.transition(TestState::Ready);
    }

    /// Starts the clock. Only a `Ready` test can start; any other call is a
    /// no-op returning `None`.
    pub fn start_timer(&mut self) -> Option<TimerHandle> {
        if self.session.state != TestState::Ready {
            return None;
        }
        let now = self.clock.now();
        self.session.started_at = Some(now);
        if let Some(input) = self.input.as_mut() {
            input.start_word_clock(now);
        }
        self.history = HistorySeries::default();

        let handle = self.scheduler.every(TICK_PERIOD);
        self.timer = Some(handle);
        debug!(?handle, duration = self.session.selected_duration_secs, "test timer started");
        self.transition(TestState::Running);
        Some(handle)
    }

    /// Takes back a handle from [`TypingEngine::start_timer`]. Stopping the
    /// running test's own timer ends the test; any other handle is only
    /// cancelled.
    pub fn stop_timer(&mut self, handle: TimerHandle) -> Option<FinalStats> {
        if self.timer != Some(handle) {
            self.scheduler.cancel(handle);
            return None;
        }
        self.end_test()
    }

    fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.scheduler.cancel(handle);
        }
    }

    /// Delivers a timer firing. Ticks from a timer that is no longer the
    /// engine's own are dropped.
    pub fn on_timer(&mut self, handle: TimerHandle) {
        if self.timer == Some(handle) {
            self.tick();
        }
    }

    /// One second of the test clock.
    pub fn tick(&mut self) {
        if self.ending || self.session.state != TestState::Running {
            self.cancel_timer();
            return;
        }
        let elapsed = self.session.elapsed_second(self.clock.now());
        if let Some(input) = self.input.as_ref() {
            record_tick(
                &input.tally().buckets,
                &mut self.history,
                &mut self.burst,
                elapsed,
            );
        }

        let out_of_time = self.session.count_down();
        let time_left = self.session.time_left_secs;
        self.emit(EngineEvent::Ticked { time_left });
        if out_of_time {
            self.end_test();
        }
    }

    /// Finalizes the test. Only the first call does anything; it returns the
    /// frozen result.
    pub fn end_test(&mut self) -> Option<FinalStats> {
        if self.ending || matches!(self.session.state, TestState::Idle | TestState::Ended) {
            return None;
        }
        self.ending = true;
        let ended_at = self.clock.now();
        self.session.ended_at = Some(ended_at);
        self.transition(TestState::Ending);

        self.cancel_timer();
        self.history.freeze();

        let input = self.input.as_mut()?;
        input.mark_partial_word();
        let elapsed = self
            .session
            .started_at
            .map(|start| ended_at.saturating_duration_since(start));
        let stats = FinalStats::compute(
            input.tally(),
            elapsed,
            self.burst.best(),
            &self.history.wpm,
            self.session.selected_duration_secs,
        );
        self.final_stats = Some(stats);
        info!(
            wpm = stats.wpm,
            raw_wpm = stats.raw_wpm,
            accuracy = stats.accuracy,
            consistency = stats.consistency,
            "test finished"
        );

        if let Some(persistence) = self.persistence.as_ref() {
            if self.session.started_at.is_some() {
                let result = TestResult::from_stats(&stats, self.session.selected_duration_secs);
                persistence.dispatch(result);
            }
        }

        self.transition(TestState::Ended);
        self.emit(EngineEvent::Finished(stats));
        Some(stats)
    }

    /// Applies the new value of the current-word field.
    pub fn process_input(&mut self, next: &str) -> InputOutcome {
        if self.session.state == TestState::Ended {
            return InputOutcome::Ignored(IgnoreReason::Finished);
        }
        if self.ending {
            return InputOutcome::Ignored(IgnoreReason::Ending);
        }
        let now = self.clock.now();
        let second = self.session.elapsed_second(now);
        let Some(input) = self.input.as_mut() else {
            return InputOutcome::Ignored(IgnoreReason::NotReady);
        };

        let outcome = input.process(next, now, second, &mut self.burst);
        if input.passage().is_exhausted() {
            let text = self
                .source
                .generate(self.text_length.min_words, self.text_length.max_words);
            input.load_text(&text);
        }
        self.emit(EngineEvent::InputApplied(outcome));
        outcome
    }

    pub fn type_char(&mut self, ch: char) -> InputOutcome {
        let mut next = self.input_value().to_string();
        next.push(ch);
        self.process_input(&next)
    }

    pub fn backspace(&mut self) -> InputOutcome {
        let mut next = self.input_value().to_string();
        if next.pop().is_none() {
            return InputOutcome::Ignored(IgnoreReason::Unchanged);
        }
        self.process_input(&next)
    }

    pub fn commit_word(&mut self) -> InputOutcome {
        let mut next = self.input_value().to_string();
        next.push(WORD_SEPARATOR);
        self.process_input(&next)
    }

    fn elapsed(&self) -> Option<Duration> {
        self.session
            .started_at
            .map(|start| self.clock.now().saturating_duration_since(start))
    }

    pub fn instant_wpm(&self) -> u32 {
        self.input
            .as_ref()
            .map_or(0, |i| i.tally().instant_wpm(self.elapsed()))
    }

    pub fn instant_raw_wpm(&self) -> u32 {
        self.input
            .as_ref()
            .map_or(0, |i| i.tally().instant_raw_wpm(self.elapsed()))
    }

    pub fn instant_accuracy(&self) -> u32 {
        self.input.as_ref().map_or(100, |i| i.tally().accuracy())
    }

    /// Result frozen at the end of the last test.
    pub fn final_stats(&self) -> Option<FinalStats> {
        self.final_stats
    }

    pub fn state(&self) -> TestState {
        self.session.state
    }

    pub fn session(&self) -> &TestSession {
        &self.session
    }

    pub fn is_test_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_ending(&self) -> bool {
        self.ending
    }

    pub fn timer(&self) -> Option<TimerHandle> {
        self.timer
    }

    pub fn history(&self) -> &HistorySeries {
        &self.history
    }

    pub fn burst_wpm(&self) -> u32 {
        self.burst.best()
    }

    pub fn counters(&self) -> RunningCounters {
        self.input
            .as_ref()
            .map(|i| i.tally().counters)
            .unwrap_or_default()
    }

    pub fn error_seconds(&self) -> &[u64] {
        self.input
            .as_ref()
            .map(|i| i.tally().error_seconds.as_slice())
            .unwrap_or_default()
    }

    pub fn input(&self) -> Option<&InputProcessor> {
        self.input.as_ref()
    }

    pub fn words(&self) -> &[WordSlot] {
        self.input
            .as_ref()
            .map(|i| i.passage().words())
            .unwrap_or_default()
    }

    pub fn word_index(&self) -> usize {
        self.input.as_ref().map_or(0, |i| i.passage().cursor())
    }

    pub fn input_value(&self) -> &str {
        self.input.as_ref().map_or("", |i| i.value())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            state: self.session.state,
            selected_duration_secs: self.session.selected_duration_secs,
            time_left_secs: self.session.time_left_secs,
            wpm: self.instant_wpm(),
            raw_wpm: self.instant_raw_wpm(),
            accuracy: self.instant_accuracy(),
            burst_wpm: self.burst.best(),
            counters: self.counters(),
            word_index: self.word_index(),
            current_word: self
                .input
                .as_ref()
                .and_then(|i| i.passage().current())
                .map(|w| w.text.clone()),
            input_value: self.input_value().to_string(),
            samples: self.history.len(),
            last_sample: self.history.last(),
        }
    }
}
