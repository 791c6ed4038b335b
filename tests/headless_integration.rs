use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use sakhatype::error::SourceError;
use sakhatype::runtime::{LoopEvent, ManualClock, ManualScheduler, Runner};
use sakhatype::text_source::{TextSource, WordBackend};
use sakhatype::{EngineEvent, InputOutcome, TestState, TextLength, TypingEngine};

struct Words(&'static [&'static str]);

impl WordBackend for Words {
    fn fetch_words(&self, _limit: usize) -> Result<Vec<String>, SourceError> {
        Ok(self.0.iter().map(|w| w.to_string()).collect())
    }
}

fn engine(words: &'static [&'static str], secs: u32) -> (TypingEngine, ManualClock, ManualScheduler) {
    let clock = ManualClock::new();
    let scheduler = ManualScheduler::new();
    let engine = TypingEngine::new(TextSource::new(Words(words)), clock.clone(), scheduler.clone())
        .with_duration(secs)
        .with_text_length(TextLength {
            min_words: 4,
            max_words: 4,
        });
    (engine, clock, scheduler)
}

// Drives the engine through the same Runner loop the binary uses, with ticks
// and keys fed from the test instead of threads.
#[test]
fn headless_timed_test_completes() {
    let (mut engine, clock, scheduler) = engine(&["кыыл"], 3);
    engine.init_test();
    let handle = engine.start_timer().unwrap();

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(rx, Duration::from_millis(5));

    for c in "кыыл ".chars() {
        tx.send(LoopEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)))
            .unwrap();
    }
    for _ in 0..3 {
        tx.send(LoopEvent::Tick(handle)).unwrap();
    }
    drop(tx);

    while let Some(event) = runner.step() {
        match event {
            LoopEvent::Tick(h) => {
                clock.advance_secs(1);
                engine.on_timer(h);
            }
            LoopEvent::Key(key) => {
                if let KeyCode::Char(' ') = key.code {
                    engine.commit_word();
                } else if let KeyCode::Char(c) = key.code {
                    engine.type_char(c);
                }
            }
            LoopEvent::Resize => {}
        }
    }

    assert_eq!(engine.state(), TestState::Ended);
    assert_eq!(scheduler.active(), 0);
    let stats = engine.final_stats().unwrap();
    // 4 typed + separator + 4 on commit, over 3 seconds
    assert_eq!(stats.wpm, 36);
    assert_eq!(stats.accuracy, 100);
    assert_eq!(stats.test_duration, 3);
}

#[test]
fn every_tick_window_feeds_consistency() {
    let (mut engine, clock, _scheduler) = engine(&["ат"], 10);
    engine.init_test();
    engine.start_timer();

    // same pace every second: one word of 2 letters
    for _ in 0..6 {
        engine.type_char('а');
        engine.type_char('т');
        engine.commit_word();
        clock.advance_secs(1);
        engine.tick();
    }
    let history = engine.history().wpm.clone();
    assert_eq!(history.len(), 6);
    // each tick lands in a second nobody has typed in yet, so a full
    // window holds two busy seconds out of three
    assert_eq!(history[0], 30);
    assert_eq!(&history[1..], &[40, 40, 40, 40, 40]);

    let stats = engine.end_test().unwrap();
    assert!(stats.consistency > 50);
    assert_eq!(stats.total_errors, 0);
}

#[test]
fn errors_and_corrections_settle_accuracy() {
    let (mut engine, clock, _scheduler) = engine(&["сир"], 30);
    engine.init_test();
    engine.start_timer();

    engine.type_char('с');
    engine.type_char('ы');
    assert_eq!(engine.counters().total_errors, 1);
    engine.backspace();
    assert_eq!(engine.counters().total_errors, 0);
    engine.type_char('и');
    engine.type_char('р');
    engine.commit_word();

    clock.advance_secs(6);
    let stats = engine.end_test().unwrap();
    assert_eq!(stats.accuracy, 100);
    assert_eq!(stats.total_errors, 0);
    assert!(engine.error_seconds().is_empty());
}

#[test]
fn wrong_word_is_marked_and_counted() {
    let (mut engine, clock, _scheduler) = engine(&["уот"], 30);
    engine.init_test();
    engine.start_timer();

    for c in "уок".chars() {
        engine.type_char(c);
    }
    let outcome = engine.commit_word();
    assert_eq!(
        outcome,
        InputOutcome::Committed {
            correct: 2,
            incorrect: 1
        }
    );
    clock.advance_secs(30);
    let stats = engine.end_test().unwrap();
    // one miss while typing, one on commit
    assert_eq!(stats.total_errors, 2);
    // 5 correct out of 7
    assert_eq!(stats.accuracy, 71);
}

#[test]
fn observer_collects_ticks_until_finish() {
    let (mut engine, clock, _scheduler) = engine(&["күн"], 3);
    let ticks = Rc::new(RefCell::new(Vec::new()));
    let finished = Rc::new(RefCell::new(None));
    {
        let ticks = Rc::clone(&ticks);
        let finished = Rc::clone(&finished);
        engine.subscribe(move |event| match event {
            EngineEvent::Ticked { time_left } => ticks.borrow_mut().push(*time_left),
            EngineEvent::Finished(stats) => *finished.borrow_mut() = Some(*stats),
            _ => {}
        });
    }

    engine.init_test();
    engine.start_timer();
    for _ in 0..5 {
        clock.advance_secs(1);
        engine.tick();
    }

    assert_eq!(*ticks.borrow(), vec![2, 1, 0]);
    assert_eq!(*finished.borrow(), engine.final_stats());
}
