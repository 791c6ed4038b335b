use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent};
use tracing::debug;

/// Period of the test timer.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Identifies one periodic timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Periodic scheduler. Firing is delivered by the owner's event loop, which
/// calls back into the engine; the scheduler itself never runs engine code.
pub trait Scheduler {
    fn every(&mut self, period: Duration) -> TimerHandle;
    fn cancel(&mut self, handle: TimerHandle);
    fn is_active(&self, handle: TimerHandle) -> bool;
}

#[derive(Debug, Default)]
struct ManualTimers {
    next_id: u64,
    active: HashSet<TimerHandle>,
    started: usize,
    cancelled: usize,
}

/// Scheduler for tests: records timers, never fires on its own.
#[derive(Clone, Debug, Default)]
pub struct ManualScheduler {
    timers: Rc<RefCell<ManualTimers>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> usize {
        self.timers.borrow().active.len()
    }

    pub fn started(&self) -> usize {
        self.timers.borrow().started
    }

    pub fn cancelled(&self) -> usize {
        self.timers.borrow().cancelled
    }
}

impl Scheduler for ManualScheduler {
    fn every(&mut self, _period: Duration) -> TimerHandle {
        let mut timers = self.timers.borrow_mut();
        timers.next_id += 1;
        let handle = TimerHandle(timers.next_id);
        timers.active.insert(handle);
        timers.started += 1;
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        let mut timers = self.timers.borrow_mut();
        if timers.active.remove(&handle) {
            timers.cancelled += 1;
        }
    }

    fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.borrow().active.contains(&handle)
    }
}

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum LoopEvent {
    Key(KeyEvent),
    Resize,
    Tick(TimerHandle),
}

/// Scheduler backed by one sleeper thread per timer, delivering
/// `LoopEvent::Tick` into the event loop's channel.
pub struct ThreadScheduler {
    tx: Sender<LoopEvent>,
    next_id: u64,
    stops: HashMap<TimerHandle, Arc<AtomicBool>>,
}

impl ThreadScheduler {
    pub fn new(tx: Sender<LoopEvent>) -> Self {
        Self {
            tx,
            next_id: 0,
            stops: HashMap::new(),
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn every(&mut self, period: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        let stop = Arc::new(AtomicBool::new(false));
        self.stops.insert(handle, Arc::clone(&stop));

        let tx = self.tx.clone();
        thread::spawn(move || loop {
            thread::sleep(period);
            if stop.load(Ordering::Acquire) || tx.send(LoopEvent::Tick(handle)).is_err() {
                break;
            }
        });
        debug!(?handle, ?period, "timer started");
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(stop) = self.stops.remove(&handle) {
            stop.store(true, Ordering::Release);
            debug!(?handle, "timer cancelled");
        }
    }

    fn is_active(&self, handle: TimerHandle) -> bool {
        self.stops.contains_key(&handle)
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        for stop in self.stops.values() {
            stop.store(true, Ordering::Release);
        }
    }
}

/// Forwards crossterm key and resize events into the loop channel until the
/// receiver goes away.
pub fn spawn_terminal_reader(tx: Sender<LoopEvent>) {
    thread::spawn(move || loop {
        let forwarded = match event::read() {
            Ok(CtEvent::Key(key)) => tx.send(LoopEvent::Key(key)),
            Ok(CtEvent::Resize(_, _)) => tx.send(LoopEvent::Resize),
            Ok(_) => Ok(()),
            Err(_) => break,
        };
        if forwarded.is_err() {
            break;
        }
    });
}

/// Runner that hands the event loop one event at a time
pub struct Runner {
    rx: Receiver<LoopEvent>,
    poll: Duration,
}

impl Runner {
    pub fn new(rx: Receiver<LoopEvent>, poll: Duration) -> Self {
        Self { rx, poll }
    }

    /// Blocks up to the poll interval. `None` means nothing arrived, or every
    /// sender is gone.
    pub fn step(&self) -> Option<LoopEvent> {
        match self.rx.recv_timeout(self.poll) {
            Ok(ev) => Some(ev),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
