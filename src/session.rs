use std::time::Instant;

/// Lifecycle of a single timed test.
///
/// `Ready` is re-entered from `Ended` when a new test is initialised; `Idle`
/// is only ever the state of a freshly constructed engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TestState {
    Idle,
    Ready,
    Running,
    Ending,
    Ended,
}

#[derive(Debug, Clone)]
pub struct TestSession {
    pub state: TestState,
    pub selected_duration_secs: u32,
    pub time_left_secs: u32,
    pub started_at: Option<Instant>,
    pub ended_at: Option<Instant>,
}

impl TestSession {
    pub fn new(selected_duration_secs: u32) -> Self {
        Self {
            state: TestState::Idle,
            selected_duration_secs,
            time_left_secs: selected_duration_secs,
            started_at: None,
            ended_at: None,
        }
    }

    /// Clears timing for a fresh test while keeping the selected duration.
    pub fn reset(&mut self) {
        self.time_left_secs = self.selected_duration_secs;
        self.started_at = None;
        self.ended_at = None;
    }

    pub fn set_duration(&mut self, secs: u32) {
        self.selected_duration_secs = secs;
        self.time_left_secs = secs;
    }

    /// Counts one second off the clock, returning true once it has run out.
    pub fn count_down(&mut self) -> bool {
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        self.time_left_secs == 0
    }

    /// Whole seconds since start, used as the per-second bucket index.
    pub fn elapsed_second(&self, now: Instant) -> u64 {
        self.started_at
            .map(|start| now.saturating_duration_since(start).as_secs())
            .unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.state == TestState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_session_is_idle_with_full_clock() {
        let session = TestSession::new(30);
        assert_eq!(session.state, TestState::Idle);
        assert_eq!(session.time_left_secs, 30);
        assert!(session.started_at.is_none());
        assert!(!session.is_active());
    }

    #[test]
    fn test_count_down_stops_at_zero() {
        let mut session = TestSession::new(2);
        assert!(!session.count_down());
        assert!(session.count_down());
        assert!(session.count_down());
        assert_eq!(session.time_left_secs, 0);
    }

    #[test]
    fn test_elapsed_second_floors_partial_seconds() {
        let mut session = TestSession::new(15);
        let start = Instant::now();
        assert_eq!(session.elapsed_second(start), 0);

        session.started_at = Some(start);
        assert_eq!(session.elapsed_second(start + Duration::from_millis(1999)), 1);
        assert_eq!(session.elapsed_second(start + Duration::from_secs(7)), 7);
    }

    #[test]
    fn test_state_display_names() {
        assert_eq!(TestState::Ready.to_string(), "Ready");
        assert_eq!(TestState::Ended.to_string(), "Ended");
    }
}
