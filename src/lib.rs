// Library surface for the binary and headless/integration tests.
pub mod app_dirs;
pub mod config;
pub mod consistency;
pub mod engine;
pub mod error;
pub mod input;
pub mod keymap;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod results_db;
pub mod runtime;
pub mod session;
pub mod text_source;
pub mod time_series;
pub mod window;

pub use engine::{EngineEvent, EngineSnapshot, SubscriptionId, TextLength, TypingEngine};
pub use input::{CharStatus, IgnoreReason, InputOutcome, WordSlot};
pub use metrics::{FinalStats, RunningCounters};
pub use session::TestState;
