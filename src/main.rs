use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    cursor::MoveTo,
    style::{Print, Stylize},
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use itertools::Itertools;
use sakhatype::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore, TIME_OPTIONS},
    keymap::KeyBindings,
    logging::init_file_logging,
    persistence::{InlineSpawner, Persistence},
    results_db::ResultsDb,
    runtime::{
        spawn_terminal_reader, Clock, LoopEvent, Runner, Scheduler, SystemClock, ThreadScheduler,
    },
    text_source::{EmbeddedWords, FileWords, TextSource},
    FinalStats, TestState, TextLength, TypingEngine,
};
use std::{
    error::Error,
    io::{self, stdin, Write},
    path::PathBuf,
    sync::{mpsc, Arc},
    time::Duration,
};
use tracing::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const UPCOMING_WORDS: usize = 12;

/// timed typing test for Sakha and Russian words
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// test length in seconds (15, 30, 60 or 120)
    #[clap(short = 't', long, value_parser = parse_time)]
    time: Option<u32>,

    /// word list to draw from: a JSON word file or one word per line
    #[clap(short = 'w', long)]
    words_file: Option<PathBuf>,

    /// fewest words per generated text
    #[clap(long)]
    min_words: Option<usize>,

    /// most words per generated text
    #[clap(long)]
    max_words: Option<usize>,

    /// save results under this user name
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// write the merged settings back to the config file
    #[clap(long)]
    save_config: bool,
}

fn parse_time(s: &str) -> Result<u32, String> {
    let secs: u32 = s.parse().map_err(|e| format!("{e}"))?;
    if TIME_OPTIONS.contains(&secs) {
        Ok(secs)
    } else {
        Err(format!("expected one of {}", TIME_OPTIONS.iter().join(", ")))
    }
}

impl Cli {
    /// Flags given on the command line win over the stored config.
    fn apply(&self, config: &mut Config) {
        if let Some(secs) = self.time {
            config.selected_time = secs;
        }
        if let Some(path) = &self.words_file {
            config.words_file = Some(path.clone());
        }
        if let Some(n) = self.min_words {
            config.min_words = n;
        }
        if let Some(n) = self.max_words {
            config.max_words = n;
        }
        if let Some(user) = &self.user {
            config.username = Some(user.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(path) = AppDirs::log_path() {
        // logging is best effort; the test still runs without it
        let _ = init_file_logging(&path);
    }

    let store = FileConfigStore::new();
    let mut config = store.load();
    cli.apply(&mut config);
    if cli.save_config {
        store.save(&config)?;
        info!(path = %store.path().display(), "config saved");
    }

    let db = match ResultsDb::new() {
        Ok(db) => Some(Arc::new(db.with_username(config.username.clone()))),
        Err(e) => {
            warn!(error = %e, "results database unavailable");
            None
        }
    };

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(rx, POLL_INTERVAL);
    let mut engine = build_engine(
        &config,
        SystemClock,
        ThreadScheduler::new(tx.clone()),
        db.clone(),
    );
    spawn_terminal_reader(tx);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let outcome = run(&mut engine, &runner, &config.key_bindings, db.as_deref(), &mut stdout);

    disable_raw_mode()?;
    execute!(stdout, LeaveAlternateScreen)?;
    outcome?;

    if let Some(stats) = engine.final_stats() {
        let best = db.as_deref().and_then(best_wpm);
        print!("{}", summary(&stats, best).replace("\r\n", "\n"));
    }
    Ok(())
}

/// The local database insert is quick, so results are written inline and
/// are already stored when the summary asks for the best run.
fn build_engine(
    config: &Config,
    clock: impl Clock + 'static,
    scheduler: impl Scheduler + 'static,
    db: Option<Arc<ResultsDb>>,
) -> TypingEngine {
    let source = match &config.words_file {
        Some(path) => TextSource::new(FileWords::new(path)),
        None => TextSource::new(EmbeddedWords::default()),
    };
    let mut engine = TypingEngine::new(source, clock, scheduler)
        .with_duration(config.selected_time)
        .with_text_length(TextLength {
            min_words: config.min_words,
            max_words: config.max_words,
        });
    if let Some(db) = db {
        let authenticated = config.is_authenticated();
        engine = engine.with_persistence(Persistence::new(db, InlineSpawner, move || {
            authenticated
        }));
    }
    engine.init_test();
    engine
}

fn run(
    engine: &mut TypingEngine,
    runner: &Runner,
    bindings: &KeyBindings,
    db: Option<&ResultsDb>,
    out: &mut impl Write,
) -> io::Result<()> {
    draw(out, engine, db)?;
    loop {
        let Some(event) = runner.step() else {
            continue;
        };
        match event {
            LoopEvent::Tick(handle) => engine.on_timer(handle),
            LoopEvent::Resize => {}
            LoopEvent::Key(key) if key.kind == KeyEventKind::Press => {
                if handle_key(engine, key, bindings) == Flow::Quit {
                    return Ok(());
                }
            }
            LoopEvent::Key(_) => continue,
        }
        draw(out, engine, db)?;
    }
}

fn handle_key(engine: &mut TypingEngine, key: KeyEvent, bindings: &KeyBindings) -> Flow {
    match key.code {
        KeyCode::Esc => return Flow::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            return Flow::Quit
        }
        KeyCode::Tab => engine.init_test(),
        KeyCode::Backspace => {
            engine.backspace();
        }
        KeyCode::Char(' ') => {
            engine.start_timer();
            engine.commit_word();
        }
        KeyCode::Char(c) => {
            engine.start_timer();
            for ch in bindings.translate(c).chars() {
                engine.type_char(ch);
            }
        }
        _ => {}
    }
    Flow::Continue
}

fn best_wpm(db: &ResultsDb) -> Option<u32> {
    db.best_wpm().unwrap_or_else(|e| {
        warn!(error = %e, "could not read best result");
        None
    })
}

fn summary(stats: &FinalStats, best: Option<u32>) -> String {
    let mut text = format!(
        "wpm {}   raw {}   accuracy {}%\r\nburst {}   consistency {}%   errors {}   time {}s\r\n",
        stats.wpm,
        stats.raw_wpm,
        stats.accuracy,
        stats.burst_wpm,
        stats.consistency,
        stats.total_errors,
        stats.test_duration,
    );
    if let Some(best) = best {
        text.push_str(&format!("best saved wpm {best}\r\n"));
    }
    text
}

fn draw(out: &mut impl Write, engine: &TypingEngine, db: Option<&ResultsDb>) -> io::Result<()> {
    let snap = engine.snapshot();
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    if snap.state == TestState::Ended {
        if let Some(stats) = engine.final_stats() {
            queue!(out, Print(summary(&stats, db.and_then(best_wpm))))?;
        }
        queue!(out, Print("\r\ntab: new test   esc: quit\r\n"))?;
        return out.flush();
    }

    queue!(
        out,
        Print(format!(
            "{}s   {} wpm   {}%\r\n\r\n",
            snap.time_left_secs, snap.wpm, snap.accuracy
        ))
    )?;
    let upcoming = engine
        .words()
        .iter()
        .skip(snap.word_index)
        .take(UPCOMING_WORDS)
        .map(|w| w.text.as_str())
        .join(" ");
    queue!(out, Print(upcoming), Print("\r\n\r\n> "))?;

    let on_track = snap
        .current_word
        .as_deref()
        .is_some_and(|w| w.starts_with(snap.input_value.as_str()));
    if on_track {
        queue!(out, Print(snap.input_value.as_str().green()))?;
    } else {
        queue!(out, Print(snap.input_value.as_str().red()))?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakhatype::runtime::{ManualClock, ManualScheduler};
    use sakhatype::text_source::WordBackend;
    use sakhatype::error::SourceError;

    struct Fixed;

    impl WordBackend for Fixed {
        fn fetch_words(&self, _limit: usize) -> Result<Vec<String>, SourceError> {
            Ok(vec!["өрөс".to_string()])
        }
    }

    fn engine() -> TypingEngine {
        let mut engine = TypingEngine::new(TextSource::new(Fixed), ManualClock::new(), ManualScheduler::new())
            .with_text_length(TextLength {
                min_words: 2,
                max_words: 2,
            });
        engine.init_test();
        engine
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_cli_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["sakhatype"]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config, Config::default());
        assert!(!cli.save_config);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "sakhatype", "-t", "60", "-u", "sardaana", "--min-words", "5", "--max-words", "9",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.selected_time, 60);
        assert_eq!(config.username.as_deref(), Some("sardaana"));
        assert_eq!(config.min_words, 5);
        assert_eq!(config.max_words, 9);
        assert!(config.is_authenticated());
    }

    #[test]
    fn test_cli_rejects_unlisted_time() {
        assert!(Cli::try_parse_from(["sakhatype", "--time", "45"]).is_err());
        assert!(Cli::try_parse_from(["sakhatype", "--time", "abc"]).is_err());
        assert!(Cli::try_parse_from(["sakhatype", "--time", "120"]).is_ok());
    }

    #[test]
    fn test_first_key_starts_timer() {
        let mut engine = engine();
        let bindings = KeyBindings::default();
        assert_eq!(engine.state(), TestState::Ready);

        handle_key(&mut engine, press(KeyCode::Char('ө')), &bindings);
        assert_eq!(engine.state(), TestState::Running);
        assert_eq!(engine.input_value(), "ө");
    }

    #[test]
    fn test_bound_digit_types_sakha_letter() {
        let mut engine = engine();
        let bindings = KeyBindings::default();

        handle_key(&mut engine, press(KeyCode::Char('6')), &bindings);
        handle_key(&mut engine, press(KeyCode::Char('р')), &bindings);
        assert_eq!(engine.input_value(), "өр");

        handle_key(&mut engine, press(KeyCode::Backspace), &bindings);
        assert_eq!(engine.input_value(), "ө");
    }

    #[test]
    fn test_space_commits_and_tab_restarts() {
        let mut engine = engine();
        let bindings = KeyBindings::default();
        for c in "өрөс".chars() {
            handle_key(&mut engine, press(KeyCode::Char(c)), &bindings);
        }
        handle_key(&mut engine, press(KeyCode::Char(' ')), &bindings);
        assert_eq!(engine.word_index(), 1);

        handle_key(&mut engine, press(KeyCode::Tab), &bindings);
        assert_eq!(engine.state(), TestState::Ready);
        assert_eq!(engine.word_index(), 0);
    }

    #[test]
    fn test_quit_keys() {
        let mut engine = engine();
        let bindings = KeyBindings::default();
        assert_eq!(handle_key(&mut engine, press(KeyCode::Esc), &bindings), Flow::Quit);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(handle_key(&mut engine, ctrl_c, &bindings), Flow::Quit);
    }

    #[test]
    fn test_result_is_stored_before_summary() {
        let db = Arc::new(ResultsDb::open_in_memory().unwrap());
        let config = Config {
            username: Some("nurgun".into()),
            selected_time: 15,
            min_words: 3,
            max_words: 3,
            ..Config::default()
        };
        let clock = ManualClock::new();
        let mut engine = build_engine(&config, clock.clone(), ManualScheduler::new(), Some(Arc::clone(&db)));
        let bindings = KeyBindings::default();

        let word = engine.snapshot().current_word.unwrap();
        for c in word.chars() {
            handle_key(&mut engine, press(KeyCode::Char(c)), &bindings);
        }
        handle_key(&mut engine, press(KeyCode::Char(' ')), &bindings);
        clock.advance_secs(5);
        let stats = engine.end_test().unwrap();

        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(best_wpm(&db), Some(stats.wpm));
    }

    #[test]
    fn test_anonymous_run_is_not_stored() {
        let db = Arc::new(ResultsDb::open_in_memory().unwrap());
        let clock = ManualClock::new();
        let mut engine = build_engine(&Config::default(), clock.clone(), ManualScheduler::new(), Some(Arc::clone(&db)));
        engine.start_timer();
        clock.advance_secs(2);
        engine.end_test();
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_summary_lists_best() {
        let stats = FinalStats {
            wpm: 41,
            raw_wpm: 45,
            accuracy: 92,
            burst_wpm: 60,
            total_errors: 7,
            consistency: 71,
            test_duration: 30,
        };
        let text = summary(&stats, Some(55));
        assert!(text.starts_with("wpm 41"));
        assert!(text.contains("best saved wpm 55"));
        assert!(!summary(&stats, None).contains("best"));
    }

    #[test]
    fn test_draw_shows_upcoming_words() {
        let engine = engine();
        let mut buf = Vec::new();
        draw(&mut buf, &engine, None).unwrap();
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("өрөс өрөс"));
        assert!(text.contains("30s"));
    }
}
