use crate::error::SourceError;
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

static LANG_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/lang");

/// How many words a backend is asked for on load.
pub const DEFAULT_FETCH_LIMIT: usize = 200;

/// Pool used whenever the backend cannot deliver.
pub const FALLBACK_WORDS: &[&str] = &[
    "саха", "дойду", "киһи", "сир", "ыал", "олох", "үлэ", "кыра", "улахан", "мир", "человек",
    "дом", "земля", "вода",
];

/// Where the word pool comes from.
pub trait WordBackend {
    fn fetch_words(&self, limit: usize) -> Result<Vec<String>, SourceError>;

    /// Shown in errors and logs.
    fn name(&self) -> String {
        String::from("word source")
    }
}

#[derive(Deserialize, Clone, Debug)]
struct WordList {
    #[allow(dead_code)]
    name: String,
    words: Vec<String>,
}

/// Word list compiled into the binary from `src/lang/<name>.json`.
#[derive(Debug, Clone)]
pub struct EmbeddedWords {
    name: String,
}

impl EmbeddedWords {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for EmbeddedWords {
    fn default() -> Self {
        Self::new("sakha")
    }
}

impl WordBackend for EmbeddedWords {
    fn fetch_words(&self, limit: usize) -> Result<Vec<String>, SourceError> {
        let file_name = format!("{}.json", self.name);
        let contents = LANG_DIR
            .get_file(&file_name)
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| SourceError::Unavailable(file_name.clone()))?;
        let list: WordList = serde_json::from_str(contents)?;
        Ok(list.words.into_iter().take(limit).collect())
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Word list on disk: either the JSON language format or one word per line.
#[derive(Debug, Clone)]
pub struct FileWords {
    path: PathBuf,
}

impl FileWords {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WordBackend for FileWords {
    fn fetch_words(&self, limit: usize) -> Result<Vec<String>, SourceError> {
        let contents = fs::read_to_string(&self.path)?;
        let words = if contents.trim_start().starts_with('{') {
            serde_json::from_str::<WordList>(&contents)?.words
        } else {
            contents.lines().map(str::to_string).collect()
        };
        Ok(words.into_iter().take(limit).collect())
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Backend-backed word pool that never fails: a failed or empty fetch is
/// replaced by [`FALLBACK_WORDS`].
pub struct TextSource {
    backend: Box<dyn WordBackend>,
    pool: Vec<String>,
    limit: usize,
}

impl std::fmt::Debug for TextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSource")
            .field("pool", &self.pool.len())
            .field("limit", &self.limit)
            .finish()
    }
}

fn fallback_pool() -> Vec<String> {
    FALLBACK_WORDS.iter().map(|w| w.to_string()).collect()
}

impl TextSource {
    pub fn new(backend: impl WordBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            pool: Vec::new(),
            limit: DEFAULT_FETCH_LIMIT,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.pool.is_empty()
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// Fetches the pool from the backend. Words are split on whitespace so
    /// every entry is a single typeable word.
    pub fn load(&mut self) -> &[String] {
        self.pool = match self.fetch() {
            Ok(words) => {
                debug!(count = words.len(), "loaded word pool");
                words
            }
            Err(e) => {
                warn!(error = %e, "failed to load words, using fallback pool");
                fallback_pool()
            }
        };
        &self.pool
    }

    fn fetch(&self) -> Result<Vec<String>, SourceError> {
        let words: Vec<String> = self
            .backend
            .fetch_words(self.limit)?
            .iter()
            .flat_map(|w| w.split_whitespace())
            .map(str::to_string)
            .collect();
        if words.is_empty() {
            return Err(SourceError::Empty(self.backend.name()));
        }
        Ok(words)
    }

    pub fn generate(&mut self, min_words: usize, max_words: usize) -> String {
        self.generate_with(&mut rand::thread_rng(), min_words, max_words)
    }

    /// Picks a word count uniformly in `[min_words, max_words]` (at least one)
    /// and samples that many words with replacement.
    pub fn generate_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        min_words: usize,
        max_words: usize,
    ) -> String {
        if self.pool.is_empty() {
            self.pool = fallback_pool();
        }
        let lo = min_words.min(max_words).max(1);
        let hi = max_words.max(min_words).max(lo);
        let count = rng.gen_range(lo..=hi);

        (0..count)
            .filter_map(|_| self.pool.choose(rng))
            .join(" ")
    }
}
