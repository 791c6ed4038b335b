use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Sakha letters that can be put on a key.
pub const SAKHA_LETTERS: &[&str] = &["ҥ", "ҕ", "ө", "һ", "ү", "дь", "нь"];

/// Digit row defaults: letters missing from a standard Russian layout.
pub const DEFAULT_BINDINGS: &[(&str, &str)] =
    &[("4", "ҥ"), ("5", "ҕ"), ("6", "ө"), ("7", "һ"), ("8", "ү")];

/// Key remapping for typing Sakha letters on a Russian keyboard.
///
/// Persisted as a plain key to letter object; on load, saved entries are
/// layered over the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct KeyBindings {
    map: BTreeMap<String, String>,
}

fn defaults() -> BTreeMap<String, String> {
    DEFAULT_BINDINGS
        .iter()
        .map(|(k, l)| (k.to_string(), l.to_string()))
        .collect()
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self { map: defaults() }
    }
}

impl From<BTreeMap<String, String>> for KeyBindings {
    fn from(saved: BTreeMap<String, String>) -> Self {
        let mut map = defaults();
        map.extend(saved);
        Self { map }
    }
}

impl From<KeyBindings> for BTreeMap<String, String> {
    fn from(bindings: KeyBindings) -> Self {
        bindings.map
    }
}

/// Numeric keys in numeric order, then everything else lexically.
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl KeyBindings {
    pub fn is_letter_used(&self, letter: &str, exclude_key: Option<&str>) -> bool {
        self.map
            .iter()
            .any(|(k, l)| l == letter && Some(k.as_str()) != exclude_key)
    }

    /// Binds `letter` to `key`. Refuses a letter already on another key
    /// unless `force` is set.
    pub fn set_binding(&mut self, key: &str, letter: &str, force: bool) -> bool {
        if !force && self.is_letter_used(letter, Some(key)) {
            return false;
        }
        self.map.insert(key.to_string(), letter.to_string());
        true
    }

    pub fn remove_binding(&mut self, key: &str) {
        self.map.remove(key);
    }

    pub fn reset_to_defaults(&mut self) {
        self.map = defaults();
    }

    pub fn letter_for_key(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn key_for_letter(&self, letter: &str) -> Option<&str> {
        self.map
            .iter()
            .find(|(_, l)| l.as_str() == letter)
            .map(|(k, _)| k.as_str())
    }

    pub fn has_binding(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// What a typed character becomes: the bound letter, or the character
    /// itself.
    pub fn translate(&self, ch: char) -> String {
        let mut buf = [0u8; 4];
        self.letter_for_key(ch.encode_utf8(&mut buf))
            .map(str::to_string)
            .unwrap_or_else(|| ch.to_string())
    }

    pub fn used_letters(&self) -> BTreeSet<&str> {
        self.map.values().map(String::as_str).collect()
    }

    pub fn available_letters(&self) -> Vec<&'static str> {
        let used = self.used_letters();
        SAKHA_LETTERS
            .iter()
            .copied()
            .filter(|l| !used.contains(l))
            .collect()
    }

    pub fn bindings(&self) -> Vec<(&str, &str)> {
        self.map
            .iter()
            .map(|(k, l)| (k.as_str(), l.as_str()))
            .sorted_by(|a, b| compare_keys(a.0, b.0))
            .collect()
    }

    pub fn is_modified(&self) -> bool {
        self.map != defaults()
    }
}
