//! # Tags
//!
//! User-defined `$name` substitutions stored in the session record.

use crate::core::state::StateStore;

/// Named-string dictionary view over the session state.
pub struct TagTable<'a> {
    state: &'a mut StateStore,
}

impl<'a> TagTable<'a> {
    pub fn new(state: &'a mut StateStore) -> Self {
        Self { state }
    }

    pub fn names(&self) -> Vec<String> {
        self.state.get().tags.keys().cloned().collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.state.get().tags.contains_key(name)
    }

    /// The tag's value, or the bare name when no such tag exists.
    pub fn get(&self, name: &str) -> String {
        lookup(&self.state.get().tags, name)
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.state.update(|s| {
            s.tags.insert(name.to_string(), value.to_string());
        });
    }

    /// Returns false if the tag did not exist.
    pub fn delete(&mut self, name: &str) -> bool {
        if !self.has(name) {
            return false;
        }
        self.state.update(|s| {
            s.tags.remove(name);
        });
        true
    }
}

fn lookup(tags: &std::collections::BTreeMap<String, String>, name: &str) -> String {
    tags.get(name).cloned().unwrap_or_else(|| name.to_string())
}

/// Replace every space-delimited `$name` token with its tag value.
///
/// An unknown tag collapses to its bare name (`$foo` → `foo`). This mirrors
/// the lookup fallback of [`TagTable::get`] and is pending product review.
/// A lone `$` is left as-is. Runs of spaces are preserved; the result is trimmed.
pub fn substitute(input: &str, tags: &std::collections::BTreeMap<String, String>) -> String {
    input
        .split(' ')
        .map(|token| match token.strip_prefix('$') {
            Some(name) if !name.is_empty() => lookup(tags, name),
            _ => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
