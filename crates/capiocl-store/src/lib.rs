// SPDX-License-Identifier: Apache-2.0
//! The path registry: a mapping from path patterns to [`Entry`] records with
//! longest-prefix inheritance and glob-match resolution.
//!
//! Not thread-safe on its own — callers sharing a store across tasks/threads
//! must wrap it in their own synchronization (see `capiocl-engine`).

pub mod entry;
pub mod rule;

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

pub use entry::Entry;
pub use rule::{CommitRule, FireRule, InvalidRule};

/// The fixed entry handed back for the empty path: every setter/getter
/// treats `""` as a no-op (§8 boundary behaviors), with `is_firable` and
/// `is_permanent` both `true` rather than the ordinary default entry's
/// `false` — so it can't be produced by materializing a real entry and is
/// synthesized here instead, never inserted into the map.
fn empty_path_entry() -> &'static Entry {
    static EMPTY: OnceLock<Entry> = OnceLock::new();
    EMPTY.get_or_init(|| Entry {
        fire_rule: FireRule::NoUpdate,
        permanent: true,
        ..Entry::default()
    })
}

/// Owns the mapping from pattern to [`Entry`] and enforces the longest-prefix
/// inheritance invariant on auto-materialization.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: HashMap<String, Entry>,
    store_all_in_memory: bool,
}

impl EntryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff some stored pattern matches `path` (§4.2 `contains`). The
    /// empty path never has membership (§8 boundary behaviors), even though
    /// a stored `*` pattern would otherwise glob-match it.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        self.entries
            .keys()
            .any(|pattern| capiocl_matcher::matches(pattern, path))
    }

    /// Number of stored patterns.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of stored patterns, sorted for deterministic iteration.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Monotone flag: once set, every subsequently auto-created entry has
    /// `store_in_memory = true` (invariant I5). Retro-applies to existing entries.
    pub fn set_all_store_in_memory(&mut self) {
        self.store_all_in_memory = true;
        for entry in self.entries.values_mut() {
            entry.store_in_memory = true;
        }
    }

    /// Exact-match erasure only; no-op if `path` is not itself a stored key
    /// (materialized children are unaffected, per spec §8).
    pub fn remove(&mut self, path: &str) {
        self.entries.remove(path);
    }

    /// Idempotent materialization (§4.2 algorithm): returns the existing entry
    /// for `path`, or creates one by longest-prefix inheritance from the
    /// longest matching stored pattern (ties broken lexicographically), or a
    /// default entry if nothing matches. Updates the parent's auto-maintained
    /// `directory_children_count` when applicable.
    pub fn get_or_create(&mut self, path: &str) -> &Entry {
        if path.is_empty() {
            return empty_path_entry();
        }
        if !self.entries.contains_key(path) {
            let new_entry = match self.longest_match(path) {
                Some(donor_key) => {
                    let mut cloned = self.entries[&donor_key].clone();
                    if self.store_all_in_memory {
                        cloned.store_in_memory = true;
                    }
                    cloned
                }
                None => {
                    let mut fresh = Entry::default();
                    if self.store_all_in_memory {
                        fresh.store_in_memory = true;
                    }
                    fresh
                }
            };
            self.entries.insert(path.to_string(), new_entry);
            self.bump_parent_directory_count(path);
        }
        tracing::trace!(path, "materialized entry");
        &self.entries[path]
    }

    /// Picks the stored key with the longest glob match against `path`,
    /// breaking ties lexicographically (§9 — the tie-break the original
    /// leaves to unspecified hash-map iteration order).
    fn longest_match(&self, path: &str) -> Option<String> {
        let mut best: Option<&str> = None;
        for key in self.entries.keys() {
            if !capiocl_matcher::matches(key, path) {
                continue;
            }
            best = Some(match best {
                None => key,
                Some(current) => match key.len().cmp(&current.len()) {
                    std::cmp::Ordering::Greater => key,
                    std::cmp::Ordering::Less => current,
                    std::cmp::Ordering::Equal => {
                        if key < current {
                            key
                        } else {
                            current
                        }
                    }
                },
            });
        }
        best.map(str::to_string)
    }

    fn bump_parent_directory_count(&mut self, path: &str) {
        let Some(parent) = parent_of(path) else {
            return;
        };
        if let Some(parent_entry) = self.entries.get_mut(parent) {
            if parent_entry.auto_update_dir_count {
                parent_entry.directory_children_count += 1;
                parent_entry.is_file = false;
            }
        }
    }

    /// Materializes `path`, then overwrites the listed fields wholesale
    /// (§4.2 `add`). Fields not listed here (`is_file`, `store_in_memory`,
    /// directory/close counters) retain whatever materialization produced.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        path: &str,
        producers: Vec<String>,
        consumers: Vec<String>,
        commit_rule: CommitRule,
        fire_rule: FireRule,
        permanent: bool,
        excluded: bool,
        file_dependencies: Vec<String>,
    ) {
        self.get_or_create(path);
        let Some(entry) = self.entries.get_mut(path) else {
            return;
        };
        entry.producers = producers;
        entry.consumers = consumers;
        entry.commit_rule = commit_rule;
        entry.fire_rule = fire_rule;
        entry.permanent = permanent;
        entry.excluded = excluded;
        entry.file_dependencies = file_dependencies;
    }

    /// Appends `step` to `path`'s producer list (materializing first).
    pub fn add_producer(&mut self, path: &str, step: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.add_producer(step);
        }
    }

    /// Appends `step` to `path`'s consumer list (materializing first).
    pub fn add_consumer(&mut self, path: &str, step: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.add_consumer(step);
        }
    }

    /// Appends `dep` to `path`'s file dependencies, forcing `commit_rule = OnFile`.
    pub fn add_file_dependency(&mut self, path: &str, dep: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.add_file_dependency(dep);
        }
    }

    /// Replaces `path`'s file dependency list wholesale (a no-op for an empty list).
    pub fn set_file_dependencies(&mut self, path: &str, deps: Vec<String>) {
        if deps.is_empty() {
            return;
        }
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.file_dependencies = deps;
        }
    }

    /// Sets the commit rule for `path` (materializing first).
    pub fn set_commit_rule(&mut self, path: &str, rule: CommitRule) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.commit_rule = rule;
        }
    }

    /// Reads the commit rule for `path`, materializing it if unseen.
    pub fn get_commit_rule(&mut self, path: &str) -> CommitRule {
        self.get_or_create(path).commit_rule
    }

    /// Sets the fire rule for `path` (materializing first).
    pub fn set_fire_rule(&mut self, path: &str, rule: FireRule) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.fire_rule = rule;
        }
    }

    /// Reads the fire rule for `path`, materializing it if unseen.
    pub fn get_fire_rule(&mut self, path: &str) -> FireRule {
        self.get_or_create(path).fire_rule
    }

    /// See [`Entry::is_firable`].
    pub fn is_firable(&mut self, path: &str) -> bool {
        self.get_or_create(path).is_firable()
    }

    /// Marks `path` permanent or not (materializing first).
    pub fn set_permanent(&mut self, path: &str, value: bool) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.permanent = value;
        }
    }

    /// Reads the permanent flag, materializing `path` if unseen.
    pub fn is_permanent(&mut self, path: &str) -> bool {
        self.get_or_create(path).permanent
    }

    /// Marks `path` excluded or not (materializing first).
    pub fn set_excluded(&mut self, path: &str, value: bool) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.excluded = value;
        }
    }

    /// Exact-match wins; else the longest matching pattern's `excluded` flag;
    /// else `false`. Does not auto-materialize (§4.2). The empty path is
    /// never excluded, even if a stored `*` pattern would otherwise
    /// glob-match it (§8 boundary behaviors).
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if let Some(entry) = self.entries.get(path) {
            return entry.excluded;
        }
        self.longest_match(path)
            .and_then(|key| self.entries.get(&key))
            .is_some_and(|entry| entry.excluded)
    }

    /// Marks `path` as a directory (materializing first).
    pub fn set_directory(&mut self, path: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.is_file = false;
        }
    }

    /// Marks `path` as a file (materializing first).
    pub fn set_file(&mut self, path: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.is_file = true;
        }
    }

    /// Reads whether `path` is a file, materializing it if unseen (§9 — the
    /// original's `isFile` returns `isPermanent` on auto-creation; this
    /// returns the entry's actual `is_file` field, default `true`).
    pub fn is_file(&mut self, path: &str) -> bool {
        self.get_or_create(path).is_file
    }

    /// `!is_file(path)`.
    pub fn is_directory(&mut self, path: &str) -> bool {
        !self.is_file(path)
    }

    /// Sets the commit-on-close counter for `path` (materializing first).
    pub fn set_commit_on_close_count(&mut self, path: &str, count: u64) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.commit_on_close_count = count;
        }
    }

    /// Reads the commit-on-close counter, materializing `path` if unseen.
    pub fn get_commit_on_close_count(&mut self, path: &str) -> u64 {
        self.get_or_create(path).commit_on_close_count
    }

    /// Sets the explicit directory child count, freezing auto-update for
    /// this entry forever (invariant I4).
    pub fn set_directory_file_count(&mut self, path: &str, count: u64) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.set_directory_file_count(count);
        }
    }

    /// Restores a directory child count that was produced by materialization
    /// rather than an explicit call, without freezing auto-update (unlike
    /// [`Self::set_directory_file_count`]). Used to round-trip a count the
    /// codec observed without also pinning `auto_update_dir_count`.
    pub fn set_directory_file_count_observed(&mut self, path: &str, count: u64) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.directory_children_count = count;
            entry.is_file = false;
        }
    }

    /// Reads the directory child count, materializing `path` if unseen.
    pub fn get_directory_file_count(&mut self, path: &str) -> u64 {
        self.get_or_create(path).directory_children_count
    }

    /// Reads the file dependency list, materializing `path` if unseen.
    pub fn get_file_dependencies(&mut self, path: &str) -> Vec<String> {
        self.get_or_create(path).file_dependencies.clone()
    }

    /// Forces `path` to be stored in memory (materializing first).
    pub fn set_store_in_memory(&mut self, path: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.store_in_memory = true;
        }
    }

    /// Forces `path` to be stored on the filesystem (materializing first).
    pub fn set_store_on_fs(&mut self, path: &str) {
        self.get_or_create(path);
        if let Some(entry) = self.entries.get_mut(path) {
            entry.store_in_memory = false;
        }
    }

    /// Reads the storage placement hint. Does not auto-materialize: an
    /// unknown path is reported as not memory-resident without being created.
    #[must_use]
    pub fn is_stored_in_memory(&self, path: &str) -> bool {
        self.entries.get(path).is_some_and(|e| e.store_in_memory)
    }

    /// All stored paths currently hinted to be held in memory.
    #[must_use]
    pub fn paths_stored_in_memory(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.store_in_memory)
            .map(|(k, _)| k.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Read-only snapshot of `path`'s permanent flag, `false` if unstored.
    /// Does not auto-materialize (for serializing existing entries only).
    #[must_use]
    pub fn is_permanent_snapshot(&self, path: &str) -> bool {
        self.entries.get(path).is_some_and(|e| e.permanent)
    }

    /// Read-only snapshot of `path`'s `is_file` flag, `true` if unstored.
    #[must_use]
    pub fn is_file_snapshot(&self, path: &str) -> bool {
        self.entries.get(path).is_none_or(|e| e.is_file)
    }

    /// Read-only snapshot of `path`'s commit rule, default if unstored.
    #[must_use]
    pub fn get_commit_rule_snapshot(&self, path: &str) -> CommitRule {
        self.entries.get(path).map(|e| e.commit_rule).unwrap_or_default()
    }

    /// Read-only snapshot of `path`'s fire rule, default if unstored.
    #[must_use]
    pub fn get_fire_rule_snapshot(&self, path: &str) -> FireRule {
        self.entries.get(path).map(|e| e.fire_rule).unwrap_or_default()
    }

    /// Read-only snapshot of `path`'s commit-on-close counter, `0` if unstored.
    #[must_use]
    pub fn get_commit_on_close_count_snapshot(&self, path: &str) -> u64 {
        self.entries.get(path).map_or(0, |e| e.commit_on_close_count)
    }

    /// Read-only snapshot of `path`'s directory child count, `0` if unstored.
    #[must_use]
    pub fn get_directory_file_count_snapshot(&self, path: &str) -> u64 {
        self.entries
            .get(path)
            .map_or(0, |e| e.directory_children_count)
    }

    /// Read-only snapshot of whether `path`'s directory child count is still
    /// auto-maintained by the store, `true` if unstored (the default entry's
    /// value). Distinguishes an explicit [`Self::set_directory_file_count`]
    /// call from a count produced purely by materialization.
    #[must_use]
    pub fn is_directory_auto_update_snapshot(&self, path: &str) -> bool {
        self.entries.get(path).is_none_or(|e| e.auto_update_dir_count)
    }

    /// Read-only snapshot of `path`'s file dependencies, empty if unstored.
    #[must_use]
    pub fn get_file_dependencies_snapshot(&self, path: &str) -> Vec<String> {
        self.entries
            .get(path)
            .map(|e| e.file_dependencies.clone())
            .unwrap_or_default()
    }

    /// Producers for an exact key, empty if not stored (no auto-materialize
    /// or pattern resolution — mirrors the original's plain map lookup).
    #[must_use]
    pub fn producers(&self, path: &str) -> Vec<String> {
        self.entries
            .get(path)
            .map(|e| e.producers.clone())
            .unwrap_or_default()
    }

    /// Consumers for an exact key, empty if not stored.
    #[must_use]
    pub fn consumers(&self, path: &str) -> Vec<String> {
        self.entries
            .get(path)
            .map(|e| e.consumers.clone())
            .unwrap_or_default()
    }

    /// True iff `step` is a producer of any stored pattern matching `path`
    /// (disjunction across all matches, no longest-prefix restriction).
    /// Auto-materializes `path` when nothing matches. The empty path never
    /// has a producer (§8 boundary behaviors), even though a stored `*`
    /// pattern would otherwise glob-match it.
    pub fn is_producer(&mut self, path: &str, step: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if let Some(found) = self.any_match_role(path, step, |e| &e.producers) {
            return found;
        }
        self.get_or_create(path);
        false
    }

    /// True iff `step` is a consumer of any stored pattern matching `path`.
    /// The empty path never has a consumer (§8 boundary behaviors).
    pub fn is_consumer(&mut self, path: &str, step: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        if let Some(found) = self.any_match_role(path, step, |e| &e.consumers) {
            return found;
        }
        self.get_or_create(path);
        false
    }

    fn any_match_role(
        &self,
        path: &str,
        step: &str,
        role: impl Fn(&Entry) -> &Vec<String>,
    ) -> Option<bool> {
        let mut matched_any = false;
        for (key, entry) in &self.entries {
            if capiocl_matcher::matches(key, path) {
                matched_any = true;
                if role(entry).iter().any(|s| s == step) {
                    return Some(true);
                }
            }
        }
        matched_any.then_some(false)
    }
}

fn parent_of(path: &str) -> Option<&str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let slash = trimmed.rfind('/')?;
    if slash == 0 {
        Some("/")
    } else {
        Some(&trimmed[..slash])
    }
}

impl PartialEq for EntryStore {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries.iter().all(|(key, entry)| {
            other
                .entries
                .get(key)
                .is_some_and(|other_entry| entries_equal_unordered(entry, other_entry))
        })
    }
}

fn entries_equal_unordered(a: &Entry, b: &Entry) -> bool {
    a.commit_rule == b.commit_rule
        && a.fire_rule == b.fire_rule
        && a.commit_on_close_count == b.commit_on_close_count
        && a.directory_children_count == b.directory_children_count
        && a.auto_update_dir_count == b.auto_update_dir_count
        && a.permanent == b.permanent
        && a.excluded == b.excluded
        && a.is_file == b.is_file
        && a.store_in_memory == b.store_in_memory
        && as_set(&a.producers) == as_set(&b.producers)
        && as_set(&a.consumers) == as_set(&b.consumers)
        && as_set(&a.file_dependencies) == as_set(&b.file_dependencies)
}

fn as_set(items: &[String]) -> HashSet<&str> {
    items.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn new_file_invariants() {
        let mut store = EntryStore::new();
        store.get_or_create("/a/b");
        assert!(store.contains("/a/b"));
        assert_eq!(store.get_commit_rule("/a/b"), CommitRule::OnTermination);
        assert_eq!(store.get_fire_rule("/a/b"), FireRule::Update);
        assert!(store.producers("/a/b").is_empty());
        assert!(store.consumers("/a/b").is_empty());
    }

    #[test]
    fn glob_inheritance_scenario_one() {
        let mut store = EntryStore::new();
        store.get_or_create("test.?");
        store.set_commit_rule("test.?", CommitRule::OnClose);
        store.set_fire_rule("test.?", FireRule::NoUpdate);
        store.set_directory("test.?");
        store.set_directory_file_count("test.?", 10);

        assert_eq!(store.get_commit_rule("test.1"), CommitRule::OnClose);
        assert!(store.is_directory("test.9"));
        assert_eq!(store.get_directory_file_count("test.a"), 10);
    }

    #[test]
    fn role_disjunction_scenario_two() {
        let mut store = EntryStore::new();
        store.get_or_create("test.*");
        store.add_producer("test.*", "P");
        store.add_consumer("test.txt", "C");

        assert!(store.is_producer("test.txt.1", "P"));
        assert!(!store.is_consumer("test.txt.1", "C"));
        assert!(store.is_consumer("test.txt", "C"));
    }

    #[test]
    fn commit_on_close_scenario_three() {
        let mut store = EntryStore::new();
        store.set_commit_rule("f", CommitRule::OnClose);
        store.set_commit_on_close_count("f", 100);
        assert_eq!(store.get_commit_on_close_count("f"), 100);

        assert_eq!(store.get_commit_on_close_count("g"), 0);
        assert!(store.contains("g"));
    }

    #[test]
    fn directory_auto_count_scenario_six() {
        let mut store = EntryStore::new();
        store.get_or_create("/d");
        store.set_directory("/d");
        store.get_or_create("/d/a");
        store.get_or_create("/d/b");
        assert_eq!(store.get_directory_file_count("/d"), 2);

        store.set_directory_file_count("/d", 10);
        store.get_or_create("/d/c");
        assert_eq!(store.get_directory_file_count("/d"), 10);
    }

    #[test]
    fn remove_is_exact_match_only() {
        let mut store = EntryStore::new();
        store.get_or_create("test.*");
        store.get_or_create("test.1");
        store.remove("test.*");
        assert!(!store.entries.contains_key("test.*"));
        assert!(store.entries.contains_key("test.1"));
    }

    #[test]
    fn set_all_store_in_memory_then_new_file() {
        let mut store = EntryStore::new();
        store.get_or_create("/already");
        store.set_all_store_in_memory();
        store.get_or_create("/fresh");
        assert!(store.is_stored_in_memory("/already"));
        assert!(store.is_stored_in_memory("/fresh"));
    }

    #[test]
    fn store_equality_is_order_insensitive_on_role_sets() {
        let mut a = EntryStore::new();
        a.add_producer("/x", "p1");
        a.add_producer("/x", "p2");

        let mut b = EntryStore::new();
        b.add_producer("/x", "p2");
        b.add_producer("/x", "p1");

        assert_eq!(a, b);
    }

    #[test]
    fn empty_path_is_a_no_op_with_fixed_defaults() {
        let mut store = EntryStore::new();
        assert!(!store.contains(""));
        assert!(store.is_firable(""));
        assert!(store.is_permanent(""));
        assert!(store.is_file(""));
        assert_eq!(store.get_directory_file_count(""), 0);
        assert!(!store.is_excluded(""));
        assert!(!store.is_producer("", "anyone"));
        assert!(!store.is_consumer("", "anyone"));

        store.set_permanent("", false);
        store.set_commit_rule("", CommitRule::OnClose);
        store.add_producer("", "p");
        assert_eq!(store.size(), 0);
        assert!(store.is_permanent(""));
        assert_eq!(store.get_commit_rule(""), CommitRule::OnTermination);
    }

    #[test]
    fn longest_prefix_tie_break_is_lexicographic() {
        let mut store = EntryStore::new();
        store.set_commit_rule("a?c", CommitRule::OnClose);
        store.set_commit_rule("ab?", CommitRule::OnFile);
        // both match "abc" with equal length 3; "a?c" < "ab?" lexicographically
        assert_eq!(store.get_commit_rule("abc"), CommitRule::OnClose);
    }
}
