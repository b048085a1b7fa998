// SPDX-License-Identifier: Apache-2.0
//! The per-path coordination record.

use crate::rule::{CommitRule, FireRule};

/// Coordination metadata for one stored path or pattern.
///
/// Role sets (`producers`, `consumers`, `file_dependencies`) are semantically
/// sets (no duplicates) but preserve insertion order for iteration, matching
/// the original's `std::vector` role lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Step names that write this path, in insertion order.
    pub producers: Vec<String>,
    /// Step names that read this path, in insertion order.
    pub consumers: Vec<String>,
    /// Paths this entry waits on; only meaningful when `commit_rule == OnFile`.
    pub file_dependencies: Vec<String>,
    /// When this path is considered committed.
    pub commit_rule: CommitRule,
    /// Whether consumers are re-notified on every update.
    pub fire_rule: FireRule,
    /// Number of closes required to commit, when `commit_rule == OnClose`.
    pub commit_on_close_count: u64,
    /// Expected number of children, when this entry is a directory.
    pub directory_children_count: u64,
    /// Whether `directory_children_count` is still auto-maintained by the store.
    pub auto_update_dir_count: bool,
    /// Whether the path should survive after workflow termination.
    pub permanent: bool,
    /// Whether the engine should treat this path as absent from the graph.
    pub excluded: bool,
    /// `false` means this entry describes a directory.
    pub is_file: bool,
    /// Storage placement hint.
    pub store_in_memory: bool,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            producers: Vec::new(),
            consumers: Vec::new(),
            file_dependencies: Vec::new(),
            commit_rule: CommitRule::default(),
            fire_rule: FireRule::default(),
            commit_on_close_count: 0,
            directory_children_count: 0,
            auto_update_dir_count: true,
            permanent: false,
            excluded: false,
            is_file: true,
            store_in_memory: false,
        }
    }
}

impl Entry {
    /// Appends `name` to `producers` if not already present, stripping whitespace.
    pub fn add_producer(&mut self, name: &str) {
        push_unique(&mut self.producers, name);
    }

    /// Appends `name` to `consumers` if not already present, stripping whitespace.
    pub fn add_consumer(&mut self, name: &str) {
        push_unique(&mut self.consumers, name);
    }

    /// Appends `path` to `file_dependencies` if not already present and
    /// forces `commit_rule = OnFile` (invariant I3).
    pub fn add_file_dependency(&mut self, path: &str) {
        push_unique(&mut self.file_dependencies, path);
        self.commit_rule = CommitRule::OnFile;
    }

    /// Sets the explicit directory child count, freezing auto-update (invariant I4).
    pub fn set_directory_file_count(&mut self, count: u64) {
        self.directory_children_count = count;
        self.auto_update_dir_count = false;
        self.is_file = false;
    }

    /// Whether the entry does not require update propagation to fire.
    ///
    /// Named `is_firable` for parity with the wire vocabulary; counter to the
    /// natural reading of the name, it is `true` precisely when `fire_rule`
    /// is `NoUpdate` (a file that never needs re-firing is always ready to fire
    /// once). This mirrors the upstream engine's behavior as specified.
    #[must_use]
    pub fn is_firable(&self) -> bool {
        self.fire_rule == FireRule::NoUpdate
    }
}

fn push_unique(set: &mut Vec<String>, value: &str) {
    let trimmed: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if !set.iter().any(|existing| existing == &trimmed) {
        set.push(trimmed);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn default_entry_matches_new_file_invariants() {
        let e = Entry::default();
        assert_eq!(e.commit_rule, CommitRule::OnTermination);
        assert_eq!(e.fire_rule, FireRule::Update);
        assert!(e.producers.is_empty());
        assert!(e.consumers.is_empty());
        assert!(e.file_dependencies.is_empty());
    }

    #[test]
    fn add_producer_rejects_duplicates_and_strips_whitespace() {
        let mut e = Entry::default();
        e.add_producer(" step-a ");
        e.add_producer("step-a");
        assert_eq!(e.producers, vec!["step-a".to_string()]);
    }

    #[test]
    fn add_file_dependency_forces_on_file_commit_rule() {
        let mut e = Entry::default();
        e.commit_rule = CommitRule::OnTermination;
        e.add_file_dependency("/a/b");
        assert_eq!(e.commit_rule, CommitRule::OnFile);
        assert_eq!(e.file_dependencies, vec!["/a/b".to_string()]);
    }

    #[test]
    fn set_directory_file_count_freezes_auto_update() {
        let mut e = Entry::default();
        e.set_directory_file_count(10);
        assert_eq!(e.directory_children_count, 10);
        assert!(!e.auto_update_dir_count);
        assert!(!e.is_file);
    }

    #[test]
    fn is_firable_is_true_exactly_when_fire_rule_is_no_update() {
        let mut e = Entry::default();
        assert!(!e.is_firable());
        e.fire_rule = FireRule::NoUpdate;
        assert!(e.is_firable());
    }
}
