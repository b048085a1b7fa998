// SPDX-License-Identifier: Apache-2.0
//! The coordination engine: a per-workflow facade over the entry store and
//! the commit-state monitor.

mod error;

use capiocl_monitor::{CommitBackend, MonitorAggregator, MonitorFailure};
use capiocl_store::{CommitRule, Entry, EntryStore, FireRule};

pub use error::EngineError;

/// Name of the environment variable the engine reads its workflow name
/// from, when the caller doesn't supply one explicitly.
pub const WORKFLOW_NAME_VAR: &str = "WORKFLOW_NAME";
/// Workflow name used when `WORKFLOW_NAME_VAR` is unset.
pub const DEFAULT_WORKFLOW_NAME: &str = "CAPIO_CL";

/// Owns one workflow's path registry and commit monitor.
///
/// Two engines are equal iff their entry stores are equal; the monitor's
/// distributed state is not part of engine identity.
pub struct Engine {
    node_name: String,
    workflow_name: String,
    store: EntryStore,
    monitor: MonitorAggregator,
}

impl Engine {
    /// Builds an engine for the current host, reading the workflow name
    /// from [`WORKFLOW_NAME_VAR`] (falling back to [`DEFAULT_WORKFLOW_NAME`]).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HostName`] if the local host name can't be read.
    pub fn new(monitor: MonitorAggregator) -> Result<Self, EngineError> {
        let workflow_name = std::env::var(WORKFLOW_NAME_VAR)
            .unwrap_or_else(|_| DEFAULT_WORKFLOW_NAME.to_string());
        Self::with_workflow_name(monitor, workflow_name)
    }

    /// Builds an engine with an explicit workflow name, bypassing the
    /// environment variable lookup (primarily for tests and embedders that
    /// already know their workflow identity).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HostName`] if the local host name can't be read.
    pub fn with_workflow_name(
        monitor: MonitorAggregator,
        workflow_name: impl Into<String>,
    ) -> Result<Self, EngineError> {
        let workflow_name = workflow_name.into();
        let node_name = hostname::get()
            .map_err(EngineError::HostName)?
            .to_string_lossy()
            .into_owned();
        tracing::debug!(node_name, workflow = %workflow_name, "engine initialized");
        Ok(Self {
            node_name,
            workflow_name,
            store: EntryStore::new(),
            monitor,
        })
    }

    /// This node's host name, captured at construction.
    #[must_use]
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// The workflow this engine coordinates.
    #[must_use]
    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    /// Direct read access to the entry store, for callers that need the
    /// full typed API (e.g. the codec).
    #[must_use]
    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Direct mutable access to the entry store.
    pub fn store_mut(&mut self) -> &mut EntryStore {
        &mut self.store
    }

    /// Forces every existing and future entry to be stored in memory
    /// (invariant I5); irreversible for the lifetime of this engine.
    pub fn set_all_store_in_memory(&mut self) {
        self.store.set_all_store_in_memory();
    }

    /// The node responsible for serving `path`.
    ///
    /// Home-node policies beyond "this node" are not yet implemented
    /// (tracked upstream); every call currently returns this engine's own
    /// node name, whether or not `path` has a registered entry.
    pub fn home_node(&mut self, path: &str) -> &str {
        if self.store.contains(path) {
            tracing::trace!(path, node = %self.node_name, "home node resolved from existing entry");
        } else {
            tracing::trace!(path, node = %self.node_name, "no entry for path, returning this node");
        }
        &self.node_name
    }

    /// Queries the monitor for whether `path` is committed.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorFailure`] if every configured backend failed.
    pub async fn is_committed(&self, path: &str) -> Result<bool, MonitorFailure> {
        self.monitor.is_committed(path).await
    }

    /// Publishes `path` as committed to every configured monitor backend.
    ///
    /// # Errors
    ///
    /// Returns the first [`MonitorFailure`] encountered, after attempting
    /// every backend.
    pub async fn set_committed(&self, path: &str) -> Result<(), MonitorFailure> {
        self.monitor.set_committed(path).await
    }

    /// Materializes `path` if unseen and returns a snapshot of its entry.
    pub fn entry(&mut self, path: &str) -> Entry {
        self.store.get_or_create(path).clone()
    }

    /// See [`EntryStore::add`].
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
        self.store.add(
            path,
            producers,
            consumers,
            commit_rule,
            fire_rule,
            permanent,
            excluded,
            file_dependencies,
        );
    }
}

impl PartialEq for Engine {
    fn eq(&self, other: &Self) -> bool {
        self.store == other.store
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use capiocl_monitor::FilesystemBackend;

    fn engine_with_name(name: &str) -> Engine {
        Engine::with_workflow_name(MonitorAggregator::new(), name).unwrap()
    }

    #[test]
    fn default_workflow_name_falls_back_when_env_unset() {
        assert!(std::env::var(WORKFLOW_NAME_VAR).is_err());
        let engine = Engine::new(MonitorAggregator::new()).unwrap();
        assert_eq!(engine.workflow_name(), DEFAULT_WORKFLOW_NAME);
    }

    #[test]
    fn explicit_workflow_name_bypasses_env_lookup() {
        let engine = engine_with_name("scenario");
        assert_eq!(engine.workflow_name(), "scenario");
    }

    #[test]
    fn home_node_always_resolves_to_local_node() {
        let mut engine = engine_with_name("scenario");
        let node = engine.node_name().to_string();
        assert_eq!(engine.home_node("/unknown/path"), node);
    }

    #[test]
    fn equality_delegates_to_store_only() {
        let mut a = engine_with_name("a");
        let mut b = engine_with_name("b");
        a.store_mut().add_producer("/x", "p1");
        b.store_mut().add_producer("/x", "p1");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn set_all_store_in_memory_retro_applies() {
        let mut engine = engine_with_name("scenario");
        engine.entry("/already");
        engine.set_all_store_in_memory();
        assert!(engine.store().is_stored_in_memory("/already"));
    }

    #[tokio::test]
    async fn commit_round_trip_through_monitor() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.bin");
        let path = file.to_string_lossy().into_owned();

        let mut monitor = MonitorAggregator::new();
        monitor.push(Box::new(FilesystemBackend::new()));
        let engine = engine_with_name_with_monitor("scenario", monitor);

        assert!(!engine.is_committed(&path).await.unwrap());
        engine.set_committed(&path).await.unwrap();
        assert!(engine.is_committed(&path).await.unwrap());
    }

    fn engine_with_name_with_monitor(name: &str, monitor: MonitorAggregator) -> Engine {
        Engine::with_workflow_name(monitor, name).unwrap()
    }
}
