// SPDX-License-Identifier: Apache-2.0
//! Composes zero or more [`CommitBackend`]s into one.

use crate::{CommitBackend, MonitorFailure};

/// Fans a single commit query or update out across every configured
/// backend. `is_committed` is an "any" over backends; `set_committed`
/// updates all of them, even if one fails, and reports the first error.
#[derive(Default)]
pub struct MonitorAggregator {
    backends: Vec<Box<dyn CommitBackend>>,
}

impl MonitorAggregator {
    /// Creates an aggregator with no backends (every path reads as
    /// uncommitted and `set_committed` is a no-op).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a backend to the aggregate.
    pub fn push(&mut self, backend: Box<dyn CommitBackend>) {
        self.backends.push(backend);
    }

    /// Number of backends composed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether this aggregator has no backends.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

#[async_trait::async_trait]
impl CommitBackend for MonitorAggregator {
    async fn is_committed(&self, path: &str) -> Result<bool, MonitorFailure> {
        for backend in &self.backends {
            if backend.is_committed(path).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn set_committed(&self, path: &str) -> Result<(), MonitorFailure> {
        let mut first_error = None;
        for backend in &self.backends {
            if let Err(e) = backend.set_committed(path).await {
                tracing::warn!(path, error = %e, "backend failed to record commit");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::FilesystemBackend;

    #[tokio::test]
    async fn empty_aggregator_reports_nothing_committed() {
        let agg = MonitorAggregator::new();
        assert!(!agg.is_committed("/anything").await.unwrap());
        agg.set_committed("/anything").await.unwrap();
    }

    #[tokio::test]
    async fn single_backend_is_reachable_through_the_aggregator() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("out.bin");
        let path = file.to_string_lossy().into_owned();

        let mut agg = MonitorAggregator::new();
        agg.push(Box::new(FilesystemBackend::new()));
        assert!(!agg.is_committed(&path).await.unwrap());
        agg.set_committed(&path).await.unwrap();
        assert!(agg.is_committed(&path).await.unwrap());
    }
}
