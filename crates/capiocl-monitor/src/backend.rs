// SPDX-License-Identifier: Apache-2.0
//! The capability every commit-state backend implements.

use crate::MonitorFailure;

/// A source of truth for whether a path has been committed.
///
/// Implementations may be local (filesystem token files) or distributed
/// (multicast UDP); the engine treats every backend identically through
/// this trait.
#[async_trait::async_trait]
pub trait CommitBackend: Send + Sync {
    /// Returns whether `path` is currently known to be committed.
    async fn is_committed(&self, path: &str) -> Result<bool, MonitorFailure>;

    /// Records `path` as committed, publishing the change to whatever
    /// medium the backend uses.
    async fn set_committed(&self, path: &str) -> Result<(), MonitorFailure>;
}
