// SPDX-License-Identifier: Apache-2.0
//! Filesystem-backed commit state: a hidden, empty token file per path.

use std::path::{Path, PathBuf};

use crate::{CommitBackend, MonitorFailure};

/// Commit state backed by the presence of a hidden token file next to the
/// path it describes. The filesystem is authoritative; this backend keeps
/// no in-memory cache.
#[derive(Debug, Clone, Default)]
pub struct FilesystemBackend;

impl FilesystemBackend {
    /// Creates a new filesystem backend.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// `<parent>/.<filename>.capiocl`, mirroring `FileSystemMonitor`'s token
/// naming convention.
fn token_path(path: &str) -> PathBuf {
    let p = Path::new(path);
    let file_name = p.file_name().map_or_else(
        || path.to_string(),
        |name| name.to_string_lossy().into_owned(),
    );
    let parent = p.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{file_name}.capiocl"))
}

#[async_trait::async_trait]
impl CommitBackend for FilesystemBackend {
    async fn is_committed(&self, path: &str) -> Result<bool, MonitorFailure> {
        let token = token_path(path);
        tokio::task::spawn_blocking(move || token.exists())
            .await
            .map_err(|e| MonitorFailure::Io {
                path: path.to_string(),
                source: std::io::Error::other(e),
            })
    }

    async fn set_committed(&self, path: &str) -> Result<(), MonitorFailure> {
        let token = token_path(path);
        let path_owned = path.to_string();
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = token.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            if !token.exists() {
                std::fs::File::create(&token)?;
            }
            Ok::<(), std::io::Error>(())
        })
        .await
        .map_err(|e| MonitorFailure::Io {
            path: path_owned.clone(),
            source: std::io::Error::other(e),
        })?
        .map_err(|source| MonitorFailure::Io {
            path: path_owned,
            source,
        })?;
        tracing::trace!(path, "marked committed via filesystem token");
        Ok(())
    }
}
