// SPDX-License-Identifier: Apache-2.0
//! Errors surfaced while constructing or driving an [`crate::Engine`].

use thiserror::Error;

/// Construction-time failure.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The local host name could not be read.
    #[error("failed to read local host name: {0}")]
    HostName(#[source] std::io::Error),
}
