// SPDX-License-Identifier: Apache-2.0
//! Error type shared by every commit backend.

use thiserror::Error;

/// A backend failed to read or publish commit state.
#[derive(Debug, Error)]
pub enum MonitorFailure {
    /// The filesystem backend could not create or inspect a token file.
    #[error("filesystem backend I/O error for {path}: {source}")]
    Io {
        /// Path the backend was operating on.
        path: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A UDP socket operation failed (bind, join, send, or receive).
    #[error("multicast socket error: {0}")]
    Socket(#[source] std::io::Error),

    /// A datagram exceeded `PATH_MAX` or was otherwise malformed.
    #[error("malformed multicast datagram: {0}")]
    MalformedDatagram(String),

    /// The listener task observed a fatal socket error and shut down; the
    /// backend now only serves its local cache.
    #[error("multicast listener terminated: {0}")]
    ListenerTerminated(String),
}
