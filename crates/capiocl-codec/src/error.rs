// SPDX-License-Identifier: Apache-2.0
//! Errors surfaced while parsing or serializing a workflow configuration.

use thiserror::Error;

/// The document could not be turned into an [`capiocl_engine::Engine`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// `version` is missing or not one this crate knows how to read.
    #[error("unsupported configuration version: {0}")]
    UnsupportedVersion(String),

    /// The document failed JSON-schema validation.
    #[error("schema validation failed: {0}")]
    SchemaViolation(String),

    /// The document was not valid JSON at all.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A field was present but had the wrong shape for its context
    /// (e.g. `committed` naming a rule outside the known set).
    #[error("malformed configuration: {0}")]
    Malformed(String),

    /// Constructing the underlying engine failed (e.g. host name lookup).
    #[error("engine construction failed: {0}")]
    Engine(#[from] capiocl_engine::EngineError),
}

/// An [`capiocl_engine::Engine`] could not be turned into a document.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The caller asked for a version this crate can't emit.
    #[error("unsupported configuration version: {0}")]
    UnsupportedVersion(String),

    /// Serialization produced a value `serde_json` couldn't render.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
