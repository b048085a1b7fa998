// SPDX-License-Identifier: Apache-2.0
//! Supported configuration versions.

use std::fmt;

use crate::{ParseError, SerializeError};

/// A codec revision. Today there is exactly one; a `V1_1` variant is the
/// documented extension point when the wire format needs to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecVersion {
    /// The only configuration version this crate currently reads or writes.
    #[default]
    V1,
}

impl CodecVersion {
    pub(crate) fn parse_version_field(raw: Option<&str>) -> Result<Self, ParseError> {
        match raw.unwrap_or("1.0") {
            "1.0" => Ok(Self::V1),
            other => Err(ParseError::UnsupportedVersion(other.to_string())),
        }
    }

    pub(crate) fn for_serialize(requested: &str) -> Result<Self, SerializeError> {
        match requested {
            "1.0" => Ok(Self::V1),
            other => Err(SerializeError::UnsupportedVersion(other.to_string())),
        }
    }
}

impl fmt::Display for CodecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1 => f.write_str("1.0"),
        }
    }
}
