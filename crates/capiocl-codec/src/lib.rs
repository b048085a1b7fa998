// SPDX-License-Identifier: Apache-2.0
//! JSON configuration codec for CAPIO-CL workflows: parses a workflow
//! description into an [`capiocl_engine::Engine`] and serializes one back.

mod error;
mod parse;
mod serialize;
mod version;
mod wire;

pub use error::{ParseError, SerializeError};
pub use parse::parse;
pub use serialize::serialize;
pub use version::CodecVersion;
