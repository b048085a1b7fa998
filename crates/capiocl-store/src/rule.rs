// SPDX-License-Identifier: Apache-2.0
//! Typed commit/fire rules with a stable bijection to their wire strings.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A setter received a rule string outside the allowed set.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid rule: {0}")]
pub struct InvalidRule(pub String);

/// When a path is considered committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitRule {
    /// Committed once the producer closes the file (optionally after N closes).
    OnClose,
    /// Committed once its `file_dependencies` are all committed.
    OnFile,
    /// Committed once a directory accumulates the expected number of children.
    OnNFiles,
    /// Committed at workflow termination. Default.
    #[default]
    OnTermination,
}

impl CommitRule {
    /// The store's internal wire name (distinct from the JSON `committed` spelling
    /// for the directory-cardinality rule — see `capiocl-codec` for that mapping).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnClose => "on_close",
            Self::OnFile => "on_file",
            Self::OnNFiles => "n_files",
            Self::OnTermination => "on_termination",
        }
    }
}

impl fmt::Display for CommitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitRule {
    type Err = InvalidRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_close" => Ok(Self::OnClose),
            "on_file" => Ok(Self::OnFile),
            "n_files" => Ok(Self::OnNFiles),
            "on_termination" => Ok(Self::OnTermination),
            other => Err(InvalidRule(other.to_string())),
        }
    }
}

/// Whether consumers are re-notified on every update or only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FireRule {
    /// Re-fire on every update. Default.
    #[default]
    Update,
    /// Fire only once.
    NoUpdate,
}

impl FireRule {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::NoUpdate => "no_update",
        }
    }
}

impl fmt::Display for FireRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FireRule {
    type Err = InvalidRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "update" => Ok(Self::Update),
            "no_update" => Ok(Self::NoUpdate),
            other => Err(InvalidRule(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn commit_rule_round_trips_through_its_wire_string() {
        for rule in [
            CommitRule::OnClose,
            CommitRule::OnFile,
            CommitRule::OnNFiles,
            CommitRule::OnTermination,
        ] {
            assert_eq!(rule.as_str().parse::<CommitRule>().unwrap(), rule);
        }
    }

    #[test]
    fn fire_rule_rejects_unknown_strings() {
        assert!("no_update".parse::<FireRule>().is_ok());
        assert_eq!(
            "NO_UPDATE".parse::<FireRule>(),
            Err(InvalidRule("NO_UPDATE".to_string()))
        );
    }

    #[test]
    fn default_rules_match_spec() {
        assert_eq!(CommitRule::default(), CommitRule::OnTermination);
        assert_eq!(FireRule::default(), FireRule::Update);
    }
}
