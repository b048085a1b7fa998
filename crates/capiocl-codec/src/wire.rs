// SPDX-License-Identifier: Apache-2.0
//! Translation between the JSON wire spellings and the store's internal
//! [`CommitRule`]/[`FireRule`] representation.
//!
//! Every rule spells identically on both sides except the directory
//! cardinality rule: the store's internal wire string is `n_files`
//! (matching the upstream engine's `COMMITTED_N_FILES` constant) but the
//! JSON configuration spells it `on_n_files`. This module is the only place
//! that translation happens.

use capiocl_store::{CommitRule, FireRule};

use crate::ParseError;

pub(crate) fn commit_rule_from_json(s: &str) -> Result<CommitRule, ParseError> {
    match s {
        "on_close" => Ok(CommitRule::OnClose),
        "on_file" => Ok(CommitRule::OnFile),
        "on_n_files" => Ok(CommitRule::OnNFiles),
        "on_termination" => Ok(CommitRule::OnTermination),
        other => Err(ParseError::Malformed(format!(
            "commit rule {other} is not one of the allowed ones"
        ))),
    }
}

pub(crate) const fn commit_rule_to_json(rule: CommitRule) -> &'static str {
    match rule {
        CommitRule::OnClose => "on_close",
        CommitRule::OnFile => "on_file",
        CommitRule::OnNFiles => "on_n_files",
        CommitRule::OnTermination => "on_termination",
    }
}

pub(crate) fn fire_rule_from_json(s: &str) -> Result<FireRule, ParseError> {
    match s {
        "update" => Ok(FireRule::Update),
        "no_update" => Ok(FireRule::NoUpdate),
        other => Err(ParseError::Malformed(format!(
            "fire rule {other} is not one of the allowed ones"
        ))),
    }
}

pub(crate) const fn fire_rule_to_json(rule: FireRule) -> &'static str {
    match rule {
        FireRule::Update => "update",
        FireRule::NoUpdate => "no_update",
    }
}
