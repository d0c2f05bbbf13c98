//! Sequence-diagram roles carried by capture-group names
//!
//! A role token is one of the identifiers below, optionally followed by `_`
//! and a literal value that replaces the captured text during extraction.

use super::ConsistencyReport;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Role of a capture group in a call-sequence diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SequenceRole {
    SequenceId,
    Client,
    Request,
    Response,
    Event,
    Service,
    Method,
    Arguments,
}

/// How a role participates in the per-record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceRoleKind {
    /// May be absent
    Optional,
    /// Must be present in every record that yields an item
    Mandatory,
    /// At least one of the request-type roles must be present
    RequestType,
}

impl SequenceRole {
    pub const ALL: [SequenceRole; 8] = [
        SequenceRole::SequenceId,
        SequenceRole::Client,
        SequenceRole::Request,
        SequenceRole::Response,
        SequenceRole::Event,
        SequenceRole::Service,
        SequenceRole::Method,
        SequenceRole::Arguments,
    ];

    /// Identifier used inside group names
    pub fn id(&self) -> &'static str {
        match self {
            SequenceRole::SequenceId => "USID",
            SequenceRole::Client => "UCL",
            SequenceRole::Request => "URT",
            SequenceRole::Response => "URS",
            SequenceRole::Event => "UEV",
            SequenceRole::Service => "US",
            SequenceRole::Method => "UM",
            SequenceRole::Arguments => "UA",
        }
    }

    pub fn kind(&self) -> SequenceRoleKind {
        match self {
            SequenceRole::Client | SequenceRole::Service | SequenceRole::Method => {
                SequenceRoleKind::Mandatory
            }
            SequenceRole::Request | SequenceRole::Response | SequenceRole::Event => {
                SequenceRoleKind::RequestType
            }
            SequenceRole::SequenceId | SequenceRole::Arguments => SequenceRoleKind::Optional,
        }
    }

    /// Case-insensitive lookup by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.id().eq_ignore_ascii_case(id))
    }

    pub fn is_request_type(&self) -> bool {
        self.kind() == SequenceRoleKind::RequestType
    }
}

impl fmt::Display for SequenceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

static ROLE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    let ids: Vec<&str> = SequenceRole::ALL.iter().map(|role| role.id()).collect();
    Regex::new(&format!(r"(?i)^({})_?([\w\d]*)$", ids.join("|")))
        .expect("Valid sequence role regex")
});

/// Parse one group-name token into a role and its optional literal override
pub(crate) fn parse_token(token: &str) -> Option<(SequenceRole, Option<String>)> {
    let caps = ROLE_TOKEN.captures(token)?;
    let role = SequenceRole::from_id(caps.get(1)?.as_str())?;
    let literal = caps
        .get(2)
        .map(|m| m.as_str())
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    Some((role, literal))
}

/// Check a set of roles against the diagram schema: every mandatory role
/// present and at least one request-type role present.
pub fn check_schema(present: &BTreeSet<SequenceRole>) -> ConsistencyReport {
    let mut report = ConsistencyReport::consistent();

    for role in SequenceRole::ALL
        .iter()
        .filter(|role| role.kind() == SequenceRoleKind::Mandatory)
    {
        if !present.contains(role) {
            report.fail(format!("Mandatory element {} not found", role));
        }
    }

    if !present.iter().any(|role| role.is_request_type()) {
        let request_types: Vec<&str> = SequenceRole::ALL
            .iter()
            .filter(|role| role.is_request_type())
            .map(|role| role.id())
            .collect();
        report.fail(format!(
            "Request type elements ({}) not found",
            request_types.join("|")
        ));
    }

    report
}

/// Roles of `present` that the schema requires but that are missing
pub fn missing_roles(present: &BTreeSet<SequenceRole>) -> Vec<SequenceRole> {
    SequenceRole::ALL
        .iter()
        .copied()
        .filter(|role| role.kind() == SequenceRoleKind::Mandatory && !present.contains(role))
        .collect()
}
