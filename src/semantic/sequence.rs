//! Sequence-diagram extraction

use super::{matched_groups, RoleValue};
use crate::scripting::sequence::{check_schema, missing_roles};
use crate::scripting::{ScriptingMetadata, SequenceRole};
use crate::tree::{MatchTree, ROOT};
use crate::types::{FieldRange, Match};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role values of one record, in pre-order of the match tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
    pub values: BTreeMap<SequenceRole, Vec<RoleValue>>,
}

impl SequenceItem {
    /// First value of a role
    pub fn first(&self, role: SequenceRole) -> Option<&RoleValue> {
        self.values.get(&role).and_then(|values| values.first())
    }
}

/// Per-record result of sequence extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOutcome {
    /// Present only when the record satisfied the schema
    pub item: Option<SequenceItem>,
    /// Mandatory roles absent from the record, followed by the request-type
    /// roles when none of them matched
    pub missing_roles: Vec<SequenceRole>,
    /// More than one request/response/event role matched in this record
    pub duplicate_role: bool,
}

/// Extract the sequence-diagram item of one record.
///
/// The caller is expected to have checked that the pattern as a whole is
/// consistent; this function only validates the record's own matches.
pub fn extract_sequence(
    tree: &MatchTree<'_>,
    matches: &[Match],
    fields: &[FieldRange],
    metadata: &ScriptingMetadata,
) -> SequenceOutcome {
    let groups = matched_groups(matches);
    let present = metadata.sequence_roles_of(groups.iter());

    if !check_schema(&present).is_consistent() {
        let mut missing = missing_roles(&present);
        if !present.iter().any(|role| role.is_request_type()) {
            missing.extend(
                SequenceRole::ALL
                    .iter()
                    .copied()
                    .filter(|role| role.is_request_type()),
            );
        }
        return SequenceOutcome {
            item: None,
            missing_roles: missing,
            duplicate_role: false,
        };
    }

    let mut item = SequenceItem::default();
    let mut request_type_hits = 0usize;

    for id in tree.pre_order() {
        if id == ROOT {
            continue;
        }
        let Some(m) = tree.item(id) else { continue };
        let Some(annotation) = metadata.annotation(m.group) else {
            continue;
        };

        for (role, literal) in &annotation.sequence_roles {
            if role.is_request_type() {
                request_type_hits += 1;
            }
            let value = match literal {
                Some(value) => RoleValue::Custom(value.clone()),
                None => RoleValue::locate(m, fields),
            };
            item.values.entry(*role).or_default().push(value);
        }
    }

    SequenceOutcome {
        item: Some(item),
        missing_roles: Vec::new(),
        duplicate_role: request_type_hits > 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::ParseOptions;
    use crate::semantic::FieldSlice;
    use crate::types::TextRange;

    fn metadata(names: &[&str]) -> ScriptingMetadata {
        let mut all = vec![None];
        all.extend(names.iter().map(|n| Some(*n)));
        ScriptingMetadata::parse(all, ParseOptions::default())
    }

    fn payload_field() -> Vec<FieldRange> {
        vec![FieldRange::new("payload", TextRange::new(0, 40))]
    }

    #[test]
    fn test_extracts_roles() {
        // "HMI MediaService play RQ"
        let meta = metadata(&["UCL", "US", "UM", "URT_and_red"]);
        let matches = vec![
            Match::new("HMI", TextRange::new(0, 2), 1),
            Match::new("MediaService", TextRange::new(4, 15), 2),
            Match::new("play", TextRange::new(17, 20), 3),
            Match::new("RQ", TextRange::new(22, 23), 4),
        ];
        let tree = MatchTree::build(&matches);
        let outcome = extract_sequence(&tree, &matches, &payload_field(), &meta);

        assert!(outcome.missing_roles.is_empty());
        assert!(!outcome.duplicate_role);
        let item = outcome.item.unwrap();
        assert_eq!(
            item.first(SequenceRole::Service),
            Some(&RoleValue::Fields(vec![FieldSlice {
                field: 0,
                from: 4,
                to: 15,
                add_separator: false
            }]))
        );
        assert!(item.first(SequenceRole::Request).is_some());
    }

    #[test]
    fn test_missing_method_yields_no_item() {
        let meta = metadata(&["UCL", "US", "URT", "UM"]);
        // method group (4) did not match in this record
        let matches = vec![
            Match::new("HMI", TextRange::new(0, 2), 1),
            Match::new("Svc", TextRange::new(4, 6), 2),
            Match::new("RQ", TextRange::new(8, 9), 3),
        ];
        let tree = MatchTree::build(&matches);
        let outcome = extract_sequence(&tree, &matches, &payload_field(), &meta);

        assert!(outcome.item.is_none());
        assert_eq!(outcome.missing_roles, vec![SequenceRole::Method]);
    }

    #[test]
    fn test_literal_override() {
        let meta = metadata(&["UCL_Navigation", "US", "UM", "UEV"]);
        let matches = vec![
            Match::new("x", TextRange::new(0, 0), 1),
            Match::new("Svc", TextRange::new(2, 4), 2),
            Match::new("m", TextRange::new(6, 6), 3),
            Match::new("EV", TextRange::new(8, 9), 4),
        ];
        let tree = MatchTree::build(&matches);
        let item = extract_sequence(&tree, &matches, &payload_field(), &meta)
            .item
            .unwrap();
        assert_eq!(
            item.first(SequenceRole::Client),
            Some(&RoleValue::Custom("Navigation".to_string()))
        );
    }

    #[test]
    fn test_duplicate_request_type_flagged() {
        let meta = metadata(&["UCL", "US", "UM", "URT", "URS"]);
        let matches = vec![
            Match::new("c", TextRange::new(0, 0), 1),
            Match::new("s", TextRange::new(2, 2), 2),
            Match::new("m", TextRange::new(4, 4), 3),
            Match::new("RQ", TextRange::new(6, 7), 4),
            Match::new("RP", TextRange::new(9, 10), 5),
        ];
        let tree = MatchTree::build(&matches);
        let outcome = extract_sequence(&tree, &matches, &payload_field(), &meta);
        assert!(outcome.item.is_some());
        assert!(outcome.duplicate_role);
    }

    #[test]
    fn test_no_request_type_reports_all_three() {
        let meta = metadata(&["UCL", "US", "UM", "URT"]);
        let matches = vec![
            Match::new("c", TextRange::new(0, 0), 1),
            Match::new("s", TextRange::new(2, 2), 2),
            Match::new("m", TextRange::new(4, 4), 3),
        ];
        let tree = MatchTree::build(&matches);
        let outcome = extract_sequence(&tree, &matches, &payload_field(), &meta);
        assert_eq!(
            outcome.missing_roles,
            vec![SequenceRole::Request, SequenceRole::Response, SequenceRole::Event]
        );
    }
}
