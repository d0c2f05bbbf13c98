//! Semantic extraction on top of the match tree
//!
//! Both extractors validate a record's matched groups against a role schema
//! and then walk the tree pre-order, resolving every role-carrying match
//! either to a literal from the group name or to the field sub-ranges it
//! covers.

pub mod plot;
pub mod sequence;

pub use plot::{extract_plot, PlotEntry, PlotItem};
pub use sequence::{extract_sequence, SequenceItem, SequenceOutcome};

use crate::types::{FieldRange, Match};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Part of a match that falls into one field, offsets relative to the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlice {
    /// Index into the record's field list
    pub field: usize,
    pub from: usize,
    pub to: usize,
    /// The match continues past this field's end
    pub add_separator: bool,
}

/// Resolved value of a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleValue {
    /// Literal supplied in the group name
    Custom(String),
    /// Sub-ranges of the record text, one per intersected field
    Fields(Vec<FieldSlice>),
}

impl RoleValue {
    /// Locate the fields a match intersects
    pub fn locate(m: &Match, fields: &[FieldRange]) -> Self {
        let slices = fields
            .iter()
            .enumerate()
            .filter_map(|(index, field)| {
                let clipped = m.range.clip(&field.range)?;
                Some(FieldSlice {
                    field: index,
                    from: clipped.from - field.range.from,
                    to: clipped.to - field.range.from,
                    add_separator: m.range.to > field.range.to,
                })
            })
            .collect();
        RoleValue::Fields(slices)
    }

    /// Reconstruct the value text from the record
    pub fn render(&self, text: &str, fields: &[FieldRange], separator: &str) -> String {
        match self {
            RoleValue::Custom(value) => value.clone(),
            RoleValue::Fields(slices) => {
                let mut rendered = String::new();
                for slice in slices {
                    let Some(field) = fields.get(slice.field) else {
                        continue;
                    };
                    let start = field.range.from + slice.from;
                    let end = field.range.from + slice.to;
                    if let Some(part) = text.get(start..=end) {
                        rendered.push_str(part);
                    }
                    if slice.add_separator {
                        rendered.push_str(separator);
                    }
                }
                rendered
            }
        }
    }
}

/// Distinct group indices that matched in a record
pub fn matched_groups(matches: &[Match]) -> BTreeSet<usize> {
    matches.iter().map(|m| m.group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextRange;

    fn fields() -> Vec<FieldRange> {
        // "ECU1 APP1 hello world"
        vec![
            FieldRange::new("ecu", TextRange::new(0, 3)),
            FieldRange::new("apid", TextRange::new(5, 8)),
            FieldRange::new("payload", TextRange::new(10, 20)),
        ]
    }

    #[test]
    fn test_locate_single_field() {
        let m = Match::new("hello", TextRange::new(10, 14), 1);
        assert_eq!(
            RoleValue::locate(&m, &fields()),
            RoleValue::Fields(vec![FieldSlice {
                field: 2,
                from: 0,
                to: 4,
                add_separator: false
            }])
        );
    }

    #[test]
    fn test_locate_across_fields() {
        let text = "ECU1 APP1 hello world";
        let m = Match::new("APP1 hello", TextRange::new(5, 14), 1);
        let value = RoleValue::locate(&m, &fields());
        match &value {
            RoleValue::Fields(slices) => {
                assert_eq!(slices.len(), 2);
                assert!(slices[0].add_separator);
                assert!(!slices[1].add_separator);
            }
            other => panic!("unexpected value {:?}", other),
        }
        assert_eq!(value.render(text, &fields(), " "), "APP1 hello");
    }

    #[test]
    fn test_custom_render() {
        let value = RoleValue::Custom("Client".to_string());
        assert_eq!(value.render("", &[], " "), "Client");
    }
}
