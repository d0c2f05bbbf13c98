//! Plot extraction

use super::{matched_groups, RoleValue};
use crate::scripting::plot::strings_to_double;
use crate::scripting::{PlotRole, ScriptingMetadata};
use crate::tree::{MatchTree, ROOT};
use crate::types::{FieldRange, Match};
use serde::{Deserialize, Serialize};

/// One plot role resolved against one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotEntry {
    pub role: PlotRole,
    /// Sub-parameters from the group name
    pub params: Vec<String>,
    pub value: RoleValue,
    /// Numeric reading for data and axis-bound roles
    pub numeric: Option<f64>,
}

/// Plot data of one record, entries in pre-order of the match tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotItem {
    pub entries: Vec<PlotEntry>,
}

impl PlotItem {
    pub fn entries_of(&self, role: PlotRole) -> impl Iterator<Item = &PlotEntry> {
        self.entries.iter().filter(move |entry| entry.role == role)
    }
}

fn numeric_value(role: PlotRole, params: &[String], matched: &str) -> Option<f64> {
    match role {
        PlotRole::XMax | PlotRole::XMin | PlotRole::YMax | PlotRole::YMin => {
            let int_part = params.get(1)?;
            let frac_part = params.get(2).map(String::as_str).unwrap_or("0");
            let value = strings_to_double(int_part, frac_part)?;
            let negative = params
                .get(3)
                .map(|p| p.eq_ignore_ascii_case("neg"))
                .unwrap_or(false);
            Some(if negative { -value } else { value })
        }
        PlotRole::XData | PlotRole::YData => match params.get(2) {
            Some(value) => value.parse().ok(),
            None => matched.trim().parse().ok(),
        },
        _ => None,
    }
}

/// Extract the plot item of one record.
///
/// Returns `None` when the pattern's plot roles are inconsistent or when the
/// record's matched roles cover none of the required role sets.
pub fn extract_plot(
    tree: &MatchTree<'_>,
    matches: &[Match],
    fields: &[FieldRange],
    metadata: &ScriptingMetadata,
) -> Option<PlotItem> {
    let info = metadata.plot_info();
    if !info.report.is_consistent() || info.required_sets.is_empty() {
        return None;
    }

    let groups = matched_groups(matches);
    let present = metadata.plot_roles_of(groups.iter());
    if !info
        .required_sets
        .iter()
        .any(|required| required.is_subset(&present))
    {
        return None;
    }

    let mut item = PlotItem::default();
    for id in tree.pre_order() {
        if id == ROOT {
            continue;
        }
        let Some(m) = tree.item(id) else { continue };
        let Some(annotation) = metadata.annotation(m.group) else {
            continue;
        };

        for (role, params) in &annotation.plot_roles {
            item.entries.push(PlotEntry {
                role: *role,
                params: params.params.clone(),
                value: RoleValue::locate(m, fields),
                numeric: numeric_value(*role, &params.params, &m.text),
            });
        }
    }

    Some(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::ParseOptions;
    use crate::types::TextRange;

    fn metadata(names: &[&str]) -> ScriptingMetadata {
        let mut all = vec![None];
        all.extend(names.iter().map(|n| Some(*n)));
        ScriptingMetadata::parse(all, ParseOptions::default())
    }

    fn field() -> Vec<FieldRange> {
        vec![FieldRange::new("payload", TextRange::new(0, 30))]
    }

    #[test]
    fn test_extracts_line_plot() {
        // "cpu load 42.5"
        let meta = metadata(&["PGN_cpu_1_load", "PYData_cpu_1"]);
        assert!(meta.plot_consistency().is_consistent());

        let matches = vec![
            Match::new("cpu load", TextRange::new(0, 7), 1),
            Match::new("42.5", TextRange::new(9, 12), 2),
        ];
        let tree = MatchTree::build(&matches);
        let item = extract_plot(&tree, &matches, &field(), &meta).unwrap();

        assert_eq!(item.entries.len(), 2);
        let data: Vec<&PlotEntry> = item.entries_of(PlotRole::YData).collect();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].numeric, Some(42.5));
        assert_eq!(data[0].params, vec!["cpu".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_record_missing_mandatory_role() {
        let meta = metadata(&["PGN_cpu_1", "PYData_cpu_1"]);
        let matches = vec![Match::new("cpu", TextRange::new(0, 2), 1)];
        let tree = MatchTree::build(&matches);
        assert!(extract_plot(&tree, &matches, &field(), &meta).is_none());
    }

    #[test]
    fn test_inconsistent_pattern_yields_nothing() {
        let meta = metadata(&["PYData_cpu_1"]);
        assert!(!meta.plot_consistency().is_consistent());
        let matches = vec![Match::new("1", TextRange::new(0, 0), 1)];
        let tree = MatchTree::build(&matches);
        assert!(extract_plot(&tree, &matches, &field(), &meta).is_none());
    }

    #[test]
    fn test_axis_bounds_numeric() {
        let params = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        assert_eq!(
            numeric_value(PlotRole::YMax, &params(&["cpu", "100", "5"]), ""),
            Some(100.5)
        );
        assert_eq!(
            numeric_value(PlotRole::YMin, &params(&["cpu", "2", "25", "neg"]), ""),
            Some(-2.25)
        );
        assert_eq!(
            numeric_value(PlotRole::XData, &params(&["cpu", "1"]), " 7 "),
            Some(7.0)
        );
        assert_eq!(numeric_value(PlotRole::GraphName, &params(&["cpu", "1"]), "1"), None);
    }
}
