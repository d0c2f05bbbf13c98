//! Plot roles carried by capture-group names
//!
//! A plot token is a role identifier optionally followed by `_` and
//! `_`-separated sub-parameters, e.g. `PYData_cpu_1` or `PXMx_cpu_100_5`.
//! Each role declares an ordered parameter list; parameters are validated
//! once per pattern.

use super::{ConsistencyReport, ScriptingAnnotation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Role of a capture group in plot extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlotRole {
    AxisRectType,
    AxisRectLabel,
    XMax,
    XMin,
    YMax,
    YMin,
    XName,
    YName,
    XUnit,
    YUnit,
    GraphName,
    GraphMetadata,
    XTimestamp,
    XData,
    YTimestamp,
    YData,
    GanttEventId,
    GanttEvent,
}

/// How a role participates in the per-record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotRoleKind {
    Optional,
    /// Required by every non-Gantt axis
    MandatoryNonGantt,
    /// Required by every Gantt axis
    MandatoryGantt,
}

/// Axis rectangle type selected by `PARType`
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum AxisType {
    Gantt,
    Point,
    #[default]
    Linear,
}

impl AxisType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gantt" => Some(AxisType::Gantt),
            "point" => Some(AxisType::Point),
            "linear" => Some(AxisType::Linear),
            _ => None,
        }
    }
}

type Validator = fn(&str) -> std::result::Result<(), String>;

/// Declaration of one positional role parameter
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    validator: Option<Validator>,
}

const fn required(name: &'static str, validator: Option<Validator>) -> ParameterSpec {
    ParameterSpec {
        name,
        required: true,
        validator,
    }
}

const fn optional(name: &'static str, validator: Option<Validator>) -> ParameterSpec {
    ParameterSpec {
        name,
        required: false,
        validator,
    }
}

fn validate_int(value: &str) -> std::result::Result<(), String> {
    value
        .parse::<i32>()
        .map(|_| ())
        .map_err(|_| format!("Wrong literal '{}' provided. It is not convertible to integer.", value))
}

fn validate_double(value: &str) -> std::result::Result<(), String> {
    value
        .parse::<f64>()
        .map(|_| ())
        .map_err(|_| format!("Wrong literal '{}' provided. It is not convertible to double.", value))
}

fn validate_axis_type(value: &str) -> std::result::Result<(), String> {
    AxisType::parse(value).map(|_| ()).ok_or_else(|| {
        format!(
            "Wrong literal '{}' provided. Expected values for the 'axisRectType' parameter are: GANTT, POINT, LINEAR.",
            value
        )
    })
}

fn validate_neg(value: &str) -> std::result::Result<(), String> {
    if value.eq_ignore_ascii_case("neg") {
        Ok(())
    } else {
        Err(format!(
            "Wrong literal '{}' provided. Expected value for the 'neg' parameter is: neg.",
            value
        ))
    }
}

fn validate_event_type(value: &str) -> std::result::Result<(), String> {
    if value.eq_ignore_ascii_case("start") || value.eq_ignore_ascii_case("end") {
        Ok(())
    } else {
        Err(format!(
            "Wrong literal '{}' provided. Expected values for the 'eventType' parameter are: start, end.",
            value
        ))
    }
}

const TIME_FORMAT_CHARS: &str = "0123456789wyMdHmsf";

fn validate_time_format(value: &str) -> std::result::Result<(), String> {
    let mut redundant = String::new();
    for c in value.chars() {
        if !TIME_FORMAT_CHARS.contains(c) && !redundant.contains(c) {
            redundant.push(c);
        }
    }
    if value.is_empty() || !redundant.is_empty() {
        Err(format!(
            "Provided literal should contain only \"0-9wyMdHmsf\" characters. The \"{}\" characters are redundant.",
            redundant
        ))
    } else {
        Ok(())
    }
}

const AXIS_RECT_TYPE_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("axisRectType", Some(validate_axis_type)),
];

const AXIS_RECT_LABEL_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("axisRectLabel", None),
];

const MIN_MAX_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("integer_part_value", Some(validate_int)),
    optional("real_part_value", Some(validate_int)),
    optional("neg", Some(validate_neg)),
];

const NAME_PARAMS: &[ParameterSpec] = &[required("axisRectName", None), required("name", None)];

const UNIT_PARAMS: &[ParameterSpec] = &[required("axisRectName", None), required("unit", None)];

const DATA_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("graphId", Some(validate_int)),
    optional("value", Some(validate_double)),
];

const TIME_PARAMS: &[ParameterSpec] = &[required("timeFormat", Some(validate_time_format))];

const GRAPH_NAME_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("graphId", Some(validate_int)),
    optional("name", None),
];

const GRAPH_METADATA_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("graphId", Some(validate_int)),
    required("key", None),
    optional("value", None),
];

const GANTT_EVENT_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("graphId", Some(validate_int)),
    required("eventType", Some(validate_event_type)),
];

const GANTT_EVENT_ID_PARAMS: &[ParameterSpec] = &[
    required("axisRectName", None),
    required("graphId", Some(validate_int)),
];

impl PlotRole {
    pub const ALL: [PlotRole; 18] = [
        PlotRole::AxisRectType,
        PlotRole::AxisRectLabel,
        PlotRole::XMax,
        PlotRole::XMin,
        PlotRole::YMax,
        PlotRole::YMin,
        PlotRole::XName,
        PlotRole::YName,
        PlotRole::XUnit,
        PlotRole::YUnit,
        PlotRole::GraphName,
        PlotRole::GraphMetadata,
        PlotRole::XTimestamp,
        PlotRole::XData,
        PlotRole::YTimestamp,
        PlotRole::YData,
        PlotRole::GanttEventId,
        PlotRole::GanttEvent,
    ];

    /// Identifier used inside group names
    pub fn id(&self) -> &'static str {
        match self {
            PlotRole::AxisRectType => "PARType",
            PlotRole::AxisRectLabel => "PARL",
            PlotRole::XMax => "PXMx",
            PlotRole::XMin => "PXMn",
            PlotRole::YMax => "PYMx",
            PlotRole::YMin => "PYMn",
            PlotRole::XName => "PXN",
            PlotRole::YName => "PYN",
            PlotRole::XUnit => "PXU",
            PlotRole::YUnit => "PYU",
            PlotRole::GraphName => "PGN",
            PlotRole::GraphMetadata => "PGMD",
            PlotRole::XTimestamp => "PXT",
            PlotRole::XData => "PXData",
            PlotRole::YTimestamp => "PYT",
            PlotRole::YData => "PYData",
            PlotRole::GanttEventId => "PGEID",
            PlotRole::GanttEvent => "PGE",
        }
    }

    pub fn kind(&self) -> PlotRoleKind {
        match self {
            PlotRole::YData | PlotRole::GraphName => PlotRoleKind::MandatoryNonGantt,
            PlotRole::GanttEvent => PlotRoleKind::MandatoryGantt,
            _ => PlotRoleKind::Optional,
        }
    }

    pub fn parameters(&self) -> &'static [ParameterSpec] {
        match self {
            PlotRole::AxisRectType => AXIS_RECT_TYPE_PARAMS,
            PlotRole::AxisRectLabel => AXIS_RECT_LABEL_PARAMS,
            PlotRole::XMax | PlotRole::XMin | PlotRole::YMax | PlotRole::YMin => MIN_MAX_PARAMS,
            PlotRole::XName | PlotRole::YName => NAME_PARAMS,
            PlotRole::XUnit | PlotRole::YUnit => UNIT_PARAMS,
            PlotRole::GraphName => GRAPH_NAME_PARAMS,
            PlotRole::GraphMetadata => GRAPH_METADATA_PARAMS,
            PlotRole::XTimestamp | PlotRole::YTimestamp => TIME_PARAMS,
            PlotRole::XData | PlotRole::YData => DATA_PARAMS,
            PlotRole::GanttEventId => GANTT_EVENT_ID_PARAMS,
            PlotRole::GanttEvent => GANTT_EVENT_PARAMS,
        }
    }

    /// Position of a named parameter, case-insensitive
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters()
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Usage string, e.g. `PGN_<axisRectName>_<graphId>_[name]`
    pub fn usage(&self) -> String {
        let mut usage = self.id().to_string();
        for p in self.parameters() {
            if p.required {
                usage.push_str(&format!("_<{}>", p.name));
            } else {
                usage.push_str(&format!("_[{}]", p.name));
            }
        }
        usage
    }

    /// Case-insensitive lookup by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.id().eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for PlotRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Parameters attached to one plot role within one group name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotRoleParams {
    /// Full group name the role was parsed from
    pub group_name: String,
    /// Positional sub-parameters in declaration order
    pub params: Vec<String>,
}

impl PlotRoleParams {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Parameter looked up by its declared name
    pub fn named(&self, role: PlotRole, name: &str) -> Option<&str> {
        role.parameter_index(name).and_then(|i| self.get(i))
    }

    /// Axis rectangle the role refers to, if the role has one
    pub fn axis_rect_name(&self, role: PlotRole) -> Option<&str> {
        self.named(role, "axisRectName")
    }
}

static ROLE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    let ids: Vec<&str> = PlotRole::ALL.iter().map(|role| role.id()).collect();
    Regex::new(&format!(r"(?i)^({})_?([\w\d]*)$", ids.join("|"))).expect("Valid plot role regex")
});

/// Parse one group-name token into a plot role and its sub-parameters
pub(crate) fn parse_token(token: &str) -> Option<(PlotRole, Vec<String>)> {
    let caps = ROLE_TOKEN.captures(token)?;
    let role = PlotRole::from_id(caps.get(1)?.as_str())?;
    let params = caps
        .get(2)
        .map(|m| {
            m.as_str()
                .split('_')
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some((role, params))
}

/// Validate the sub-parameters of one role occurrence.
///
/// Errors name the group and list every missing mandatory parameter, an
/// excess of parameters, or the first parameter that failed validation.
pub fn check_parameters(role: PlotRole, params: &PlotRoleParams) -> std::result::Result<(), String> {
    let specs = role.parameters();
    let mandatory: Vec<&ParameterSpec> = specs.iter().filter(|p| p.required).collect();
    let given = params.params.len();

    if given < mandatory.len() {
        let missing: Vec<String> = mandatory[given..]
            .iter()
            .map(|p| format!("'{}'", p.name))
            .collect();
        let noun = if missing.len() > 1 {
            "mandatory parameters"
        } else {
            "mandatory parameter"
        };
        return Err(format!(
            "'{}' has {} {} missing",
            params.group_name,
            missing.join(" and "),
            noun
        ));
    }

    if given > specs.len() {
        return Err(format!(
            "'{}' has '{}' parameters. Expected maximum number of parameters - '{}'",
            params.group_name,
            given,
            specs.len()
        ));
    }

    for (spec, value) in specs.iter().zip(params.params.iter()) {
        if let Some(validator) = spec.validator {
            if let Err(msg) = validator(value) {
                return Err(format!(
                    "'{}'. Parameter '{}' did not pass validation: \"{}\"",
                    params.group_name, spec.name, msg
                ));
            }
        }
    }

    Ok(())
}

/// `int + frac / 10^len(frac)`; `None` when either part is not an integer
pub fn strings_to_double(int_part: &str, frac_part: &str) -> Option<f64> {
    let int_value: i32 = int_part.parse().ok()?;
    let frac_value: i32 = frac_part.parse().ok()?;
    let frac_len = frac_part.chars().count() as i32;
    Some(int_value as f64 + frac_value as f64 / 10f64.powi(frac_len))
}

/// Plot-related facts computed once per pattern
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotPatternInfo {
    /// Parameter validation and mandatory-role verdict
    pub report: ConsistencyReport,
    /// Axis type per axis rectangle name (`PARType`, last wins, default LINEAR)
    pub axis_types: BTreeMap<String, AxisType>,
    /// Alternative role sets; a record satisfies the schema if it covers one of them
    pub required_sets: Vec<BTreeSet<PlotRole>>,
}

fn required_roles(kind: PlotRoleKind) -> BTreeSet<PlotRole> {
    PlotRole::ALL
        .iter()
        .copied()
        .filter(|role| role.kind() == kind)
        .collect()
}

/// Validate all plot roles of a pattern and derive its per-record schema.
pub fn analyze_pattern(items: &[ScriptingAnnotation]) -> PlotPatternInfo {
    let mut info = PlotPatternInfo::default();

    let mut any_role = false;
    let mut declared_roles = BTreeSet::new();
    let mut referenced_axes = BTreeSet::new();

    for item in items {
        for (role, params) in &item.plot_roles {
            any_role = true;
            declared_roles.insert(*role);

            if let Err(msg) = check_parameters(*role, params) {
                info.report.fail(msg);
                continue;
            }

            if let Some(axis) = params.axis_rect_name(*role) {
                referenced_axes.insert(axis.to_string());
                if *role == PlotRole::AxisRectType {
                    if let Some(axis_type) = params.get(1).and_then(AxisType::parse) {
                        info.axis_types.insert(axis.to_string(), axis_type);
                    }
                }
            }
        }
    }

    if !any_role {
        info.report.fail("No plot groups found".to_string());
        return info;
    }

    let mut has_gantt = false;
    let mut has_non_gantt = false;
    for axis in &referenced_axes {
        match info.axis_types.get(axis).copied().unwrap_or_default() {
            AxisType::Gantt => has_gantt = true,
            AxisType::Point | AxisType::Linear => has_non_gantt = true,
        }
    }
    if !has_gantt && !has_non_gantt {
        has_non_gantt = true;
    }

    let mut families = Vec::new();
    if has_non_gantt {
        families.push(required_roles(PlotRoleKind::MandatoryNonGantt));
    }
    if has_gantt {
        families.push(required_roles(PlotRoleKind::MandatoryGantt));
    }

    for family in &families {
        for role in family {
            if !declared_roles.contains(role) {
                info.report
                    .fail(format!("Mandatory element {} not found", role.usage()));
            }
        }
    }

    info.required_sets = families;
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(group: &str, values: &[&str]) -> PlotRoleParams {
        PlotRoleParams {
            group_name: group.to_string(),
            params: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_token_with_params() {
        let (role, p) = parse_token("PYData_cpu_1").unwrap();
        assert_eq!(role, PlotRole::YData);
        assert_eq!(p, vec!["cpu".to_string(), "1".to_string()]);

        let (role, p) = parse_token("pgeid_tasks_2").unwrap();
        assert_eq!(role, PlotRole::GanttEventId);
        assert_eq!(p.len(), 2);

        let (role, p) = parse_token("PGE_tasks_2_start").unwrap();
        assert_eq!(role, PlotRole::GanttEvent);
        assert_eq!(p[2], "start");
    }

    #[test]
    fn test_parse_token_without_params() {
        let (role, p) = parse_token("PGN").unwrap();
        assert_eq!(role, PlotRole::GraphName);
        assert!(p.is_empty());
        assert!(parse_token("PLOT").is_none());
    }

    #[test]
    fn test_check_missing_parameters() {
        let err = check_parameters(PlotRole::GanttEvent, &params("PGE_x", &["x"])).unwrap_err();
        assert!(err.contains("'graphId' and 'eventType' mandatory parameters missing"));
    }

    #[test]
    fn test_check_too_many_parameters() {
        let err = check_parameters(PlotRole::XName, &params("PXN_a_b_c", &["a", "b", "c"]))
            .unwrap_err();
        assert!(err.contains("Expected maximum number of parameters - '2'"));
    }

    #[test]
    fn test_check_validator_failure() {
        let err = check_parameters(PlotRole::YData, &params("PYData_cpu_x", &["cpu", "x"]))
            .unwrap_err();
        assert!(err.contains("graphId"));

        let err = check_parameters(PlotRole::XTimestamp, &params("PXT_2Mw2dq", &["2Mw2dq"]))
            .unwrap_err();
        assert!(err.contains("\"q\""));

        assert!(check_parameters(PlotRole::XMax, &params("PXMx_a_100_5_neg", &["a", "100", "5", "neg"])).is_ok());
        assert!(check_parameters(PlotRole::AxisRectType, &params("PARType_a_point", &["a", "point"])).is_ok());
    }

    #[test]
    fn test_strings_to_double() {
        assert_eq!(strings_to_double("12", "5"), Some(12.5));
        assert_eq!(strings_to_double("3", "25"), Some(3.25));
        assert_eq!(strings_to_double("x", "1"), None);
    }

    #[test]
    fn test_usage() {
        assert_eq!(PlotRole::GraphName.usage(), "PGN_<axisRectName>_<graphId>_[name]");
    }
}
