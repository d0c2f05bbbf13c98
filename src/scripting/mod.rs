//! Scripting metadata embedded in capture-group names
//!
//! Group names double as a small annotation language. A name is split on
//! `_and_` (case-insensitive) into tokens, and every token is independently
//! tried as:
//! - an explicit color: `RGB_<r>_<g>_<b>` or a named color such as `red`
//! - a variable name: `VAR_<ident>`
//! - a sequence-diagram role: `UCL`, `US_MyService`, ...
//! - a plot role: `PYData_cpu_1`, `PARType_cpu_linear`, ...
//!
//! Unknown tokens are ignored. The parse happens once per compiled pattern and
//! produces one immutable [`ScriptingAnnotation`] per capture-group index.

pub mod plot;
pub mod sequence;

pub use plot::{AxisType, PlotPatternInfo, PlotRole, PlotRoleKind, PlotRoleParams};
pub use sequence::{SequenceRole, SequenceRoleKind};

use crate::palette::Rgb;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Delimiter between tokens of a group name
pub const SCRIPTING_DELIMITER: &str = "_and_";

static DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)_and_").expect("Valid scripting delimiter regex"));

static RGB_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)RGB_([0-9]{1,3})_([0-9]{1,3})_([0-9]{1,3})").expect("Valid RGB token regex")
});

static VAR_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)VAR_([\w\d]+)").expect("Valid variable token regex"));

static ORDERING_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^GVI_?([0-9]+)$").expect("Valid ordering token regex"));

/// Named colors usable as group-name tokens (lower case)
const NAMED_COLORS: &[(&str, Rgb)] = &[
    ("ok", Rgb::new(0, 150, 0)),
    ("warning", Rgb::new(150, 150, 0)),
    ("error", Rgb::new(150, 0, 0)),
    ("black", Rgb::new(0, 0, 0)),
    ("white", Rgb::new(255, 255, 255)),
    ("red", Rgb::new(255, 0, 0)),
    ("lime", Rgb::new(0, 255, 0)),
    ("blue", Rgb::new(0, 0, 255)),
    ("yellow", Rgb::new(255, 255, 0)),
    ("snow", Rgb::new(255, 250, 250)),
    ("dim_gray", Rgb::new(105, 105, 105)),
    ("gray", Rgb::new(128, 128, 128)),
    ("dark_gray", Rgb::new(169, 169, 169)),
    ("silver", Rgb::new(192, 192, 192)),
    ("light_gray", Rgb::new(211, 211, 211)),
    ("gainsboro", Rgb::new(220, 220, 220)),
    ("white_smoke", Rgb::new(245, 245, 245)),
];

/// Look up a named color, case-insensitive
pub fn named_color(token: &str) -> Option<Rgb> {
    let lower = token.to_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, color)| *color)
}

/// Which optional role families to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub sequence: bool,
    pub plot: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sequence: true,
            plot: true,
        }
    }
}

/// Annotation parsed from one capture-group name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptingAnnotation {
    /// Explicit highlighting color, overrides palette assignment
    pub color: Option<Rgb>,
    /// Logical variable name
    pub var_name: Option<String>,
    /// Sequence-diagram roles with their optional literal override
    pub sequence_roles: BTreeMap<SequenceRole, Option<String>>,
    /// Plot roles with their sub-parameters
    pub plot_roles: BTreeMap<PlotRole, PlotRoleParams>,
}

impl ScriptingAnnotation {
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.var_name.is_none()
            && self.sequence_roles.is_empty()
            && self.plot_roles.is_empty()
    }
}

fn split_tokens(group_name: &str) -> impl Iterator<Item = &str> {
    DELIMITER.split(group_name).filter(|token| !token.is_empty())
}

fn parse_color(token: &str) -> Option<Rgb> {
    match RGB_TOKEN.captures(token) {
        Some(caps) => {
            let blue = caps.get(3)?;
            if blue.end() != token.len() {
                return None;
            }
            let channel = |i: usize| -> Option<i64> { caps.get(i)?.as_str().parse().ok() };
            Some(Rgb::clamped(channel(1)?, channel(2)?, channel(3)?))
        }
        None => named_color(token),
    }
}

fn parse_var(token: &str) -> Option<String> {
    VAR_TOKEN
        .captures(token)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse one capture-group name into its annotation
pub fn parse_group_name(group_name: &str, options: ParseOptions) -> ScriptingAnnotation {
    let mut annotation = ScriptingAnnotation::default();

    for token in split_tokens(group_name) {
        if annotation.color.is_none() {
            annotation.color = parse_color(token);
        }

        if annotation.var_name.is_none() {
            annotation.var_name = parse_var(token);
        }

        if options.sequence {
            if let Some((role, literal)) = sequence::parse_token(token) {
                annotation.sequence_roles.insert(role, literal);
            }
        }

        if options.plot {
            if let Some((role, params)) = plot::parse_token(token) {
                annotation.plot_roles.insert(
                    role,
                    PlotRoleParams {
                        group_name: group_name.to_string(),
                        params,
                    },
                );
            }
        }
    }

    annotation
}

/// Explicit ordering index for grouped views: a `GVI_<n>` token, first wins
pub fn ordering_index(group_name: &str) -> Option<u32> {
    split_tokens(group_name).find_map(|token| {
        ORDERING_TOKEN
            .captures(token)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

/// Outcome of a schema or parameter check, with readable reasons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    issues: Vec<String>,
}

impl ConsistencyReport {
    pub fn consistent() -> Self {
        Self::default()
    }

    pub fn fail(&mut self, issue: String) {
        self.issues.push(issue);
    }

    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[String] {
        &self.issues
    }

    /// All issues joined for display
    pub fn describe(&self) -> String {
        if self.issues.is_empty() {
            "consistent".to_string()
        } else {
            self.issues
                .iter()
                .map(|issue| format!("<{}>", issue))
                .collect::<Vec<_>>()
                .join(" ")
        }
    }
}

/// Annotations of every capture group of one compiled pattern
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptingMetadata {
    items: Vec<ScriptingAnnotation>,
    ordering: Vec<Option<u32>>,
    plot_info: PlotPatternInfo,
}

impl ScriptingMetadata {
    /// Parse the group names of a pattern, indexed by group number.
    ///
    /// Index 0 is the implicit whole-match group; unnamed groups are `None`.
    pub fn parse<'a, I>(group_names: I, options: ParseOptions) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut items = Vec::new();
        let mut ordering = Vec::new();

        for name in group_names {
            match name {
                Some(name) => {
                    items.push(parse_group_name(name, options));
                    ordering.push(ordering_index(name));
                }
                None => {
                    items.push(ScriptingAnnotation::default());
                    ordering.push(None);
                }
            }
        }

        let plot_info = plot::analyze_pattern(&items);

        Self {
            items,
            ordering,
            plot_info,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn annotation(&self, group: usize) -> Option<&ScriptingAnnotation> {
        self.items.get(group)
    }

    pub fn items(&self) -> &[ScriptingAnnotation] {
        &self.items
    }

    /// Explicit color of a group, if scripted
    pub fn color(&self, group: usize) -> Option<Rgb> {
        self.items.get(group).and_then(|item| item.color)
    }

    pub fn ordering_index(&self, group: usize) -> Option<u32> {
        self.ordering.get(group).copied().flatten()
    }

    pub fn has_any_sequence_role(&self) -> bool {
        self.items.iter().any(|item| !item.sequence_roles.is_empty())
    }

    /// Sequence roles declared by a set of groups
    pub fn sequence_roles_of<'a, I>(&self, groups: I) -> BTreeSet<SequenceRole>
    where
        I: IntoIterator<Item = &'a usize>,
    {
        groups
            .into_iter()
            .filter_map(|group| self.items.get(*group))
            .flat_map(|item| item.sequence_roles.keys().copied())
            .collect()
    }

    /// Whether the pattern as a whole can yield sequence-diagram items
    pub fn sequence_consistency(&self) -> ConsistencyReport {
        let all: Vec<usize> = (0..self.items.len()).collect();
        sequence::check_schema(&self.sequence_roles_of(all.iter()))
    }

    pub fn has_any_plot_role(&self) -> bool {
        self.items.iter().any(|item| !item.plot_roles.is_empty())
    }

    /// Plot roles declared by a set of groups
    pub fn plot_roles_of<'a, I>(&self, groups: I) -> BTreeSet<PlotRole>
    where
        I: IntoIterator<Item = &'a usize>,
    {
        groups
            .into_iter()
            .filter_map(|group| self.items.get(*group))
            .flat_map(|item| item.plot_roles.keys().copied())
            .collect()
    }

    /// Whether the pattern as a whole can yield plot items
    pub fn plot_consistency(&self) -> &ConsistencyReport {
        &self.plot_info.report
    }

    pub fn plot_info(&self) -> &PlotPatternInfo {
        &self.plot_info
    }

    pub fn plot_axis_types(&self) -> &BTreeMap<String, AxisType> {
        &self.plot_info.axis_types
    }
}
