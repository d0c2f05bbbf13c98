//! Coverage splitting: colored, gapless segmentation of a field
//!
//! Every offset of a field belongs to its innermost enclosing match. A parent
//! match only contributes the parts of its range that none of its children
//! own, and offsets outside every match are left unfilled.

use crate::palette::{Palette, Rgb};
use crate::scripting::ScriptingMetadata;
use crate::tree::{MatchTree, ROOT};
use crate::types::{FieldRange, Match, TextRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One highlighted piece of a field, offsets relative to the field start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub from: usize,
    pub to: usize,
    /// `None` means no fill
    pub color: Option<Rgb>,
    /// Color came from the group name rather than the palette
    pub explicit: bool,
}

impl Segment {
    pub fn range(&self) -> TextRange {
        TextRange::new(self.from, self.to)
    }
}

/// Palette index assigned to each matched group of one record.
///
/// Non-empty matches are ordered by `(from, length)`, ties by group, and
/// receive rotating palette indices in that order, independent of nesting
/// and of the order the engine reported them in. A group keeps the first
/// index it was given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorIndexTable {
    indices: HashMap<usize, usize>,
}

impl ColorIndexTable {
    pub fn build(matches: &[Match], palette_len: usize) -> Self {
        let mut indices = HashMap::new();
        if palette_len == 0 {
            return Self { indices };
        }

        let mut sorted: Vec<&Match> = matches.iter().filter(|m| !m.text.is_empty()).collect();
        sorted.sort_by_key(|m| (m.range.from, m.range.to - m.range.from, m.group));

        for (counter, m) in sorted.into_iter().enumerate() {
            indices.entry(m.group).or_insert(counter % palette_len);
        }

        Self { indices }
    }

    pub fn get(&self, group: usize) -> Option<usize> {
        self.indices.get(&group).copied()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn resolve_color(
    group: usize,
    palette: &Palette,
    table: &ColorIndexTable,
    metadata: &ScriptingMetadata,
) -> (Option<Rgb>, bool) {
    if let Some(color) = metadata.color(group) {
        return (Some(color), true);
    }
    match table.get(group).and_then(|index| palette.get(index)) {
        Some(color) => (Some(color), false),
        None => (None, false),
    }
}

fn push(segments: &mut Vec<Segment>, from: usize, to: usize, color: (Option<Rgb>, bool)) {
    segments.push(Segment {
        from,
        to,
        color: color.0,
        explicit: color.1,
    });
}

/// Split `field` into colored segments using the match tree.
///
/// Post-order traversal: children emit their own segments first, then each
/// node fills the gaps before, between and after its (clipped) children. The
/// root fills the remaining gaps of the field without a color. Results are
/// relative to `field.from` and sorted by start offset.
pub fn split_coverage(
    tree: &MatchTree<'_>,
    field: TextRange,
    palette: &Palette,
    table: &ColorIndexTable,
    metadata: &ScriptingMetadata,
) -> Vec<Segment> {
    let mut segments = Vec::new();

    for id in tree.post_order() {
        let (range, color) = if id == ROOT {
            (field, (None, false))
        } else {
            let Some(m) = tree.item(id) else { continue };
            let Some(clipped) = m.range.clip(&field) else {
                continue;
            };
            (clipped, resolve_color(m.group, palette, table, metadata))
        };

        let children: Vec<TextRange> = tree
            .children(id)
            .iter()
            .filter_map(|child| tree.item(*child))
            .filter_map(|child| child.range.clip(&field))
            .collect();

        let (Some(first), Some(last)) = (children.first(), children.last()) else {
            push(&mut segments, range.from, range.to, color);
            continue;
        };

        if first.from > range.from {
            push(&mut segments, range.from, first.from - 1, color);
        }

        for pair in children.windows(2) {
            if pair[1].from > pair[0].to + 1 {
                push(&mut segments, pair[0].to + 1, pair[1].from - 1, color);
            }
        }

        if last.to < range.to {
            push(&mut segments, last.to + 1, range.to, color);
        }
    }

    for segment in &mut segments {
        segment.from -= field.from;
        segment.to -= field.from;
    }
    segments.sort_by_key(|segment| (segment.from, segment.to));
    segments
}

/// Highlighting of every field a record's matches touch, keyed by field index
pub fn highlight_with_tree(
    tree: &MatchTree<'_>,
    matches: &[Match],
    fields: &[FieldRange],
    palette: &Palette,
    metadata: &ScriptingMetadata,
) -> BTreeMap<usize, Vec<Segment>> {
    let table = ColorIndexTable::build(matches, palette.len());

    fields
        .iter()
        .enumerate()
        .filter(|(_, field)| matches.iter().any(|m| m.range.intersects(&field.range)))
        .map(|(index, field)| {
            (
                index,
                split_coverage(tree, field.range, palette, &table, metadata),
            )
        })
        .collect()
}

/// Convenience wrapper that builds the match tree itself
pub fn highlight_record(
    matches: &[Match],
    fields: &[FieldRange],
    palette: &Palette,
    metadata: &ScriptingMetadata,
) -> BTreeMap<usize, Vec<Segment>> {
    let tree = MatchTree::build(matches);
    highlight_with_tree(&tree, matches, fields, palette, metadata)
}
