//! Property tests for the coverage splitter and range partitioning

use logscope_core::coverage::{split_coverage, ColorIndexTable, Segment};
use logscope_core::scripting::{ParseOptions, ScriptingMetadata};
use logscope_core::{split_range, Match, MatchTree, Palette, Rgb, TextRange};
use proptest::prelude::*;

fn crosses(a: &TextRange, b: &TextRange) -> bool {
    a.intersects(b) && !a.contains(b) && !b.contains(a)
}

/// Nested-or-disjoint matches in engine scan order (parents before children)
fn non_crossing(candidates: Vec<(usize, usize)>) -> Vec<Match> {
    let mut accepted: Vec<TextRange> = Vec::new();
    for (a, b) in candidates {
        let range = TextRange::new(a.min(b), a.max(b));
        if accepted.iter().all(|other| !crosses(other, &range)) {
            accepted.push(range);
        }
    }
    accepted.sort_by_key(|r| (r.from, std::cmp::Reverse(r.to)));
    accepted
        .into_iter()
        .enumerate()
        .map(|(i, range)| Match::new("x".repeat(range.len()), range, i + 1))
        .collect()
}

fn metadata(group_count: usize) -> ScriptingMetadata {
    let mut names = vec![None];
    for group in 1..=group_count {
        names.push(match group % 3 {
            0 => Some("red"),
            1 => None,
            _ => Some("VAR_value"),
        });
    }
    ScriptingMetadata::parse(names, ParseOptions::default())
}

fn palette() -> Palette {
    Palette::from_gradient(Rgb::new(255, 255, 0), Rgb::new(0, 255, 255), 3)
}

/// Palettes of 0 to 5 colors; size 1 is the mono override
fn palette_strategy() -> impl Strategy<Value = Palette> {
    (0usize..6).prop_map(|size| match size {
        1 => Palette::mono(Rgb::new(150, 150, 0)),
        n => Palette::from_colors((0..n).map(|i| Rgb::new(10 * i as u8, 0, 200)).collect()),
    })
}

fn field_strategy() -> impl Strategy<Value = TextRange> {
    (0usize..45, 0usize..45).prop_map(|(a, b)| TextRange::new(a.min(b), a.max(b)))
}

fn matches_strategy() -> impl Strategy<Value = Vec<Match>> {
    prop::collection::vec((0usize..40, 0usize..40), 0..12).prop_map(non_crossing)
}

/// Same matches in arbitrary order, as an engine may report them
fn shuffled_matches_strategy() -> impl Strategy<Value = Vec<Match>> {
    matches_strategy().prop_shuffle()
}

fn segments_with(matches: &[Match], field: TextRange, pal: &Palette) -> Vec<Segment> {
    let meta = metadata(matches.len());
    let tree = MatchTree::build(matches);
    let table = ColorIndexTable::build(matches, pal.len());
    split_coverage(&tree, field, pal, &table, &meta)
}

fn segments_for(matches: &[Match], field: TextRange) -> Vec<Segment> {
    segments_with(matches, field, &palette())
}

fn assert_gapless(segments: &[Segment], field: TextRange) -> Result<(), TestCaseError> {
    prop_assert!(!segments.is_empty());
    prop_assert_eq!(segments[0].from, 0);
    prop_assert_eq!(segments[segments.len() - 1].to, field.to - field.from);
    for segment in segments {
        prop_assert!(segment.from <= segment.to);
    }
    for pair in segments.windows(2) {
        prop_assert_eq!(pair[1].from, pair[0].to + 1);
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_segments_cover_field_exactly(matches in matches_strategy(), field in field_strategy()) {
        assert_gapless(&segments_for(&matches, field), field)?;
    }

    #[test]
    fn prop_match_order_does_not_matter(
        matches in shuffled_matches_strategy(),
        field in field_strategy(),
        pal in palette_strategy(),
    ) {
        let segments = segments_with(&matches, field, &pal);
        assert_gapless(&segments, field)?;

        let mut sorted = matches.clone();
        sorted.sort_by_key(|m| (m.range.from, std::cmp::Reverse(m.range.to), m.group));
        prop_assert_eq!(segments, segments_with(&sorted, field, &pal));
    }

    #[test]
    fn prop_splitting_is_idempotent(matches in matches_strategy(), field in field_strategy()) {
        prop_assert_eq!(segments_for(&matches, field), segments_for(&matches, field));
    }

    #[test]
    fn prop_innermost_match_owns_each_offset(
        matches in shuffled_matches_strategy(),
        field in field_strategy(),
        pal in palette_strategy(),
    ) {
        let meta = metadata(matches.len());
        let table = ColorIndexTable::build(&matches, pal.len());
        let segments = segments_with(&matches, field, &pal);

        for offset in field.from..=field.to {
            // equal ranges nest by group index, the later group innermost
            let innermost = matches
                .iter()
                .filter(|m| m.range.from <= offset && offset <= m.range.to)
                .min_by_key(|m| (m.range.len(), std::cmp::Reverse(m.group)));

            let relative = offset - field.from;
            let segment = segments
                .iter()
                .find(|s| s.from <= relative && relative <= s.to)
                .expect("offset covered");

            match innermost.and_then(|m| meta.color(m.group)) {
                Some(scripted) => {
                    prop_assert!(segment.explicit);
                    prop_assert_eq!(segment.color, Some(scripted));
                }
                None => {
                    let expected = innermost
                        .and_then(|m| table.get(m.group))
                        .and_then(|i| pal.get(i));
                    prop_assert!(!segment.explicit);
                    prop_assert_eq!(segment.color, expected);
                }
            }
        }
    }

    #[test]
    fn prop_split_range_partitions(count in 1u64..500, workers in 1usize..16, from in 0u64..1000) {
        prop_assume!(count >= workers as u64);
        let parts = split_range(from, count, workers);

        prop_assert_eq!(parts.len(), workers);
        prop_assert_eq!(parts[0].start, from);
        prop_assert_eq!(parts[parts.len() - 1].end, from + count);
        for pair in parts.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        let sizes: Vec<u64> = parts.iter().map(|r| r.end - r.start).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        prop_assert!(max - min <= 1);
        prop_assert!(min >= 1);
    }
}

#[test]
fn test_documented_example() {
    // g1 unscripted, g2 red, g3 unscripted
    let matches = vec![
        Match::new("x".repeat(10), TextRange::new(0, 9), 1),
        Match::new("xxx", TextRange::new(2, 4), 2),
        Match::new("xx", TextRange::new(6, 7), 3),
    ];
    let meta = ScriptingMetadata::parse(
        vec![None, Some("outer"), Some("red"), Some("inner")],
        ParseOptions::default(),
    );
    let pal = palette();
    let tree = MatchTree::build(&matches);
    let table = ColorIndexTable::build(&matches, pal.len());
    let segments = split_coverage(&tree, TextRange::new(0, 9), &pal, &table, &meta);

    let ranges: Vec<(usize, usize)> = segments.iter().map(|s| (s.from, s.to)).collect();
    assert_eq!(ranges, vec![(0, 1), (2, 4), (5, 5), (6, 7), (8, 9)]);
    assert_eq!(segments[1].color, Some(Rgb::new(255, 0, 0)));
    assert_eq!(segments[0].color, segments[2].color);
    assert_eq!(segments[0].color, segments[4].color);
    assert_ne!(segments[3].color, segments[1].color);
}
