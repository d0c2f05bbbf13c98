//! Pattern engine seam
//!
//! The analyzer never matches text itself; it consumes ordered capture-group
//! hits from a [`CompiledPattern`]. [`RegexEngine`] is the default engine.

use crate::error::{AnalyzerError, Result};
use crate::types::{Match, TextRange};
use regex::Regex;
use std::cmp::Reverse;
use std::sync::Arc;

/// A pattern ready to be applied to record texts
pub trait CompiledPattern: Send + Sync + std::fmt::Debug {
    /// Source text of the pattern
    fn as_str(&self) -> &str;

    /// Name of every capture group by index, group 0 included
    fn group_names(&self) -> Vec<Option<String>>;

    /// Capture-group hits in group order, or `None` when the text does not
    /// match. Group 0 and empty captures are left out.
    fn find(&self, text: &str) -> Option<Vec<Match>>;
}

/// Compiles pattern source into a [`CompiledPattern`]
pub trait PatternEngine: Send + Sync {
    fn compile(&self, pattern: &str) -> Result<Arc<dyn CompiledPattern>>;
}

/// Engine backed by the `regex` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexEngine;

impl RegexEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Reason and pattern offset recovered from a regex diagnostic.
///
/// Syntax errors render as the pattern indented by four spaces, a caret line
/// pointing at the offending span and a trailing `error: <reason>` line.
/// Sort matches so that every match follows the matches enclosing it.
///
/// Captures of a repeated group keep their last iteration, so group index
/// order can run backwards through the text.
pub fn scan_order(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by_key(|m| (m.range.from, Reverse(m.range.to), m.group));
    matches
}

fn parse_diagnostic(message: &str) -> (String, usize) {
    let reason = message
        .lines()
        .find_map(|line| line.strip_prefix("error: "))
        .unwrap_or(message)
        .trim()
        .to_string();

    let offset = message
        .lines()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty() && trimmed.chars().all(|c| c == '^')
        })
        .and_then(|line| line.find('^'))
        .map(|column| column.saturating_sub(4))
        .unwrap_or(0);

    (reason, offset)
}

impl PatternEngine for RegexEngine {
    fn compile(&self, pattern: &str) -> Result<Arc<dyn CompiledPattern>> {
        if pattern.is_empty() {
            return Err(AnalyzerError::InvalidPattern {
                reason: "pattern is empty".to_string(),
                offset: 0,
            });
        }

        let regex = Regex::new(pattern).map_err(|e| {
            let (reason, offset) = parse_diagnostic(&e.to_string());
            AnalyzerError::InvalidPattern { reason, offset }
        })?;

        tracing::debug!(
            "Compiled pattern with {} capture groups",
            regex.captures_len() - 1
        );
        Ok(Arc::new(RegexPattern { regex }))
    }
}

#[derive(Debug)]
struct RegexPattern {
    regex: Regex,
}

impl CompiledPattern for RegexPattern {
    fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    fn group_names(&self) -> Vec<Option<String>> {
        self.regex
            .capture_names()
            .map(|name| name.map(str::to_string))
            .collect()
    }

    fn find(&self, text: &str) -> Option<Vec<Match>> {
        let caps = self.regex.captures(text)?;
        let matches = caps
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(group, capture)| {
                let capture = capture.filter(|c| !c.as_str().is_empty())?;
                Some(Match::new(
                    capture.as_str(),
                    TextRange::new(capture.start(), capture.end() - 1),
                    group,
                ))
            })
            .collect();
        Some(scan_order(matches))
    }
}
