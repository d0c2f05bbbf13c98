//! Core data types shared by the analyzer layers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record within its source
pub type RecordId = u64;

/// Inclusive range of byte offsets `[from, to]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub from: usize,
    pub to: usize,
}

impl TextRange {
    pub const fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Number of offsets covered
    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from) + 1
    }

    /// Always false: an inclusive range covers at least one offset
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `other` lies entirely inside `self`
    pub fn contains(&self, other: &TextRange) -> bool {
        self.from <= other.from && other.to <= self.to
    }

    pub fn intersects(&self, other: &TextRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Intersection of both ranges
    pub fn clip(&self, bounds: &TextRange) -> Option<TextRange> {
        if self.intersects(bounds) {
            Some(TextRange::new(
                self.from.max(bounds.from),
                self.to.min(bounds.to),
            ))
        } else {
            None
        }
    }

    /// Shift the range so that `origin` becomes offset 0
    pub fn relative_to(&self, origin: usize) -> TextRange {
        TextRange::new(self.from - origin, self.to - origin)
    }

    /// Half-open equivalent, for slicing
    pub fn as_slice_range(&self) -> std::ops::Range<usize> {
        self.from..self.to + 1
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Named sub-range of a record (one logical column)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRange {
    pub name: String,
    pub range: TextRange,
}

impl FieldRange {
    pub fn new(name: impl Into<String>, range: TextRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

/// One capture-group hit within one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Captured text
    pub text: String,
    /// Offsets into the whole record text
    pub range: TextRange,
    /// Capture-group index in the compiled pattern
    pub group: usize,
}

impl Match {
    pub fn new(text: impl Into<String>, range: TextRange, group: usize) -> Self {
        Self {
            text: text.into(),
            range,
            group,
        }
    }
}
