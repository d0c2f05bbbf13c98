//! Record sources
//!
//! A source turns a position into a decoded [`Record`]. Positions are in the
//! source's visible coordinates: for a filtered source position `i` is the
//! `i`-th record that passed the filter, and the returned record carries its
//! real id.

pub mod file;
pub mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use crate::error::Result;
use crate::types::{FieldRange, RecordId, TextRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Real id within the unfiltered source
    pub id: RecordId,
    pub text: String,
    pub size_bytes: u64,
    pub timestamp: Option<DateTime<Utc>>,
    /// Disjoint named ranges of `text`
    pub fields: Vec<FieldRange>,
}

impl Record {
    /// Record whose whole text is a single `payload` field
    pub fn from_text(id: RecordId, text: impl Into<String>) -> Self {
        let text = text.into();
        let fields = if text.is_empty() {
            Vec::new()
        } else {
            vec![FieldRange::new("payload", TextRange::new(0, text.len() - 1))]
        };
        Self {
            id,
            size_bytes: text.len() as u64,
            text,
            timestamp: None,
            fields,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Text of a field, if the index is valid
    pub fn field_text(&self, index: usize) -> Option<&str> {
        let field = self.fields.get(index)?;
        self.text.get(field.range.as_slice_range())
    }
}

/// Record text assembled from columns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLayout {
    pub text: String,
    pub fields: Vec<FieldRange>,
}

impl FieldLayout {
    /// Join `(name, value)` columns with `separator`.
    ///
    /// Empty columns still contribute their separator but get no field range.
    pub fn join<'a, I>(columns: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut layout = FieldLayout::default();
        for (index, (name, value)) in columns.into_iter().enumerate() {
            if index > 0 {
                layout.text.push_str(separator);
            }
            if !value.is_empty() {
                let from = layout.text.len();
                layout.text.push_str(value);
                layout
                    .fields
                    .push(FieldRange::new(name, TextRange::new(from, layout.text.len() - 1)));
            }
        }
        layout
    }

    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            size_bytes: self.text.len() as u64,
            text: self.text,
            timestamp: None,
            fields: self.fields,
        }
    }
}

/// Read access to an ordered, possibly growing sequence of records.
///
/// Implementations must allow concurrent reads of disjoint positions from
/// several worker threads.
pub trait RecordSource: Send + Sync {
    /// Number of visible records
    fn size(&self) -> Result<u64>;

    /// Record at a visible position
    fn get(&self, position: u64) -> Result<Record>;

    fn is_filtered(&self) -> bool {
        false
    }

    /// Real id of the record at a visible position
    fn real_position_of(&self, position: u64) -> RecordId {
        position
    }

    /// Translate a range of real ids into visible positions
    fn normalize_range(&self, range: Range<RecordId>) -> Range<u64> {
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_columns() {
        let layout = FieldLayout::join(
            [("ecu", "ECU1"), ("apid", ""), ("payload", "hello world")],
            " ",
        );
        assert_eq!(layout.text, "ECU1  hello world");
        assert_eq!(layout.fields.len(), 2);
        assert_eq!(layout.fields[0].range, TextRange::new(0, 3));
        assert_eq!(layout.fields[1].name, "payload");
        assert_eq!(layout.fields[1].range, TextRange::new(6, 16));

        let record = layout.into_record(7);
        assert_eq!(record.field_text(1), Some("hello world"));
        assert_eq!(record.size_bytes, 17);
    }

    #[test]
    fn test_from_text_single_payload() {
        let record = Record::from_text(0, "abc");
        assert_eq!(record.fields.len(), 1);
        assert_eq!(record.fields[0].range, TextRange::new(0, 2));
        assert!(Record::from_text(1, "").fields.is_empty());
    }
}
