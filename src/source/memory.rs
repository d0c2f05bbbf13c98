//! In-memory record source

use super::{Record, RecordSource};
use crate::error::{AnalyzerError, Result};
use crate::types::RecordId;
use std::ops::Range;
use std::sync::{RwLock, RwLockReadGuard};

/// Appendable record store held in memory, with an optional filter.
///
/// The filter is a sorted list of real ids that stay visible.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: RwLock<Vec<Record>>,
    filter: RwLock<Option<Vec<RecordId>>>,
}

fn poisoned<T>(_: T) -> AnalyzerError {
    AnalyzerError::SourceRead("memory source lock poisoned".to_string())
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// One single-field record per line
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = lines
            .into_iter()
            .enumerate()
            .map(|(id, line)| Record::from_text(id as RecordId, line))
            .collect();
        Self {
            records: RwLock::new(records),
            filter: RwLock::new(None),
        }
    }

    /// Append a line, returning its id
    pub fn push_line(&self, line: impl Into<String>) -> Result<RecordId> {
        let mut records = self.records.write().map_err(poisoned)?;
        let id = records.len() as RecordId;
        records.push(Record::from_text(id, line));
        Ok(id)
    }

    /// Append a prepared record; its id is reassigned to the next position
    pub fn push(&self, mut record: Record) -> Result<RecordId> {
        let mut records = self.records.write().map_err(poisoned)?;
        let id = records.len() as RecordId;
        record.id = id;
        records.push(record);
        Ok(id)
    }

    /// Keep only the given real ids visible; `None` removes the filter
    pub fn set_filter(&self, ids: Option<Vec<RecordId>>) -> Result<()> {
        let mut filter = self.filter.write().map_err(poisoned)?;
        *filter = ids.map(|mut ids| {
            ids.sort_unstable();
            ids.dedup();
            ids
        });
        Ok(())
    }

    fn filter(&self) -> Result<RwLockReadGuard<'_, Option<Vec<RecordId>>>> {
        self.filter.read().map_err(poisoned)
    }
}

impl RecordSource for MemorySource {
    fn size(&self) -> Result<u64> {
        if let Some(ids) = self.filter()?.as_ref() {
            return Ok(ids.len() as u64);
        }
        Ok(self.records.read().map_err(poisoned)?.len() as u64)
    }

    fn get(&self, position: u64) -> Result<Record> {
        let id = self.real_position_of(position);
        let records = self.records.read().map_err(poisoned)?;
        records
            .get(id as usize)
            .cloned()
            .ok_or_else(|| AnalyzerError::SourceRead(format!("record {} out of range", id)))
    }

    fn is_filtered(&self) -> bool {
        self.filter().map(|f| f.is_some()).unwrap_or(false)
    }

    fn real_position_of(&self, position: u64) -> RecordId {
        match self.filter() {
            Ok(guard) => match guard.as_ref() {
                Some(ids) => ids.get(position as usize).copied().unwrap_or(RecordId::MAX),
                None => position,
            },
            Err(_) => RecordId::MAX,
        }
    }

    fn normalize_range(&self, range: Range<RecordId>) -> Range<u64> {
        match self.filter() {
            Ok(guard) => match guard.as_ref() {
                Some(ids) => {
                    let start = ids.partition_point(|id| *id < range.start) as u64;
                    let end = ids.partition_point(|id| *id < range.end) as u64;
                    start..end
                }
                None => range,
            },
            Err(_) => range,
        }
    }
}
