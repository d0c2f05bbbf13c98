//! Line-oriented file source
//!
//! The file is indexed by line start offsets. Only complete lines (ending in
//! `\n`) are visible, so a writer appending a partial line is picked up once
//! the line is finished. Decoded records are kept in an LRU cache.
//!
//! A file that shrank, or whose head or last indexed line ending changed, was
//! rewritten rather than appended to and is indexed again from scratch.

use super::{Record, RecordSource};
use crate::error::{AnalyzerError, Result};
use crate::types::{FieldRange, RecordId, TextRange};
use lru::LruCache;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::debug;

/// Leading bytes remembered to recognize a rewritten file
const HEAD_SAMPLE: usize = 64;

#[derive(Debug, Default)]
struct LineIndex {
    /// Start offset of every complete line
    starts: Vec<u64>,
    /// Offset just past the last complete line
    indexed_to: u64,
    /// First bytes of the indexed region
    head: Vec<u8>,
}

impl LineIndex {
    /// The indexed region still reads as it did when indexed
    fn still_matches(&self, file: &mut File) -> Result<bool> {
        if self.indexed_to == 0 {
            return Ok(true);
        }

        let mut head = vec![0u8; self.head.len()];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut head)?;
        if head != self.head {
            return Ok(false);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(self.indexed_to - 1))?;
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }
}

/// Text file exposed as one record per line
pub struct FileSource {
    path: PathBuf,
    index: RwLock<LineIndex>,
    cache: Mutex<LruCache<RecordId, Record>>,
    columns: Option<Regex>,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("path", &self.path)
            .field("columns", &self.columns.as_ref().map(Regex::as_str))
            .finish()
    }
}

impl FileSource {
    /// Open and index a file
    pub fn open(path: impl AsRef<Path>, cache_capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        let source = Self {
            path: path.as_ref().to_path_buf(),
            index: RwLock::new(LineIndex::default()),
            cache: Mutex::new(LruCache::new(capacity)),
            columns: None,
        };
        source.refresh()?;
        Ok(source)
    }

    /// Split lines into fields with a column regex.
    ///
    /// Every participating capture group becomes a field named after the
    /// group (or `column<N>` when unnamed). Lines the regex does not match
    /// fall back to a single `payload` field.
    pub fn with_columns(mut self, columns: &str) -> Result<Self> {
        let regex = Regex::new(columns).map_err(|e| AnalyzerError::InvalidPattern {
            reason: e.to_string(),
            offset: 0,
        })?;
        self.columns = Some(regex);
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index lines appended since the last call.
    ///
    /// A file that shrank or was rewritten is re-indexed from scratch and
    /// its cached records are dropped.
    /// Returns the number of visible lines.
    pub fn refresh(&self) -> Result<u64> {
        let mut index = self
            .index
            .write()
            .map_err(|_| AnalyzerError::SourceRead("line index lock poisoned".to_string()))?;

        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();

        let rewritten = len < index.indexed_to || !index.still_matches(&mut file)?;
        if rewritten {
            debug!("{:?} was rewritten ({} bytes), re-indexing", self.path, len);
            *index = LineIndex::default();
            if let Ok(mut cache) = self.cache.lock() {
                cache.clear();
            }
        }
        if len == index.indexed_to {
            return Ok(index.starts.len() as u64);
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(index.indexed_to))?;

        let mut offset = index.indexed_to;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 || line.last() != Some(&b'\n') {
                break;
            }
            index.starts.push(offset);
            offset += read as u64;
        }
        let added = offset - index.indexed_to;
        index.indexed_to = offset;

        let sample = offset.min(HEAD_SAMPLE as u64) as usize;
        if index.head.len() < sample {
            let mut head = vec![0u8; sample];
            let file = reader.get_mut();
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut head)?;
            index.head = head;
        }

        debug!(
            "Indexed {:?}: {} lines, {} new bytes",
            self.path,
            index.starts.len(),
            added
        );
        Ok(index.starts.len() as u64)
    }

    fn line_bounds(&self, id: RecordId) -> Result<(u64, u64)> {
        let index = self
            .index
            .read()
            .map_err(|_| AnalyzerError::SourceRead("line index lock poisoned".to_string()))?;
        let position = id as usize;
        let start = *index
            .starts
            .get(position)
            .ok_or_else(|| AnalyzerError::SourceRead(format!("line {} out of range", id)))?;
        let end = index
            .starts
            .get(position + 1)
            .copied()
            .unwrap_or(index.indexed_to);
        Ok((start, end))
    }

    fn read_line(&self, id: RecordId) -> Result<Record> {
        let (start, end) = self.line_bounds(id)?;

        let mut file = File::open(&self.path)
            .map_err(|e| AnalyzerError::SourceRead(format!("{:?}: {}", self.path, e)))?;
        file.seek(SeekFrom::Start(start))?;
        let mut raw = vec![0u8; (end - start) as usize];
        file.read_exact(&mut raw)
            .map_err(|e| AnalyzerError::SourceRead(format!("line {}: {}", id, e)))?;

        let size_bytes = raw.len() as u64;
        while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
            raw.pop();
        }
        let text = String::from_utf8_lossy(&raw).into_owned();
        let fields = self.split_fields(&text);

        Ok(Record {
            id,
            text,
            size_bytes,
            timestamp: None,
            fields,
        })
    }

    fn split_fields(&self, text: &str) -> Vec<FieldRange> {
        let columns = self
            .columns
            .as_ref()
            .and_then(|regex| regex.captures(text).map(|caps| (regex, caps)));

        match columns {
            Some((regex, caps)) => regex
                .capture_names()
                .enumerate()
                .skip(1)
                .filter_map(|(i, name)| {
                    let m = caps.get(i).filter(|m| !m.as_str().is_empty())?;
                    let name = name
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("column{}", i));
                    Some(FieldRange::new(name, TextRange::new(m.start(), m.end() - 1)))
                })
                .collect(),
            None if text.is_empty() => Vec::new(),
            None => vec![FieldRange::new("payload", TextRange::new(0, text.len() - 1))],
        }
    }
}

impl RecordSource for FileSource {
    fn size(&self) -> Result<u64> {
        self.refresh()
    }

    fn get(&self, position: u64) -> Result<Record> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(record) = cache.get(&position) {
                return Ok(record.clone());
            }
        }

        let record = self.read_line(position)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(position, record.clone());
        }
        Ok(record)
    }
}
