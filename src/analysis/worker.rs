//! Blocking worker scanning one contiguous sub-range

use super::{analyze_record, AnalysisContext, RecordResult};
use crate::source::RecordSource;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Event sent from a worker to its request driver
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// `processed` records scanned since the previous batch
    Batch {
        worker: usize,
        processed: u64,
        results: Vec<RecordResult>,
    },
    Failed {
        worker: usize,
        error: String,
    },
}

pub(crate) struct WorkerJob {
    pub index: usize,
    pub source: Arc<dyn RecordSource>,
    pub range: Range<u64>,
    pub context: Arc<AnalysisContext>,
    pub chunk_size: usize,
    pub cancelled: Arc<AtomicBool>,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
}

impl WorkerJob {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn flush(&self, processed: &mut u64, results: &mut Vec<RecordResult>) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let event = WorkerEvent::Batch {
            worker: self.index,
            processed: std::mem::take(processed),
            results: std::mem::take(results),
        };
        self.events.send(event).is_ok()
    }

    /// Scan the range record by record.
    ///
    /// The cancel flag is checked before every pull and before every batch,
    /// so a cancelled worker stops after the record it is working on.
    pub(crate) fn run(self) {
        debug!(
            "Worker {} scanning [{}, {})",
            self.index, self.range.start, self.range.end
        );

        let chunk_size = self.chunk_size.max(1) as u64;
        let mut processed = 0u64;
        let mut results = Vec::new();

        for position in self.range.clone() {
            if self.is_cancelled() {
                debug!("Worker {} cancelled at position {}", self.index, position);
                return;
            }

            let record = match self.source.get(position) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Worker {} failed at position {}: {}", self.index, position, e);
                    let _ = self.events.send(WorkerEvent::Failed {
                        worker: self.index,
                        error: e.to_string(),
                    });
                    return;
                }
            };

            if let Some(result) = analyze_record(&record, &self.context) {
                results.push(result);
            }
            processed += 1;

            if processed == chunk_size && !self.flush(&mut processed, &mut results) {
                return;
            }
        }

        if processed > 0 || !results.is_empty() {
            self.flush(&mut processed, &mut results);
        }
    }
}
