//! Analysis coordinator
//!
//! Each submitted request gets a driver task. The driver splits the range,
//! runs one blocking worker per sub-range, folds worker batches into
//! progress notifications and, for continuous requests, keeps polling the
//! source for growth until cancelled.
//!
//! Cancellation is cooperative for workers, but silence is guaranteed on the
//! consumer side: [`NotificationReceiver`] drops every notification of an id
//! once [`AnalysisCoordinator::cancel`] has returned.
//!
//! A driver posts a retirement marker behind its last notification. The
//! receiver forgets a cancelled id when that marker arrives, so the set of
//! silenced ids only holds requests whose messages may still be queued.

use super::worker::{WorkerEvent, WorkerJob};
use super::{AnalysisContext, AnalysisRequest, ProgressNotification, RequestId};
use crate::engine::PatternEngine;
use crate::error::{AnalyzerError, Result};
use crate::source::RecordSource;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

/// Split `[from, from + count)` into `min(workers, count)` contiguous parts.
///
/// Part sizes differ by at most one; the remainder goes to the first parts.
pub fn split_range(from: u64, count: u64, workers: usize) -> Vec<Range<u64>> {
    let parts = (workers.max(1) as u64).min(count);
    if parts == 0 {
        return Vec::new();
    }

    let base = count / parts;
    let remainder = count % parts;
    let mut ranges = Vec::with_capacity(parts as usize);
    let mut start = from;
    for i in 0..parts {
        let len = base + u64::from(i < remainder);
        ranges.push(start..start + len);
        start += len;
    }
    ranges
}

/// Message on the driver to receiver channel
#[derive(Debug)]
enum Envelope {
    Notification(ProgressNotification),
    /// The driver of this id is gone and sends nothing more
    Retired(RequestId),
}

/// Ids whose driver may still have messages queued, and those of them that
/// were cancelled
#[derive(Debug, Default)]
struct Delivery {
    unretired: HashSet<RequestId>,
    silenced: HashSet<RequestId>,
}

type SharedDelivery = Arc<RwLock<Delivery>>;

fn is_cancelled_id(delivery: &SharedDelivery, id: RequestId) -> bool {
    delivery
        .read()
        .map(|state| state.silenced.contains(&id))
        .unwrap_or(true)
}

fn retire(delivery: &SharedDelivery, id: RequestId) {
    if let Ok(mut state) = delivery.write() {
        state.unretired.remove(&id);
        state.silenced.remove(&id);
    }
}

/// Consumer end of the notification stream
pub struct NotificationReceiver {
    receiver: mpsc::UnboundedReceiver<Envelope>,
    delivery: SharedDelivery,
}

impl NotificationReceiver {
    /// Next notification of a request that has not been cancelled.
    ///
    /// Returns `None` once the coordinator and every driver are gone.
    pub async fn recv(&mut self) -> Option<ProgressNotification> {
        loop {
            let envelope = self.receiver.recv().await?;
            if let Some(notification) = self.open(envelope) {
                return Some(notification);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv)
    pub fn try_recv(&mut self) -> Option<ProgressNotification> {
        while let Ok(envelope) = self.receiver.try_recv() {
            if let Some(notification) = self.open(envelope) {
                return Some(notification);
            }
        }
        None
    }

    fn open(&self, envelope: Envelope) -> Option<ProgressNotification> {
        match envelope {
            Envelope::Notification(notification) => {
                (!is_cancelled_id(&self.delivery, notification.request_id)).then_some(notification)
            }
            Envelope::Retired(id) => {
                retire(&self.delivery, id);
                None
            }
        }
    }
}

/// Accepts requests and drives them on a bounded worker pool
pub struct AnalysisCoordinator {
    engine: Arc<dyn PatternEngine>,
    max_workers: usize,
    pool: Arc<Semaphore>,
    next_id: AtomicU64,
    active: Arc<Mutex<HashMap<RequestId, Arc<AtomicBool>>>>,
    delivery: SharedDelivery,
    notifications: mpsc::UnboundedSender<Envelope>,
}

impl AnalysisCoordinator {
    /// Create a coordinator with at most `max_workers` workers running at once
    pub fn new(engine: Arc<dyn PatternEngine>, max_workers: usize) -> (Self, NotificationReceiver) {
        let max_workers = max_workers.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let delivery: SharedDelivery = Arc::new(RwLock::new(Delivery::default()));

        let coordinator = Self {
            engine,
            max_workers,
            pool: Arc::new(Semaphore::new(max_workers)),
            next_id: AtomicU64::new(1),
            active: Arc::new(Mutex::new(HashMap::new())),
            delivery: delivery.clone(),
            notifications: sender,
        };
        let receiver = NotificationReceiver { receiver, delivery };
        (coordinator, receiver)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Validate and start a request.
    ///
    /// Pattern errors and out-of-range requests are returned here and no
    /// worker is started. Must be called from within a Tokio runtime.
    pub fn submit(&self, request: AnalysisRequest) -> Result<RequestId> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AnalyzerError::Other(format!("No Tokio runtime: {}", e)))?;

        let size = request.source.size()?;
        let end = request
            .from
            .checked_add(request.count)
            .ok_or_else(|| AnalyzerError::InvalidRequest("range overflows".to_string()))?;
        if end > size {
            return Err(AnalyzerError::InvalidRequest(format!(
                "range [{}, {}) exceeds source size {}",
                request.from, end, size
            )));
        }

        let pattern = self.engine.compile(&request.pattern)?;
        let context = Arc::new(AnalysisContext::new(pattern, &request.settings));

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        if let Ok(mut active) = self.active.lock() {
            active.insert(id, cancel_flag.clone());
        }
        if let Ok(mut delivery) = self.delivery.write() {
            delivery.unretired.insert(id);
        }

        let workers = request.worker_count.clamp(1, self.max_workers);
        info!(
            "Submitted request {}: [{}, {}) with {} workers{}{}",
            id,
            request.from,
            end,
            workers,
            if request.continuous { ", continuous" } else { "" },
            if request.source.is_filtered() { ", filtered" } else { "" }
        );

        let driver = RequestDriver {
            id,
            source: request.source,
            context,
            workers,
            chunk_size: request.settings.chunk_size,
            poll_interval: request.settings.poll_interval,
            pool: self.pool.clone(),
            cancelled: cancel_flag,
            delivery: self.delivery.clone(),
            notifications: self.notifications.clone(),
            active: self.active.clone(),
        };
        runtime.spawn(driver.run(request.from, request.count, request.continuous));

        Ok(id)
    }

    /// Cancel a request.
    ///
    /// Once this returns, no notification for `id` is observed by the
    /// receiver. Returns whether the request was still active.
    pub fn cancel(&self, id: RequestId) -> bool {
        if let Ok(mut delivery) = self.delivery.write() {
            if delivery.unretired.contains(&id) {
                delivery.silenced.insert(id);
            }
        }
        let flag = self
            .active
            .lock()
            .ok()
            .and_then(|mut active| active.remove(&id));
        match flag {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!("Cancelled request {}", id);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: RequestId) -> bool {
        self.active
            .lock()
            .map(|active| active.contains_key(&id))
            .unwrap_or(false)
    }

    /// Ids of requests still running or live
    pub fn active_requests(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self
            .active
            .lock()
            .map(|active| active.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Number of cancelled ids still filtered by the receiver
    pub fn silenced_count(&self) -> usize {
        self.delivery
            .read()
            .map(|delivery| delivery.silenced.len())
            .unwrap_or(0)
    }

    /// Cancel every active request
    pub fn shutdown(&self) {
        for id in self.active_requests() {
            self.cancel(id);
        }
    }
}

impl Drop for AnalysisCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct RequestDriver {
    id: RequestId,
    source: Arc<dyn RecordSource>,
    context: Arc<AnalysisContext>,
    workers: usize,
    chunk_size: usize,
    poll_interval: Duration,
    pool: Arc<Semaphore>,
    /// Stops workers; raised by `cancel` and by the first worker failure
    cancelled: Arc<AtomicBool>,
    delivery: SharedDelivery,
    notifications: mpsc::UnboundedSender<Envelope>,
    active: Arc<Mutex<HashMap<RequestId, Arc<AtomicBool>>>>,
}

impl Drop for RequestDriver {
    fn drop(&mut self) {
        if self.notifications.send(Envelope::Retired(self.id)).is_err() {
            retire(&self.delivery, self.id);
        }
    }
}

impl RequestDriver {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn notify(&self, notification: ProgressNotification) {
        if !is_cancelled_id(&self.delivery, self.id) {
            let _ = self.notifications.send(Envelope::Notification(notification));
        }
    }

    fn finish(&self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.id);
        }
    }

    async fn run(self, from: u64, count: u64, continuous: bool) {
        let mut percent = 0u8;
        if let Err(error) = self.scan(from..from + count, false, &mut percent).await {
            self.fail(percent, error);
            return;
        }
        if self.is_cancelled() {
            self.finish();
            return;
        }

        if !continuous {
            info!("Request {} completed", self.id);
            self.finish();
            self.notify(ProgressNotification::successful(self.id));
            return;
        }

        self.notify(ProgressNotification::progress(self.id, 100, Vec::new()));
        debug!("Request {} is live", self.id);
        self.live(from + count).await;
    }

    fn fail(&self, percent: u8, error: String) {
        warn!("Request {} failed: {}", self.id, error);
        self.cancelled.store(true, Ordering::SeqCst);
        self.finish();
        self.notify(ProgressNotification::error(self.id, percent, error));
    }

    /// Re-scan whatever the source grew by, until cancelled
    async fn live(self, mut scanned_to: u64) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            if self.is_cancelled() {
                break;
            }

            let source = self.source.clone();
            let size = match tokio::task::spawn_blocking(move || source.size()).await {
                Ok(Ok(size)) => size,
                Ok(Err(e)) => {
                    self.fail(100, e.to_string());
                    return;
                }
                Err(e) => {
                    self.fail(100, format!("Size poll failed: {}", e));
                    return;
                }
            };

            if size < scanned_to {
                self.fail(
                    100,
                    format!("source shrank from {} to {} records", scanned_to, size),
                );
                return;
            }
            if size == scanned_to {
                continue;
            }

            debug!(
                "Request {} scanning new records [{}, {})",
                self.id, scanned_to, size
            );
            let mut percent = 100;
            if let Err(error) = self.scan(scanned_to..size, true, &mut percent).await {
                self.fail(100, error);
                return;
            }
            scanned_to = size;
        }
        self.finish();
    }

    /// Run workers over `range` and forward their batches.
    ///
    /// On the first worker failure siblings are cancelled and the error is
    /// returned; the caller emits the single `Error` notification.
    async fn scan(&self, range: Range<u64>, live: bool, percent: &mut u8) -> std::result::Result<(), String> {
        let total = range.end - range.start;
        let parts = split_range(range.start, total, self.workers);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(parts.len());

        for (index, part) in parts.into_iter().enumerate() {
            if self.is_cancelled() {
                break;
            }
            let permit = self
                .pool
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| format!("Worker pool closed: {}", e))?;
            let job = WorkerJob {
                index,
                source: self.source.clone(),
                range: part,
                context: self.context.clone(),
                chunk_size: self.chunk_size,
                cancelled: self.cancelled.clone(),
                events: events_tx.clone(),
            };
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                job.run();
            }));
        }
        drop(events_tx);

        let mut processed = 0u64;
        while let Some(event) = events_rx.recv().await {
            match event {
                WorkerEvent::Batch {
                    worker,
                    processed: delta,
                    results,
                } => {
                    processed += delta;
                    if !live {
                        *percent = if total == 0 {
                            100
                        } else {
                            (processed.saturating_mul(100) / total).min(100) as u8
                        };
                    }
                    debug!(
                        "Request {}: worker {} sent {} results, {}%",
                        self.id,
                        worker,
                        results.len(),
                        percent
                    );
                    self.notify(ProgressNotification::progress(self.id, *percent, results));
                }
                WorkerEvent::Failed { worker, error } => {
                    warn!("Request {}: worker {} failed", self.id, worker);
                    self.cancelled.store(true, Ordering::SeqCst);
                    return Err(error);
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                self.cancelled.store(true, Ordering::SeqCst);
                return Err(format!("Worker terminated abnormally: {}", e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{RequestSettings, RequestState};
    use crate::engine::RegexEngine;
    use crate::source::MemorySource;

    #[test]
    fn test_split_range_example() {
        let parts = split_range(0, 10, 4);
        let sizes: Vec<u64> = parts.iter().map(|r| r.end - r.start).collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(parts.first().unwrap().start, 0);
        assert_eq!(parts.last().unwrap().end, 10);
    }

    #[test]
    fn test_split_range_fewer_records_than_workers() {
        assert_eq!(split_range(5, 2, 4), vec![5..6, 6..7]);
        assert!(split_range(5, 0, 4).is_empty());
        assert_eq!(split_range(0, 3, 0), vec![0..3]);
    }

    fn coordinator() -> (AnalysisCoordinator, NotificationReceiver) {
        AnalysisCoordinator::new(Arc::new(RegexEngine::new()), 4)
    }

    #[tokio::test]
    async fn test_invalid_pattern_rejected_on_submit() {
        let (coordinator, _rx) = coordinator();
        let source = Arc::new(MemorySource::from_lines(["a"]));
        let result = coordinator.submit(AnalysisRequest::new(source, "(", 0, 1));
        assert!(matches!(result, Err(AnalyzerError::InvalidPattern { .. })));
        assert!(coordinator.active_requests().is_empty());
    }

    #[tokio::test]
    async fn test_range_beyond_source_rejected() {
        let (coordinator, _rx) = coordinator();
        let source = Arc::new(MemorySource::from_lines(["a", "b"]));
        let result = coordinator.submit(AnalysisRequest::new(source, "(a)", 1, 5));
        assert!(matches!(result, Err(AnalyzerError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_ids_increase_from_one() {
        let (coordinator, mut rx) = coordinator();
        let source: Arc<dyn RecordSource> = Arc::new(MemorySource::from_lines(["a1", "b2"]));

        let first = coordinator
            .submit(AnalysisRequest::new(source.clone(), r"(\d)", 0, 2))
            .unwrap();
        let second = coordinator
            .submit(AnalysisRequest::new(source, r"(\d)", 0, 2))
            .unwrap();
        assert_eq!((first, second), (1, 2));

        let mut finished = HashSet::new();
        while finished.len() < 2 {
            let n = rx.recv().await.unwrap();
            if n.state == RequestState::Successful {
                finished.insert(n.request_id);
            }
        }
        assert!(!coordinator.is_active(first));
    }

    #[tokio::test]
    async fn test_cancelled_ids_are_forgotten_once_retired() {
        let (coordinator, mut rx) = coordinator();
        let source = Arc::new(MemorySource::from_lines(["a1", "b2"]));
        let settings = RequestSettings {
            poll_interval: Duration::from_millis(5),
            ..RequestSettings::default()
        };

        let live = coordinator
            .submit(
                AnalysisRequest::new(source.clone(), r"(\d)", 0, 2)
                    .continuous(true)
                    .with_settings(settings),
            )
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().request_id, live);
        assert!(coordinator.cancel(live));
        assert_eq!(coordinator.silenced_count(), 1);

        // The driver leaves live mode on its next poll and retires the id
        let drained = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(drained.is_err());
        assert_eq!(coordinator.silenced_count(), 0);

        let done = coordinator
            .submit(AnalysisRequest::new(source, r"(\d)", 0, 2))
            .unwrap();
        loop {
            if rx.recv().await.unwrap().is_terminal() {
                break;
            }
        }
        assert!(!coordinator.cancel(done));
        let drained = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(drained.is_err());
        assert_eq!(coordinator.silenced_count(), 0);

        // Unknown ids are never recorded
        assert!(!coordinator.cancel(999));
        assert_eq!(coordinator.silenced_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_range_completes() {
        let (coordinator, mut rx) = coordinator();
        let source = Arc::new(MemorySource::from_lines(["a"]));
        let id = coordinator
            .submit(AnalysisRequest::new(source, "(a)", 0, 0))
            .unwrap();
        let n = rx.recv().await.unwrap();
        assert_eq!(n.request_id, id);
        assert_eq!(n.state, RequestState::Successful);
        assert_eq!(n.percent, 100);
    }
}
