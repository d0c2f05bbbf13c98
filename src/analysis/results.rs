//! Consumer-side accumulation of record results

use super::{ProgressNotification, RecordResult, RequestId, RequestState};
use crate::types::RecordId;

/// Results of one request, kept sorted by record id.
///
/// Batches from different workers arrive in any order; every insert goes to
/// its sorted position so lookups by id stay valid.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    request_id: Option<RequestId>,
    results: Vec<RecordResult>,
    percent: u8,
    state: Option<RequestState>,
    duplicate_role_found: bool,
    error: Option<String>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result set that only accepts notifications of `request_id`
    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            ..Self::default()
        }
    }

    /// Insert or replace a result at its sorted position
    pub fn insert(&mut self, result: RecordResult) {
        match self
            .results
            .binary_search_by_key(&result.record_id, |r| r.record_id)
        {
            Ok(index) => self.results[index] = result,
            Err(index) => self.results.insert(index, result),
        }
    }

    pub fn extend(&mut self, batch: impl IntoIterator<Item = RecordResult>) {
        for result in batch {
            self.insert(result);
        }
    }

    /// Fold a notification in; returns false if it belongs to another request
    pub fn apply(&mut self, notification: ProgressNotification) -> bool {
        if let Some(id) = self.request_id {
            if notification.request_id != id {
                return false;
            }
        }
        self.percent = notification.percent;
        self.state = Some(notification.state);
        self.duplicate_role_found |= notification.duplicate_role_found;
        if notification.error.is_some() {
            self.error = notification.error;
        }
        self.extend(notification.batch);
        true
    }

    pub fn get(&self, record_id: RecordId) -> Option<&RecordResult> {
        self.results
            .binary_search_by_key(&record_id, |r| r.record_id)
            .ok()
            .map(|index| &self.results[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn state(&self) -> Option<RequestState> {
        self.state
    }

    pub fn duplicate_role_found(&self) -> bool {
        self.duplicate_role_found
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear(&mut self) {
        *self = Self {
            request_id: self.request_id,
            ..Self::default()
        };
    }
}
