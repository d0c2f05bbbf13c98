//! Request model and per-record analysis
//!
//! [`analyze_record`] is the pure, per-record pipeline run by workers: apply
//! the compiled pattern, build the match tree, split coverage for every
//! touched field and run the enabled semantic extractors.

pub mod coordinator;
pub mod results;
mod worker;

pub use coordinator::{split_range, AnalysisCoordinator, NotificationReceiver};
pub use results::ResultSet;

use crate::coverage::{highlight_with_tree, Segment};
use crate::engine::CompiledPattern;
use crate::palette::Palette;
use crate::scripting::{ParseOptions, ScriptingMetadata};
use crate::semantic::{extract_plot, extract_sequence, PlotItem, SequenceOutcome};
use crate::source::{Record, RecordSource};
use crate::tree::MatchTree;
use crate::types::{Match, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of a submitted request, never reused
pub type RequestId = u64;

/// State carried by a progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Progress,
    Successful,
    Error,
}

/// Configuration snapshot taken when a request is submitted
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSettings {
    pub palette: Palette,
    /// Records per worker batch
    pub chunk_size: usize,
    /// Source polling interval while a continuous request is live
    pub poll_interval: Duration,
    pub sequence_enabled: bool,
    pub plot_enabled: bool,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            palette: Palette::default(),
            chunk_size: 4000,
            poll_interval: Duration::from_millis(50),
            sequence_enabled: true,
            plot_enabled: true,
        }
    }
}

/// Work submitted to the coordinator
#[derive(Clone)]
pub struct AnalysisRequest {
    pub source: Arc<dyn RecordSource>,
    /// First visible position to scan
    pub from: u64,
    /// Number of records to scan
    pub count: u64,
    pub pattern: String,
    pub worker_count: usize,
    /// Keep scanning as the source grows
    pub continuous: bool,
    pub settings: RequestSettings,
}

impl AnalysisRequest {
    /// Request over `[from, from + count)` with default settings and one worker
    pub fn new(source: Arc<dyn RecordSource>, pattern: impl Into<String>, from: u64, count: u64) -> Self {
        Self {
            source,
            from,
            count,
            pattern: pattern.into(),
            worker_count: 1,
            continuous: false,
            settings: RequestSettings::default(),
        }
    }

    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn with_settings(mut self, settings: RequestSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("from", &self.from)
            .field("count", &self.count)
            .field("pattern", &self.pattern)
            .field("worker_count", &self.worker_count)
            .field("continuous", &self.continuous)
            .finish()
    }
}

/// Analysis output of one matching record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub record_id: RecordId,
    pub timestamp: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    pub matches: Vec<Match>,
    /// Segments per field index, only for fields a match touches
    pub highlighting: BTreeMap<usize, Vec<Segment>>,
    pub sequence: Option<SequenceOutcome>,
    pub plot: Option<PlotItem>,
    /// `(group index, ordering index)` for matched groups that declare one
    pub ordering: Vec<(usize, u32)>,
}

/// Message streamed to the requester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNotification {
    pub request_id: RequestId,
    pub state: RequestState,
    pub percent: u8,
    pub batch: Vec<RecordResult>,
    /// Some record of this batch carries more than one request-type role
    pub duplicate_role_found: bool,
    pub error: Option<String>,
}

impl ProgressNotification {
    pub(crate) fn progress(request_id: RequestId, percent: u8, batch: Vec<RecordResult>) -> Self {
        let duplicate_role_found = batch.iter().any(|result| {
            result
                .sequence
                .as_ref()
                .map(|outcome| outcome.duplicate_role)
                .unwrap_or(false)
        });
        Self {
            request_id,
            state: RequestState::Progress,
            percent,
            batch,
            duplicate_role_found,
            error: None,
        }
    }

    pub(crate) fn successful(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RequestState::Successful,
            percent: 100,
            batch: Vec::new(),
            duplicate_role_found: false,
            error: None,
        }
    }

    pub(crate) fn error(request_id: RequestId, percent: u8, error: String) -> Self {
        Self {
            request_id,
            state: RequestState::Error,
            percent,
            batch: Vec::new(),
            duplicate_role_found: false,
            error: Some(error),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != RequestState::Progress
    }
}

/// Everything a worker needs to analyze records, shared per request
#[derive(Debug)]
pub struct AnalysisContext {
    pub pattern: Arc<dyn CompiledPattern>,
    pub metadata: ScriptingMetadata,
    pub palette: Palette,
    sequence_active: bool,
    plot_active: bool,
}

impl AnalysisContext {
    /// Parse the pattern's group names and decide which extractors run.
    ///
    /// An extractor runs only when enabled, when the pattern declares at least
    /// one of its roles and when the pattern-level role check passed.
    pub fn new(pattern: Arc<dyn CompiledPattern>, settings: &RequestSettings) -> Self {
        let names = pattern.group_names();
        let metadata = ScriptingMetadata::parse(
            names.iter().map(|name| name.as_deref()),
            ParseOptions {
                sequence: settings.sequence_enabled,
                plot: settings.plot_enabled,
            },
        );

        let sequence_active = settings.sequence_enabled
            && metadata.has_any_sequence_role()
            && metadata.sequence_consistency().is_consistent();
        let plot_active = settings.plot_enabled
            && metadata.has_any_plot_role()
            && metadata.plot_consistency().is_consistent();

        Self {
            pattern,
            metadata,
            palette: settings.palette.clone(),
            sequence_active,
            plot_active,
        }
    }

    pub fn sequence_active(&self) -> bool {
        self.sequence_active
    }

    pub fn plot_active(&self) -> bool {
        self.plot_active
    }
}

/// Analyze one record; `None` when the pattern does not match it
pub fn analyze_record(record: &Record, context: &AnalysisContext) -> Option<RecordResult> {
    let matches = context.pattern.find(&record.text)?;
    let tree = MatchTree::build(&matches);

    let highlighting = highlight_with_tree(
        &tree,
        &matches,
        &record.fields,
        &context.palette,
        &context.metadata,
    );

    let sequence = context
        .sequence_active
        .then(|| extract_sequence(&tree, &matches, &record.fields, &context.metadata));
    let plot = if context.plot_active {
        extract_plot(&tree, &matches, &record.fields, &context.metadata)
    } else {
        None
    };

    let mut ordering: Vec<(usize, u32)> = matches
        .iter()
        .filter_map(|m| {
            context
                .metadata
                .ordering_index(m.group)
                .map(|index| (m.group, index))
        })
        .collect();
    ordering.dedup();

    Some(RecordResult {
        record_id: record.id,
        timestamp: record.timestamp,
        size_bytes: record.size_bytes,
        matches,
        highlighting,
        sequence,
        plot,
        ordering,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PatternEngine, RegexEngine};

    fn context(pattern: &str) -> AnalysisContext {
        let compiled = RegexEngine::new().compile(pattern).unwrap();
        AnalysisContext::new(compiled, &RequestSettings::default())
    }

    #[test]
    fn test_non_matching_record() {
        let ctx = context(r"(?P<red>error)");
        assert!(analyze_record(&Record::from_text(0, "all good"), &ctx).is_none());
    }

    #[test]
    fn test_highlighting_and_ordering() {
        let ctx = context(r"(?P<red_and_GVI_2>error) (?P<GVI_1>\d+)");
        let result = analyze_record(&Record::from_text(3, "an error 42 here"), &ctx).unwrap();

        assert_eq!(result.record_id, 3);
        assert_eq!(result.matches.len(), 2);
        assert_eq!(result.ordering, vec![(1, 2), (2, 1)]);

        let segments = &result.highlighting[&0];
        let first_colored = segments.iter().find(|s| s.color.is_some()).unwrap();
        assert_eq!((first_colored.from, first_colored.to), (3, 7));
        assert!(first_colored.explicit);
        assert!(result.sequence.is_none());
        assert!(result.plot.is_none());
    }

    #[test]
    fn test_repeated_groups_yield_contiguous_segments() {
        let ctx = context(r"(?:(?P<a>a)|(?P<b>b))+");
        let result = analyze_record(&Record::from_text(0, "ba"), &ctx).unwrap();

        let groups: Vec<usize> = result.matches.iter().map(|m| m.group).collect();
        assert_eq!(groups, vec![2, 1]);

        let segments = &result.highlighting[&0];
        let ranges: Vec<(usize, usize)> = segments.iter().map(|s| (s.from, s.to)).collect();
        assert_eq!(ranges, vec![(0, 0), (1, 1)]);
    }

    #[test]
    fn test_sequence_values_follow_text_order() {
        // UCL is group 1 but appears last in the text on this record
        let ctx = context(
            r"(?:(?P<UCL>c\w*)|(?P<US>s\w*)|(?P<UM>m\w*)|(?P<URT>RQ)|\s)+",
        );
        let record = Record::from_text(0, "s1 m1 RQ c1");
        let result = analyze_record(&record, &ctx).unwrap();

        let positions: Vec<usize> = result.matches.iter().map(|m| m.range.from).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(result.sequence.unwrap().item.is_some());
    }

    #[test]
    fn test_sequence_runs_when_pattern_declares_roles() {
        let ctx = context(r"(?P<UCL>\w+) -> (?P<US>\w+)\.(?P<UM>\w+) (?P<URT>RQ)");
        assert!(ctx.sequence_active());
        assert!(!ctx.plot_active());

        let result =
            analyze_record(&Record::from_text(0, "HMI -> Media.play RQ"), &ctx).unwrap();
        let outcome = result.sequence.unwrap();
        assert!(outcome.item.is_some());
    }

    #[test]
    fn test_disabled_extractor_skipped() {
        let compiled = RegexEngine::new()
            .compile(r"(?P<UCL>\w+) (?P<US>\w+) (?P<UM>\w+) (?P<URT>\w+)")
            .unwrap();
        let settings = RequestSettings {
            sequence_enabled: false,
            ..RequestSettings::default()
        };
        let ctx = AnalysisContext::new(compiled, &settings);
        assert!(!ctx.sequence_active());
    }
}
