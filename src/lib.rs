//! logscope - pattern-driven log record analysis
//!
//! Applies one pattern with named capture groups to a large range of text
//! records. Group names double as a small scripting language that declares
//! highlight colors, variable names, sequence-diagram roles and plot roles.
//! For every matching record the analyzer produces:
//! - a gapless, non-overlapping colored segmentation of each touched field
//! - an optional sequence-diagram item when the record satisfies the role schema
//! - an optional plot item with numeric readings
//!
//! # Architecture
//!
//! - **Scripting**: group name → annotation, pattern-level role checks
//! - **Tree / Coverage**: match nesting tree and the coverage splitter
//! - **Semantic**: sequence-diagram and plot extractors over the same tree
//! - **Source / Engine**: record sources and the pattern engine seam
//! - **Analysis**: worker pool, request coordinator and result accumulation
//!
//! # Example
//!
//! ```ignore
//! use logscope_core::{AnalysisCoordinator, AnalysisRequest, MemorySource, RegexEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> logscope_core::Result<()> {
//!     let (coordinator, mut notifications) =
//!         AnalysisCoordinator::new(Arc::new(RegexEngine::new()), 4);
//!     let source = Arc::new(MemorySource::from_lines(["ECU1 started", "ECU2 failed"]));
//!
//!     let id = coordinator.submit(
//!         AnalysisRequest::new(source, r"(?P<red>ECU\d) (?P<VAR_state>\w+)", 0, 2).with_workers(2),
//!     )?;
//!
//!     while let Some(n) = notifications.recv().await {
//!         println!("{} {:?} {}% {} results", id, n.state, n.percent, n.batch.len());
//!         if n.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod palette;
pub mod scripting;
pub mod semantic;
pub mod source;
pub mod tree;
pub mod types;

// Re-export commonly used types
pub use analysis::{
    analyze_record, split_range, AnalysisContext, AnalysisCoordinator, AnalysisRequest,
    NotificationReceiver, ProgressNotification, RecordResult, RequestId, RequestSettings,
    RequestState, ResultSet,
};
pub use config::AnalyzerConfig;
pub use coverage::{highlight_record, split_coverage, ColorIndexTable, Segment};
pub use engine::{CompiledPattern, PatternEngine, RegexEngine};
pub use error::{AnalyzerError, Result};
pub use palette::{Palette, Rgb};
pub use scripting::{ScriptingAnnotation, ScriptingMetadata};
pub use semantic::{PlotItem, RoleValue, SequenceItem, SequenceOutcome};
pub use source::{FieldLayout, FileSource, MemorySource, Record, RecordSource};
pub use tree::MatchTree;
pub use types::{FieldRange, Match, RecordId, TextRange};
