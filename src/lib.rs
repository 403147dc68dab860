//! Test-stage dashboard engine
//!
//! Loads manufacturing unit records, summarises how long units spend in
//! each test stage, derives composite environment metrics, and probes
//! remote log servers to estimate first-pass yield.

pub mod config;
pub mod core;
pub mod metrics;
pub mod probe;
pub mod reporting;
pub mod session;
pub mod source;
pub mod ui;

pub use config::{CliConfig, Config, ProjectProfile};
pub use core::{Result, StageEvent, StageTimeError, StatSummary, UnitRecord};
pub use metrics::{Aggregation, GroupBy, StageAggregator, compute_stats};
pub use probe::{CacheStore, FailureCacheEntry, FailureLogProbe, QualityReport};
pub use session::Session;
pub use source::{LogServer, UnitFilter, UnitSource};
