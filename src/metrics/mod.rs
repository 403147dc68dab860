//! Stage-duration statistics
//!
//! Pure functions over loaded unit records: summary statistics, grouped
//! stage aggregation and composite environment metrics.

pub mod aggregator;
pub mod environment;
pub mod stats;

pub use aggregator::{Aggregation, GroupBy, GroupStats, StageAggregator, StageStat};
pub use environment::{
    EnvironmentStat, MetricSample, compute_environment_metrics, summarize_environment,
};
pub use stats::{compute_stats, compute_stats_from_hours, percentile};
