//! 限额判断、冻结与统计。

mod evaluator;
mod freeze;
mod metrics;
mod types;

pub use evaluator::LimitEvaluator;
pub use freeze::FreezeGuard;
pub use metrics::MetricsRecorder;
pub use types::{Evaluation, MetricCounts, Outcome, UsageStats, WindowUsage};
