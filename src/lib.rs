//! 多窗口配额控制与 key/模型轮换。
//!
//! 计数、冻结标记与统计放在共享的后端存储里（默认 Redis），
//! 轮询游标只存在于进程内存。入口是 [`QuotaManager`]。

pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod selection;
pub mod store;
pub mod window;

pub use config::Settings;
pub use error::{Error, Result};
pub use limiter::{Evaluation, MetricCounts, UsageStats, WindowUsage};
pub use manager::QuotaManager;
pub use registry::{Api, Model};
pub use selection::{Selection, Strategy};
