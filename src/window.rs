//! 时间窗口与 key 空间。
//!
//! 计数 key 形如 `{prefix}:{apiKey}:{model}:{window}:{windowTimestamp}`，
//! 其中 windowTimestamp 是按窗口时长向下取整的 unix 秒；不同时间段的桶永不重叠。

use crate::clock::Clock;
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const MINUTE: &str = "minute";
pub const HOUR: &str = "hour";
pub const DAY: &str = "day";
pub const MONTH: &str = "month";

/// 内置窗口（秒）。
pub const DEFAULT_WINDOWS: [(&str, u64); 4] = [
    (MINUTE, 60),
    (HOUR, 3_600),
    (DAY, 86_400),
    (MONTH, 2_592_000),
];

pub const FREEZE_PREFIX: &str = "freeze";

#[derive(Debug, Clone)]
pub struct Keyspace {
    windows: BTreeMap<String, u64>,
    prefix: String,
    metric_prefix: String,
    clock: Arc<dyn Clock>,
}

impl Keyspace {
    /// 在内置窗口基础上注册额外窗口；同名时以配置为准。
    pub fn new(
        extra_windows: &BTreeMap<String, u64>,
        prefix: impl Into<String>,
        metric_prefix: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut windows: BTreeMap<String, u64> = DEFAULT_WINDOWS
            .iter()
            .map(|(name, secs)| (name.to_string(), *secs))
            .collect();

        for (name, secs) in extra_windows {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::configuration("窗口名称不能为空"));
            }
            if *secs == 0 {
                return Err(Error::configuration(format!("窗口 {name} 的时长必须大于 0")));
            }
            windows.insert(name.to_string(), *secs);
        }

        Ok(Self {
            windows,
            prefix: prefix.into(),
            metric_prefix: metric_prefix.into(),
            clock,
        })
    }

    pub fn duration(&self, window: &str) -> Result<u64> {
        self.windows
            .get(window)
            .copied()
            .ok_or_else(|| Error::configuration(format!("未注册的窗口: {window}")))
    }

    pub fn is_known(&self, window: &str) -> bool {
        self.windows.contains_key(window)
    }

    /// 一次操作内先取一次时刻，再用 `*_at` 推导 key 与 TTL，两者才会落在同一个桶。
    pub fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    /// 当前时间按窗口时长对齐后的桶起点（unix 秒）。
    pub fn window_timestamp(&self, window: &str) -> Result<u64> {
        self.timestamp_at(window, self.now_secs())
    }

    pub fn timestamp_at(&self, window: &str, now: u64) -> Result<u64> {
        let d = self.duration(window)?;
        Ok(now - now % d)
    }

    /// 距离下个边界还剩的整秒数（不含当前这一秒），取值范围 `[0, d)`。
    pub fn window_expiry(&self, window: &str) -> Result<u64> {
        self.expiry_at(window, self.now_secs())
    }

    pub fn expiry_at(&self, window: &str, now: u64) -> Result<u64> {
        let d = self.duration(window)?;
        Ok(d - 1 - now % d)
    }

    /// 写入存储的 TTL：恰好在窗口边界过期，且永远不会是 0。
    pub fn ttl_at(&self, window: &str, now: u64) -> Result<u64> {
        Ok(self.expiry_at(window, now)? + 1)
    }

    pub fn counter_key(&self, api_key: &str, model: &str, window: &str) -> Result<String> {
        self.counter_key_at(api_key, model, window, self.now_secs())
    }

    pub fn counter_key_at(&self, api_key: &str, model: &str, window: &str, now: u64) -> Result<String> {
        let ts = self.timestamp_at(window, now)?;
        Ok(format!("{}:{api_key}:{model}:{window}:{ts}", self.prefix))
    }

    /// 统计 key 按天分桶。
    pub fn metric_key(&self, api_key: &str, model: &str, outcome: &str) -> Result<String> {
        self.metric_key_at(api_key, model, outcome, self.now_secs())
    }

    pub fn metric_key_at(&self, api_key: &str, model: &str, outcome: &str, now: u64) -> Result<String> {
        let ts = self.timestamp_at(DAY, now)?;
        Ok(format!("{}:{api_key}:{model}:{outcome}:{ts}", self.metric_prefix))
    }

    pub fn freeze_key(&self, api_key: &str, model: &str) -> String {
        format!("{FREEZE_PREFIX}:{api_key}:{model}")
    }
}
