use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 某个窗口在本次判断后的用量视图。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowUsage {
    pub used: u64,
    pub remaining: u64,
    pub limit: u64,
    /// 距离窗口重置的秒数。
    pub reset: u64,
}

impl WindowUsage {
    pub fn new(used: u64, limit: u64, reset: u64) -> Self {
        Self {
            used,
            remaining: limit.saturating_sub(used),
            limit,
            reset,
        }
    }
}

/// 一次“自增并判断”的结果。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub is_within_limits: bool,
    /// 被冻结时为空。
    pub usage: BTreeMap<String, WindowUsage>,
    pub borrowed: bool,
}

impl Evaluation {
    /// 冻结命中：不触碰计数，用量为空。
    pub fn frozen() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    LimitReached,
    Borrowed,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Success, Outcome::LimitReached, Outcome::Borrowed];

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::LimitReached => "limit_reached",
            Outcome::Borrowed => "borrowed",
        }
    }
}

/// 当天的结果计数；缺失的计数按 0 计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCounts {
    pub success: u64,
    pub limit_reached: u64,
    pub borrowed: u64,
}

impl MetricCounts {
    pub fn get(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::Success => self.success,
            Outcome::LimitReached => self.limit_reached,
            Outcome::Borrowed => self.borrowed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub usage: BTreeMap<String, WindowUsage>,
    /// None 表示统计功能未开启。
    pub metrics: Option<MetricCounts>,
}
