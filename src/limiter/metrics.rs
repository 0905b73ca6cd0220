//! 按天累计的结果统计（success / limit_reached / borrowed）。
//!
//! 统计写入失败只记日志，不影响判断结果。

use crate::error::Result;
use crate::limiter::types::{MetricCounts, Outcome, UsageStats, WindowUsage};
use crate::registry::Model;
use crate::store::{Command, CounterStore};
use crate::window::{DAY, Keyspace};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    store: Arc<dyn CounterStore>,
    keyspace: Arc<Keyspace>,
    enabled: bool,
}

impl MetricsRecorder {
    pub fn new(store: Arc<dyn CounterStore>, keyspace: Arc<Keyspace>, enabled: bool) -> Self {
        Self {
            store,
            keyspace,
            enabled,
        }
    }

    pub async fn update_metrics(&self, api_key: &str, model: &str, outcome: Outcome) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.record(api_key, model, outcome).await {
            tracing::warn!(api_key, model, outcome = outcome.as_str(), error = %e, "记录统计失败");
        }
    }

    async fn record(&self, api_key: &str, model: &str, outcome: Outcome) -> Result<()> {
        let now = self.keyspace.now_secs();
        let key = self.keyspace.metric_key_at(api_key, model, outcome.as_str(), now)?;
        let ttl = self.keyspace.ttl_at(DAY, now)?;
        self.store
            .pipeline(&[Command::incr(&key), Command::expire(&key, ttl)])
            .await?;
        Ok(())
    }

    /// 未开启统计时返回 None。
    pub async fn get_metrics(&self, api_key: &str, model: &str) -> Result<Option<MetricCounts>> {
        if !self.enabled {
            return Ok(None);
        }

        let keys = Outcome::ALL
            .iter()
            .map(|o| self.keyspace.metric_key(api_key, model, o.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let values = self.store.get_many(&keys).await?;
        let count = |i: usize| values.get(i).copied().flatten().unwrap_or(0).max(0) as u64;

        Ok(Some(MetricCounts {
            success: count(0),
            limit_reached: count(1),
            borrowed: count(2),
        }))
    }

    /// 只读：当前各窗口用量 + 当天统计，不做任何自增。
    pub async fn get_usage_stats(&self, api_key: &str, model: &Model) -> Result<UsageStats> {
        let now = self.keyspace.now_secs();
        let mut keys = Vec::with_capacity(model.limits.len());
        for window in model.limits.keys() {
            keys.push(self.keyspace.counter_key_at(api_key, &model.name, window, now)?);
        }
        let values = self.store.get_many(&keys).await?;

        let mut usage = BTreeMap::new();
        for ((window, limit), value) in model.limits.iter().zip(values) {
            let used = value.unwrap_or(0).max(0) as u64;
            let reset = self.keyspace.expiry_at(window, now)?;
            usage.insert(window.clone(), WindowUsage::new(used, *limit, reset));
        }

        let metrics = self.get_metrics(api_key, &model.name).await?;
        Ok(UsageStats { usage, metrics })
    }
}
