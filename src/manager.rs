//! 对外入口：组装窗口、注册表、冻结、统计、限额判断与候选选择。

use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::limiter::{Evaluation, FreezeGuard, LimitEvaluator, MetricCounts, MetricsRecorder, UsageStats};
use crate::registry::{Api, Registry};
use crate::selection::{Selection, Selector, Strategy, StrategySettings};
use crate::store::{CounterStore, RedisStore};
use crate::window::Keyspace;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct QuotaManager {
    registry: Arc<Registry>,
    freeze: FreezeGuard,
    metrics: MetricsRecorder,
    evaluator: LimitEvaluator,
    selector: Selector,
    default_batch_size: usize,
}

impl QuotaManager {
    /// 连接 Redis 并使用系统时钟。
    pub async fn connect(settings: &Settings) -> Result<Self> {
        let store = RedisStore::connect(&settings.redis_url).await?;
        tracing::info!(prefix = %settings.key_prefix, "已连接计数存储");
        Self::new(settings, Arc::new(store), Arc::new(SystemClock))
    }

    pub fn new(
        settings: &Settings,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let keyspace = Arc::new(Keyspace::new(
            &settings.windows,
            settings.key_prefix.clone(),
            settings.metric_prefix.clone(),
            clock,
        )?);
        if !keyspace.is_known(&settings.final_window) {
            return Err(Error::configuration(format!(
                "final_window 引用了未注册的窗口: {}",
                settings.final_window
            )));
        }
        if settings.default_batch_size == 0 {
            return Err(Error::validation("default_batch_size 必须大于 0"));
        }

        let registry = Arc::new(Registry::new(settings.apis.clone(), keyspace.clone())?);
        let freeze = FreezeGuard::new(store.clone(), keyspace.clone());
        let metrics = MetricsRecorder::new(store.clone(), keyspace.clone(), settings.metrics_enabled);
        let evaluator = LimitEvaluator::new(
            store,
            keyspace.clone(),
            metrics.clone(),
            settings.final_window.clone(),
        );
        let selector = Selector::new(
            registry.clone(),
            freeze.clone(),
            evaluator.clone(),
            settings.strategies(),
        );

        Ok(Self {
            registry,
            freeze,
            metrics,
            evaluator,
            selector,
            default_batch_size: settings.default_batch_size,
        })
    }

    /// 对指定 (key, 模型) 自增并判断；冻结中直接拒绝且不触碰计数。
    pub async fn check_and_increment(
        &self,
        api_name: &str,
        api_key: &str,
        model_name: &str,
        allow_borrowing: bool,
    ) -> Result<Evaluation> {
        let model = self.registry.find_model(api_name, model_name).await?;
        if self.freeze.is_frozen(api_key, model_name).await? {
            return Ok(Evaluation::frozen());
        }
        self.evaluator
            .check_and_increment(api_key, &model, allow_borrowing)
            .await
    }

    pub async fn get_model(&self, api_name: &str, allow_borrowing: bool) -> Result<Option<Selection>> {
        self.selector.get_model(api_name, allow_borrowing).await
    }

    /// `size` 为空时使用配置中的 default_batch_size。
    pub async fn get_batch(&self, api_name: &str, size: Option<usize>) -> Result<Option<Vec<Selection>>> {
        let size = size.unwrap_or(self.default_batch_size);
        self.selector.get_batch(api_name, size).await
    }

    pub async fn freeze_model(&self, api_key: &str, model_name: &str, seconds: u64) -> Result<()> {
        self.freeze.freeze(api_key, model_name, seconds).await
    }

    pub async fn is_frozen(&self, api_key: &str, model_name: &str) -> Result<bool> {
        self.freeze.is_frozen(api_key, model_name).await
    }

    /// 某个 API 下当前被冻结的 (key, 模型)。
    pub async fn frozen_pairs(&self, api_name: &str) -> Result<Vec<(String, String)>> {
        let api = self.registry.find_api(api_name).await?;
        let models: Vec<String> = api.models.iter().map(|m| m.name.clone()).collect();
        self.freeze.frozen_among(&api.keys, &models).await
    }

    pub async fn update_limits(
        &self,
        api_name: &str,
        model_name: &str,
        new_limits: &BTreeMap<String, serde_json::Value>,
    ) -> Result<BTreeMap<String, u64>> {
        self.registry
            .update_limits(api_name, model_name, new_limits)
            .await
    }

    /// 未开启统计时返回 None。
    pub async fn get_metrics(&self, api_key: &str, model_name: &str) -> Result<Option<MetricCounts>> {
        self.metrics.get_metrics(api_key, model_name).await
    }

    pub async fn get_usage_stats(
        &self,
        api_name: &str,
        api_key: &str,
        model_name: &str,
    ) -> Result<UsageStats> {
        let model = self.registry.find_model(api_name, model_name).await?;
        self.metrics.get_usage_stats(api_key, &model).await
    }

    pub fn set_key_strategy(&self, name: &str) -> Result<Strategy> {
        self.selector.set_key_strategy(name)
    }

    pub fn set_model_strategy(&self, name: &str) -> Result<Strategy> {
        self.selector.set_model_strategy(name)
    }

    pub fn strategies(&self) -> StrategySettings {
        self.selector.strategies()
    }

    pub async fn find_api(&self, api_name: &str) -> Result<Api> {
        self.registry.find_api(api_name).await
    }

    pub async fn api_names(&self) -> Vec<String> {
        self.registry.api_names().await
    }
}
