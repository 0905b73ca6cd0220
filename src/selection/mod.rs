//! 候选 (key, 模型) 的排序与逐个尝试。
//!
//! 外层遍历模型、内层遍历 key；每个组合先查冻结，再做限额判断，
//! 严格按顺序一次只评估一个候选。

mod cursor;
mod strategy;

pub use cursor::CursorTable;
pub use strategy::{Dimension, Strategy, order};

use crate::error::{Error, Result};
use crate::limiter::{FreezeGuard, LimitEvaluator, WindowUsage};
use crate::registry::{Model, Registry};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 当前生效的两个维度的策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategySettings {
    pub key: Strategy,
    pub model: Strategy,
}

/// 一个被接纳的候选。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub api_key: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub usage: BTreeMap<String, WindowUsage>,
    pub borrowed: bool,
}

#[derive(Debug)]
pub struct Selector {
    registry: Arc<Registry>,
    freeze: FreezeGuard,
    evaluator: LimitEvaluator,
    cursors: CursorTable,
    strategies: ArcSwap<StrategySettings>,
}

impl Selector {
    pub fn new(
        registry: Arc<Registry>,
        freeze: FreezeGuard,
        evaluator: LimitEvaluator,
        strategies: StrategySettings,
    ) -> Self {
        Self {
            registry,
            freeze,
            evaluator,
            cursors: CursorTable::new(),
            strategies: ArcSwap::from_pointee(strategies),
        }
    }

    pub fn strategies(&self) -> StrategySettings {
        **self.strategies.load()
    }

    /// 运行时替换某个维度的策略；不重置任何游标。
    pub fn set_strategy(&self, dimension: Dimension, name: &str) -> Result<Strategy> {
        let strategy: Strategy = name.parse()?;
        self.strategies.rcu(|current| {
            let mut next = **current;
            match dimension {
                Dimension::Key => next.key = strategy,
                Dimension::Model => next.model = strategy,
            }
            next
        });
        tracing::info!(dimension = dimension.as_str(), strategy = %strategy, "轮换策略已切换");
        Ok(strategy)
    }

    pub fn set_key_strategy(&self, name: &str) -> Result<Strategy> {
        self.set_strategy(Dimension::Key, name)
    }

    pub fn set_model_strategy(&self, name: &str) -> Result<Strategy> {
        self.set_strategy(Dimension::Model, name)
    }

    /// 返回第一个被接纳的组合；全部不可用时返回 `Ok(None)`。
    pub async fn get_model(&self, api_name: &str, allow_borrowing: bool) -> Result<Option<Selection>> {
        let mut found = self.collect(api_name, 1, allow_borrowing).await?;
        Ok(found.pop())
    }

    /// 与 `get_model` 相同的遍历顺序，但收集最多 `size` 个组合；每个都真实占用一次额度。
    /// 批量模式不允许借用。
    pub async fn get_batch(&self, api_name: &str, size: usize) -> Result<Option<Vec<Selection>>> {
        if size == 0 {
            return Err(Error::validation("批量大小必须大于 0"));
        }
        let found = self.collect(api_name, size, false).await?;
        Ok(if found.is_empty() { None } else { Some(found) })
    }

    async fn collect(
        &self,
        api_name: &str,
        size: usize,
        allow_borrowing: bool,
    ) -> Result<Vec<Selection>> {
        let api = self.registry.find_api(api_name).await?;
        let settings = self.strategies();

        let models: Vec<Model> = self
            .cursors
            .ordered(api_name, Dimension::Model, settings.model, &api.models)
            .await;
        let keys: Vec<String> = self
            .cursors
            .ordered(api_name, Dimension::Key, settings.key, &api.keys)
            .await;

        let mut out = Vec::new();
        for model in &models {
            for key in &keys {
                if self.freeze.is_frozen(key, &model.name).await? {
                    tracing::debug!(api = api_name, api_key = %key, model = %model.name, "候选已冻结，跳过");
                    continue;
                }

                let eval = self
                    .evaluator
                    .check_and_increment(key, model, allow_borrowing)
                    .await?;
                if !eval.is_within_limits {
                    continue;
                }

                out.push(Selection {
                    api_key: key.clone(),
                    model: model.name.clone(),
                    metadata: model.metadata.clone(),
                    usage: eval.usage,
                    borrowed: eval.borrowed,
                });
                if out.len() >= size {
                    return Ok(out);
                }
            }
        }

        if out.is_empty() {
            tracing::info!(api = api_name, "所有 key/模型组合均不可用");
        }
        Ok(out)
    }
}
