use crate::error::{Error, Result};
use crate::store::CounterStore;
use crate::window::{FREEZE_PREFIX, Keyspace};
use std::sync::Arc;

/// 冻结标记：在 TTL 内直接视为拒绝，不做计数也不记统计。没有手动解冻，到期自动消失。
#[derive(Debug, Clone)]
pub struct FreezeGuard {
    store: Arc<dyn CounterStore>,
    keyspace: Arc<Keyspace>,
}

impl FreezeGuard {
    pub fn new(store: Arc<dyn CounterStore>, keyspace: Arc<Keyspace>) -> Self {
        Self { store, keyspace }
    }

    pub async fn freeze(&self, api_key: &str, model: &str, seconds: u64) -> Result<()> {
        if seconds == 0 {
            return Err(Error::validation("冻结时长必须大于 0 秒"));
        }
        let key = self.keyspace.freeze_key(api_key, model);
        self.store.set_ex(&key, 1, seconds).await?;
        tracing::info!(api_key, model, seconds, "已冻结 key/模型组合");
        Ok(())
    }

    pub async fn is_frozen(&self, api_key: &str, model: &str) -> Result<bool> {
        let key = self.keyspace.freeze_key(api_key, model);
        self.store.exists(&key).await
    }

    /// 列出给定候选集合中当前处于冻结状态的 (key, 模型)。
    pub async fn frozen_among(
        &self,
        keys: &[String],
        models: &[String],
    ) -> Result<Vec<(String, String)>> {
        let found = self.store.keys(&format!("{FREEZE_PREFIX}:*")).await?;
        let mut out = Vec::new();
        for key in keys {
            for model in models {
                if found.contains(&self.keyspace.freeze_key(key, model)) {
                    out.push((key.clone(), model.clone()));
                }
            }
        }
        Ok(out)
    }
}
