//! 多窗口限额判断：先自增、再判断、超限则补偿回滚。
//!
//! 流程：
//! 1. 对模型的每个窗口计数 INCR 并重设 TTL（一次往返提交）；
//! 2. 逐窗口比较自增后的值与上限；
//! 3. 超限窗口若允许借用且不是最终窗口，则标记 borrowed 继续；否则整体拒绝；
//! 4. 拒绝时对所有窗口 DECR 回滚并记 limit_reached；通过时记 success / borrowed。
//!
//! 自增与判断之间没有隔离：同一桶上的并发调用方可能都越过上限后才各自回滚，
//! 造成有界的超发或误拒。需要严格正确性时应改为服务端脚本一次完成。

use crate::error::{Error, Result};
use crate::limiter::metrics::MetricsRecorder;
use crate::limiter::types::{Evaluation, Outcome, WindowUsage};
use crate::registry::Model;
use crate::store::{Command, CounterStore};
use crate::window::Keyspace;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LimitEvaluator {
    store: Arc<dyn CounterStore>,
    keyspace: Arc<Keyspace>,
    metrics: MetricsRecorder,
    /// 不可借用的窗口（按惯例为 month）。
    final_window: String,
}

struct Touched {
    window: String,
    key: String,
    limit: u64,
    reset: u64,
}

impl LimitEvaluator {
    pub fn new(
        store: Arc<dyn CounterStore>,
        keyspace: Arc<Keyspace>,
        metrics: MetricsRecorder,
        final_window: impl Into<String>,
    ) -> Self {
        Self {
            store,
            keyspace,
            metrics,
            final_window: final_window.into(),
        }
    }

    pub async fn check_and_increment(
        &self,
        api_key: &str,
        model: &Model,
        allow_borrowing: bool,
    ) -> Result<Evaluation> {
        // key 与 TTL 全部算好再发请求：未知窗口时不会留下半截自增。
        let now = self.keyspace.now_secs();
        let mut touched = Vec::with_capacity(model.limits.len());
        let mut commands = Vec::with_capacity(model.limits.len() * 2);
        for (window, limit) in &model.limits {
            let key = self.keyspace.counter_key_at(api_key, &model.name, window, now)?;
            let ttl = self.keyspace.ttl_at(window, now)?;
            commands.push(Command::incr(&key));
            commands.push(Command::expire(&key, ttl));
            touched.push(Touched {
                window: window.clone(),
                key,
                limit: *limit,
                reset: ttl - 1,
            });
        }

        let replies = self.store.pipeline(&commands).await?;
        if replies.len() != commands.len() {
            return Err(unexpected_reply(commands.len(), replies.len()));
        }

        let mut usage = BTreeMap::new();
        let mut within = true;
        let mut borrowed = false;
        // 每个窗口两条命令，INCR 的结果在偶数位。
        for (t, used) in touched.iter().zip(replies.iter().step_by(2)) {
            let used = (*used).max(0) as u64;
            usage.insert(t.window.clone(), WindowUsage::new(used, t.limit, t.reset));

            if used <= t.limit {
                continue;
            }
            if allow_borrowing && t.window != self.final_window {
                borrowed = true;
                tracing::debug!(api_key, model = %model.name, window = %t.window, used, limit = t.limit, "窗口超限，向更长窗口借用");
            } else {
                within = false;
            }
        }

        if !within {
            let rollback: Vec<Command> = touched.iter().map(|t| Command::decr(&t.key)).collect();
            self.store.pipeline(&rollback).await?;
            self.metrics
                .update_metrics(api_key, &model.name, Outcome::LimitReached)
                .await;
            tracing::debug!(api_key, model = %model.name, "已达上限，计数已回滚");
            return Ok(Evaluation {
                is_within_limits: false,
                usage,
                borrowed: false,
            });
        }

        let outcome = if borrowed {
            Outcome::Borrowed
        } else {
            Outcome::Success
        };
        self.metrics
            .update_metrics(api_key, &model.name, outcome)
            .await;

        Ok(Evaluation {
            is_within_limits: true,
            usage,
            borrowed,
        })
    }
}

/// 返回条数与提交条数不一致时无法判断用量，按存储故障上报。
fn unexpected_reply(expected: usize, actual: usize) -> Error {
    Error::Store(redis::RedisError::from((
        redis::ErrorKind::ResponseError,
        "批量提交返回条数不符",
        format!("期望 {expected} 条，实际 {actual} 条"),
    )))
}
