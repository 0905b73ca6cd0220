//! 后端计数存储（Backing Store）。
//!
//! 任何满足以下能力的存储都可替换：单键原子增减、带过期的写入、读取、
//! 按模式枚举 key，以及“一次往返提交多条命令、按提交顺序返回结果”的批量提交。
//!
//! 注意：批量提交只保证自身命令相对于其他客户端的单条命令原子执行，
//! 并不隔离“自增 -> 判断 -> 回滚”这一整段多次往返的流程。

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;

/// 批量提交中的一条命令。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    IncrBy { key: String, delta: i64 },
    Expire { key: String, seconds: u64 },
}

impl Command {
    pub fn incr(key: impl Into<String>) -> Self {
        Self::IncrBy {
            key: key.into(),
            delta: 1,
        }
    }

    pub fn decr(key: impl Into<String>) -> Self {
        Self::IncrBy {
            key: key.into(),
            delta: -1,
        }
    }

    pub fn expire(key: impl Into<String>, seconds: u64) -> Self {
        Self::Expire {
            key: key.into(),
            seconds,
        }
    }
}

#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// 一次往返提交多条命令，结果与提交顺序一一对应。
    ///
    /// `IncrBy` 返回自增后的值，`Expire` 返回 1（key 存在）或 0。
    async fn pipeline(&self, commands: &[Command]) -> Result<Vec<i64>>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// 批量读取；不存在（或已过期）的 key 返回 None。
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>>;

    async fn set_ex(&self, key: &str, value: i64, seconds: u64) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// 按 glob 模式（仅支持 `*`）枚举 key。
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}
