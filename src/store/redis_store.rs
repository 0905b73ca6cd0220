//! Redis 后端。多个进程共用同一前缀即共享计数、冻结标记与统计。

use crate::error::Result;
use crate::store::{Command, CounterStore};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::fmt;

/// 基于 `ConnectionManager` 的 Redis 存储；断线重连由 redis 客户端负责。
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn pipeline(&self, commands: &[Command]) -> Result<Vec<i64>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }

        // MULTI/EXEC：同批命令不会与其他客户端的单条命令交错。
        let mut pipe = redis::pipe();
        pipe.atomic();
        for cmd in commands {
            match cmd {
                Command::IncrBy { key, delta } => {
                    pipe.incr(key, *delta);
                }
                Command::Expire { key, seconds } => {
                    pipe.expire(key, (*seconds).min(i64::MAX as u64) as i64);
                }
            }
        }

        let mut conn = self.conn.clone();
        let replies: Vec<i64> = pipe.query_async(&mut conn).await?;
        Ok(replies)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        let v: i64 = conn.incr(key, delta).await?;
        Ok(v)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        // 单 key 时 MGET/GET 的返回形态不同，这里统一用流水线 GET。
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.get(key);
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<i64>> = pipe.query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set_ex(&self, key: &str, value: i64, seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let v: bool = conn.exists(key).await?;
        Ok(v)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let v: Vec<String> = conn.keys(pattern).await?;
        Ok(v)
    }
}
