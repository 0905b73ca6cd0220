//! 进程内存储：单实例部署与测试使用，过期时间按注入的 Clock 判断。

use crate::clock::Clock;
use crate::error::Result;
use crate::store::{Command, CounterStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Slot {
    value: i64,
    /// 过期时刻（unix 毫秒）；None 表示永不过期。
    expires_at: Option<u64>,
}

#[derive(Debug)]
pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 当前存活的 key 数量（测试与诊断用）。
    pub async fn len(&self) -> usize {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        slots.values().filter(|s| is_live(s, now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// 过大的 TTL 截断到 u64 上限，等同于永不过期。
fn expires_at(now: u64, seconds: u64) -> u64 {
    now.saturating_add(seconds.saturating_mul(1000))
}

fn is_live(slot: &Slot, now: u64) -> bool {
    slot.expires_at.is_none_or(|at| at > now)
}

/// 取出存活的条目；已过期的条目顺手清掉。
fn live_slot<'a>(
    slots: &'a mut HashMap<String, Slot>,
    key: &str,
    now: u64,
) -> Option<&'a mut Slot> {
    if slots.get(key).is_some_and(|s| !is_live(s, now)) {
        slots.remove(key);
    }
    slots.get_mut(key)
}

fn apply_incr(slots: &mut HashMap<String, Slot>, key: &str, delta: i64, now: u64) -> i64 {
    if let Some(slot) = live_slot(slots, key, now) {
        slot.value += delta;
        return slot.value;
    }
    slots.insert(
        key.to_string(),
        Slot {
            value: delta,
            expires_at: None,
        },
    );
    delta
}

fn apply_expire(slots: &mut HashMap<String, Slot>, key: &str, seconds: u64, now: u64) -> i64 {
    match live_slot(slots, key, now) {
        Some(slot) => {
            slot.expires_at = Some(expires_at(now, seconds));
            1
        }
        None => 0,
    }
}

/// 仅支持 `*` 通配。
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || text.len() < first.len() + last.len() {
        return false;
    }
    if !text[first.len()..].ends_with(last) {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    true
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn pipeline(&self, commands: &[Command]) -> Result<Vec<i64>> {
        let now = self.clock.now_millis();
        let mut slots = self.slots.lock().await;
        let replies = commands
            .iter()
            .map(|cmd| match cmd {
                Command::IncrBy { key, delta } => apply_incr(&mut slots, key, *delta, now),
                Command::Expire { key, seconds } => apply_expire(&mut slots, key, *seconds, now),
            })
            .collect();
        Ok(replies)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let now = self.clock.now_millis();
        let mut slots = self.slots.lock().await;
        Ok(apply_incr(&mut slots, key, delta, now))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        Ok(keys
            .iter()
            .map(|k| slots.get(k).filter(|s| is_live(s, now)).map(|s| s.value))
            .collect())
    }

    async fn set_ex(&self, key: &str, value: i64, seconds: u64) -> Result<()> {
        let now = self.clock.now_millis();
        let mut slots = self.slots.lock().await;
        slots.insert(
            key.to_string(),
            Slot {
                value,
                expires_at: Some(expires_at(now, seconds)),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        Ok(slots.get(key).is_some_and(|s| is_live(s, now)))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let now = self.clock.now_millis();
        let slots = self.slots.lock().await;
        let mut out: Vec<String> = slots
            .iter()
            .filter(|(k, s)| is_live(s, now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn store_at(secs: u64) -> (MockClock, MemoryStore) {
        let clock = MockClock::at_secs(secs);
        let store = MemoryStore::new(Arc::new(clock.clone()));
        (clock, store)
    }

    #[tokio::test]
    async fn pipeline_returns_replies_in_order() {
        let (_clock, store) = store_at(1_000);
        let replies = store
            .pipeline(&[
                Command::incr("a"),
                Command::expire("a", 10),
                Command::incr("a"),
                Command::expire("missing", 10),
                Command::decr("b"),
            ])
            .await
            .unwrap();
        assert_eq!(replies, vec![1, 1, 2, 0, -1]);
    }

    #[tokio::test]
    async fn counters_expire_with_the_clock() {
        let (clock, store) = store_at(1_000);
        store
            .pipeline(&[Command::incr("k"), Command::expire("k", 5)])
            .await
            .unwrap();

        clock.advance_secs(4);
        assert_eq!(store.get_many(&["k".to_string()]).await.unwrap(), vec![Some(1)]);

        clock.advance_secs(1);
        assert_eq!(store.get_many(&["k".to_string()]).await.unwrap(), vec![None]);
        // 过期后重新计数。
        assert_eq!(store.incr_by("k", 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn set_ex_and_exists() {
        let (clock, store) = store_at(0);
        store.set_ex("freeze:k:m", 1, 60).await.unwrap();
        assert!(store.exists("freeze:k:m").await.unwrap());
        clock.advance_secs(60);
        assert!(!store.exists("freeze:k:m").await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn huge_ttls_saturate_instead_of_overflowing() {
        let (clock, store) = store_at(1_700_000_000);
        store.set_ex("freeze:k:m", 1, u64::MAX / 1000).await.unwrap();
        store.set_ex("forever", 1, u64::MAX).await.unwrap();
        store
            .pipeline(&[Command::incr("c"), Command::expire("c", u64::MAX)])
            .await
            .unwrap();

        clock.advance_secs(10 * 365 * 86_400);
        assert!(store.exists("freeze:k:m").await.unwrap());
        assert!(store.exists("forever").await.unwrap());
        assert_eq!(store.get_many(&["c".to_string()]).await.unwrap(), vec![Some(1)]);
    }

    #[tokio::test]
    async fn keys_match_glob_patterns() {
        let (_clock, store) = store_at(0);
        for k in ["freeze:a:m1", "freeze:b:m2", "ratelimit:a:m1:minute:0"] {
            store.set_ex(k, 1, 60).await.unwrap();
        }
        assert_eq!(
            store.keys("freeze:*").await.unwrap(),
            vec!["freeze:a:m1".to_string(), "freeze:b:m2".to_string()]
        );
        assert_eq!(
            store.keys("*:a:m1*").await.unwrap(),
            vec!["freeze:a:m1".to_string(), "ratelimit:a:m1:minute:0".to_string()]
        );
        assert!(store.keys("nothing").await.unwrap().is_empty());
    }

    #[test]
    fn glob_match_edge_cases() {
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "abc"));
        assert!(glob_match("a*b*c", "axxbyyc"));
        assert!(!glob_match("a*b*c", "acb"));
        assert!(!glob_match("ab*ba", "aba"));
        assert!(glob_match("exact", "exact"));
    }
}
