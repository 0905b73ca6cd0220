use crate::selection::strategy::{Dimension, Strategy, order};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// 轮询游标表：(API 名, 维度) -> 上次使用的下标。
///
/// 只存在于进程内存，不持久化，多实例之间互不协调。
#[derive(Debug, Default)]
pub struct CursorTable {
    cursors: Mutex<HashMap<(String, Dimension), usize>>,
}

impl CursorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出游标、排序、写回游标在同一把锁内完成，保证并发调用也逐个前进。
    pub async fn ordered<T: Clone>(
        &self,
        api_name: &str,
        dimension: Dimension,
        strategy: Strategy,
        items: &[T],
    ) -> Vec<T> {
        let mut cursors = self.cursors.lock().await;
        let slot = (api_name.to_string(), dimension);
        let (out, next) = order(strategy, items, cursors.get(&slot).copied());
        if let Some(next) = next {
            cursors.insert(slot, next);
        }
        out
    }

    pub async fn get(&self, api_name: &str, dimension: Dimension) -> Option<usize> {
        let cursors = self.cursors.lock().await;
        cursors.get(&(api_name.to_string(), dimension)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cursors_are_per_api_and_dimension() {
        let table = CursorTable::new();
        let items = ["k1", "k2", "k3"];

        let first = table.ordered("a", Dimension::Key, Strategy::RoundRobin, &items).await;
        let second = table.ordered("a", Dimension::Key, Strategy::RoundRobin, &items).await;
        assert_eq!(first, vec!["k1", "k2", "k3"]);
        assert_eq!(second, vec!["k2", "k3", "k1"]);

        let other_api = table.ordered("b", Dimension::Key, Strategy::RoundRobin, &items).await;
        assert_eq!(other_api[0], "k1");
        let other_dim = table.ordered("a", Dimension::Model, Strategy::RoundRobin, &items).await;
        assert_eq!(other_dim[0], "k1");

        // 非轮询策略不动游标。
        table.ordered("a", Dimension::Key, Strategy::Random, &items).await;
        table.ordered("a", Dimension::Key, Strategy::Ascending, &items).await;
        assert_eq!(table.get("a", Dimension::Key).await, Some(1));
        assert_eq!(table.get("c", Dimension::Key).await, None);
    }
}
