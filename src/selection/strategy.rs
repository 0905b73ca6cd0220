use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 候选项排序策略。反序列化与 `FromStr` 接受同一组名称。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Strategy {
    /// 按配置顺序。
    #[default]
    Ascending,
    /// 每次调用都重新均匀洗牌，不影响游标。
    Random,
    /// 游标前进一位后，从新位置开始旋转输出。
    RoundRobin,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Ascending => "ascending",
            Strategy::Random => "random",
            Strategy::RoundRobin => "round-robin",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ascending" => Ok(Self::Ascending),
            "random" => Ok(Self::Random),
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            other => Err(Error::validation(format!(
                "未知的轮换策略: {other}（可选 ascending、random、round-robin）"
            ))),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// 轮换的维度：key 或模型，各自独立持有游标。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Key,
    Model,
}

impl Dimension {
    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Key => "key",
            Dimension::Model => "model",
        }
    }
}

/// 按策略给出候选顺序，并返回新的游标值（`None` 表示尚未使用过）。
///
/// 除随机洗牌外没有副作用，游标的保存由调用方负责。
pub fn order<T: Clone>(
    strategy: Strategy,
    items: &[T],
    cursor: Option<usize>,
) -> (Vec<T>, Option<usize>) {
    match strategy {
        Strategy::Ascending => (items.to_vec(), cursor),
        Strategy::Random => {
            let mut out = items.to_vec();
            out.shuffle(&mut rand::thread_rng());
            (out, cursor)
        }
        Strategy::RoundRobin => {
            if items.is_empty() {
                return (Vec::new(), cursor);
            }
            let start = cursor.map_or(0, |c| (c + 1) % items.len());
            let mut out = Vec::with_capacity(items.len());
            out.extend_from_slice(&items[start..]);
            out.extend_from_slice(&items[..start]);
            (out, Some(start))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_accepts_known_names_only() {
        assert_eq!("ascending".parse::<Strategy>().unwrap(), Strategy::Ascending);
        assert_eq!(" RANDOM ".parse::<Strategy>().unwrap(), Strategy::Random);
        for name in ["round-robin", "round_robin", "RoundRobin"] {
            assert_eq!(name.parse::<Strategy>().unwrap(), Strategy::RoundRobin);
        }
        assert!(matches!(
            "weighted".parse::<Strategy>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn serde_uses_kebab_case_and_accepts_aliases() {
        for name in ["\"round-robin\"", "\"round_robin\"", "\"RoundRobin\""] {
            let s: Strategy = serde_json::from_str(name).unwrap();
            assert_eq!(s, Strategy::RoundRobin);
        }
        assert!(serde_json::from_str::<Strategy>("\"weighted\"").is_err());
        assert_eq!(serde_json::to_string(&Strategy::RoundRobin).unwrap(), "\"round-robin\"");
    }

    #[test]
    fn ascending_keeps_order() {
        let (out, cursor) = order(Strategy::Ascending, &["a", "b", "c"], Some(1));
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(cursor, Some(1));
    }

    #[test]
    fn random_is_a_permutation_and_keeps_cursor() {
        let items: Vec<u32> = (0..20).collect();
        let (out, cursor) = order(Strategy::Random, &items, None);
        assert_eq!(cursor, None);
        assert_eq!(
            out.iter().collect::<HashSet<_>>(),
            items.iter().collect::<HashSet<_>>()
        );
        assert_eq!(out.len(), items.len());
    }

    #[test]
    fn round_robin_visits_each_position_once_per_cycle() {
        let items = ["a", "b", "c", "d"];
        let mut cursor = Some(1);
        let mut firsts = Vec::new();
        for _ in 0..items.len() {
            let (out, next) = order(Strategy::RoundRobin, &items, cursor);
            assert_eq!(out.len(), items.len());
            firsts.push(out[0]);
            cursor = next;
        }
        assert_eq!(firsts, vec!["c", "d", "a", "b"]);

        let (out, next) = order(Strategy::RoundRobin, &items, None);
        assert_eq!(out, vec!["a", "b", "c", "d"]);
        assert_eq!(next, Some(0));
    }

    #[test]
    fn round_robin_handles_empty_and_shrunk_lists() {
        let empty: [&str; 0] = [];
        assert_eq!(order(Strategy::RoundRobin, &empty, Some(3)), (Vec::new(), Some(3)));

        let (out, next) = order(Strategy::RoundRobin, &["x", "y", "z"], Some(7));
        assert_eq!(out, vec!["z", "x", "y"]);
        assert_eq!(next, Some(2));

        let (out, next) = order(Strategy::RoundRobin, &["x", "y", "z"], Some(3));
        assert_eq!(out, vec!["y", "z", "x"]);
        assert_eq!(next, Some(1));
    }
}
