//! 时间来源。窗口对齐、计数器 TTL 与内存存储的过期判断都从这里取“现在”。

use chrono::Utc;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait Clock: Send + Sync + Debug {
    /// 当前 unix 时间（毫秒）。
    fn now_millis(&self) -> u64;

    fn now_secs(&self) -> u64 {
        self.now_millis() / 1000
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        // 早于 1970 的系统时间视为 0。
        Utc::now().timestamp_millis().max(0) as u64
    }
}

/// 可手动拨动的时钟；clone 之间共享同一时间值。
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    millis: Arc<AtomicU64>,
}

impl MockClock {
    pub fn at_secs(secs: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(secs * 1000)),
        }
    }

    pub fn set_secs(&self, secs: u64) {
        self.millis.store(secs * 1000, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.millis.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_clones_share_time() {
        let clock = MockClock::at_secs(100);
        let other = clock.clone();
        other.advance_secs(20);
        assert_eq!(clock.now_secs(), 120);
        clock.set_secs(5);
        assert_eq!(other.now_millis(), 5_000);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_secs() > 1_577_836_800);
    }
}
