//! 时钟源
//!
//! 缓存只读取时钟，用它给释放事件打时间戳，决定驱逐顺序。
//! 时钟由外部（定时器中断、测试代码）推进。

use core::sync::atomic::{AtomicU64, Ordering};

/// 单调递增的 tick 来源
pub trait Clock: Send + Sync {
    /// 当前 tick 值
    fn ticks(&self) -> u64;
}

/// 原子 tick 计数器
///
/// 缓存持有它的 `Arc`，外部定时器调用 [`TickCounter::tick`] 推进。
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicU64,
}

impl TickCounter {
    /// 从 0 开始计数
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
        }
    }

    /// 推进一个 tick，返回新值
    pub fn tick(&self) -> u64 {
        self.advance(1)
    }

    /// 推进 `n` 个 tick，返回新值
    pub fn advance(&self, n: u64) -> u64 {
        self.ticks.fetch_add(n, Ordering::AcqRel) + n
    }
}

impl Clock for TickCounter {
    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }
}
