//! 块缓存模块
//!
//! 固定容量、多线程共享的缓冲区缓存，位于上层存储逻辑和块设备之间，
//! 按 `(dev, blockno)` 缓存固定大小的块。
//!
//! # 主要组件
//!
//! - [`BufferCache`] - 缓存管理器：哈希分桶、命中路径、未命中时的替换与迁移
//! - [`BufGuard`] - 已加锁的缓存块句柄：`load` / `commit` / `release` / `pin`
//! - [`PinnedBuf`] - pin 住的缓存块，丢弃时 unpin
//! - [`SlotFlags`] - 缓存块状态标志
//! - [`CacheStats`] / [`SlotInfo`] - 统计与诊断
//!
//! # 设计原理
//!
//! 1. **分桶加锁**：每个桶一把短锁，命中路径只碰一个桶，不同桶之间互不影响
//! 2. **分配锁**：未命中路径需要跨桶寻找替换对象，用一把全局锁串行化，
//!    避免两个未命中线程选中同一个缓存块，也避免多桶加锁死锁
//! 3. **两层锁**：桶锁/分配锁只做短时的元数据修改；缓存块数据由睡眠锁保护，
//!    持有期间可以做磁盘 I/O
//! 4. **缓存块池 + 下标**：缓存块一次性分配，桶里只保存下标和元数据，
//!    迁移就是在两个列表之间移动一条记录
//!
//! # 替换策略
//!
//! refcount 为 0 的缓存块才能被替换，优先选择最近一次释放时间（tick）最早的。
//! 扫描逐桶进行，不做全局快照，所以只是近似的全局 LRU。
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bcache_core::{BlockId, BufferCache, MemoryDevice, TickCounter};
//!
//! let clock = Arc::new(TickCounter::new());
//! let cache = BufferCache::new(MemoryDevice::new(1024), clock.clone())?;
//!
//! // 读取块（未命中时从设备读取）
//! let mut buf = cache.read(BlockId::new(1, 33))?;
//!
//! // 修改并写穿
//! buf[0] = 42;
//! buf.commit()?;
//!
//! // 让日志层在释放后继续保持驻留
//! let pinned = buf.pin();
//! buf.release();
//! // ...
//! pinned.unpin();
//!
//! let stats = cache.stats();
//! println!("hit rate {:.2}, {} evictions", stats.hit_rate(), stats.evictions);
//! ```

mod block_cache;
mod bucket;
mod buffer;
mod handle;

pub use block_cache::{BufferCache, CacheStats, SlotInfo};
pub use buffer::SlotFlags;
pub use handle::{BufGuard, PinnedBuf};
