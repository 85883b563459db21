//! bcache_core: 分桶加锁的块缓存
//!
//! 这是一个纯 Rust 实现的缓冲区缓存（buffer cache）库，提供：
//! - **固定容量**：缓存块在初始化时一次性分配，运行期间只回收复用
//! - **分桶加锁**：命中路径只锁一个哈希桶，未命中路径由全局分配锁串行化
//! - **两层锁**：短时持有的桶锁 + 可跨 I/O 持有的缓存块睡眠锁
//! - **RAII 句柄**：释放、unpin 都由句柄的 drop 完成，refcount 不会泄漏或变负
//!
//! # 示例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bcache_core::{BlockDevice, BlockId, BufferCache, TickCounter, Result};
//!
//! // 实现 BlockDevice trait
//! struct MyDisk {
//!     // ...
//! }
//!
//! impl BlockDevice for MyDisk {
//!     // 实现必要的方法
//!     // ...
//! }
//!
//! fn main() -> Result<()> {
//!     let clock = Arc::new(TickCounter::new());
//!     let cache = BufferCache::new(MyDisk::new(), clock.clone())?;
//!
//!     // 读取块
//!     let buf = cache.read(BlockId::new(1, 0))?;
//!     println!("first byte: {:02x}", buf[0]);
//!
//!     Ok(())
//! }
//! ```
//!
//! # 模块结构
//!
//! - [`error`] - 错误类型定义
//! - [`block`] - 后备存储接口
//! - [`cache`] - 块缓存
//! - [`sync`] - 桶锁与睡眠锁
//! - [`clock`] - tick 时钟
//! - [`consts`] - 常量定义
//! - [`types`] - 数据结构定义

#![deny(unsafe_code)]
#![warn(missing_docs)]

// ===== 核心模块 =====

/// 错误处理
pub mod error;

/// 后备存储接口
pub mod block;

/// 块缓存
pub mod cache;

/// 锁原语
pub mod sync;

/// 时钟源
pub mod clock;

/// 常量定义
pub mod consts;

/// 数据结构定义
pub mod types;

// ===== 公共导出 =====

// 错误处理
pub use error::{Error, ErrorKind, Result};

// 后备存储
pub use block::{BlockDevice, MemoryDevice};

// 缓存
pub use cache::{BufGuard, BufferCache, CacheStats, PinnedBuf, SlotFlags, SlotInfo};

// 时钟
pub use clock::{Clock, TickCounter};

// 类型
pub use types::{BlockId, CacheConfig, DeviceId, SlotId};
