//! 锁原语
//!
//! 缓存使用两层锁：
//!
//! - [`ShardLock`] - 短时持有的锁，保护哈希桶链表和全局分配流程
//! - [`SleepLock`] - 可能长时间持有的缓存块独占锁，持有期间可以做磁盘 I/O
//!
//! 加锁顺序固定为：先短锁（用完即放），最后获取睡眠锁。
//! 持有短锁时不允许阻塞在睡眠锁或后备存储上，调试构建下由
//! [`assert_no_shard_locks`] 检查。

mod shard;
mod sleep;

pub use shard::{shard_locks_held, ShardLock, ShardLockGuard};
pub use sleep::{SleepLock, SleepLockGuard};

/// 断言当前线程没有持有任何 [`ShardLock`]
///
/// 在可能阻塞的位置（获取睡眠锁、访问后备存储）之前调用。
#[inline]
pub fn assert_no_shard_locks(site: &'static str) {
    debug_assert_eq!(
        shard_locks_held(),
        0,
        "{}: shard lock held across a blocking call",
        site
    );
}
