//! 短时锁
//!
//! 基于 `parking_lot::Mutex`，额外按线程统计当前持有的数量。

use core::cell::Cell;
use core::fmt;
use core::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

thread_local! {
    static HELD: Cell<usize> = const { Cell::new(0) };
}

/// 当前线程持有的 [`ShardLock`] 数量
pub fn shard_locks_held() -> usize {
    HELD.with(|held| held.get())
}

/// 短时持有的锁
///
/// 用于哈希桶和全局分配锁。临界区只做链表扫描和计数修改。
pub struct ShardLock<T> {
    name: &'static str,
    inner: Mutex<T>,
}

impl<T> ShardLock<T> {
    /// 创建锁
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            inner: Mutex::new(data),
        }
    }

    /// 获取锁
    pub fn lock(&self) -> ShardLockGuard<'_, T> {
        let inner = self.inner.lock();
        HELD.with(|held| held.set(held.get() + 1));
        ShardLockGuard { inner }
    }
}

impl<T> fmt::Debug for ShardLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardLock")
            .field("name", &self.name)
            .field("locked", &self.inner.is_locked())
            .finish()
    }
}

/// [`ShardLock`] 的守卫，离开作用域时释放
///
/// 内含 `parking_lot::MutexGuard`，因此不能跨线程移动。
pub struct ShardLockGuard<'a, T> {
    inner: MutexGuard<'a, T>,
}

impl<T> Deref for ShardLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for ShardLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for ShardLockGuard<'_, T> {
    fn drop(&mut self) {
        HELD.with(|held| held.set(held.get() - 1));
    }
}
