//! 睡眠锁
//!
//! 缓存块的独占锁。获取时可能无限期阻塞（持有者可能正在做磁盘 I/O），
//! 阻塞的线程会被挂起而不是忙等。锁记录持有者线程，
//! 用于 `commit` / `release` 的持有检查。

use core::fmt;
use core::ops::{Deref, DerefMut};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, MutexGuard};

use super::assert_no_shard_locks;

/// 记录持有者的阻塞锁
pub struct SleepLock<T> {
    name: &'static str,
    owner: Mutex<Option<ThreadId>>,
    inner: Mutex<T>,
}

impl<T> SleepLock<T> {
    /// 创建睡眠锁
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            owner: Mutex::new(None),
            inner: Mutex::new(data),
        }
    }

    /// 获取锁，必要时挂起当前线程
    ///
    /// 调用方不能持有任何 [`super::ShardLock`]。
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        assert_no_shard_locks(self.name);
        let inner = self.inner.lock();
        *self.owner.lock() = Some(thread::current().id());
        SleepLockGuard { lock: self, inner }
    }

    /// 当前线程是否持有该锁
    pub fn holding(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// 是否被任意线程持有
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

impl<T> fmt::Debug for SleepLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SleepLock")
            .field("name", &self.name)
            .field("owner", &*self.owner.lock())
            .finish()
    }
}

/// [`SleepLock`] 的守卫
///
/// 持有者记录在锁上，守卫不能跨线程移动。
pub struct SleepLockGuard<'a, T> {
    lock: &'a SleepLock<T>,
    inner: MutexGuard<'a, T>,
}

impl<'a, T> SleepLockGuard<'a, T> {
    /// 守卫所属的锁
    pub fn lock(&self) -> &'a SleepLock<T> {
        self.lock
    }
}

impl<T> Deref for SleepLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        // 先清除持有者，`inner` 随后释放
        *self.lock.owner.lock() = None;
    }
}
