//! 缓存块句柄 - RAII 风格的块访问
//!
//! - [`BufGuard`]：持有缓存块睡眠锁的句柄，丢弃即释放（brelse）
//! - [`PinnedBuf`]：只占一个引用计数、不持有睡眠锁的句柄，丢弃即 unpin

use core::fmt;
use core::ops::{Deref, DerefMut};

use super::block_cache::BufferCache;
use crate::{
    block::BlockDevice,
    error::{Error, Result},
    sync::{assert_no_shard_locks, SleepLockGuard},
    types::{BlockId, SlotId},
};

/// 已加锁的缓存块
///
/// 由 [`BufferCache::get`] / [`BufferCache::read`] 返回。持有期间：
///
/// - 缓存块的 refcount 至少为 1，不会被替换
/// - 调用线程独占块数据，可以读写、`load`、`commit`
///
/// 丢弃时先释放睡眠锁，再在所属桶锁内把 refcount 减一；
/// 归零时记录当前 tick 作为释放时间。句柄不能跨线程移动。
///
/// # 示例
///
/// ```rust,ignore
/// let mut buf = cache.read(BlockId::new(dev, blockno))?;
/// buf[0..4].copy_from_slice(&magic);
/// buf.commit()?;
/// // buf 超出作用域时自动释放
/// ```
pub struct BufGuard<'a, D: BlockDevice> {
    cache: &'a BufferCache<D>,
    slot: SlotId,
    block: BlockId,
    /// 只在 drop 中取走，以保证先于 refcount 递减释放
    data: Option<SleepLockGuard<'a, Box<[u8]>>>,
}

impl<'a, D: BlockDevice> BufGuard<'a, D> {
    pub(crate) fn new(
        cache: &'a BufferCache<D>,
        slot: SlotId,
        block: BlockId,
        data: SleepLockGuard<'a, Box<[u8]>>,
    ) -> Self {
        Self {
            cache,
            slot,
            block,
            data: Some(data),
        }
    }

    /// 块标识
    pub fn block_id(&self) -> BlockId {
        self.block
    }

    pub(crate) fn slot(&self) -> SlotId {
        self.slot
    }

    /// 数据是否与后备存储一致
    pub fn is_valid(&self) -> bool {
        self.cache.slot(self.slot).is_valid()
    }

    /// 块数据
    pub fn data(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[..],
            None => unreachable!("buffer guard used after release"),
        }
    }

    /// 可变块数据
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.data {
            Some(data) => &mut data[..],
            None => unreachable!("buffer guard used after release"),
        }
    }

    /// 读穿：数据无效时从后备存储读取
    ///
    /// 读取期间不持有任何桶锁或分配锁，其他桶照常服务。
    /// 读取失败时数据保持无效，可以再次调用重试。
    pub fn load(&mut self) -> Result<()> {
        let cache = self.cache;
        let slot = cache.slot(self.slot);
        if slot.is_valid() {
            return Ok(());
        }

        assert_no_shard_locks("bread");
        let block = self.block;
        cache
            .device()
            .read_block(block, self.data_mut())
            .map_err(|e| Error::with_cause(e.kind(), "bread: backing store read failed", (block, e)))?;
        slot.mark_valid();
        cache.stats.disk_read();
        log::debug!("[BCACHE] load {} slot={}", block, self.slot);
        Ok(())
    }

    /// 写穿：把块数据同步写到后备存储
    ///
    /// 调用线程必须持有该缓存块的睡眠锁，否则视为调用方错误直接 panic。
    pub fn commit(&self) -> Result<()> {
        let slot = self.cache.slot(self.slot);
        assert!(
            slot.lock().holding(),
            "bwrite: slot {} ({}) not locked by caller",
            self.slot,
            self.block
        );

        assert_no_shard_locks("bwrite");
        self.cache
            .device()
            .write_block(self.block, self.data())
            .map_err(|e| Error::with_cause(e.kind(), "bwrite: backing store write failed", (self.block, e)))?;
        self.cache.stats.disk_write();
        log::debug!("[BCACHE] commit {} slot={}", self.block, self.slot);
        Ok(())
    }

    /// 额外增加一个引用，使缓存块在本句柄释放后仍然驻留
    ///
    /// 不涉及睡眠锁，也不修改释放时间戳。
    #[must_use = "dropping the pin unpins the buffer immediately"]
    pub fn pin(&self) -> PinnedBuf<'a, D> {
        self.cache.pin_slot(self.slot, self.block);
        log::trace!("[BCACHE] pin {} slot={}", self.block, self.slot);
        PinnedBuf {
            cache: self.cache,
            slot: self.slot,
            block: self.block,
        }
    }

    /// 释放缓存块，等同于 drop
    pub fn release(self) {}
}

impl<D: BlockDevice> Deref for BufGuard<'_, D> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl<D: BlockDevice> DerefMut for BufGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

impl<D: BlockDevice> Drop for BufGuard<'_, D> {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            debug_assert!(data.lock().holding(), "brelse: slot {} not locked by caller", self.slot);
            drop(data);
            self.cache.release_slot(self.slot, self.block);
        }
    }
}

impl<D: BlockDevice> fmt::Debug for BufGuard<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufGuard")
            .field("block", &self.block)
            .field("slot", &self.slot)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// pin 住的缓存块
///
/// 由 [`BufGuard::pin`] 返回，供上层（如日志层）跨多个操作保持块驻留。
/// 丢弃或调用 [`PinnedBuf::unpin`] 时 refcount 减一。
#[must_use = "dropping the pin unpins the buffer immediately"]
pub struct PinnedBuf<'a, D: BlockDevice> {
    cache: &'a BufferCache<D>,
    slot: SlotId,
    block: BlockId,
}

impl<D: BlockDevice> PinnedBuf<'_, D> {
    /// 块标识
    pub fn block_id(&self) -> BlockId {
        self.block
    }

    /// 取消 pin，等同于 drop
    pub fn unpin(self) {}
}

impl<D: BlockDevice> Drop for PinnedBuf<'_, D> {
    fn drop(&mut self) {
        self.cache.unpin_slot(self.slot, self.block);
        log::trace!("[BCACHE] unpin {} slot={}", self.block, self.slot);
    }
}

impl<D: BlockDevice> fmt::Debug for PinnedBuf<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedBuf")
            .field("block", &self.block)
            .field("slot", &self.slot)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryDevice;
    use crate::clock::TickCounter;
    use crate::types::CacheConfig;
    use std::sync::Arc;

    fn cache(slots: usize) -> BufferCache<MemoryDevice> {
        let config = CacheConfig {
            bucket_count: 5,
            slot_count: slots,
            block_size: 64,
        };
        BufferCache::with_config(MemoryDevice::new(64), Arc::new(TickCounter::new()), config).unwrap()
    }

    #[test]
    fn test_guard_data_access() {
        let cache = cache(2);
        let mut buf = cache.read(BlockId::new(0, 1)).unwrap();
        assert_eq!(buf.len(), 64);
        assert!(buf.data().iter().all(|&b| b == 0));

        buf.data_mut()[10] = 0x42;
        assert_eq!(buf[10], 0x42);
        assert_eq!(buf.block_id(), BlockId::new(0, 1));
    }

    #[test]
    fn test_drop_releases() {
        let cache = cache(1);
        {
            let _buf = cache.get(BlockId::new(0, 1)).unwrap();
            assert!(cache.get(BlockId::new(0, 2)).is_err());
        }
        assert!(cache.get(BlockId::new(0, 2)).is_ok());
    }

    #[test]
    fn test_pin_outlives_guard() {
        let cache = cache(1);
        let buf = cache.get(BlockId::new(0, 1)).unwrap();
        let pin = buf.pin();
        assert_eq!(pin.block_id(), BlockId::new(0, 1));
        buf.release();

        assert!(cache.get(BlockId::new(0, 2)).is_err());
        assert!(cache.contains(BlockId::new(0, 1)));

        drop(pin);
        assert!(cache.get(BlockId::new(0, 2)).is_ok());
    }

    #[test]
    fn test_slot_unlocked_after_release() {
        let cache = cache(1);
        let buf = cache.get(BlockId::new(0, 3)).unwrap();
        let slot = buf.slot();
        assert!(cache.slot(slot).lock().is_locked());
        buf.release();
        assert!(!cache.slot(slot).lock().is_locked());
    }

    #[test]
    fn test_guard_debug() {
        let cache = cache(1);
        let buf = cache.get(BlockId::new(2, 3)).unwrap();
        let text = format!("{:?}", buf);
        assert!(text.contains("BufGuard"));
        assert!(text.contains("valid: false"));
    }
}
