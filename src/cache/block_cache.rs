//! 块缓存管理器
//!
//! 固定容量、分桶加锁的缓冲区缓存。
//!
//! # 锁结构
//!
//! ```text
//! BufferCache
//!   alloc_lock : ShardLock<()>              串行化所有未命中路径
//!   buckets[i] : ShardLock<BucketList>      桶内身份 / refcount / 释放时间戳
//!   slots[j]   : SleepLock<Box<[u8]>>       块数据，持有者可以做 I/O
//! ```
//!
//! 命中路径只锁一个桶；未命中路径先拿分配锁，再锁目标桶，
//! 然后逐个扫描其余桶寻找全局最久未释放的空闲缓存块。
//! 睡眠锁总是在所有短锁释放之后才获取。

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::bucket::{Bucket, BucketEntry, BucketList};
use super::buffer::BufSlot;
use super::handle::BufGuard;
use crate::{
    block::BlockDevice,
    clock::Clock,
    error::{Error, ErrorKind, Result},
    sync::{ShardLock, ShardLockGuard},
    types::{BlockId, CacheConfig, SlotId},
};

/// 缓存统计信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 命中次数（包括未命中路径上二次检查命中）
    pub hits: u64,
    /// 未命中并分配缓存块的次数
    pub misses: u64,
    /// 回收了仍带有旧身份的缓存块的次数
    pub evictions: u64,
    /// 后备存储读取次数
    pub disk_reads: u64,
    /// 后备存储写入次数
    pub disk_writes: u64,
}

impl CacheStats {
    /// 计算命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
}

impl StatCounters {
    pub(crate) fn disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
            disk_writes: self.disk_writes.load(Ordering::Relaxed),
        }
    }
}

/// 单个缓存块的状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotInfo {
    /// 缓存块下标
    pub slot: SlotId,
    /// 所在哈希桶
    pub bucket: usize,
    /// 当前身份
    pub block: Option<BlockId>,
    /// 引用计数
    pub refcount: u32,
    /// 最近一次 refcount 归零时的 tick
    pub last_released: u64,
    /// 数据是否有效
    pub valid: bool,
}

/// 未命中路径上的替换候选
enum Victim<'a> {
    /// 在目标桶内（目标桶锁已持有）
    Home { index: usize, stamp: u64 },
    /// 在其他桶内，持有该桶的锁直到找到更好的候选
    Remote {
        list: ShardLockGuard<'a, BucketList>,
        index: usize,
        stamp: u64,
    },
}

impl Victim<'_> {
    fn stamp(&self) -> u64 {
        match self {
            Victim::Home { stamp, .. } | Victim::Remote { stamp, .. } => *stamp,
        }
    }
}

/// 块缓存
///
/// 缓存块和桶在构造时一次性分配，之后不再分配内存。
/// 多个线程通过 `&BufferCache` 共享同一个实例（通常放在 `Arc` 里）。
///
/// # 示例
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use bcache_core::{BlockId, BufferCache, MemoryDevice, TickCounter};
///
/// let clock = Arc::new(TickCounter::new());
/// let cache = BufferCache::new(MemoryDevice::new(1024), clock.clone())?;
///
/// let mut buf = cache.read(BlockId::new(0, 7))?;
/// buf[0] = 42;
/// buf.commit()?;
/// buf.release();
/// ```
pub struct BufferCache<D: BlockDevice> {
    device: D,
    clock: Arc<dyn Clock>,
    block_size: usize,
    slots: Box<[BufSlot]>,
    buckets: Box<[Bucket]>,
    alloc_lock: ShardLock<()>,
    pub(crate) stats: StatCounters,
}

impl<D: BlockDevice> BufferCache<D> {
    /// 使用默认配置创建缓存，块大小取自设备
    pub fn new(device: D, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = CacheConfig {
            block_size: device.block_size(),
            ..CacheConfig::default()
        };
        Self::with_config(device, clock, config)
    }

    /// 按配置创建缓存
    ///
    /// 缓存块按下标轮流放入各个桶，这只是初始位置，之后会随替换迁移。
    pub fn with_config(device: D, clock: Arc<dyn Clock>, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        if config.block_size != device.block_size() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "cache block size does not match device block size",
            ));
        }

        let slots: Box<[BufSlot]> = (0..config.slot_count)
            .map(|id| BufSlot::new(id, config.block_size))
            .collect();

        // 缓存块可能全部迁入同一个桶，每个桶按总数预留，之后插入不再分配
        let mut lists: Vec<BucketList> = (0..config.bucket_count)
            .map(|_| BucketList::with_capacity(config.slot_count))
            .collect();
        for slot in slots.iter() {
            lists[slot.id() % config.bucket_count].insert(BucketEntry::new(slot.id()));
        }
        let buckets: Box<[Bucket]> = lists.into_iter().map(Bucket::new).collect();

        log::debug!(
            "[BCACHE] init: {} slots x {} bytes, {} buckets",
            config.slot_count,
            config.block_size,
            config.bucket_count
        );

        Ok(Self {
            device,
            clock,
            block_size: config.block_size,
            slots,
            buckets,
            alloc_lock: ShardLock::new((), "bcache.alloc"),
            stats: StatCounters::default(),
        })
    }

    /// 获取块对应的缓存块（不读盘）
    ///
    /// 返回时 refcount 已加一，且调用者持有缓存块的睡眠锁。
    /// 数据可能无效，需要时调用 [`BufGuard::load`]。
    ///
    /// 所有缓存块都被引用时返回 `NoSpace`。
    pub fn get(&self, block: BlockId) -> Result<BufGuard<'_, D>> {
        let target = block.bucket(self.buckets.len());

        // 命中路径：只锁目标桶
        let mut list = self.buckets[target].lock();
        if let Some(slot) = list.acquire(block) {
            drop(list);
            return Ok(self.hit(slot, block));
        }
        drop(list);

        // 未命中路径
        let alloc = self.alloc_lock.lock();
        let mut list = self.buckets[target].lock();

        // 两次加锁之间，别的线程可能已经装入了同一个块
        if let Some(slot) = list.acquire(block) {
            drop(list);
            drop(alloc);
            return Ok(self.hit(slot, block));
        }

        let slot = self.recycle(target, &mut list, block)?;
        drop(list);
        drop(alloc);

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        Ok(self.lock_slot(slot, block))
    }

    /// 获取块并保证数据有效（必要时从后备存储读取）
    pub fn read(&self, block: BlockId) -> Result<BufGuard<'_, D>> {
        let mut buf = self.get(block)?;
        buf.load()?;
        Ok(buf)
    }

    fn hit(&self, slot: SlotId, block: BlockId) -> BufGuard<'_, D> {
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        log::trace!("[BCACHE] get {} HIT slot={}", block, slot);
        self.lock_slot(slot, block)
    }

    fn lock_slot(&self, slot: SlotId, block: BlockId) -> BufGuard<'_, D> {
        let data = self.slots[slot].lock().lock();
        BufGuard::new(self, slot, block, data)
    }

    /// 选出替换对象并迁入目标桶
    ///
    /// 调用者持有分配锁和目标桶锁。目标桶先看，其余桶按下标各扫描一次；
    /// 当前最佳候选所在的桶保持加锁，直到在别处找到时间戳严格更小的候选。
    /// 结果是近似的全局 LRU：已扫描过的桶在扫描后仍可能有新的释放。
    fn recycle(&self, target: usize, home: &mut BucketList, block: BlockId) -> Result<SlotId> {
        let mut best = home
            .least_recently_released()
            .map(|(index, stamp)| Victim::Home { index, stamp });

        for (i, bucket) in self.buckets.iter().enumerate() {
            if i == target {
                continue;
            }
            let list = bucket.lock();
            let Some((index, stamp)) = list.least_recently_released() else {
                continue;
            };
            if best.as_ref().map_or(true, |b| stamp < b.stamp()) {
                // 旧候选的桶锁随旧值一起释放
                best = Some(Victim::Remote { list, index, stamp });
            }
        }

        let Some(victim) = best else {
            log::error!(
                "[BCACHE] get {}: no buffers, all {} slots referenced",
                block,
                self.slots.len()
            );
            return Err(Error::new(ErrorKind::NoSpace, "bget: no buffers"));
        };

        let mut entry = match victim {
            Victim::Home { index, .. } => home.remove(index),
            Victim::Remote { mut list, index, .. } => list.remove(index),
        };
        let previous = entry.block.replace(block);
        entry.refcnt = 1;
        let slot = entry.slot;
        home.insert(entry);
        self.slots[slot].invalidate();

        match previous {
            Some(old) => {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                log::debug!("[BCACHE] get {} MISS, recycled slot={} (was {})", block, slot, old);
            }
            None => log::debug!("[BCACHE] get {} MISS, assigned fresh slot={}", block, slot),
        }
        Ok(slot)
    }

    /// 在所属桶锁内修改缓存块元数据
    fn with_entry<R>(
        &self,
        slot: SlotId,
        block: BlockId,
        site: &'static str,
        f: impl FnOnce(&mut BucketEntry) -> R,
    ) -> R {
        let mut list = self.buckets[block.bucket(self.buckets.len())].lock();
        match list.find_slot_mut(slot) {
            Some(entry) if entry.block == Some(block) => f(entry),
            _ => panic!("{}: slot {} is not resident as {}", site, slot, block),
        }
    }

    /// 释放：refcount 减一，归零时记录当前 tick
    ///
    /// 调用前睡眠锁必须已经释放。
    pub(crate) fn release_slot(&self, slot: SlotId, block: BlockId) {
        let now = self.clock.ticks();
        self.with_entry(slot, block, "brelse", |entry| {
            assert!(entry.refcnt > 0, "brelse: refcount underflow on slot {}", slot);
            entry.refcnt -= 1;
            if entry.refcnt == 0 {
                entry.last_released = now;
            }
        });
        log::trace!("[BCACHE] release {} slot={}", block, slot);
    }

    pub(crate) fn pin_slot(&self, slot: SlotId, block: BlockId) {
        self.with_entry(slot, block, "bpin", |entry| entry.refcnt += 1);
    }

    /// 取消 pin，不更新释放时间戳
    pub(crate) fn unpin_slot(&self, slot: SlotId, block: BlockId) {
        self.with_entry(slot, block, "bunpin", |entry| {
            assert!(entry.refcnt > 0, "bunpin: refcount underflow on slot {}", slot);
            entry.refcnt -= 1;
        });
    }

    pub(crate) fn slot(&self, slot: SlotId) -> &BufSlot {
        &self.slots[slot]
    }

    /// 底层设备
    pub fn device(&self) -> &D {
        &self.device
    }

    /// 块大小（字节）
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 缓存容量（缓存块数量）
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 哈希桶数量
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// 块当前是否驻留在缓存中（不论 refcount）
    pub fn contains(&self, block: BlockId) -> bool {
        self.buckets[block.bucket(self.buckets.len())]
            .lock()
            .iter()
            .any(|e| e.block == Some(block))
    }

    /// 所有缓存块的状态，按下标排序
    ///
    /// 桶逐个加锁读取，并发迁移时结果可能不一致，只在静止时准确。
    pub fn snapshot(&self) -> Vec<SlotInfo> {
        let mut infos = Vec::with_capacity(self.slots.len());
        for (bucket, b) in self.buckets.iter().enumerate() {
            let list = b.lock();
            infos.extend(list.iter().map(|e| SlotInfo {
                slot: e.slot,
                bucket,
                block: e.block,
                refcount: e.refcnt,
                last_released: e.last_released,
                valid: self.slots[e.slot].is_valid(),
            }));
        }
        infos.sort_by_key(|info| info.slot);
        infos
    }
}

impl<D: BlockDevice> fmt::Debug for BufferCache<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferCache")
            .field("capacity", &self.slots.len())
            .field("buckets", &self.buckets.len())
            .field("block_size", &self.block_size)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
