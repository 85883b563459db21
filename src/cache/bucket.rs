//! 哈希桶
//!
//! 每个桶用自己的 [`ShardLock`] 保护一组缓存块的元数据。
//! 桶的成员关系只用于查找分片，不代表任何缓存策略；
//! 缓存块只会在未命中路径上、持有全局分配锁时在桶之间迁移。

use crate::sync::{ShardLock, ShardLockGuard};
use crate::types::{BlockId, SlotId};

/// 桶内一个缓存块的元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketEntry {
    /// 缓存块下标
    pub slot: SlotId,
    /// 当前身份，初始化后尚未分配时为 `None`
    pub block: Option<BlockId>,
    /// 活跃持有者数量（持锁使用者 + pin）
    pub refcnt: u32,
    /// refcount 最近一次归零时的 tick
    pub last_released: u64,
}

impl BucketEntry {
    pub(crate) fn new(slot: SlotId) -> Self {
        Self {
            slot,
            block: None,
            refcnt: 0,
            last_released: 0,
        }
    }
}

/// 桶内缓存块列表
///
/// 无序集合，`remove` 用 `swap_remove` 做到 O(1)。
#[derive(Debug)]
pub(crate) struct BucketList {
    entries: Vec<BucketEntry>,
}

impl BucketList {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &BucketEntry> {
        self.entries.iter()
    }

    /// 插入一个缓存块，不得超出构造时预留的容量
    pub(crate) fn insert(&mut self, entry: BucketEntry) {
        debug_assert!(
            self.entries.len() < self.entries.capacity(),
            "bucket list full: {} entries",
            self.entries.len()
        );
        self.entries.push(entry);
    }

    pub(crate) fn remove(&mut self, index: usize) -> BucketEntry {
        self.entries.swap_remove(index)
    }

    /// 按身份查找，命中则 refcount 加一并返回缓存块下标
    pub(crate) fn acquire(&mut self, block: BlockId) -> Option<SlotId> {
        let entry = self.entries.iter_mut().find(|e| e.block == Some(block))?;
        entry.refcnt += 1;
        Some(entry.slot)
    }

    /// 按缓存块下标查找
    pub(crate) fn find_slot_mut(&mut self, slot: SlotId) -> Option<&mut BucketEntry> {
        self.entries.iter_mut().find(|e| e.slot == slot)
    }

    /// 桶内 refcount 为 0 且释放时间最早的缓存块，返回 `(位置, 时间戳)`
    ///
    /// 时间戳相同时取先遇到的那个
    pub(crate) fn least_recently_released(&self) -> Option<(usize, u64)> {
        let mut best: Option<(usize, u64)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.refcnt != 0 {
                continue;
            }
            if best.map_or(true, |(_, stamp)| entry.last_released < stamp) {
                best = Some((index, entry.last_released));
            }
        }
        best
    }
}

/// 哈希桶
#[derive(Debug)]
pub(crate) struct Bucket {
    list: ShardLock<BucketList>,
}

impl Bucket {
    pub(crate) fn new(list: BucketList) -> Self {
        Self {
            list: ShardLock::new(list, "bcache.bucket"),
        }
    }

    pub(crate) fn lock(&self) -> ShardLockGuard<'_, BucketList> {
        self.list.lock()
    }
}
