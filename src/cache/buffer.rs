//! 缓存块结构
//!
//! 一个缓存块 = 块数据 + 睡眠锁 + 状态标志。
//! 身份 `(dev, blockno)`、引用计数、释放时间戳由所属哈希桶保存，
//! 见 [`super::bucket::BucketEntry`]。

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use bitflags::bitflags;

use crate::sync::SleepLock;
use crate::types::SlotId;

bitflags! {
    /// 缓存块状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlotFlags: u8 {
        /// 数据与后备存储中当前身份对应的块一致
        const VALID = 0x01;
    }
}

/// 缓存块
///
/// 在缓存初始化时创建，之后只被回收复用，从不销毁。
///
/// - `data` 只能在持有睡眠锁时访问
/// - `flags` 中的 `VALID` 在两种情况下修改：持有睡眠锁的 `load`
///   把它置位；未命中路径在 refcount 为 0（无人持有睡眠锁）时把它清除
pub(crate) struct BufSlot {
    id: SlotId,
    flags: AtomicU8,
    data: SleepLock<Box<[u8]>>,
}

impl BufSlot {
    pub(crate) fn new(id: SlotId, block_size: usize) -> Self {
        Self {
            id,
            flags: AtomicU8::new(SlotFlags::empty().bits()),
            data: SleepLock::new(vec![0u8; block_size].into_boxed_slice(), "buffer"),
        }
    }

    pub(crate) fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn flags(&self) -> SlotFlags {
        SlotFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.flags().contains(SlotFlags::VALID)
    }

    pub(crate) fn mark_valid(&self) {
        self.flags.fetch_or(SlotFlags::VALID.bits(), Ordering::Release);
    }

    pub(crate) fn invalidate(&self) {
        self.flags.fetch_and(!SlotFlags::VALID.bits(), Ordering::Release);
    }

    pub(crate) fn lock(&self) -> &SleepLock<Box<[u8]>> {
        &self.data
    }
}

impl fmt::Debug for BufSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufSlot")
            .field("id", &self.id)
            .field("flags", &self.flags())
            .field("locked", &self.data.is_locked())
            .finish()
    }
}
