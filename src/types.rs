//! 基础数据结构定义

use core::fmt;

use crate::consts::{BSIZE, NBUCKETS, NBUF};
use crate::error::{Error, ErrorKind, Result};

/// 设备号
pub type DeviceId = u32;

/// 缓存块在缓存池中的下标
///
/// 缓存块在初始化时一次性创建，之后只通过下标引用，从不销毁。
pub type SlotId = usize;

/// 块标识：`(设备号, 块号)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    /// 设备号
    pub dev: DeviceId,
    /// 块号
    pub blockno: u32,
}

impl BlockId {
    /// 创建块标识
    pub const fn new(dev: DeviceId, blockno: u32) -> Self {
        Self { dev, blockno }
    }

    /// 计算所属哈希桶
    ///
    /// `(dev + blockno) % buckets`，在 u64 中计算避免溢出
    #[inline]
    pub fn bucket(&self, buckets: usize) -> usize {
        ((self.dev as u64 + self.blockno as u64) % buckets as u64) as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.blockno)
    }
}

/// 块缓存配置
///
/// 只在构造缓存时读取一次。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 哈希桶数量
    pub bucket_count: usize,
    /// 缓存块数量
    pub slot_count: usize,
    /// 块大小（字节），必须与后备存储一致
    pub block_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            bucket_count: NBUCKETS,
            slot_count: NBUF,
            block_size: BSIZE,
        }
    }
}

impl CacheConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.bucket_count == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "bucket count must be non-zero"));
        }
        if self.slot_count == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "slot count must be non-zero"));
        }
        if self.block_size == 0 {
            return Err(Error::new(ErrorKind::InvalidInput, "block size must be non-zero"));
        }
        if !is_prime(self.bucket_count) {
            log::warn!(
                "[BCACHE] bucket count {} is not prime, keys may cluster",
                self.bucket_count
            );
        }
        Ok(())
    }
}

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    let mut i = 2;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 1;
    }
    true
}
