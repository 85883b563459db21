//! 后备存储接口
//!
//! 缓存只通过两个同步原语访问后备存储：读一个块、写一个块。

use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, ErrorKind, Result};
use crate::types::BlockId;

/// 块设备接口
///
/// 实现此 trait 以提供底层块设备访问。缓存会在多个线程上并发调用，
/// 实现需要自行保证内部同步。
///
/// # 示例
///
/// ```rust,ignore
/// use bcache_core::{BlockDevice, BlockId, Result};
///
/// struct VirtioDisk {
///     // ...
/// }
///
/// impl BlockDevice for VirtioDisk {
///     fn block_size(&self) -> usize {
///         1024
///     }
///
///     fn read_block(&self, id: BlockId, buf: &mut [u8]) -> Result<()> {
///         // 发起读请求并等待完成
///         Ok(())
///     }
///
///     fn write_block(&self, id: BlockId, buf: &[u8]) -> Result<()> {
///         // 发起写请求并等待完成
///         Ok(())
///     }
/// }
/// ```
pub trait BlockDevice: Send + Sync {
    /// 块大小（字节）
    fn block_size(&self) -> usize;

    /// 读取一个完整的块
    ///
    /// `buf.len()` 等于 [`BlockDevice::block_size`]。失败时不得暴露部分读取的数据。
    fn read_block(&self, id: BlockId, buf: &mut [u8]) -> Result<()>;

    /// 写入一个完整的块
    ///
    /// 返回时数据已落到后备存储。
    fn write_block(&self, id: BlockId, buf: &[u8]) -> Result<()>;
}

/// 内存块设备
///
/// 未写过的块读出全零。记录物理读写次数，可以注入延迟和故障，
/// 主要用于测试和演示。
#[derive(Debug)]
pub struct MemoryDevice {
    block_size: usize,
    blocks: Mutex<HashMap<BlockId, Box<[u8]>>>,
    latency: Option<Duration>,
    fail_io: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDevice {
    /// 创建内存设备
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            blocks: Mutex::new(HashMap::new()),
            latency: None,
            fail_io: AtomicBool::new(false),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// 每次读写额外休眠 `latency`，模拟慢速磁盘
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 打开或关闭故障注入；打开后所有读写返回 `Io` 错误
    pub fn set_failing(&self, failing: bool) {
        self.fail_io.store(failing, Ordering::SeqCst);
    }

    /// 物理读取次数
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// 物理写入次数
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// 直接查看设备上的块内容（绕过缓存）
    pub fn peek(&self, id: BlockId) -> Option<Vec<u8>> {
        self.blocks.lock().get(&id).map(|data| data.to_vec())
    }

    fn check(&self, buf_len: usize) -> Result<()> {
        if buf_len != self.block_size {
            return Err(Error::new(ErrorKind::InvalidInput, "buffer size does not match block size"));
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if self.fail_io.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Io, "injected device failure"));
        }
        Ok(())
    }
}

impl BlockDevice for MemoryDevice {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn read_block(&self, id: BlockId, buf: &mut [u8]) -> Result<()> {
        self.check(buf.len())?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.blocks.lock().get(&id) {
            Some(data) => buf.copy_from_slice(data),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_block(&self, id: BlockId, buf: &[u8]) -> Result<()> {
        self.check(buf.len())?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.blocks.lock().insert(id, buf.into());
        Ok(())
    }
}
