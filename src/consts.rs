//! 块缓存常量定义
//!
//! 缓存的规模在初始化时固定，运行期间不可调整。
//! 这里给出默认值，[`crate::CacheConfig::default`] 使用它们。

/// 默认哈希桶数量
///
/// 使用素数让 `(dev + blockno) % NBUCKETS` 分布更均匀
pub const NBUCKETS: usize = 13;

/// 单个文件系统操作最多写入的块数
pub const MAXOPBLOCKS: usize = 10;

/// 默认缓存块数量（缓存总容量）
pub const NBUF: usize = MAXOPBLOCKS * 3;

/// 默认块大小（字节）
pub const BSIZE: usize = 1024;
