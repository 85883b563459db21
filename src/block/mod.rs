//! 块设备抽象
//!
//! 后备存储是外部协作者，缓存只依赖 [`BlockDevice`] 的同步读写。
//! [`MemoryDevice`] 是内存实现，带读写计数。

mod device;

pub use device::{BlockDevice, MemoryDevice};
