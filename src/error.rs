//! 错误类型定义
//!
//! 提供块缓存操作的错误类型。

use core::fmt;

/// 块缓存操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 后备存储 I/O 错误
    Io,
    /// 无效参数（配置、缓冲区大小）
    InvalidInput,
    /// 缓存容量耗尽：没有 refcount 为 0 的缓存块可供复用
    NoSpace,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self { kind, message }
    }

    /// 创建带原因的错误
    ///
    /// 原因只写入日志，不保存在错误值中
    pub fn with_cause(kind: ErrorKind, message: &'static str, cause: impl fmt::Debug) -> Self {
        log::error!("[BCACHE] {:?}: {} (cause: {:?})", kind, message, cause);
        Self { kind, message }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
