//! 统一错误类型定义.
//!
//! 所有 modplay crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// modplay 统一错误类型
#[derive(Debug, Error)]
pub enum ModError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 解码器状态错误 (未配置、未加载等)
    #[error("解码器错误: {0}")]
    Codec(String),

    /// 无效数据 (损坏或无法识别的模块文件)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),
}

impl ModError {
    /// 是否为内存分配失败
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

impl From<std::collections::TryReserveError> for ModError {
    fn from(err: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory(err.to_string())
    }
}

/// modplay 统一 Result 类型
pub type ModResult<T> = Result<T, ModError>;
