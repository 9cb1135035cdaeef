//! 会话层错误类型.

use std::os::raw::c_int;

use modplay_core::ModError;
use thiserror::Error;

/// 成功
pub const MODPLAY_OK: c_int = 0;
/// 输入无效 (空缓冲、非法采样率、空输出指针)
pub const MODPLAY_ERR_INVALID_INPUT: c_int = -1;
/// 内存分配失败
pub const MODPLAY_ERR_ALLOCATION: c_int = -2;
/// 解码器配置或模块解析失败
pub const MODPLAY_ERR_INITIALIZATION: c_int = -3;

/// 会话创建失败的原因
#[derive(Debug, Error)]
pub enum SessionError {
    /// 输入无效
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    Allocation(#[source] ModError),

    /// 解码器配置或模块解析失败
    #[error("解码器初始化失败: {0}")]
    Initialization(#[source] ModError),
}

impl SessionError {
    /// 按解码器错误类别区分分配失败与初始化失败
    pub fn from_decoder(err: ModError) -> Self {
        if err.is_out_of_memory() {
            Self::Allocation(err)
        } else {
            Self::Initialization(err)
        }
    }

    /// 对应的 FFI 状态码
    pub fn status_code(&self) -> c_int {
        match self {
            Self::InvalidInput(_) => MODPLAY_ERR_INVALID_INPUT,
            Self::Allocation(_) => MODPLAY_ERR_ALLOCATION,
            Self::Initialization(_) => MODPLAY_ERR_INITIALIZATION,
        }
    }
}
