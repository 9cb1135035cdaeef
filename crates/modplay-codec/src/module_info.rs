//! 已加载模块的元数据.

use serde::{Deserialize, Serialize};

/// 模块元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// 乐曲名称
    pub song_name: String,
    /// 格式签名 (如 "M.K.", "8CHN")
    pub format: String,
    /// 模块声道数
    pub channels: u32,
    /// 图案数量
    pub patterns: u32,
    /// 播放序列长度
    pub sequence_length: u32,
    /// 重新开始位置
    pub restart_position: u32,
    /// C-2 音符对应的采样率 (PAL 8287 / NTSC 8363)
    pub c2_rate: u32,
    /// 乐器名称, 按乐器编号 1..=31 排列
    pub instruments: Vec<String>,
}
