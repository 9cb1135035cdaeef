//! 解码器 trait 定义.
//!
//! 会话层只通过 `ModuleDecoder` 与解码器交互, 不关心模块格式和合成算法.

use modplay_core::{ModError, ModResult};

use crate::config::DecoderConfig;
use crate::module_info::ModuleInfo;

/// 模块解码器 trait
///
/// 解码流程:
/// 1. 调用 `init()` 重置为零状态
/// 2. 调用 `configure()` 设置采样率与立体声/音质参数
/// 3. 调用 `load()` 解析模块数据
/// 4. 反复调用 `fill_chunk()` 取出交错 S16 立体声 PCM
///
/// 相同的模块数据与配置必须产生完全相同的输出序列.
pub trait ModuleDecoder: Send {
    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 重置为未配置、未加载的零状态
    fn init(&mut self);

    /// 使用参数配置解码器
    fn configure(&mut self, config: &DecoderConfig) -> ModResult<()>;

    /// 解析模块数据, 必须在 `configure()` 之后调用
    fn load(&mut self, data: &[u8]) -> ModResult<()>;

    /// 生成接下来的 `nb_samples` 个立体声采样
    ///
    /// 写入 `out[..nb_samples * 2]`, 左右声道交错排列.
    ///
    /// # 返回
    /// - `Err(ModError::Codec)`: 尚未加载模块
    /// - `Err(ModError::InvalidArgument)`: `out` 容量不足
    fn fill_chunk(&mut self, out: &mut [i16], nb_samples: usize) -> ModResult<()>;

    /// 跳转到指定采样位置附近, 返回实际到达的位置
    fn seek(&mut self, _sample_pos: u64) -> ModResult<u64> {
        Err(ModError::Unsupported(format!("{} 不支持 seek", self.name())))
    }

    /// 计算整首乐曲的采样数 (到序列回绕为止)
    ///
    /// 计算会把播放位置重置到开头.
    fn duration(&mut self) -> ModResult<u64> {
        Err(ModError::Unsupported(format!("{} 不支持计算时长", self.name())))
    }

    /// 已加载模块的元数据
    fn info(&self) -> Option<ModuleInfo> {
        None
    }
}
