//! 会话管理.
//!
//! 会话要么完整初始化并加载完毕, 要么不存在: `create()` 在任何一步失败时
//! 都不会返回部分构造的会话.

use log::debug;
use modplay_codec::{DecoderConfig, ModuleDecoder, ModuleInfo, ProTrackerDecoder};
use modplay_core::{ChannelLayout, ModResult};

use crate::error::SessionError;

/// 一个已加载、可播放的模块实例
///
/// 会话独占解码器状态, 不同会话之间互不影响.
pub struct Session {
    decoder: Box<dyn ModuleDecoder>,
    sample_rate: u32,
}

impl Session {
    /// 使用内置 ProTracker 解码器创建会话
    pub fn create(data: &[u8], sample_rate: u32) -> Result<Self, SessionError> {
        Self::create_with(Box::new(ProTrackerDecoder::new()), data, sample_rate)
    }

    /// 使用指定解码器创建会话
    ///
    /// 依次执行 init -> configure -> load, 任一步失败都会丢弃解码器并返回错误.
    pub fn create_with(
        mut decoder: Box<dyn ModuleDecoder>,
        data: &[u8],
        sample_rate: u32,
    ) -> Result<Self, SessionError> {
        if data.is_empty() {
            return Err(SessionError::InvalidInput("模块缓冲为空".into()));
        }
        if sample_rate == 0 {
            return Err(SessionError::InvalidInput("采样率必须为正数".into()));
        }

        decoder.init();
        decoder
            .configure(&DecoderConfig::session(sample_rate))
            .map_err(SessionError::from_decoder)?;
        decoder.load(data).map_err(SessionError::from_decoder)?;

        debug!(
            "创建会话: 解码器={}, {} Hz, 模块 {} 字节",
            decoder.name(),
            sample_rate,
            data.len()
        );
        Ok(Self {
            decoder,
            sample_rate,
        })
    }

    /// 销毁会话, 释放解码器状态
    pub fn destroy(self) {
        debug!("销毁会话: 解码器={}", self.decoder.name());
    }

    /// 输出采样率 (Hz)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 输出声道布局, 固定为立体声
    pub fn channel_layout(&self) -> ChannelLayout {
        ChannelLayout::STEREO
    }

    /// 已加载模块的元数据
    pub fn info(&self) -> Option<ModuleInfo> {
        self.decoder.info()
    }

    /// 乐曲总采样数, 计算后播放位置回到开头
    pub fn duration(&mut self) -> ModResult<u64> {
        self.decoder.duration()
    }

    /// 跳转到采样位置附近, 返回实际位置
    pub fn seek(&mut self, sample_pos: u64) -> ModResult<u64> {
        self.decoder.seek(sample_pos)
    }

    /// 回到乐曲开头
    pub fn rewind(&mut self) -> ModResult<()> {
        self.decoder.seek(0).map(|_| ())
    }

    pub(crate) fn decoder_mut(&mut self) -> &mut dyn ModuleDecoder {
        self.decoder.as_mut()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("decoder", &self.decoder.name())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// 边界层的浮点采样率转换为整数 Hz, 截断小数部分
///
/// 非有限值、非正值或截断后为 0 时返回 None.
pub fn sample_rate_from_f32(rate: f32) -> Option<u32> {
    if !rate.is_finite() || rate < 1.0 || rate > u32::MAX as f32 {
        return None;
    }
    Some(rate as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_decoder::{FailAt, RampDecoder};
    use modplay_codec::testing::demo_module;

    #[test]
    fn test_create_with_protracker() {
        let session = Session::create(&demo_module(), 44100).unwrap();
        assert_eq!(session.sample_rate(), 44100);
        assert_eq!(session.channel_layout(), ChannelLayout::STEREO);
        assert_eq!(session.info().unwrap().format, "M.K.");
        session.destroy();
    }

    #[test]
    fn test_create_rejects_empty_buffer() {
        let err = Session::create(&[], 44100).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
    }

    #[test]
    fn test_create_rejects_zero_rate() {
        let err = Session::create(&demo_module(), 0).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
    }

    #[test]
    fn test_parse_failure_is_initialization_error() {
        let err = Session::create(b"definitely not a tracker module", 44100).unwrap_err();
        assert!(matches!(err, SessionError::Initialization(_)));
    }

    #[test]
    fn test_unsupported_rate_is_initialization_error() {
        let err = Session::create(&demo_module(), 1000).unwrap_err();
        assert!(matches!(err, SessionError::Initialization(_)));
    }

    #[test]
    fn test_decoder_steps_run_in_order() {
        let (decoder, probe) = RampDecoder::new();
        let session = Session::create_with(Box::new(decoder), b"x", 32000).unwrap();
        assert_eq!(probe.steps(), vec!["init", "configure", "load"]);
        assert_eq!(probe.configured_rate(), Some(32000));
        drop(session);
    }

    #[test]
    fn test_failures_map_to_session_errors() {
        let (decoder, _) = RampDecoder::failing(FailAt::Configure);
        let err = Session::create_with(Box::new(decoder), b"x", 44100).unwrap_err();
        assert!(matches!(err, SessionError::Initialization(_)));

        let (decoder, _) = RampDecoder::failing(FailAt::Load);
        let err = Session::create_with(Box::new(decoder), b"x", 44100).unwrap_err();
        assert!(matches!(err, SessionError::Initialization(_)));

        let (decoder, _) = RampDecoder::failing(FailAt::LoadOutOfMemory);
        let err = Session::create_with(Box::new(decoder), b"x", 44100).unwrap_err();
        assert!(matches!(err, SessionError::Allocation(_)));
    }

    #[test]
    fn test_rewind_restarts_output() {
        let mut session = Session::create(&demo_module(), 48000).unwrap();
        let mut l1 = vec![0.0f32; 700];
        let mut r1 = vec![0.0f32; 700];
        session.fill(&mut l1, &mut r1, 700).unwrap();
        session.rewind().unwrap();
        let mut l2 = vec![0.0f32; 700];
        let mut r2 = vec![0.0f32; 700];
        session.fill(&mut l2, &mut r2, 700).unwrap();
        assert_eq!(l1, l2);
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_sample_rate_from_f32() {
        assert_eq!(sample_rate_from_f32(44100.0), Some(44100));
        assert_eq!(sample_rate_from_f32(48000.9), Some(48000));
        assert_eq!(sample_rate_from_f32(0.0), None);
        assert_eq!(sample_rate_from_f32(0.5), None);
        assert_eq!(sample_rate_from_f32(-44100.0), None);
        assert_eq!(sample_rate_from_f32(f32::NAN), None);
        assert_eq!(sample_rate_from_f32(f32::INFINITY), None);
    }
}
