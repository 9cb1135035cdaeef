//! ProTracker 系列 `.mod` 解码器.
//!
//! 支持 M.K. / M!K! / FLT4 (4 声道) 与 xCHN / xxCH (多声道) 签名,
//! 实现全部 0x0-0xF 标准效果与 E0x-EFx 扩展效果.

mod channel;
mod module;
mod replay;

use log::debug;
use modplay_core::{ModError, ModResult};

use crate::config::DecoderConfig;
use crate::decoder::ModuleDecoder;
use crate::module_info::ModuleInfo;

use module::{MAX_CHANNELS, Module};
use replay::Replay;

/// 支持的采样率下限 (Hz)
pub const MIN_SAMPLE_RATE: u32 = 8000;
/// 支持的采样率上限 (Hz)
pub const MAX_SAMPLE_RATE: u32 = 128_000;

/// 数据是否为可识别的 ProTracker 模块
pub fn probe(data: &[u8]) -> bool {
    module::probe(data)
}

/// ProTracker 解码器
#[derive(Debug, Default)]
pub struct ProTrackerDecoder {
    /// 当前配置, `configure()` 之前为 None
    config: Option<DecoderConfig>,
    /// 回放状态, `load()` 之前为 None
    replay: Option<Replay>,
}

impl ProTrackerDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn replay_mut(&mut self) -> ModResult<&mut Replay> {
        self.replay
            .as_mut()
            .ok_or_else(|| ModError::Codec("模块未加载, 请先调用 load()".into()))
    }

    /// 跳转到序列位置与行, 超出范围时回到开头
    pub fn seek_sequence(&mut self, seq_pos: usize, row: usize) -> ModResult<()> {
        self.replay_mut()?.seek_sequence(seq_pos, row);
        Ok(())
    }

    /// 当前序列位置与行
    pub fn position(&self) -> Option<(usize, usize)> {
        self.replay.as_ref().map(|r| (r.sequence_pos(), r.row()))
    }
}

impl ModuleDecoder for ProTrackerDecoder {
    fn name(&self) -> &str {
        "protracker"
    }

    fn init(&mut self) {
        self.config = None;
        self.replay = None;
    }

    fn configure(&mut self, config: &DecoderConfig) -> ModResult<()> {
        config.validate()?;
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&config.sample_rate) {
            return Err(ModError::Unsupported(format!(
                "采样率 {} Hz 超出范围 {}..={}",
                config.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            )));
        }
        if let Some(replay) = self.replay.as_mut() {
            replay.apply_config(config)?;
        }
        self.config = Some(*config);
        debug!(
            "配置 {} 解码器: {} Hz, 分离度 {}%, 插值={}",
            self.name(),
            config.sample_rate,
            config.stereo_separation,
            config.interpolation,
        );
        Ok(())
    }

    fn load(&mut self, data: &[u8]) -> ModResult<()> {
        let config = self
            .config
            .ok_or_else(|| ModError::Codec("解码器未配置, 请先调用 configure()".into()))?;
        let module = Module::parse(data)?;
        debug!(
            "加载模块 \"{}\": 签名={}, {} 声道, {} 个图案, 序列长度 {}",
            module.song_name,
            module.format_tag(),
            module.num_channels,
            module.num_patterns,
            module.sequence_length,
        );
        debug_assert!(module.num_channels <= MAX_CHANNELS);
        self.replay = Some(Replay::new(module, &config)?);
        Ok(())
    }

    fn fill_chunk(&mut self, out: &mut [i16], nb_samples: usize) -> ModResult<()> {
        let needed = nb_samples
            .checked_mul(2)
            .ok_or_else(|| ModError::InvalidArgument(format!("采样数 {nb_samples} 溢出")))?;
        if out.len() < needed {
            return Err(ModError::InvalidArgument(format!(
                "输出缓冲容量 {} 不足, 需要 {}",
                out.len(),
                needed
            )));
        }
        let replay = self.replay_mut()?;
        replay.render(&mut out[..needed]);
        Ok(())
    }

    fn seek(&mut self, sample_pos: u64) -> ModResult<u64> {
        Ok(self.replay_mut()?.seek(sample_pos))
    }

    fn duration(&mut self) -> ModResult<u64> {
        Ok(self.replay_mut()?.song_duration())
    }

    fn info(&self) -> Option<ModuleInfo> {
        let module = self.replay.as_ref()?.module();
        Some(ModuleInfo {
            song_name: module.song_name.clone(),
            format: module.format_tag(),
            channels: module.num_channels as u32,
            patterns: module.num_patterns as u32,
            sequence_length: module.sequence_length as u32,
            restart_position: module.restart_pos as u32,
            c2_rate: module.c2_rate as u32,
            instruments: module.instruments[1..]
                .iter()
                .map(|ins| ins.name.clone())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::demo_module;

    fn loaded(rate: u32) -> ProTrackerDecoder {
        let mut dec = ProTrackerDecoder::new();
        dec.init();
        dec.configure(&DecoderConfig::session(rate)).unwrap();
        dec.load(&demo_module()).unwrap();
        dec
    }

    #[test]
    fn test_load_requires_configure() {
        let mut dec = ProTrackerDecoder::new();
        dec.init();
        let err = dec.load(&demo_module()).unwrap_err();
        assert!(matches!(err, ModError::Codec(_)));
    }

    #[test]
    fn test_fill_requires_load() {
        let mut dec = ProTrackerDecoder::new();
        dec.configure(&DecoderConfig::session(44100)).unwrap();
        let mut out = vec![0i16; 64];
        let err = dec.fill_chunk(&mut out, 32).unwrap_err();
        assert!(matches!(err, ModError::Codec(_)));
    }

    #[test]
    fn test_configure_rejects_unsupported_rate() {
        let mut dec = ProTrackerDecoder::new();
        for rate in [0, 4000, 192_000] {
            assert!(dec.configure(&DecoderConfig::session(rate)).is_err());
        }
        assert!(dec.configure(&DecoderConfig::session(8000)).is_ok());
        assert!(dec.configure(&DecoderConfig::session(128_000)).is_ok());
    }

    #[test]
    fn test_fill_chunk_checks_capacity() {
        let mut dec = loaded(44100);
        let mut out = vec![0i16; 10];
        let err = dec.fill_chunk(&mut out, 6).unwrap_err();
        assert!(matches!(err, ModError::InvalidArgument(_)));
    }

    #[test]
    fn test_fill_chunk_writes_only_requested_frames() {
        let mut dec = loaded(44100);
        let mut out = vec![i16::MAX; 2048 + 8];
        dec.fill_chunk(&mut out, 1024).unwrap();
        assert!(out[2048..].iter().all(|&s| s == i16::MAX));
    }

    #[test]
    fn test_init_resets_state() {
        let mut dec = loaded(44100);
        assert!(dec.info().is_some());
        dec.init();
        assert!(dec.info().is_none());
        assert!(dec.position().is_none());
        assert!(matches!(
            dec.load(&demo_module()),
            Err(ModError::Codec(_))
        ));
    }

    #[test]
    fn test_info_reports_module_metadata() {
        let dec = loaded(48000);
        let info = dec.info().unwrap();
        assert_eq!(info.song_name, "demo");
        assert_eq!(info.format, "M.K.");
        assert_eq!(info.channels, 4);
        assert_eq!(info.instruments.len(), 31);
        assert_eq!(info.instruments[0], "square");
    }

    #[test]
    fn test_duration_rewinds_playback() {
        let mut dec = loaded(44100);
        let mut first = vec![0i16; 4096];
        dec.fill_chunk(&mut first, 2048).unwrap();
        assert_eq!(dec.duration().unwrap(), 64 * 6 * 882);
        let mut again = vec![0i16; 4096];
        dec.fill_chunk(&mut again, 2048).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_reconfigure_after_load_keeps_module() {
        let mut dec = loaded(44100);
        dec.configure(&DecoderConfig::session(22050)).unwrap();
        let mut out = vec![0i16; 512];
        dec.fill_chunk(&mut out, 256).unwrap();
        assert_eq!(dec.duration().unwrap(), 64 * 6 * 441);
    }

    #[test]
    fn test_probe_decoder() {
        assert!(crate::decoders::probe_decoder(&demo_module()).is_some());
        assert!(crate::decoders::probe_decoder(b"not a module").is_none());
    }
}
