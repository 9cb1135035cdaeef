//! 解码器配置.

use modplay_core::{ModError, ModResult};
use serde::{Deserialize, Serialize};

fn default_separation() -> u8 {
    DecoderConfig::FULL_SEPARATION
}

fn default_true() -> bool {
    true
}

/// 解码器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// 输出采样率 (Hz)
    pub sample_rate: u32,
    /// 立体声分离度百分比: 0 为单声道, 100 为 Amiga 硬声像
    #[serde(default = "default_separation")]
    pub stereo_separation: u8,
    /// 是否启用线性插值 (关闭时取最近采样点)
    #[serde(default = "default_true")]
    pub interpolation: bool,
}

impl DecoderConfig {
    /// 完全分离
    pub const FULL_SEPARATION: u8 = 100;

    /// 会话层使用的固定配置: 完全立体声分离, 开启插值
    pub fn session(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stereo_separation: Self::FULL_SEPARATION,
            interpolation: true,
        }
    }

    /// 检查与具体解码器无关的参数
    pub fn validate(&self) -> ModResult<()> {
        if self.sample_rate == 0 {
            return Err(ModError::InvalidArgument("采样率不能为 0".into()));
        }
        if self.stereo_separation > Self::FULL_SEPARATION {
            return Err(ModError::InvalidArgument(format!(
                "立体声分离度 {} 超出范围 0..=100",
                self.stereo_separation
            )));
        }
        Ok(())
    }

    /// 分离度的 0.0..=1.0 表示
    pub fn separation_factor(&self) -> f64 {
        f64::from(self.stereo_separation) / f64::from(Self::FULL_SEPARATION)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self::session(48000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_profile() {
        let cfg = DecoderConfig::session(44100);
        assert_eq!(cfg.sample_rate, 44100);
        assert_eq!(cfg.stereo_separation, 100);
        assert!(cfg.interpolation);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.separation_factor(), 1.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = DecoderConfig::session(0);
        assert!(matches!(zero.validate(), Err(ModError::InvalidArgument(_))));

        let wide = DecoderConfig {
            stereo_separation: 101,
            ..DecoderConfig::default()
        };
        assert!(matches!(wide.validate(), Err(ModError::InvalidArgument(_))));
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let cfg: DecoderConfig = serde_json::from_str(r#"{"sample_rate": 22050}"#).unwrap();
        assert_eq!(cfg, DecoderConfig::session(22050));
    }
}
