//! 测试用解码器: 输出可预测的锯齿波并记录调用序列.

use std::sync::{Arc, Mutex};

use modplay_codec::{DecoderConfig, ModuleDecoder};
use modplay_core::{ModError, ModResult};

/// 在哪一步注入失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Configure,
    Load,
    LoadOutOfMemory,
    Fill,
}

#[derive(Debug, Default)]
struct Record {
    steps: Vec<&'static str>,
    requests: Vec<usize>,
    rate: Option<u32>,
}

/// 解码器调用记录的共享视图
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<Mutex<Record>>);

impl Probe {
    pub fn steps(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().steps.clone()
    }

    pub fn requests(&self) -> Vec<usize> {
        self.0.lock().unwrap().requests.clone()
    }

    pub fn configured_rate(&self) -> Option<u32> {
        self.0.lock().unwrap().rate
    }
}

/// 第 n 帧输出 (左, 右) = (n * 331 回绕, 其相反数), 覆盖 i16 全范围
pub struct RampDecoder {
    frame: usize,
    fail_at: Option<FailAt>,
    probe: Probe,
}

impl RampDecoder {
    pub fn new() -> (Self, Probe) {
        Self::build(None)
    }

    pub fn failing(fail_at: FailAt) -> (Self, Probe) {
        Self::build(Some(fail_at))
    }

    fn build(fail_at: Option<FailAt>) -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                frame: 0,
                fail_at,
                probe: probe.clone(),
            },
            probe,
        )
    }

    pub fn expected_frame(n: usize) -> (i16, i16) {
        let l = (n as i64 * 331).rem_euclid(65536) as u16 as i16;
        (l, l.wrapping_neg())
    }

    fn record(&self, step: &'static str) {
        self.probe.0.lock().unwrap().steps.push(step);
    }
}

impl ModuleDecoder for RampDecoder {
    fn name(&self) -> &str {
        "ramp"
    }

    fn init(&mut self) {
        self.frame = 0;
        self.record("init");
    }

    fn configure(&mut self, config: &DecoderConfig) -> ModResult<()> {
        self.record("configure");
        if self.fail_at == Some(FailAt::Configure) {
            return Err(ModError::Unsupported("配置失败".into()));
        }
        self.probe.0.lock().unwrap().rate = Some(config.sample_rate);
        Ok(())
    }

    fn load(&mut self, _data: &[u8]) -> ModResult<()> {
        self.record("load");
        match self.fail_at {
            Some(FailAt::Load) => Err(ModError::InvalidData("解析失败".into())),
            Some(FailAt::LoadOutOfMemory) => Err(ModError::OutOfMemory("采样数据".into())),
            _ => Ok(()),
        }
    }

    fn fill_chunk(&mut self, out: &mut [i16], nb_samples: usize) -> ModResult<()> {
        self.probe.0.lock().unwrap().requests.push(nb_samples);
        if self.fail_at == Some(FailAt::Fill) {
            return Err(ModError::Codec("模块未加载".into()));
        }
        for frame in out[..nb_samples * 2].chunks_exact_mut(2) {
            let (l, r) = Self::expected_frame(self.frame);
            frame[0] = l;
            frame[1] = r;
            self.frame += 1;
        }
        Ok(())
    }
}
