//! 单个模块声道: 音符触发、逐 tick 效果与重采样混音.

use super::module::{KEY_TO_PERIOD, MAX_KEY, Module};

/// 微调系数, 以 4096 (无微调) 为中心
const FINE_TUNING: [i32; 16] = [
    4340, 4308, 4277, 4247, 4216, 4186, 4156, 4126, 4096, 4067, 4037, 4008, 3979, 3951, 3922,
    3894,
];

/// 半个周期的正弦表
const SINE_TABLE: [i32; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, 255, 253, 250, 244,
    235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];

// 内部效果号: 0x0-0xF 为标准效果, 0x10-0x1F 为 Exx 扩展效果, 无参数的 0 效果映射为 0xE (琶音)
const FX_PORTA_UP: i32 = 0x01;
const FX_PORTA_DOWN: i32 = 0x02;
const FX_TONE_PORTA: i32 = 0x03;
const FX_VIBRATO: i32 = 0x04;
const FX_TONE_PORTA_VOL_SLIDE: i32 = 0x05;
const FX_VIBRATO_VOL_SLIDE: i32 = 0x06;
const FX_TREMOLO: i32 = 0x07;
const FX_SET_PANNING: i32 = 0x08;
const FX_SAMPLE_OFFSET: i32 = 0x09;
const FX_VOLUME_SLIDE: i32 = 0x0a;
const FX_SET_VOLUME: i32 = 0x0c;
pub(crate) const FX_ARPEGGIO: i32 = 0x0e;
const FX_FINE_PORTA_UP: i32 = 0x11;
const FX_FINE_PORTA_DOWN: i32 = 0x12;
const FX_VIBRATO_WAVEFORM: i32 = 0x14;
const FX_SET_FINE_TUNE: i32 = 0x15;
const FX_TREMOLO_WAVEFORM: i32 = 0x17;
const FX_RETRIG: i32 = 0x19;
const FX_FINE_VOLUME_UP: i32 = 0x1a;
const FX_FINE_VOLUME_DOWN: i32 = 0x1b;
const FX_NOTE_CUT: i32 = 0x1c;
const FX_NOTE_DELAY: i32 = 0x1d;

/// 声道状态
#[derive(Debug, Clone)]
pub(crate) struct Channel {
    note_key: i32,
    note_effect: i32,
    note_param: i32,
    note_ins: i32,
    /// 正在播放的乐器
    instrument: usize,
    /// 最近一次指定的乐器, 下一个音符生效
    assigned: usize,
    sample_offset: i32,
    /// 采样读取位置 (小数部分用于插值)
    sample_idx: f64,
    /// 播放频率 (采样/秒)
    freq: f64,
    volume: i32,
    /// 声像 0 (右) ..= 127 (左)
    panning: i32,
    fine_tune: i32,
    /// 当前振幅
    ampl: f64,
    period: i32,
    porta_period: i32,
    porta_speed: i32,
    fx_count: i32,
    vibrato_type: i32,
    vibrato_phase: i32,
    vibrato_speed: i32,
    vibrato_depth: i32,
    tremolo_type: i32,
    tremolo_phase: i32,
    tremolo_speed: i32,
    tremolo_depth: i32,
    tremolo_add: i32,
    vibrato_add: i32,
    arpeggio_add: i32,
    random_seed: i32,
    /// 图案循环标记行
    pub pl_row: i32,
}

impl Channel {
    /// 创建第 `id` 个声道, 按 L R R L 的 Amiga 方式分配声像
    pub fn new(id: usize) -> Self {
        let panning = match id & 0x3 {
            1 | 2 => 127,
            _ => 0,
        };
        Self {
            note_key: 0,
            note_effect: 0,
            note_param: 0,
            note_ins: 0,
            instrument: 0,
            assigned: 0,
            sample_offset: 0,
            sample_idx: 0.0,
            freq: 0.0,
            volume: 0,
            panning,
            fine_tune: 0,
            ampl: 0.0,
            period: 0,
            porta_period: 0,
            porta_speed: 0,
            fx_count: 0,
            vibrato_type: 0,
            vibrato_phase: 0,
            vibrato_speed: 0,
            vibrato_depth: 0,
            tremolo_type: 0,
            tremolo_phase: 0,
            tremolo_speed: 0,
            tremolo_depth: 0,
            tremolo_add: 0,
            vibrato_add: 0,
            arpeggio_add: 0,
            random_seed: (id as i32 + 1) * 0xabcdef,
            pl_row: 0,
        }
    }

    /// 将本声道重采样后累加到交错立体声缓冲 `out` 的前 `count` 帧
    ///
    /// 只读取采样位置, 不推进; 推进由 `update_sample_idx()` 完成.
    pub fn resample(
        &self,
        module: &Module,
        out: &mut [f32],
        count: usize,
        sample_rate: f64,
        interpolate: bool,
        separation: f64,
    ) {
        if self.ampl <= 0.0 {
            return;
        }
        let ins = &module.instruments[self.instrument];
        let loop_len = ins.loop_length as f64;
        let loop_end = (ins.loop_start + ins.loop_length) as f64;
        let data = &ins.sample_data;
        let step = self.freq / sample_rate;

        let pan = 63.5 + (f64::from(self.panning) - 63.5) * separation;
        let l_gain = self.ampl * pan / 32768.0;
        let r_gain = self.ampl * (127.0 - pan) / 32768.0;

        let mut sam_idx = self.sample_idx;
        for frame in out[..count * 2].chunks_exact_mut(2) {
            if sam_idx >= loop_end {
                if loop_len <= 1.0 {
                    break;
                }
                while sam_idx >= loop_end {
                    sam_idx -= loop_len;
                }
            }
            let x = sam_idx as usize;
            let c = f64::from(data[x]);
            let y = if interpolate {
                let m = f64::from(data[x + 1]) - c;
                m * (sam_idx - x as f64) + c
            } else {
                c
            };
            frame[0] += (y * l_gain) as f32;
            frame[1] += (y * r_gain) as f32;
            sam_idx += step;
        }
    }

    /// 推进 `count` 个输出采样对应的采样位置
    pub fn update_sample_idx(&mut self, module: &Module, count: usize, sample_rate: f64) {
        self.sample_idx += self.freq / sample_rate * count as f64;
        let ins = &module.instruments[self.instrument];
        let loop_start = ins.loop_start as f64;
        if self.sample_idx > loop_start {
            if ins.loop_length > 1 {
                let wrapped = (self.sample_idx - loop_start) % ins.loop_length as f64;
                self.sample_idx = loop_start + wrapped;
            } else {
                self.sample_idx = loop_start;
            }
        }
    }

    /// 处理新的一行
    pub fn row(&mut self, module: &Module, key: i32, ins: i32, effect: i32, param: i32) {
        self.note_key = key;
        self.note_ins = ins;
        self.note_effect = effect;
        self.note_param = param;
        self.vibrato_add = 0;
        self.tremolo_add = 0;
        self.arpeggio_add = 0;
        self.fx_count = 0;
        if !(effect == FX_NOTE_DELAY && param > 0) {
            self.trigger(module);
        }
        match effect {
            FX_TONE_PORTA => {
                if param > 0 {
                    self.porta_speed = param;
                }
            }
            FX_VIBRATO => {
                if param & 0xf0 > 0 {
                    self.vibrato_speed = param >> 4;
                }
                if param & 0x0f > 0 {
                    self.vibrato_depth = param & 0xf;
                }
                self.vibrato();
            }
            FX_VIBRATO_VOL_SLIDE => self.vibrato(),
            FX_TREMOLO => {
                if param & 0xf0 > 0 {
                    self.tremolo_speed = param >> 4;
                }
                if param & 0x0f > 0 {
                    self.tremolo_depth = param & 0xf;
                }
                self.tremolo();
            }
            // 4 声道 ProTracker 模块忽略声像设置
            FX_SET_PANNING => {
                if module.num_channels != 4 {
                    self.panning = param.min(127);
                }
            }
            FX_SET_VOLUME => self.volume = param.min(64),
            FX_FINE_PORTA_UP => self.period = (self.period - param).max(0),
            FX_FINE_PORTA_DOWN => self.period = (self.period + param).min(65535),
            FX_VIBRATO_WAVEFORM => {
                if param < 8 {
                    self.vibrato_type = param;
                }
            }
            FX_TREMOLO_WAVEFORM => {
                if param < 8 {
                    self.tremolo_type = param;
                }
            }
            FX_FINE_VOLUME_UP => self.volume = (self.volume + param).min(64),
            FX_FINE_VOLUME_DOWN => self.volume = (self.volume - param).max(0),
            FX_NOTE_CUT => {
                if param <= 0 {
                    self.volume = 0;
                }
            }
            _ => {}
        }
        self.update_frequency(module);
    }

    /// 处理行内的后续 tick
    pub fn tick(&mut self, module: &Module) {
        self.fx_count += 1;
        match self.note_effect {
            FX_PORTA_UP => self.period = (self.period - self.note_param).max(0),
            FX_PORTA_DOWN => self.period = (self.period + self.note_param).min(65535),
            FX_TONE_PORTA => self.tone_portamento(),
            FX_VIBRATO => {
                self.vibrato_phase += self.vibrato_speed;
                self.vibrato();
            }
            FX_TONE_PORTA_VOL_SLIDE => {
                self.tone_portamento();
                self.volume_slide(self.note_param);
            }
            FX_VIBRATO_VOL_SLIDE => {
                self.vibrato_phase += self.vibrato_speed;
                self.vibrato();
                self.volume_slide(self.note_param);
            }
            FX_TREMOLO => {
                self.tremolo_phase += self.tremolo_speed;
                self.tremolo();
            }
            FX_VOLUME_SLIDE => self.volume_slide(self.note_param),
            FX_ARPEGGIO => {
                if self.fx_count > 2 {
                    self.fx_count = 0;
                }
                self.arpeggio_add = match self.fx_count {
                    1 => self.note_param >> 4,
                    2 => self.note_param & 0xf,
                    _ => 0,
                };
            }
            FX_RETRIG => {
                if self.fx_count >= self.note_param {
                    self.fx_count = 0;
                    self.sample_idx = 0.0;
                }
            }
            FX_NOTE_CUT => {
                if self.note_param == self.fx_count {
                    self.volume = 0;
                }
            }
            FX_NOTE_DELAY => {
                if self.note_param == self.fx_count {
                    self.trigger(module);
                }
            }
            _ => {}
        }
        if self.note_effect > 0 {
            self.update_frequency(module);
        }
    }

    fn update_frequency(&mut self, module: &Module) {
        let mut per = f64::from(self.period + self.vibrato_add);
        per = per * f64::from(KEY_TO_PERIOD[self.arpeggio_add as usize])
            / f64::from(KEY_TO_PERIOD[0]);
        if per < 7.0 {
            per = 6848.0;
        }
        self.freq = f64::from(module.c2_rate) * 428.0 / per;
        let vol = (self.volume + self.tremolo_add).clamp(0, 64);
        self.ampl = f64::from(vol * module.gain) / 8192.0;
    }

    fn trigger(&mut self, module: &Module) {
        if self.note_ins > 0 && self.note_ins as usize <= module.num_instruments() {
            self.assigned = self.note_ins as usize;
            let ins = &module.instruments[self.assigned];
            self.sample_offset = 0;
            self.fine_tune = ins.fine_tune;
            self.volume = if ins.volume >= 64 { 64 } else { ins.volume & 0x3f };
            if ins.loop_length > 0 && self.instrument > 0 {
                self.instrument = self.assigned;
            }
        }
        if self.note_effect == FX_SAMPLE_OFFSET {
            self.sample_offset = (self.note_param & 0xff) << 8;
        } else if self.note_effect == FX_SET_FINE_TUNE {
            self.fine_tune = self.note_param;
        }
        if self.note_key > 0 && self.note_key <= MAX_KEY {
            let per = (KEY_TO_PERIOD[self.note_key as usize]
                * FINE_TUNING[(self.fine_tune & 0xf) as usize])
                >> 11;
            self.porta_period = (per >> 1) + (per & 1);
            if self.note_effect != FX_TONE_PORTA && self.note_effect != FX_TONE_PORTA_VOL_SLIDE {
                self.instrument = self.assigned;
                self.period = self.porta_period;
                self.sample_idx = f64::from(self.sample_offset);
                if self.vibrato_type < 4 {
                    self.vibrato_phase = 0;
                }
                if self.tremolo_type < 4 {
                    self.tremolo_phase = 0;
                }
            }
        }
    }

    fn volume_slide(&mut self, param: i32) {
        self.volume = (self.volume + (param >> 4) - (param & 0xf)).clamp(0, 64);
    }

    fn tone_portamento(&mut self) {
        let dest = self.porta_period;
        if self.period < dest {
            self.period = (self.period + self.porta_speed).min(dest);
        } else if self.period > dest {
            self.period = (self.period - self.porta_speed).max(dest);
        }
    }

    fn vibrato(&mut self) {
        let amplitude = self.waveform(self.vibrato_phase, self.vibrato_type);
        self.vibrato_add = (amplitude * self.vibrato_depth) >> 7;
    }

    fn tremolo(&mut self) {
        let amplitude = self.waveform(self.tremolo_phase, self.tremolo_type);
        self.tremolo_add = (amplitude * self.tremolo_depth) >> 6;
    }

    fn waveform(&mut self, phase: i32, kind: i32) -> i32 {
        match kind & 0x3 {
            // 正弦
            0 => {
                let amplitude = SINE_TABLE[(phase & 0x1f) as usize];
                if phase & 0x20 > 0 { -amplitude } else { amplitude }
            }
            // 下降锯齿
            1 => 255 - (((phase + 0x20) & 0x3f) << 3),
            // 方波
            2 => {
                if phase & 0x20 > 0 {
                    255
                } else {
                    -255
                }
            }
            // 随机
            _ => {
                let amplitude = (self.random_seed >> 20) - 255;
                self.random_seed =
                    self.random_seed.wrapping_mul(65).wrapping_add(17) & 0x1fff_ffff;
                amplitude
            }
        }
    }

    /// 当前是否在发声
    #[cfg(test)]
    pub fn is_audible(&self) -> bool {
        self.ampl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ModuleWriter, TestSample};

    fn module_with_sample() -> Module {
        let mut writer = ModuleWriter::new(4);
        writer.add_sample(TestSample::square(64, 40));
        writer.add_pattern();
        writer.sequence(&[0]);
        Module::parse(&writer.build()).unwrap()
    }

    #[test]
    fn test_panning_layout() {
        let pans: Vec<i32> = (0..8).map(|id| Channel::new(id).panning).collect();
        assert_eq!(pans, vec![0, 127, 127, 0, 0, 127, 127, 0]);
    }

    #[test]
    fn test_note_trigger_sets_period_and_volume() {
        let module = module_with_sample();
        let mut chan = Channel::new(0);
        // key 25 = C-2, 无微调时周期 428
        chan.row(&module, 25, 1, 0, 0);
        assert_eq!(chan.period, 428);
        assert_eq!(chan.volume, 40);
        assert_eq!(chan.instrument, 1);
        assert!(chan.is_audible());
        assert!((chan.freq - 8287.0).abs() < 1e-9);
    }

    #[test]
    fn test_volume_effects() {
        let module = module_with_sample();
        let mut chan = Channel::new(0);
        chan.row(&module, 25, 1, FX_SET_VOLUME, 80);
        assert_eq!(chan.volume, 64);
        chan.row(&module, 0, 0, FX_FINE_VOLUME_DOWN, 10);
        assert_eq!(chan.volume, 54);
        // 音量滑动 A0F: 每 tick 减 15
        chan.row(&module, 0, 0, FX_VOLUME_SLIDE, 0x0f);
        for _ in 0..5 {
            chan.tick(&module);
        }
        assert_eq!(chan.volume, 0);
        assert!(!chan.is_audible());
    }

    #[test]
    fn test_tone_portamento_converges() {
        let module = module_with_sample();
        let mut chan = Channel::new(0);
        chan.row(&module, 25, 1, 0, 0);
        // 目标 key 37 (C-3, 周期 214), 速度 0x40
        chan.row(&module, 37, 0, FX_TONE_PORTA, 0x40);
        assert_eq!(chan.period, 428);
        for _ in 0..10 {
            chan.tick(&module);
        }
        assert_eq!(chan.period, 214);
    }

    #[test]
    fn test_note_cut_on_tick() {
        let module = module_with_sample();
        let mut chan = Channel::new(0);
        chan.row(&module, 25, 1, FX_NOTE_CUT, 2);
        assert_eq!(chan.volume, 40);
        chan.tick(&module);
        assert_eq!(chan.volume, 40);
        chan.tick(&module);
        assert_eq!(chan.volume, 0);
    }

    #[test]
    fn test_resample_respects_panning() {
        let module = module_with_sample();
        let mut chan = Channel::new(1);
        chan.row(&module, 25, 1, 0, 0);
        let mut buf = vec![0.0f32; 32];
        chan.resample(&module, &mut buf, 16, 96000.0, false, 1.0);
        // 声像 127: 全部落在左侧
        assert!(buf.chunks_exact(2).any(|f| f[0] != 0.0));
        assert!(buf.chunks_exact(2).all(|f| f[1] == 0.0));

        // 分离度 0: 左右相等
        let mut mono = vec![0.0f32; 32];
        chan.resample(&module, &mut mono, 16, 96000.0, false, 0.0);
        assert!(mono.chunks_exact(2).all(|f| f[0] == f[1]));
    }

    #[test]
    fn test_update_sample_idx_wraps_into_loop() {
        let module = module_with_sample();
        let mut chan = Channel::new(0);
        chan.row(&module, 25, 1, 0, 0);
        // 8287 Hz 播放 1 秒, 循环长度 64
        chan.update_sample_idx(&module, 48000, 48000.0);
        assert!(chan.sample_idx >= 0.0 && chan.sample_idx < 64.0);
    }
}
