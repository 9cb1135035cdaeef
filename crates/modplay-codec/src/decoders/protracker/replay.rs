//! 序列器与混音器.
//!
//! 每个 tick 先以 2 倍输出采样率重采样所有声道, 再 2:1 降采样,
//! 并在 tick 边界做短音量斜坡以消除咔嗒声.

use modplay_core::{ModError, ModResult};
use modplay_core::sample_format::f32_to_s16;

use super::channel::{Channel, FX_ARPEGGIO};
use super::module::{Module, ROWS_PER_PATTERN};
use crate::config::DecoderConfig;

/// 斜坡缓冲: 64 个立体声采样
const RAMP_LEN: usize = 64;
/// 最慢速度, 决定混音缓冲上限
const MIN_TEMPO: i32 = 32;
/// 计算时长时的 tick 上限, 防止畸形模块无限循环
const MAX_DURATION_TICKS: u64 = 1 << 24;

const DEFAULT_SPEED: i32 = 6;
const DEFAULT_TEMPO: i32 = 125;

// 影响序列器的效果
const FX_POSITION_JUMP: i32 = 0x0b;
const FX_PATTERN_BREAK: i32 = 0x0d;
const FX_SET_SPEED: i32 = 0x0f;
const FX_PATTERN_LOOP: i32 = 0x16;
const FX_PATTERN_DELAY: i32 = 0x1e;

/// 每个 tick 的输出采样数
fn tick_len(tempo: i32, sample_rate: u32) -> usize {
    (sample_rate as usize * 5) / (tempo as usize * 2)
}

/// 按最慢速度分配混音缓冲, 足够容纳 2 倍过采样的一个 tick
fn alloc_mix_buf(sample_rate: u32) -> ModResult<Vec<f32>> {
    let len = mix_buf_len(sample_rate)
        .ok_or_else(|| ModError::OutOfMemory(format!("采样率 {sample_rate} Hz 的混音缓冲过大")))?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, 0.0);
    Ok(buf)
}

fn mix_buf_len(sample_rate: u32) -> Option<usize> {
    tick_len(MIN_TEMPO, sample_rate).checked_add(65)?.checked_mul(4)
}

/// 回放状态
#[derive(Debug, Clone)]
pub(crate) struct Replay {
    module: Module,
    sample_rate: u32,
    interpolation: bool,
    separation: f64,
    /// 交错立体声混音缓冲
    mix_buf: Vec<f32>,
    ramp_buf: [f32; RAMP_LEN * 2],
    mix_idx: usize,
    mix_len: usize,
    seq_pos: i32,
    break_seq_pos: i32,
    row: i32,
    next_row: i32,
    tick: i32,
    speed: i32,
    tempo: i32,
    pl_count: i32,
    pl_channel: i32,
    channels: Vec<Channel>,
}

impl Replay {
    pub fn new(module: Module, config: &DecoderConfig) -> ModResult<Self> {
        let num_channels = module.num_channels;
        let mut replay = Self {
            module,
            sample_rate: config.sample_rate,
            interpolation: config.interpolation,
            separation: config.separation_factor(),
            mix_buf: alloc_mix_buf(config.sample_rate)?,
            ramp_buf: [0.0; RAMP_LEN * 2],
            mix_idx: 0,
            mix_len: 0,
            seq_pos: 0,
            break_seq_pos: 0,
            row: 0,
            next_row: 0,
            tick: 0,
            speed: DEFAULT_SPEED,
            tempo: DEFAULT_TEMPO,
            pl_count: -1,
            pl_channel: -1,
            channels: Vec::with_capacity(num_channels),
        };
        replay.set_sequence_pos(0);
        Ok(replay)
    }

    /// 应用新的配置, 播放位置保持不变
    ///
    /// 失败时状态保持不变.
    pub fn apply_config(&mut self, config: &DecoderConfig) -> ModResult<()> {
        config.validate()?;
        let mix_buf = alloc_mix_buf(config.sample_rate)?;
        self.mix_buf = mix_buf;
        self.sample_rate = config.sample_rate;
        self.interpolation = config.interpolation;
        self.separation = config.separation_factor();
        // 旧缓冲中的剩余采样按旧采样率生成, 丢弃
        self.mix_idx = 0;
        self.mix_len = 0;
        Ok(())
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn sequence_pos(&self) -> usize {
        self.seq_pos as usize
    }

    pub fn row(&self) -> usize {
        self.row as usize
    }

    /// 生成交错 S16 立体声, 写满 `out`
    pub fn render(&mut self, out: &mut [i16]) {
        let frames = out.len() / 2;
        let mut out_idx = 0;
        while out_idx < frames {
            if self.mix_idx >= self.mix_len {
                self.mix_len = self.mix_audio();
                self.mix_idx = 0;
            }
            let remain = (self.mix_len - self.mix_idx).min(frames - out_idx);
            let src = &self.mix_buf[self.mix_idx * 2..(self.mix_idx + remain) * 2];
            let dst = &mut out[out_idx * 2..(out_idx + remain) * 2];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = f32_to_s16(s);
            }
            out_idx += remain;
            self.mix_idx += remain;
        }
    }

    /// 跳转到序列中的指定位置, 速度与节拍恢复默认值
    pub fn set_sequence_pos(&mut self, pos: usize) {
        let pos = if pos >= self.module.sequence_length { 0 } else { pos };
        self.break_seq_pos = pos as i32;
        self.next_row = 0;
        self.tick = 1;
        self.speed = DEFAULT_SPEED;
        self.tempo = DEFAULT_TEMPO;
        self.pl_count = -1;
        self.pl_channel = -1;
        self.channels.clear();
        self.channels
            .extend((0..self.module.num_channels).map(Channel::new));
        self.ramp_buf.fill(0.0);
        self.mix_idx = 0;
        self.mix_len = 0;
        self.seq_tick();
    }

    /// 整首乐曲的采样数, 计算后回到开头
    pub fn song_duration(&mut self) -> u64 {
        let mut duration = 0u64;
        let mut ticks = 0u64;
        self.set_sequence_pos(0);
        loop {
            duration += tick_len(self.tempo, self.sample_rate) as u64;
            ticks += 1;
            if self.seq_tick() || ticks >= MAX_DURATION_TICKS {
                break;
            }
        }
        self.set_sequence_pos(0);
        duration
    }

    /// 以 tick 为粒度跳转到采样位置附近, 返回实际到达的位置
    pub fn seek(&mut self, sample_pos: u64) -> u64 {
        self.set_sequence_pos(0);
        let mut current = 0u64;
        let mut len = tick_len(self.tempo, self.sample_rate);
        while sample_pos - current >= len as u64 {
            self.advance_channels(len);
            current += len as u64;
            self.seq_tick();
            len = tick_len(self.tempo, self.sample_rate);
        }
        current
    }

    /// 跳转到序列位置与行
    pub fn seek_sequence(&mut self, seq_pos: usize, row: usize) {
        self.set_sequence_pos(0);
        let seq_pos = if seq_pos >= self.module.sequence_length { 0 } else { seq_pos };
        let row = if row >= ROWS_PER_PATTERN { 0 } else { row };
        while self.seq_pos != seq_pos as i32 || self.row != row as i32 {
            let len = tick_len(self.tempo, self.sample_rate);
            self.advance_channels(len);
            if self.seq_tick() {
                // 到达乐曲末尾仍未找到, 直接从序列位置开始
                self.set_sequence_pos(seq_pos);
                return;
            }
        }
    }

    fn advance_channels(&mut self, len: usize) {
        let rate = f64::from(self.sample_rate) * 2.0;
        for chan in &mut self.channels {
            chan.update_sample_idx(&self.module, len * 2, rate);
        }
    }

    /// 生成一个 tick 的音频, 返回采样数
    fn mix_audio(&mut self) -> usize {
        let len = tick_len(self.tempo, self.sample_rate);
        let oversampled = (len + 65) * 2;
        self.mix_buf[..oversampled * 2].fill(0.0);
        let rate = f64::from(self.sample_rate) * 2.0;
        for chan in &mut self.channels {
            chan.resample(
                &self.module,
                &mut self.mix_buf,
                oversampled,
                rate,
                self.interpolation,
                self.separation,
            );
            chan.update_sample_idx(&self.module, len * 2, rate);
        }
        self.downsample(len + RAMP_LEN);
        self.volume_ramp(len);
        self.seq_tick();
        len
    }

    /// 2:1 降采样, 核为 [0.25, 0.5, 0.25]
    ///
    /// 缓冲中至少要有 `count * 2 + 1` 个立体声采样.
    fn downsample(&mut self, count: usize) {
        let buf = &mut self.mix_buf;
        for out in 0..count {
            let i = out * 4;
            let o = out * 2;
            buf[o] = buf[i] * 0.25 + buf[i + 2] * 0.5 + buf[i + 4] * 0.25;
            buf[o + 1] = buf[i + 1] * 0.25 + buf[i + 3] * 0.5 + buf[i + 5] * 0.25;
        }
    }

    fn volume_ramp(&mut self, len: usize) {
        let ramp_rate = 2048.0 / self.sample_rate as f32;
        let mut a1 = 0.0f32;
        let mut idx = 0;
        while a1 < 1.0 && idx + 1 < self.ramp_buf.len() {
            let a2 = 1.0 - a1;
            self.mix_buf[idx] = self.mix_buf[idx] * a1 + self.ramp_buf[idx] * a2;
            self.mix_buf[idx + 1] = self.mix_buf[idx + 1] * a1 + self.ramp_buf[idx + 1] * a2;
            idx += 2;
            a1 += ramp_rate;
        }
        self.ramp_buf
            .copy_from_slice(&self.mix_buf[len * 2..(len + RAMP_LEN) * 2]);
    }

    /// 推进一个 tick, 返回是否回到了乐曲开头
    fn seq_tick(&mut self) -> bool {
        self.tick -= 1;
        if self.tick <= 0 {
            self.tick = self.speed;
            return self.seq_row();
        }
        for chan in &mut self.channels {
            chan.tick(&self.module);
        }
        false
    }

    fn seq_row(&mut self) -> bool {
        let mut song_end = false;
        if self.next_row < 0 {
            self.break_seq_pos = self.seq_pos + 1;
            self.next_row = 0;
        }
        if self.break_seq_pos >= 0 {
            if self.break_seq_pos as usize >= self.module.sequence_length {
                self.break_seq_pos = 0;
                self.next_row = 0;
            }
            if self.break_seq_pos <= self.seq_pos {
                song_end = true;
            }
            self.seq_pos = self.break_seq_pos;
            for chan in &mut self.channels {
                chan.pl_row = 0;
            }
            self.break_seq_pos = -1;
        }
        self.row = self.next_row;
        self.next_row = self.row + 1;
        if self.next_row >= ROWS_PER_PATTERN as i32 {
            self.next_row = -1;
        }

        let mut offset = self.module.cell_offset(self.seq_pos as usize, self.row as usize);
        for chan_idx in 0..self.module.num_channels {
            let cell = &self.module.patterns[offset..offset + 4];
            let key = i32::from(cell[0]);
            let ins = i32::from(cell[1]);
            let mut effect = i32::from(cell[2]);
            let mut param = i32::from(cell[3]);
            offset += 4;
            if effect == 0xe {
                effect = 0x10 | (param >> 4);
                param &= 0xf;
            }
            if effect == 0 && param > 0 {
                effect = FX_ARPEGGIO;
            }
            self.channels[chan_idx].row(&self.module, key, ins, effect, param);
            match effect {
                FX_POSITION_JUMP => {
                    if self.pl_count < 0 {
                        self.break_seq_pos = param;
                        self.next_row = 0;
                    }
                }
                FX_PATTERN_BREAK => {
                    if self.pl_count < 0 {
                        if self.break_seq_pos < 0 {
                            self.break_seq_pos = self.seq_pos + 1;
                        }
                        self.next_row = (param >> 4) * 10 + (param & 0xf);
                        if self.next_row >= ROWS_PER_PATTERN as i32 {
                            self.next_row = 0;
                        }
                    }
                }
                FX_SET_SPEED => {
                    if param > 0 {
                        if param < 32 {
                            self.speed = param;
                            self.tick = param;
                        } else {
                            self.tempo = param;
                        }
                    }
                }
                FX_PATTERN_LOOP => self.pattern_loop(chan_idx, param),
                FX_PATTERN_DELAY => self.tick = self.speed + self.speed * param,
                _ => {}
            }
        }
        song_end
    }

    fn pattern_loop(&mut self, chan_idx: usize, param: i32) {
        let row = self.row;
        let chan = &mut self.channels[chan_idx];
        if param == 0 {
            // 设置循环标记
            chan.pl_row = row;
        }
        if chan.pl_row < row && self.break_seq_pos < 0 {
            if self.pl_count < 0 {
                self.pl_count = param;
                self.pl_channel = chan_idx as i32;
            }
            if self.pl_channel == chan_idx as i32 {
                if self.pl_count == 0 {
                    // 循环结束, 使标记失效
                    chan.pl_row = row + 1;
                } else {
                    self.next_row = chan.pl_row;
                }
                self.pl_count -= 1;
            }
        }
    }
}
