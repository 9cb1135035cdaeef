//! ProTracker 模块文件解析.
//!
//! 文件布局:
//! - 0..20: 乐曲名称
//! - 20..950: 31 个乐器头, 每个 30 字节
//! - 950: 序列长度, 951: 重新开始位置, 952..1080: 播放序列
//! - 1080..1084: 格式签名
//! - 1084..: 图案数据 (每个单元 4 字节), 随后是 8 位有符号采样数据

use modplay_core::{ModError, ModResult};

/// 每个图案的行数
pub(crate) const ROWS_PER_PATTERN: usize = 64;
/// 乐器数量
pub(crate) const NUM_INSTRUMENTS: usize = 31;
/// 最大支持的声道数
pub(crate) const MAX_CHANNELS: usize = 32;
/// 播放序列容量
const SEQUENCE_CAPACITY: usize = 128;
/// 头部长度, 图案数据从这里开始
pub(crate) const HEADER_LEN: usize = 1084;

const SEQUENCE_LENGTH_OFFSET: usize = 950;
const RESTART_OFFSET: usize = 951;
const SEQUENCE_OFFSET: usize = 952;
const SIGNATURE_OFFSET: usize = 1080;

/// 音符 (key) 到 Amiga 周期的映射, 下标 0 为参考周期, 1..=72 为 C-0..B-5
pub(crate) const KEY_TO_PERIOD: [i32; 73] = [
    1814, //
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 907, //
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, //
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, //
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, //
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56, //
    53, 50, 47, 45, 42, 40, 37, 35, 33, 31, 30, 28,
];

/// 最大有效音符
pub(crate) const MAX_KEY: i32 = 72;

/// 乐器 (采样)
#[derive(Debug, Clone)]
pub(crate) struct Instrument {
    /// 乐器名称
    pub name: String,
    /// 默认音量 0..=64
    pub volume: i32,
    /// 微调, 以 8 为中心的 0..=15
    pub fine_tune: i32,
    /// 循环起点 (采样数)
    pub loop_start: usize,
    /// 循环长度 (采样数), 0 表示不循环
    pub loop_length: usize,
    /// 采样数据, 末尾多出一个保护采样供插值读取
    pub sample_data: Vec<i8>,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: String::new(),
            volume: 0,
            fine_tune: 8,
            loop_start: 0,
            loop_length: 0,
            sample_data: vec![0],
        }
    }
}

/// 已解析的模块
#[derive(Debug, Clone)]
pub(crate) struct Module {
    pub song_name: String,
    pub signature: [u8; 4],
    pub num_channels: usize,
    pub num_patterns: usize,
    pub sequence_length: usize,
    pub restart_pos: usize,
    /// C-2 对应的采样率
    pub c2_rate: i32,
    /// 混音增益, 4 声道模块更大
    pub gain: i32,
    pub sequence: [u8; SEQUENCE_CAPACITY],
    /// 图案单元: [key, instrument, effect, param]
    pub patterns: Vec<u8>,
    /// 下标 0 为空乐器, 1..=31 为文件中的乐器
    pub instruments: Vec<Instrument>,
}

/// 格式签名对应的声道参数
struct FormatDesc {
    num_channels: i32,
    c2_rate: i32,
    gain: i32,
}

/// 根据签名识别格式, 只比较后两个字节
fn detect_format(data: &[u8]) -> Option<FormatDesc> {
    if data.len() < HEADER_LEN {
        return None;
    }
    let tag = &data[SIGNATURE_OFFSET..HEADER_LEN];
    let digit = |b: u8| i32::from(b) - i32::from(b'0');
    match read_u16_be(data, SIGNATURE_OFFSET + 2) {
        // M.K. / M!K! / FLT4
        0x4b2e | 0x4b21 | 0x5434 => Some(FormatDesc {
            num_channels: 4,
            c2_rate: 8287,
            gain: 64,
        }),
        // xCHN
        0x484e => Some(FormatDesc {
            num_channels: digit(tag[0]),
            c2_rate: 8363,
            gain: 32,
        }),
        // xxCH
        0x4348 => Some(FormatDesc {
            num_channels: digit(tag[0]) * 10 + digit(tag[1]),
            c2_rate: 8363,
            gain: 32,
        }),
        _ => None,
    }
}

/// 数据是否像一个可识别的 ProTracker 模块
pub(crate) fn probe(data: &[u8]) -> bool {
    detect_format(data)
        .is_some_and(|f| f.num_channels >= 1 && f.num_channels as usize <= MAX_CHANNELS)
}

fn read_u16_be(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// 控制字符替换为空格, 去掉尾部空白
fn read_ascii(data: &[u8], offset: usize, len: usize) -> String {
    data[offset..offset + len]
        .iter()
        .map(|&c| if c < 32 { ' ' } else { char::from(c) })
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Amiga 周期转换为音符, 超出一个八度的周期先折叠再查表
fn period_to_key(period: i32) -> u8 {
    if period < 28 {
        return 0;
    }
    let mut period = period;
    let mut octave = 0;
    while period < 907 {
        period *= 2;
        octave += 1;
    }
    let mut key = 0;
    while key < 12 {
        let d1 = KEY_TO_PERIOD[key] - period;
        let d2 = period - KEY_TO_PERIOD[key + 1];
        if d2 >= 0 {
            if d2 < d1 {
                key += 1;
            }
            break;
        }
        key += 1;
    }
    (octave * 12 + key) as u8
}

impl Module {
    /// 解析模块数据
    pub fn parse(data: &[u8]) -> ModResult<Self> {
        let format = detect_format(data).ok_or_else(|| {
            ModError::InvalidData(format!(
                "无法识别的模块格式 (数据长度 {} 字节)",
                data.len()
            ))
        })?;
        if format.num_channels < 1 || format.num_channels as usize > MAX_CHANNELS {
            return Err(ModError::InvalidData(format!(
                "声道数 {} 超出范围 1..={}",
                format.num_channels, MAX_CHANNELS
            )));
        }
        let num_channels = format.num_channels as usize;

        let sequence_length = usize::from(data[SEQUENCE_LENGTH_OFFSET] & 0x7f);
        if sequence_length == 0 {
            return Err(ModError::InvalidData("播放序列长度为 0".into()));
        }
        let mut restart_pos = usize::from(data[RESTART_OFFSET] & 0x7f);
        if restart_pos >= sequence_length {
            restart_pos = 0;
        }

        let mut sequence = [0u8; SEQUENCE_CAPACITY];
        let mut num_patterns = 0;
        for (idx, slot) in sequence.iter_mut().enumerate() {
            let pat = data[SEQUENCE_OFFSET + idx] & 0x7f;
            *slot = pat;
            num_patterns = num_patterns.max(usize::from(pat) + 1);
        }

        let pattern_bytes = num_patterns * ROWS_PER_PATTERN * num_channels * 4;
        let pattern_end = HEADER_LEN + pattern_bytes;
        if data.len() < pattern_end {
            return Err(ModError::InvalidData(format!(
                "图案数据被截断: 需要 {} 字节, 实际 {} 字节",
                pattern_end,
                data.len()
            )));
        }

        let mut patterns = Vec::new();
        patterns.try_reserve_exact(pattern_bytes)?;
        for cell in data[HEADER_LEN..pattern_end].chunks_exact(4) {
            let period = (i32::from(cell[0] & 0x0f) << 8) | i32::from(cell[1]);
            let instrument = ((cell[2] & 0xf0) >> 4) | (cell[0] & 0x10);
            patterns.extend_from_slice(&[
                period_to_key(period),
                instrument,
                cell[2] & 0x0f,
                cell[3],
            ]);
        }

        let mut instruments = Vec::new();
        instruments.try_reserve_exact(NUM_INSTRUMENTS + 1)?;
        instruments.push(Instrument::default());
        let mut sample_offset = pattern_end;
        for idx in 1..=NUM_INSTRUMENTS {
            let (instrument, consumed) = parse_instrument(data, idx, sample_offset)?;
            sample_offset += consumed;
            instruments.push(instrument);
        }

        Ok(Self {
            song_name: read_ascii(data, 0, 20),
            signature: [
                data[SIGNATURE_OFFSET],
                data[SIGNATURE_OFFSET + 1],
                data[SIGNATURE_OFFSET + 2],
                data[SIGNATURE_OFFSET + 3],
            ],
            num_channels,
            num_patterns,
            sequence_length,
            restart_pos,
            c2_rate: format.c2_rate,
            gain: format.gain,
            sequence,
            patterns,
            instruments,
        })
    }

    /// 文件中的乐器数量 (不含下标 0 的空乐器)
    pub fn num_instruments(&self) -> usize {
        self.instruments.len() - 1
    }

    /// 格式签名字符串
    pub fn format_tag(&self) -> String {
        String::from_utf8_lossy(&self.signature).into_owned()
    }

    /// 指定序列位置与行的第一个单元的偏移
    pub fn cell_offset(&self, seq_pos: usize, row: usize) -> usize {
        let pattern = usize::from(self.sequence[seq_pos]);
        (pattern * ROWS_PER_PATTERN + row) * self.num_channels * 4
    }
}

/// 解析第 `idx` 个乐器头与采样数据, 返回乐器与消耗的采样字节数
fn parse_instrument(data: &[u8], idx: usize, sample_offset: usize) -> ModResult<(Instrument, usize)> {
    let header = idx * 30;
    let sample_length = usize::from(read_u16_be(data, header + 12)) * 2;
    let fine_tune = i32::from(data[header + 14] & 0x0f);
    let volume = i32::from(data[header + 15] & 0x7f).min(64);
    let mut loop_start = i64::from(read_u16_be(data, header + 16)) * 2;
    let mut loop_length = i64::from(read_u16_be(data, header + 18)) * 2;

    let len = sample_length as i64;
    if loop_start + loop_length > len {
        if loop_start / 2 + loop_length <= len {
            // 部分老模块的循环起点以字节为单位
            loop_start /= 2;
        } else {
            loop_length = len - loop_start;
        }
    }
    if loop_length < 4 {
        loop_start = len;
        loop_length = 0;
    }
    let loop_start = loop_start as usize;
    let loop_length = loop_length as usize;

    let mut sample_data = Vec::new();
    sample_data.try_reserve_exact(sample_length + 1)?;
    sample_data.resize(sample_length + 1, 0i8);
    let stored = data.get(sample_offset..).unwrap_or(&[]);
    let available = stored.len().min(sample_length);
    for (dst, &src) in sample_data.iter_mut().zip(&stored[..available]) {
        *dst = src as i8;
    }
    // 保护采样: 循环终点处复制循环起点, 插值时无需回绕
    sample_data[loop_start + loop_length] = sample_data[loop_start];

    Ok((
        Instrument {
            name: read_ascii(data, header - 10, 22),
            volume,
            fine_tune: (fine_tune & 0x7) - (fine_tune & 0x8) + 8,
            loop_start,
            loop_length,
            sample_data,
        },
        available,
    ))
}
