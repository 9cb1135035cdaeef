//! 合成测试模块的构造工具.
//!
//! 仅在测试或启用 `test-util` 特性时编译, 用于在内存中生成最小的 ProTracker 模块.

/// 图案单元
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell {
    /// Amiga 周期, 0 表示无音符
    pub period: u16,
    /// 乐器编号 0..=31
    pub instrument: u8,
    /// 效果号 0x0..=0xF
    pub effect: u8,
    /// 效果参数
    pub param: u8,
}

impl Cell {
    /// 带乐器的音符
    pub fn note(period: u16, instrument: u8) -> Self {
        Self {
            period,
            instrument,
            ..Self::default()
        }
    }

    /// 仅效果
    pub fn effect(effect: u8, param: u8) -> Self {
        Self {
            effect,
            param,
            ..Self::default()
        }
    }

    /// 为音符附加效果
    pub fn with_effect(mut self, effect: u8, param: u8) -> Self {
        self.effect = effect;
        self.param = param;
        self
    }

    fn encode(&self) -> [u8; 4] {
        [
            (self.instrument & 0xf0) | ((self.period >> 8) as u8 & 0x0f),
            (self.period & 0xff) as u8,
            ((self.instrument & 0x0f) << 4) | (self.effect & 0x0f),
            self.param,
        ]
    }
}

/// 测试采样
#[derive(Debug, Clone)]
pub struct TestSample {
    pub name: String,
    pub data: Vec<i8>,
    pub volume: u8,
    pub fine_tune: u8,
    /// 循环起点 (字节)
    pub loop_start: usize,
    /// 循环长度 (字节)
    pub loop_length: usize,
}

impl TestSample {
    /// 整段循环的方波, 前半周期为正
    pub fn square(len: usize, volume: u8) -> Self {
        let data = (0..len)
            .map(|i| if i < len / 2 { 100 } else { -100 })
            .collect();
        Self {
            name: String::new(),
            data,
            volume,
            fine_tune: 0,
            loop_start: 0,
            loop_length: len,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_loop(mut self, start: usize, length: usize) -> Self {
        self.loop_start = start;
        self.loop_length = length;
        self
    }

    pub fn with_fine_tune(mut self, fine_tune: u8) -> Self {
        self.fine_tune = fine_tune & 0x0f;
        self
    }
}

/// 内存模块写入器
#[derive(Debug, Clone)]
pub struct ModuleWriter {
    channels: usize,
    song_name: String,
    sequence: Vec<u8>,
    extra_sequence: Vec<(usize, u8)>,
    patterns: Vec<Vec<Cell>>,
    samples: Vec<TestSample>,
}

impl ModuleWriter {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            song_name: String::new(),
            sequence: Vec::new(),
            extra_sequence: Vec::new(),
            patterns: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn song_name(&mut self, name: &str) -> &mut Self {
        self.song_name = name.to_string();
        self
    }

    /// 添加采样, 返回乐器编号 (从 1 开始)
    pub fn add_sample(&mut self, sample: TestSample) -> u8 {
        self.samples.push(sample);
        self.samples.len() as u8
    }

    /// 添加一个空图案, 返回图案编号
    pub fn add_pattern(&mut self) -> usize {
        self.patterns.push(vec![Cell::default(); 64 * self.channels]);
        self.patterns.len() - 1
    }

    pub fn set_cell(&mut self, pattern: usize, row: usize, channel: usize, cell: Cell) -> &mut Self {
        self.patterns[pattern][row * self.channels + channel] = cell;
        self
    }

    /// 设置播放序列 (同时决定序列长度)
    pub fn sequence(&mut self, order: &[u8]) -> &mut Self {
        self.sequence = order.to_vec();
        self
    }

    /// 写入序列长度之外的序列表项
    pub fn sequence_entry(&mut self, index: usize, pattern: u8) -> &mut Self {
        self.extra_sequence.push((index, pattern));
        self
    }

    fn signature(&self) -> [u8; 4] {
        match self.channels {
            4 => *b"M.K.",
            n if n < 10 => [b'0' + n as u8, b'C', b'H', b'N'],
            n => [b'0' + (n / 10) as u8, b'0' + (n % 10) as u8, b'C', b'H'],
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; 1084];
        for (dst, src) in out[..20].iter_mut().zip(self.song_name.bytes()) {
            *dst = src;
        }
        for (idx, sample) in self.samples.iter().enumerate().take(31) {
            let header = 20 + idx * 30;
            for (dst, src) in out[header..header + 22].iter_mut().zip(sample.name.bytes()) {
                *dst = src;
            }
            let words = |bytes: usize| ((bytes / 2) as u16).to_be_bytes();
            out[header + 22..header + 24].copy_from_slice(&words(sample.data.len()));
            out[header + 24] = sample.fine_tune;
            out[header + 25] = sample.volume;
            out[header + 26..header + 28].copy_from_slice(&words(sample.loop_start));
            out[header + 28..header + 30].copy_from_slice(&words(sample.loop_length));
        }
        out[950] = self.sequence.len() as u8;
        out[951] = 0;
        for (idx, &pat) in self.sequence.iter().enumerate() {
            out[952 + idx] = pat;
        }
        for &(idx, pat) in &self.extra_sequence {
            out[952 + idx] = pat;
        }
        out[1080..1084].copy_from_slice(&self.signature());
        for pattern in &self.patterns {
            for cell in pattern {
                out.extend_from_slice(&cell.encode());
            }
        }
        for sample in &self.samples {
            out.extend(sample.data.iter().map(|&s| s as u8));
        }
        out
    }
}

/// 4 声道演示模块: 一个方波乐器, 第 0 行左右两侧各起一个音
pub fn demo_module() -> Vec<u8> {
    let mut writer = ModuleWriter::new(4);
    writer.song_name("demo");
    let ins = writer.add_sample(TestSample::square(64, 64).named("square"));
    let pat = writer.add_pattern();
    writer.set_cell(pat, 0, 0, Cell::note(428, ins));
    writer.set_cell(pat, 0, 1, Cell::note(214, ins));
    writer.set_cell(pat, 16, 2, Cell::note(320, ins));
    writer.set_cell(pat, 32, 3, Cell::note(285, ins).with_effect(0xa, 0x02));
    writer.sequence(&[pat as u8]);
    writer.build()
}
