//! 会话渲染: 按块调用 `Session::fill()` 并写入 WAV.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info};
use modplay_ffi::Session;

use crate::wav::WavWriter;

/// 默认渲染时长上限 (秒)
pub const MAX_DEFAULT_SECS: u64 = 600;

/// 渲染区间 (采样帧)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRange {
    pub start: u64,
    pub frames: u64,
}

/// 根据 --ss / -t 计算渲染区间, 并把会话定位到起点
///
/// 起点不超过乐曲结尾. 未指定时长时渲染到乐曲结尾, 最多 `MAX_DEFAULT_SECS` 秒.
pub fn plan(session: &mut Session, start_secs: Option<f64>, duration_secs: Option<f64>) -> Result<RenderRange> {
    let rate = u64::from(session.sample_rate());
    let song_frames = session.duration().context("计算乐曲时长失败")?;

    let start = match start_secs {
        Some(secs) => {
            let target = secs_to_frames(secs, rate)
                .context("--ss 必须是非负有限数")?
                .min(song_frames);
            let reached = session.seek(target).context("定位起点失败")?;
            debug!("定位: 请求 {target} 帧, 实际 {reached} 帧");
            reached
        }
        None => 0,
    };

    let frames = match duration_secs {
        Some(secs) => secs_to_frames(secs, rate).context("-t 必须是非负有限数")?,
        None => song_frames
            .saturating_sub(start)
            .min(MAX_DEFAULT_SECS * rate),
    };
    Ok(RenderRange { start, frames })
}

fn secs_to_frames(secs: f64, rate: u64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0).then(|| (secs * rate as f64) as u64)
}

/// 从会话当前位置渲染 `frames` 帧到写入器
pub fn render_to<W: Write + Seek>(
    session: &mut Session,
    writer: W,
    frames: u64,
    block: usize,
) -> Result<W> {
    if block == 0 {
        bail!("块大小必须为正数");
    }
    let channels = session.channel_layout().channels as u16;
    let mut wav = WavWriter::create(writer, session.sample_rate(), channels)?;
    let mut left = vec![0.0f32; block];
    let mut right = vec![0.0f32; block];

    let mut remaining = frames;
    while remaining > 0 {
        let n = remaining.min(block as u64) as usize;
        session
            .fill(&mut left, &mut right, n)
            .context("解码失败")?;
        wav.write_frames(&left[..n], &right[..n])?;
        remaining -= n as u64;
    }

    info!("渲染完成: {} 帧", wav.frames_written());
    Ok(wav.finish()?)
}

/// 渲染到 WAV 文件
pub fn render_file(session: &mut Session, path: &Path, frames: u64, block: usize) -> Result<()> {
    let file = File::create(path).with_context(|| format!("无法创建输出文件 '{}'", path.display()))?;
    let mut writer = render_to(session, BufWriter::new(file), frames, block)?;
    writer.flush().context("写入输出文件失败")?;
    Ok(())
}
