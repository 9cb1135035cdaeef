//! 流式填充循环.
//!
//! 每次调用只向解码器请求一次 `sample_count` 个立体声采样, 然后把交错 S16
//! 解交织并归一化到两路 F32 输出. 中间缓冲只在本次调用内存在.

use log::warn;
use modplay_codec::ModuleDecoder;
use modplay_core::sample_format::deinterleave_s16_stereo;
use modplay_core::{ModError, ModResult};

use crate::session::Session;

impl Session {
    /// 向左右声道各写入 `sample_count` 个归一化采样
    ///
    /// `sample_count == 0` 时不做任何事. 解码失败时输出静音并返回错误.
    pub fn fill(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        sample_count: usize,
    ) -> ModResult<()> {
        fill_channels(self.decoder_mut(), left, right, sample_count)
    }
}

/// 使用任意解码器填充两路输出
pub fn fill_channels(
    decoder: &mut dyn ModuleDecoder,
    left: &mut [f32],
    right: &mut [f32],
    sample_count: usize,
) -> ModResult<()> {
    if sample_count == 0 {
        return Ok(());
    }
    if left.len() < sample_count || right.len() < sample_count {
        return Err(ModError::InvalidArgument(format!(
            "输出缓冲不足: 需要 {} 个采样, 左 {} 右 {}",
            sample_count,
            left.len(),
            right.len()
        )));
    }
    let left = &mut left[..sample_count];
    let right = &mut right[..sample_count];

    let result = sample_count
        .checked_mul(2)
        .ok_or_else(|| ModError::InvalidArgument(format!("采样数 {sample_count} 溢出")))
        .and_then(|len| {
            let mut chunk: Vec<i16> = Vec::new();
            chunk.try_reserve_exact(len)?;
            chunk.resize(len, 0);
            decoder.fill_chunk(&mut chunk, sample_count)?;
            Ok(chunk)
        });

    match result {
        Ok(chunk) => {
            deinterleave_s16_stereo(&chunk, left, right);
            Ok(())
        }
        Err(err) => {
            warn!("{} 解码 {} 个采样失败, 输出静音: {}", decoder.name(), sample_count, err);
            left.fill(0.0);
            right.fill(0.0);
            Err(err)
        }
    }
}
