//! 音频采样转换.
//!
//! 解码器输出交错 S16, 会话层输出平面 F32.

/// S16 -> F32 归一化系数, 注意分母是 32767 而不是 32768
pub const S16_TO_F32_SCALE: f32 = 1.0 / 32767.0;

/// 单个 S16 采样归一化为 F32
#[inline]
pub fn s16_to_f32(sample: i16) -> f32 {
    sample as f32 * S16_TO_F32_SCALE
}

/// F32 量化为 S16, 超出范围时饱和
#[inline]
pub fn f32_to_s16(sample: f32) -> i16 {
    let scaled = (sample * 32767.0).round();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// 交错 S16 立体声解交织为两路归一化 F32
///
/// 偶数下标写入 `left`, 奇数下标写入 `right`.
/// 只写入 `min(left.len(), right.len(), interleaved.len() / 2)` 个采样.
pub fn deinterleave_s16_stereo(interleaved: &[i16], left: &mut [f32], right: &mut [f32]) {
    for ((frame, l), r) in interleaved
        .chunks_exact(2)
        .zip(left.iter_mut())
        .zip(right.iter_mut())
    {
        *l = s16_to_f32(frame[0]);
        *r = s16_to_f32(frame[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s16_to_f32_full_scale() {
        assert_eq!(s16_to_f32(0), 0.0);
        assert!((s16_to_f32(32767) - 1.0).abs() < 1e-6);
        assert!((s16_to_f32(-32767) + 1.0).abs() < 1e-6);
        // -32768 略微超出 -1.0
        assert!(s16_to_f32(i16::MIN) < -1.0);
        assert!(s16_to_f32(i16::MIN) > -1.0001);
    }

    #[test]
    fn test_f32_to_s16_saturates() {
        assert_eq!(f32_to_s16(2.0), i16::MAX);
        assert_eq!(f32_to_s16(-2.0), i16::MIN);
        assert_eq!(f32_to_s16(0.5), 16384);
        assert_eq!(f32_to_s16(0.0), 0);
    }

    #[test]
    fn test_deinterleave_even_left_odd_right() {
        let src = [100i16, -100, 200, -200, 300, -300];
        let mut left = [9.0f32; 4];
        let mut right = [9.0f32; 4];
        deinterleave_s16_stereo(&src, &mut left, &mut right);
        assert_eq!(left[0], 100.0 * S16_TO_F32_SCALE);
        assert_eq!(right[0], -100.0 * S16_TO_F32_SCALE);
        assert_eq!(left[2], 300.0 * S16_TO_F32_SCALE);
        assert_eq!(right[2], -300.0 * S16_TO_F32_SCALE);
        // 超出源数据范围的位置保持不变
        assert_eq!(left[3], 9.0);
        assert_eq!(right[3], 9.0);
    }
}
