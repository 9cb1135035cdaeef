//! 32 位浮点 WAV (RIFF WAVE, IEEE float) 写入.
//!
//! 1. `create()` - 写入 RIFF 和 fmt 块, 预留大小字段
//! 2. `write_frames()` - 交错写入左右声道
//! 3. `finish()` - 回填 RIFF 大小和 data 块大小

use std::io::{self, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

/// WAVE_FORMAT_IEEE_FLOAT
const FORMAT_IEEE_FLOAT: u16 = 3;
const BITS_PER_SAMPLE: u16 = 32;
/// "RIFF" 之后的大小字段
const RIFF_SIZE_OFFSET: u64 = 4;
/// 12 (RIFF) + 24 (fmt) + 4 (data tag)
const DATA_SIZE_OFFSET: u64 = 40;
const HEADER_LEN: u32 = 44;

/// 立体声浮点 WAV 写入器
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    channels: u16,
    data_written: u64,
}

impl<W: Write + Seek> WavWriter<W> {
    /// 写入文件头, 大小字段先填 0
    pub fn create(mut inner: W, sample_rate: u32, channels: u16) -> io::Result<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "声道数和采样率必须为正数",
            ));
        }
        let block_align = channels * (BITS_PER_SAMPLE / 8);
        let byte_rate = sample_rate * u32::from(block_align);

        inner.write_all(b"RIFF")?;
        inner.write_u32::<LittleEndian>(0)?;
        inner.write_all(b"WAVE")?;

        inner.write_all(b"fmt ")?;
        inner.write_u32::<LittleEndian>(16)?;
        inner.write_u16::<LittleEndian>(FORMAT_IEEE_FLOAT)?;
        inner.write_u16::<LittleEndian>(channels)?;
        inner.write_u32::<LittleEndian>(sample_rate)?;
        inner.write_u32::<LittleEndian>(byte_rate)?;
        inner.write_u16::<LittleEndian>(block_align)?;
        inner.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

        inner.write_all(b"data")?;
        inner.write_u32::<LittleEndian>(0)?;

        debug!("WAV 写入头部: {sample_rate} Hz, {channels} 声道, f32");
        Ok(Self {
            inner,
            channels,
            data_written: 0,
        })
    }

    /// 交错写入两路采样, 两路长度必须相同
    pub fn write_frames(&mut self, left: &[f32], right: &[f32]) -> io::Result<()> {
        if self.channels != 2 || left.len() != right.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "仅支持等长的立体声输入",
            ));
        }
        for (&l, &r) in left.iter().zip(right) {
            self.inner.write_f32::<LittleEndian>(l)?;
            self.inner.write_f32::<LittleEndian>(r)?;
        }
        self.data_written += left.len() as u64 * 8;
        Ok(())
    }

    /// 已写入的采样帧数
    pub fn frames_written(&self) -> u64 {
        self.data_written / (u64::from(self.channels) * 4)
    }

    /// 回填大小字段并返回底层写入器
    pub fn finish(mut self) -> io::Result<W> {
        let data_size = u32::try_from(self.data_written)
            .ok()
            .filter(|size| size.checked_add(HEADER_LEN - 8).is_some())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "WAV 数据超过 4 GiB"))?;
        let riff_size = HEADER_LEN - 8 + data_size;

        self.inner.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(riff_size)?;
        self.inner.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        self.inner.write_u32::<LittleEndian>(data_size)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;

        debug!("WAV 写入尾部: riff_size={riff_size}, data_size={data_size}");
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn u32_at(buf: &[u8], pos: usize) -> u32 {
        u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap())
    }

    fn u16_at(buf: &[u8], pos: usize) -> u16 {
        u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap())
    }

    #[test]
    fn test_header_and_sizes() {
        let mut wav = WavWriter::create(Cursor::new(Vec::new()), 48000, 2).unwrap();
        wav.write_frames(&[0.5, -0.25], &[1.0, 0.0]).unwrap();
        assert_eq!(wav.frames_written(), 2);
        let buf = wav.finish().unwrap().into_inner();

        assert_eq!(buf.len(), 44 + 16);
        assert_eq!(&buf[0..4], b"RIFF");
        assert_eq!(u32_at(&buf, 4), 36 + 16);
        assert_eq!(&buf[8..16], b"WAVEfmt ");
        assert_eq!(u16_at(&buf, 20), FORMAT_IEEE_FLOAT);
        assert_eq!(u16_at(&buf, 22), 2);
        assert_eq!(u32_at(&buf, 24), 48000);
        assert_eq!(u32_at(&buf, 28), 48000 * 8);
        assert_eq!(u16_at(&buf, 32), 8);
        assert_eq!(u16_at(&buf, 34), 32);
        assert_eq!(&buf[36..40], b"data");
        assert_eq!(u32_at(&buf, 40), 16);
    }

    #[test]
    fn test_samples_are_interleaved() {
        let mut wav = WavWriter::create(Cursor::new(Vec::new()), 44100, 2).unwrap();
        wav.write_frames(&[0.5, -0.25], &[1.0, 0.0]).unwrap();
        let buf = wav.finish().unwrap().into_inner();
        let samples: Vec<f32> = buf[44..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(samples, vec![0.5, 1.0, -0.25, 0.0]);
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let mut wav = WavWriter::create(Cursor::new(Vec::new()), 44100, 2).unwrap();
        assert!(wav.write_frames(&[0.0; 3], &[0.0; 2]).is_err());
        assert!(WavWriter::create(Cursor::new(Vec::new()), 0, 2).is_err());
    }
}
