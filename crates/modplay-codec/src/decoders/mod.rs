//! 内置解码器实现.

pub mod protracker;

use crate::decoder::ModuleDecoder;

/// 根据模块数据探测并创建合适的解码器
///
/// 目前只有 ProTracker 系列格式, 无法识别时返回 `None`.
pub fn probe_decoder(data: &[u8]) -> Option<Box<dyn ModuleDecoder>> {
    if protracker::probe(data) {
        return Some(Box::new(protracker::ProTrackerDecoder::new()));
    }
    None
}
