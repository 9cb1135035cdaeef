//! # modplay-core
//!
//! modplay 核心库, 提供基础类型定义、错误处理和采样转换工具.
//!
//! 上层的解码器 crate 与 FFI 导出层都依赖本 crate 的类型.

pub mod channel_layout;
pub mod error;
pub mod sample_format;

// 重导出常用类型
pub use channel_layout::ChannelLayout;
pub use error::{ModError, ModResult};
pub use sample_format::{S16_TO_F32_SCALE, deinterleave_s16_stereo};
