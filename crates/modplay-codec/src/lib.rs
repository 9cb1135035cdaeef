//! # modplay-codec
//!
//! modplay 模块解码器库.
//!
//! 定义了会话层依赖的解码器能力 [`ModuleDecoder`] (init / configure / load / fill_chunk),
//! 并提供一个 ProTracker 系列 `.mod` 文件的回放实现.
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use modplay_codec::{DecoderConfig, ModuleDecoder, ProTrackerDecoder};
//!
//! # fn demo(data: &[u8]) -> modplay_core::ModResult<()> {
//! let mut dec = ProTrackerDecoder::new();
//! dec.init();
//! dec.configure(&DecoderConfig::session(48000))?;
//! dec.load(data)?;
//!
//! // 512 个立体声采样 = 1024 个交错 i16
//! let mut chunk = vec![0i16; 1024];
//! dec.fill_chunk(&mut chunk, 512)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decoder;
pub mod decoders;
pub mod module_info;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

// 重导出常用类型
pub use config::DecoderConfig;
pub use decoder::ModuleDecoder;
pub use decoders::protracker::ProTrackerDecoder;
pub use module_info::ModuleInfo;
