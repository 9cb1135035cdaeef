//! # modplay
//!
//! 纯 Rust 实现的 MOD 音乐模块流式解码库.
//!
//! 宿主 (浏览器音频回调、游戏引擎等) 把整个模块文件交给会话,
//! 之后反复请求固定长度的左右声道浮点采样:
//! - **会话**: 加载后独占解码器状态, 多个会话互不影响
//! - **填充**: 每次请求一段交错 S16, 解交织并归一化到 [-1, 1]
//! - **C 接口**: `loadMod` / `getNextSoundData` / `unloadMod`
//!
//! # 快速开始
//!
//! ```rust,no_run
//! # fn demo(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = modplay::open(data, 48000)?;
//! let mut left = vec![0.0f32; 1024];
//! let mut right = vec![0.0f32; 1024];
//! session.fill(&mut left, &mut right, 1024)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `modplay-core` | 错误、采样格式、声道布局 |
//! | `modplay-codec` | 解码器能力与 ProTracker 回放 |
//! | `modplay-ffi` | 会话、填充循环、C 导出 |

/// 核心类型与工具
pub use modplay_core as core;

/// 模块解码器
pub use modplay_codec as codec;

/// 会话与 C 导出层
pub use modplay_ffi as ffi;

pub use modplay_ffi::{Session, SessionError};

/// 获取 modplay 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 探测模块格式并创建会话
///
/// 空缓冲返回 `SessionError::InvalidInput`, 无法识别格式时返回 `SessionError::Initialization`.
pub fn open(data: &[u8], sample_rate: u32) -> Result<Session, SessionError> {
    if data.is_empty() {
        return Err(SessionError::InvalidInput("模块缓冲为空".into()));
    }
    let decoder = modplay_codec::decoders::probe_decoder(data).ok_or_else(|| {
        SessionError::Initialization(modplay_core::ModError::InvalidData(
            "无法识别的模块格式".into(),
        ))
    })?;
    Session::create_with(decoder, data, sample_rate)
}
