//! # modplay-ffi
//!
//! modplay C FFI 导出层.
//!
//! 将 MOD 模块会话导出为 C 兼容的函数接口, 编译为 DLL (Windows) / SO (Linux) /
//! dylib (macOS) / WASM 供宿主调用. 宿主拿到的是不透明句柄, 只能交还给本库.
//!
//! # 导出函数
//!
//! - `loadMod()` - 从内存缓冲创建会话, 失败返回空指针
//! - `loadModChecked()` - 同上, 返回状态码区分失败原因
//! - `getNextSoundData()` - 向左右声道写入下一段采样
//! - `unloadMod()` - 销毁会话
//!
//! # 内存管理
//!
//! - `loadMod()` 返回的句柄必须且只能通过 `unloadMod()` 释放一次
//! - 模块缓冲在 `loadMod()` 返回后即可由调用方释放
//! - 输出缓冲由调用方分配, 本库只在调用期间写入

pub mod error;
pub mod fill;
pub mod session;

#[cfg(test)]
mod test_decoder;

use std::alloc::Layout;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};
use std::ptr;

use log::warn;

pub use error::{
    MODPLAY_ERR_ALLOCATION, MODPLAY_ERR_INITIALIZATION, MODPLAY_ERR_INVALID_INPUT, MODPLAY_OK,
    SessionError,
};
pub use fill::fill_channels;
pub use session::{Session, sample_rate_from_f32};

/// `modplay_alloc()` 分配的内存对齐
const SCRATCH_ALIGN: usize = 8;

/// 从内存中的模块文件创建会话
///
/// 失败 (空指针、长度非正、采样率非法、模块无法解析、内存不足) 时返回空指针.
///
/// # Safety
///
/// `buffer` 非空时必须指向至少 `length` 个可读字节.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn loadMod(
    buffer: *const c_void,
    length: c_int,
    sample_rate: f32,
) -> *mut c_void {
    let mut handle = ptr::null_mut();
    // 安全: 参数约束与 loadModChecked 相同, handle 指向本地变量
    unsafe { loadModChecked(buffer, length, sample_rate, &mut handle) };
    handle
}

/// 从内存中的模块文件创建会话, 返回状态码
///
/// 成功返回 `MODPLAY_OK` 并写入句柄; 失败时写入空指针并返回负数状态码.
/// `out_handle` 为空时返回 `MODPLAY_ERR_INVALID_INPUT`.
///
/// # Safety
///
/// `buffer` 非空时必须指向至少 `length` 个可读字节, `out_handle` 非空时必须可写.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn loadModChecked(
    buffer: *const c_void,
    length: c_int,
    sample_rate: f32,
    out_handle: *mut *mut c_void,
) -> c_int {
    if out_handle.is_null() {
        return MODPLAY_ERR_INVALID_INPUT;
    }
    // 安全: 已检查非空, 调用方保证可写
    unsafe { *out_handle = ptr::null_mut() };

    if buffer.is_null() || length <= 0 {
        return MODPLAY_ERR_INVALID_INPUT;
    }
    let Some(rate) = sample_rate_from_f32(sample_rate) else {
        return MODPLAY_ERR_INVALID_INPUT;
    };
    // 安全: 调用方保证 buffer 指向 length 个可读字节, 仅在本调用内借用
    let data = unsafe { std::slice::from_raw_parts(buffer.cast::<u8>(), length as usize) };

    match Session::create(data, rate) {
        Ok(session) => {
            // 安全: 同上
            unsafe { *out_handle = Box::into_raw(Box::new(session)).cast() };
            MODPLAY_OK
        }
        Err(err) => {
            warn!("加载模块失败: {err}");
            err.status_code()
        }
    }
}

/// 向左右声道各写入 `sample_count` 个 [-1, 1] 范围的采样
///
/// 总是返回 0. 句柄或缓冲为空、`sample_count <= 0` 时不做任何事;
/// 解码失败时写入静音.
///
/// # Safety
///
/// `handle` 必须来自 `loadMod()` 且尚未释放; `left` 和 `right` 必须各自指向
/// 至少 `sample_count` 个可写 f32, 且两者不能重叠.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn getNextSoundData(
    handle: *mut c_void,
    left: *mut f32,
    right: *mut f32,
    sample_count: c_int,
) -> c_int {
    if handle.is_null() || left.is_null() || right.is_null() || sample_count <= 0 {
        return 0;
    }
    let n = sample_count as usize;
    // 安全: 调用方保证句柄有效且没有其它引用
    let session = unsafe { &mut *handle.cast::<Session>() };
    // 安全: 调用方保证两路缓冲各有 n 个元素且互不重叠
    let (left, right) = unsafe {
        (
            std::slice::from_raw_parts_mut(left, n),
            std::slice::from_raw_parts_mut(right, n),
        )
    };
    // 失败时 fill 已经写入静音并记录日志
    let _ = session.fill(left, right, n);
    0
}

/// 销毁会话, 空句柄时不做任何事
///
/// # Safety
///
/// `handle` 必须为空或来自 `loadMod()` 且尚未释放. 调用后句柄失效.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn unloadMod(handle: *mut c_void) {
    if handle.is_null() {
        return;
    }
    // 安全: 调用方保证句柄来自 Box::into_raw 且只释放一次
    let session = unsafe { Box::from_raw(handle.cast::<Session>()) };
    session.destroy();
}

/// 获取 modplay 版本号字符串
///
/// 返回的字符串指针为静态分配, 无需释放.
#[unsafe(no_mangle)]
pub extern "C" fn modplay_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

/// 获取 modplay 版本号的数字表示
///
/// 格式: (主版本 << 16) | (次版本 << 8) | 修订版本
#[unsafe(no_mangle)]
pub extern "C" fn modplay_version_int() -> u32 {
    let part = |s: &str| s.parse::<u32>().unwrap_or(0);
    let (major, minor, patch) = (
        part(env!("CARGO_PKG_VERSION_MAJOR")),
        part(env!("CARGO_PKG_VERSION_MINOR")),
        part(env!("CARGO_PKG_VERSION_PATCH")),
    );
    (major << 16) | (minor << 8) | patch
}

/// 为没有自带分配器的宿主 (WASM) 分配 `size` 字节
///
/// `size == 0` 或分配失败时返回空指针. 必须用相同的 `size` 调用 `modplay_free()`.
#[unsafe(no_mangle)]
pub extern "C" fn modplay_alloc(size: usize) -> *mut u8 {
    if size == 0 {
        return ptr::null_mut();
    }
    match Layout::from_size_align(size, SCRATCH_ALIGN) {
        // 安全: size 非零
        Ok(layout) => unsafe { std::alloc::alloc(layout) },
        Err(_) => ptr::null_mut(),
    }
}

/// 释放 `modplay_alloc()` 分配的内存, 空指针时不做任何事
///
/// # Safety
///
/// `ptr` 必须来自 `modplay_alloc(size)` 且尚未释放.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn modplay_free(ptr: *mut u8, size: usize) {
    if ptr.is_null() || size == 0 {
        return;
    }
    if let Ok(layout) = Layout::from_size_align(size, SCRATCH_ALIGN) {
        // 安全: 调用方保证 ptr 由相同 layout 分配
        unsafe { std::alloc::dealloc(ptr, layout) };
    }
}

/// 初始化日志输出, 级别由 `MODPLAY_LOG` 环境变量控制
///
/// 可安全多次调用.
#[unsafe(no_mangle)]
pub extern "C" fn modplay_init_logging() {
    let env = env_logger::Env::new().filter_or("MODPLAY_LOG", "warn");
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_version() {
        // 安全: 静态字符串以 \0 结尾
        let version = unsafe { CStr::from_ptr(modplay_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
        assert_eq!(modplay_version_int() >> 16, 0);
        assert_eq!((modplay_version_int() >> 8) & 0xFF, 1);
    }

    #[test]
    fn test_alloc_roundtrip() {
        assert!(modplay_alloc(0).is_null());
        let ptr = modplay_alloc(64);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % SCRATCH_ALIGN, 0);
        // 安全: 刚分配的 64 字节
        unsafe {
            ptr.write_bytes(0xAB, 64);
            modplay_free(ptr, 64);
            modplay_free(ptr::null_mut(), 64);
        }
    }

    #[test]
    fn test_init_logging_twice() {
        modplay_init_logging();
        modplay_init_logging();
    }
}
