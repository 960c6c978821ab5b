//! 性能分析宏
//!
//! 开启 `profiling` feature 时转发到 `tracy-client`，此时调用方需要先 `tracy_client::Client::start()`。
//! 未开启时宏展开为空，不产生任何开销。
//!
//! ```ignore
//! fn pre_update(&mut self) {
//!     truvis_crate_tools::profile_scope!("BasicBufferManager::pre_update");
//!     // ...
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, frame_mark as tracy_frame_mark, span};

/// 为当前作用域创建一个 span，离开作用域时结束
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// 标记一帧的结束
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}
