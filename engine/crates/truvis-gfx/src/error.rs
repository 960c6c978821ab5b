//! GFX 层的错误类型
//!
//! - [`GfxError::Usage`]：接口被错误地使用，例如在 dispose 之后继续创建资源
//! - [`GfxError::NotSupported`]：请求本身合法，但后端或当前配置无法满足
//! - [`GfxError::InvalidHandle`]：句柄表中不存在该句柄
//!
//! 创建路径上的错误同步返回给调用者；每帧的 GC、flush、dispose 不返回错误，只记录日志。

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GfxError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),
}

impl GfxError {
    #[inline]
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    #[inline]
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    #[inline]
    pub fn invalid_handle(handle: impl std::fmt::Debug) -> Self {
        Self::InvalidHandle(format!("{handle:?}"))
    }
}

pub type GfxResult<T> = Result<T, GfxError>;
