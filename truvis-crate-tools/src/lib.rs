//! Truvis 工具集
//!
//! 提供日志初始化、性能分析宏等在各个 crate 之间共享的通用工具。
//!
//! # 日志
//! 统一的单行彩色日志格式：`[时间] 级别 [文件:行号] 内容`，可通过 `RUST_LOG` 覆盖过滤级别。
//!
//! # 性能分析
//! `profile_scope!` / `frame_mark!` 在开启 `profiling` feature 时转发到 tracy，否则为空。

pub mod init_log;
pub mod profiling;
