//! Truvis 的 GFX 层
//!
//! - [`basic::handle_table`]：带代际号的句柄表
//! - [`factory`]：资源管理器与后端之间的 Native 资源工厂接口
//! - [`headless`]：基于主存的后端实现
//! - [`error`]：GFX 层统一的错误类型

pub mod basic;
pub mod error;
pub mod factory;
pub mod headless;
pub mod resources;
