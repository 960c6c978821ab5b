//! 不依赖图形 API 的后端，资源都放在主存中
//!
//! 用于单元测试、集成测试以及 headless 的 demo。

pub mod buffer_factory;
pub mod descriptor_set_manager;
pub mod texture_factory;
