//! GPU 资源的生命周期管理
//!
//! 资源管理器为调用者创建 buffer/texture，返回由调用者持有的 tracker。
//! tracker 被 drop 之后，资源不会立即销毁，而是等待 `max_frames_in_flight` 次 `pre_update`，
//! 保证 GPU 上所有可能引用它的帧都已经执行完毕。

pub mod buffer_manager;
pub mod config;
pub mod deferred_records;
pub mod dependent_resources;
pub mod frame_counter;
pub mod handles;
pub mod liveness;
pub mod render_system;
pub mod texture_manager;
