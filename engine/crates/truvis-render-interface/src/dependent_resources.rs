/// 依赖于 device 的资源是否可用
///
/// 只有在 `Valid` 状态下才能创建资源；切换到 `Invalid` 时会强制释放所有 Native 资源。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DependentResources {
    /// 第一次 `create_dependent_resources` 之前，或者 `destroy_dependent_resources` 之后
    #[default]
    Invalid,
    Valid,
}
impl DependentResources {
    #[inline]
    pub fn is_valid(&self) -> bool {
        matches!(self, DependentResources::Valid)
    }
}

/// render system 广播给各个资源管理器的事件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasicRenderSystemEvent {
    /// device 丢失，所有 Native 资源都需要重建
    DeviceLost,
    /// swapchain 尺寸改变
    Resized { width: u32, height: u32 },
}
