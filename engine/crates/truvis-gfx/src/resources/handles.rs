use slotmap::new_key_type;

// Native 层的句柄，只在 GFX 层和资源管理器之间传递
new_key_type! {
    /// Native Buffer 句柄
    pub struct NativeBufferHandle;
    /// Native Texture 句柄
    pub struct NativeTextureHandle;
    /// 从 DescriptorSetManager 分配出的 descriptor set
    pub struct DescriptorSetHandle;
}
