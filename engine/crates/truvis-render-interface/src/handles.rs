use slotmap::new_key_type;

// 资源管理器中 record 的句柄，由 tracker 持有
new_key_type! {
    pub struct BasicBufferHandle;
    pub struct BasicTextureHandle;
}
