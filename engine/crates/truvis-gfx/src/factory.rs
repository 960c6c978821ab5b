//! Native 资源工厂
//!
//! 资源管理器只通过这里的 trait 和后端打交道，后端负责真正的显存分配与释放。
//! 工厂独占它创建的所有 Native 资源；`dispose` 之后任何创建和写入都返回 `Usage` 错误。

use crate::error::GfxResult;
use crate::resources::buffer::{BasicBufferType, BufferCaps, BufferData};
use crate::resources::handles::{NativeBufferHandle, NativeTextureHandle};
use crate::resources::texture::{NativeTextureInfo, TextureCaps, TextureDesc, TextureFilterHint, TextureFlags};

pub trait NativeBufferFactory {
    fn buffer_caps(&self) -> BufferCaps;

    /// 创建一个可以容纳 `element_capacity` 个元素的 buffer，并写入 `data`
    ///
    /// `data` 的元素数量超过容量时返回 `NotSupported`。
    fn create_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        element_capacity: u32,
        is_dynamic: bool,
    ) -> GfxResult<NativeBufferHandle>;

    /// 句柄不存在时返回 false
    fn destroy_buffer(&mut self, handle: NativeBufferHandle) -> bool;

    /// 从第 `dst_index` 个元素开始写入
    fn set_buffer_data(&mut self, handle: NativeBufferHandle, dst_index: u32, data: BufferData<'_>) -> GfxResult<()>;

    /// 释放所有剩余的 buffer，可以重复调用
    fn dispose(&mut self);

    fn live_buffer_count(&self) -> usize;
}

pub trait NativeTextureFactory {
    fn texture_caps(&self) -> TextureCaps;

    fn create_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
        is_dynamic: bool,
    ) -> GfxResult<NativeTextureHandle>;

    /// 句柄不存在时返回 false
    fn destroy_texture(&mut self, handle: NativeTextureHandle) -> bool;

    /// 整体替换 texture 的内容，尺寸和格式必须与创建时一致
    fn set_texture_data(
        &mut self,
        handle: NativeTextureHandle,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<()>;

    fn try_get_texture(&self, handle: NativeTextureHandle) -> Option<&NativeTextureInfo>;

    fn get_texture(&self, handle: NativeTextureHandle) -> GfxResult<&NativeTextureInfo>;

    /// 释放所有剩余的 texture 以及依附于它们的资源，可以重复调用
    fn dispose(&mut self);

    fn live_texture_count(&self) -> usize;
}
