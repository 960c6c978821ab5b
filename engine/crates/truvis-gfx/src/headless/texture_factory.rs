use itertools::Itertools;

use crate::basic::handle_table::HandleTable;
use crate::error::{GfxError, GfxResult};
use crate::factory::NativeTextureFactory;
use crate::headless::descriptor_set_manager::DescriptorSetManager;
use crate::resources::handles::{DescriptorSetHandle, NativeTextureHandle};
use crate::resources::texture::{NativeTextureInfo, TextureCaps, TextureDesc, TextureFilterHint, TextureFlags};
use slotmap::Key;

/// 位于主存中的 texture
pub struct HostTexture {
    info: NativeTextureInfo,
    pixels: Vec<u8>,
}
impl HostTexture {
    #[inline]
    pub fn info(&self) -> &NativeTextureInfo {
        &self.info
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// 拆除过程中的一步，按发生顺序记录
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownStep {
    DestroyTexture(NativeTextureHandle),
    /// `leaked_sets` 为销毁时仍未释放的 descriptor set 数量
    DestroyDescriptorSetManager { leaked_sets: usize },
}

/// 在主存中模拟 Native Texture 的工厂
///
/// 每张 texture 持有一个从 [`DescriptorSetManager`] 分配的 descriptor set，
/// 所以拆除必须分两步：先销毁所有 texture，再销毁 descriptor set manager。
pub struct HeadlessTextureFactory {
    caps: TextureCaps,
    textures: HandleTable<NativeTextureHandle, HostTexture>,
    descriptor_sets: Option<DescriptorSetManager>,

    teardown_steps: Vec<TeardownStep>,
    disposed: bool,
}
// new & init
impl HeadlessTextureFactory {
    /// 支持所有能力，descriptor pool 数量不设上限
    pub fn new(max_frames_in_flight: usize) -> GfxResult<Self> {
        Self::with_config(TextureCaps::all(), max_frames_in_flight, None)
    }

    pub fn with_config(caps: TextureCaps, max_frames_in_flight: usize, max_descriptor_pools: Option<usize>) -> GfxResult<Self> {
        Ok(Self {
            caps,
            textures: HandleTable::new(),
            descriptor_sets: Some(DescriptorSetManager::new(max_frames_in_flight, max_descriptor_pools)?),
            teardown_steps: Vec::new(),
            disposed: false,
        })
    }
}
// destroy
impl HeadlessTextureFactory {
    /// 第一步：销毁所有 texture，同时归还它们的 descriptor set
    fn destroy_all_textures(&mut self) {
        let handles = self.textures.keys().collect_vec();
        if !handles.is_empty() {
            log::warn!("HeadlessTextureFactory disposed with {} live textures, force freeing them", handles.len());
        }
        for handle in handles {
            self.destroy_texture(handle);
        }
    }

    /// 第二步：销毁 descriptor set manager
    fn destroy_descriptor_set_manager(&mut self) {
        if let Some(descriptor_sets) = self.descriptor_sets.take() {
            self.teardown_steps.push(TeardownStep::DestroyDescriptorSetManager {
                leaked_sets: descriptor_sets.allocated_count(),
            });
            descriptor_sets.destroy();
        }
    }
}
impl Drop for HeadlessTextureFactory {
    fn drop(&mut self) {
        if !self.disposed {
            log::warn!("HeadlessTextureFactory dropped without dispose");
            self.dispose();
        }
        log::info!("Dropping HeadlessTextureFactory");
    }
}
// getters
impl HeadlessTextureFactory {
    #[inline]
    pub fn texture(&self, handle: NativeTextureHandle) -> Option<&HostTexture> {
        self.textures.try_get(handle)
    }

    #[inline]
    pub fn descriptor_sets(&self) -> Option<&DescriptorSetManager> {
        self.descriptor_sets.as_ref()
    }

    /// 拆除时每一步的记录，dispose 之前为空
    #[inline]
    pub fn teardown_steps(&self) -> &[TeardownStep] {
        &self.teardown_steps
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
impl NativeTextureFactory for HeadlessTextureFactory {
    fn texture_caps(&self) -> TextureCaps {
        self.caps
    }

    fn create_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
        is_dynamic: bool,
    ) -> GfxResult<NativeTextureHandle> {
        if self.disposed {
            return Err(GfxError::usage("create_texture called after the factory was disposed"));
        }
        if is_dynamic && !self.caps.contains(TextureCaps::DYNAMIC_TEXTURES) {
            return Err(GfxError::not_supported("dynamic textures"));
        }
        if flags.contains(TextureFlags::GENERATE_MIPMAPS) && !self.caps.contains(TextureCaps::MIPMAP_GENERATION) {
            return Err(GfxError::not_supported("mipmap generation"));
        }

        let mip_levels = if flags.contains(TextureFlags::GENERATE_MIPMAPS) {
            desc.extent().full_mip_levels()
        } else {
            1
        };
        let handle = self.textures.add(HostTexture {
            info: NativeTextureInfo {
                extent: desc.extent(),
                format: desc.format(),
                mip_levels,
                filter_hint,
                flags,
                is_dynamic,
                descriptor_set: DescriptorSetHandle::null(),
                update_count: 0,
            },
            pixels: desc.pixels().to_vec(),
        });

        // descriptor set 分配失败时回滚已经创建的 texture
        let descriptor_set = match self.descriptor_sets.as_mut() {
            Some(descriptor_sets) => descriptor_sets.allocate(),
            None => Err(GfxError::usage("descriptor set manager already destroyed")),
        };
        match descriptor_set {
            Ok(descriptor_set) => {
                self.textures.get_mut(handle)?.info.descriptor_set = descriptor_set;
                log::trace!("headless texture created: {handle:?}, {:?}", desc.extent());
                Ok(handle)
            }
            Err(e) => {
                self.textures.remove_entry(handle);
                Err(e)
            }
        }
    }

    fn destroy_texture(&mut self, handle: NativeTextureHandle) -> bool {
        let Some(texture) = self.textures.remove(handle) else {
            log::warn!("destroy_texture: unknown handle {handle:?}");
            return false;
        };
        if let Some(descriptor_sets) = self.descriptor_sets.as_mut() {
            descriptor_sets.free(texture.info.descriptor_set);
        }
        if self.disposed {
            self.teardown_steps.push(TeardownStep::DestroyTexture(handle));
        }
        log::trace!("headless texture destroyed: {handle:?}");
        true
    }

    fn set_texture_data(
        &mut self,
        handle: NativeTextureHandle,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<()> {
        if self.disposed {
            return Err(GfxError::usage("set_texture_data called after the factory was disposed"));
        }
        if !self.caps.contains(TextureCaps::DYNAMIC_TEXTURES) {
            return Err(GfxError::not_supported("dynamic textures"));
        }

        let texture = self.textures.get_mut(handle)?;
        if !texture.info.is_dynamic {
            return Err(GfxError::usage(format!("texture {handle:?} was not created as dynamic")));
        }
        if texture.info.extent != desc.extent() || texture.info.format != desc.format() {
            return Err(GfxError::not_supported(format!(
                "changing texture layout from {:?} {:?} to {:?} {:?}",
                texture.info.extent,
                texture.info.format,
                desc.extent(),
                desc.format()
            )));
        }

        texture.pixels.clear();
        texture.pixels.extend_from_slice(desc.pixels());
        texture.info.filter_hint = filter_hint;
        texture.info.flags = flags;
        texture.info.update_count += 1;
        Ok(())
    }

    fn try_get_texture(&self, handle: NativeTextureHandle) -> Option<&NativeTextureInfo> {
        self.textures.try_get(handle).map(|texture| &texture.info)
    }

    fn get_texture(&self, handle: NativeTextureHandle) -> GfxResult<&NativeTextureInfo> {
        self.textures.get(handle).map(|texture| &texture.info)
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        truvis_crate_tools::profile_scope!("HeadlessTextureFactory::dispose");

        self.teardown_steps.clear();
        self.disposed = true;
        self.destroy_all_textures();
        self.destroy_descriptor_set_manager();
    }

    fn live_texture_count(&self) -> usize {
        self.textures.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::texture::{Extent2D, PixelFormat};

    fn rgba(extent: Extent2D, value: u8) -> Vec<u8> {
        vec![value; extent.texel_count() * 4]
    }

    #[test]
    fn test_each_texture_owns_a_descriptor_set() {
        let mut factory = HeadlessTextureFactory::new(2).unwrap();
        let extent = Extent2D::new(4, 4);
        let pixels = rgba(extent, 255);
        let desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &pixels).unwrap();

        let a = factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), false).unwrap();
        let b = factory.create_texture(desc, TextureFilterHint::Nearest, TextureFlags::GENERATE_MIPMAPS, false).unwrap();

        assert_eq!(factory.descriptor_sets().unwrap().allocated_count(), 2);
        assert_ne!(factory.get_texture(a).unwrap().descriptor_set, factory.get_texture(b).unwrap().descriptor_set);
        assert_eq!(factory.get_texture(b).unwrap().mip_levels, 3);

        assert!(factory.destroy_texture(a));
        assert_eq!(factory.descriptor_sets().unwrap().allocated_count(), 1);
        assert!(factory.try_get_texture(a).is_none());
        assert!(matches!(factory.get_texture(a), Err(GfxError::InvalidHandle(_))));
        factory.dispose();
    }

    #[test]
    fn test_descriptor_failure_rolls_back_texture() {
        let mut factory = HeadlessTextureFactory::with_config(TextureCaps::all(), 1, Some(1)).unwrap();
        let extent = Extent2D::new(2, 2);
        let pixels = rgba(extent, 0);
        let desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &pixels).unwrap();

        factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), false).unwrap();
        let result = factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), false);

        assert!(matches!(result, Err(GfxError::NotSupported(_))));
        assert_eq!(factory.live_texture_count(), 1);
        factory.dispose();
    }

    #[test]
    fn test_teardown_destroys_textures_before_descriptor_sets() {
        let mut factory = HeadlessTextureFactory::new(2).unwrap();
        let extent = Extent2D::new(2, 2);
        let pixels = rgba(extent, 7);
        let desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &pixels).unwrap();
        for _ in 0..3 {
            factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), false).unwrap();
        }

        factory.dispose();
        factory.dispose();

        let steps = factory.teardown_steps();
        assert_eq!(steps.len(), 4);
        assert!(steps[..3].iter().all(|step| matches!(step, TeardownStep::DestroyTexture(_))));
        assert_eq!(steps[3], TeardownStep::DestroyDescriptorSetManager { leaked_sets: 0 });
        assert!(factory.descriptor_sets().is_none());
        assert_eq!(factory.live_texture_count(), 0);
    }

    #[test]
    fn test_replace_dynamic_content() {
        let mut factory = HeadlessTextureFactory::new(2).unwrap();
        let extent = Extent2D::new(2, 2);
        let pixels = rgba(extent, 1);
        let desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &pixels).unwrap();
        let handle = factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), true).unwrap();

        let new_pixels = rgba(extent, 9);
        let new_desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &new_pixels).unwrap();
        factory
            .set_texture_data(handle, new_desc, TextureFilterHint::Nearest, TextureFlags::empty())
            .unwrap();
        assert_eq!(factory.texture(handle).unwrap().pixels(), new_pixels.as_slice());
        assert_eq!(factory.get_texture(handle).unwrap().update_count, 1);

        let bigger = Extent2D::new(4, 2);
        let bigger_pixels = rgba(bigger, 9);
        let bigger_desc = TextureDesc::new(bigger, PixelFormat::R8G8B8A8Unorm, &bigger_pixels).unwrap();
        assert!(matches!(
            factory.set_texture_data(handle, bigger_desc, TextureFilterHint::Nearest, TextureFlags::empty()),
            Err(GfxError::NotSupported(_))
        ));
        factory.dispose();
    }

    #[test]
    fn test_dynamic_requires_cap() {
        let mut factory = HeadlessTextureFactory::with_config(TextureCaps::empty(), 2, None).unwrap();
        let extent = Extent2D::new(1, 1);
        let pixels = rgba(extent, 0);
        let desc = TextureDesc::new(extent, PixelFormat::R8G8B8A8Unorm, &pixels).unwrap();
        assert!(matches!(
            factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::empty(), true),
            Err(GfxError::NotSupported(_))
        ));
        assert!(matches!(
            factory.create_texture(desc, TextureFilterHint::Smooth, TextureFlags::GENERATE_MIPMAPS, false),
            Err(GfxError::NotSupported(_))
        ));
        factory.dispose();
    }
}
