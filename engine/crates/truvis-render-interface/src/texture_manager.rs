use std::cell::{Cell, RefCell};
use std::rc::Rc;

use truvis_gfx::error::{GfxError, GfxResult};
use truvis_gfx::factory::NativeTextureFactory;
use truvis_gfx::resources::handles::NativeTextureHandle;
use truvis_gfx::resources::texture::{
    Extent2D, NativeTextureInfo, OwnedTextureDesc, PixelFormat, TextureCaps, TextureDesc, TextureFilterHint,
    TextureFlags,
};

use crate::deferred_records::{DeferredRecords, GcStats, RecordReclaimer};
use crate::dependent_resources::{BasicRenderSystemEvent, DependentResources};
use crate::handles::BasicTextureHandle;
use crate::liveness::LivenessToken;

struct PendingReplace {
    desc: OwnedTextureDesc,
    filter_hint: TextureFilterHint,
    flags: TextureFlags,
}

/// dynamic texture 的 tracker 与管理器之间共享的通道
///
/// texture 只支持整体替换，所以只保留最近一次的内容。
pub struct DynamicTextureLink {
    native: Cell<Option<NativeTextureHandle>>,
    extent: Extent2D,
    format: PixelFormat,
    pending: RefCell<Option<PendingReplace>>,
}
impl DynamicTextureLink {
    fn new(native: NativeTextureHandle, extent: Extent2D, format: PixelFormat) -> Self {
        Self {
            native: Cell::new(Some(native)),
            extent,
            format,
            pending: RefCell::new(None),
        }
    }

    fn replace(&self, desc: TextureDesc<'_>, filter_hint: TextureFilterHint, flags: TextureFlags) -> GfxResult<()> {
        if self.native.get().is_none() {
            return Err(GfxError::usage("set_data on a dynamic texture whose native resource was force freed"));
        }
        if desc.extent() != self.extent || desc.format() != self.format {
            return Err(GfxError::not_supported(format!(
                "dynamic texture is {:?} {:?}, can not replace it with {:?} {:?}",
                self.extent,
                self.format,
                desc.extent(),
                desc.format()
            )));
        }

        *self.pending.borrow_mut() = Some(PendingReplace {
            desc: desc.to_owned_desc(),
            filter_hint,
            flags,
        });
        Ok(())
    }

    fn drain_into(&self, factory: &mut impl NativeTextureFactory) -> bool {
        let pending = self.pending.borrow_mut().take();
        let (Some(native), Some(pending)) = (self.native.get(), pending) else {
            return false;
        };

        match factory.set_texture_data(native, pending.desc.as_desc(), pending.filter_hint, pending.flags) {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to update dynamic texture {native:?}: {e}");
                false
            }
        }
    }

    fn invalidate(&self) {
        self.native.set(None);
        self.pending.borrow_mut().take();
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.native.get().is_some()
    }

    #[inline]
    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

pub trait BasicTexture {
    fn handle(&self) -> BasicTextureHandle;
    fn extent(&self) -> Extent2D;
    fn format(&self) -> PixelFormat;
}

pub struct BasicStaticTexture {
    handle: BasicTextureHandle,
    extent: Extent2D,
    format: PixelFormat,
    _token: LivenessToken,
}
impl BasicTexture for BasicStaticTexture {
    fn handle(&self) -> BasicTextureHandle {
        self.handle
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

pub struct BasicDynamicTexture {
    handle: BasicTextureHandle,
    link: Rc<DynamicTextureLink>,
    _token: LivenessToken,
}
impl BasicDynamicTexture {
    /// 整体替换内容，尺寸和格式必须与创建时一致；在下一次 flush 时生效
    pub fn set_data(&mut self, desc: TextureDesc<'_>, filter_hint: TextureFilterHint, flags: TextureFlags) -> GfxResult<()> {
        self.link.replace(desc, filter_hint, flags)
    }

    #[inline]
    pub fn link(&self) -> &DynamicTextureLink {
        &self.link
    }
}
impl BasicTexture for BasicDynamicTexture {
    fn handle(&self) -> BasicTextureHandle {
        self.handle
    }

    fn extent(&self) -> Extent2D {
        self.link.extent
    }

    fn format(&self) -> PixelFormat {
        self.link.format
    }
}

struct TextureRecord {
    native: NativeTextureHandle,
    link: Option<Rc<DynamicTextureLink>>,
}

struct TextureReclaimer<'a, F: NativeTextureFactory> {
    factory: &'a mut F,
}
impl<F: NativeTextureFactory> RecordReclaimer<BasicTextureHandle, TextureRecord> for TextureReclaimer<'_, F> {
    fn on_condemn(&mut self, _key: BasicTextureHandle, record: &mut TextureRecord) {
        if let Some(link) = record.link.take() {
            link.drain_into(&mut *self.factory);
        }
    }

    fn destroy(&mut self, key: BasicTextureHandle, record: TextureRecord) -> bool {
        if let Some(link) = record.link {
            link.invalidate();
        }
        log::debug!("destroy texture {key:?} -> {:?}", record.native);
        self.factory.destroy_texture(record.native)
    }
}

/// Texture 资源管理器
///
/// 与 [`crate::buffer_manager::BasicBufferManager`] 的生命周期规则相同。
pub struct BasicTextureManager<F: NativeTextureFactory> {
    max_frames_in_flight: u32,
    factory: F,
    records: DeferredRecords<BasicTextureHandle, TextureRecord>,
    dependent_resources: DependentResources,

    destroyed: bool,
}
// new & init
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    pub fn new(max_frames_in_flight: u32, factory: F) -> GfxResult<Self> {
        if max_frames_in_flight == 0 {
            return Err(GfxError::usage("max_frames_in_flight must be at least 1"));
        }
        Ok(Self {
            max_frames_in_flight,
            factory,
            records: DeferredRecords::new(),
            dependent_resources: DependentResources::Invalid,
            destroyed: false,
        })
    }
}
// destroy
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        self.force_free_all_textures();
        self.dependent_resources = DependentResources::Invalid;
        self.factory.dispose();
        self.destroyed = true;
        log::info!("BasicTextureManager destroyed");
    }
}
impl<F: NativeTextureFactory> Drop for BasicTextureManager<F> {
    fn drop(&mut self) {
        if !self.destroyed {
            if !self.records.is_empty() {
                log::warn!("BasicTextureManager dropped with {} records, force freeing them", self.records.count());
            }
            self.destroy_mut();
        }
    }
}
// dependent resources
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    pub fn create_dependent_resources(&mut self) -> GfxResult<()> {
        if self.dependent_resources.is_valid() {
            return Err(GfxError::usage("dependent resources already created"));
        }
        self.collect_garbage(0);
        self.dependent_resources = DependentResources::Valid;
        log::info!("BasicTextureManager: dependent resources created");
        Ok(())
    }

    pub fn destroy_dependent_resources(&mut self) {
        if !self.dependent_resources.is_valid() {
            return;
        }
        self.force_free_all_textures();
        self.dependent_resources = DependentResources::Invalid;
        log::info!("BasicTextureManager: dependent resources destroyed");
    }

    pub fn on_render_system_event(&mut self, event: BasicRenderSystemEvent) {
        match event {
            BasicRenderSystemEvent::DeviceLost => {
                log::warn!("BasicTextureManager: device lost, all textures are force freed");
                self.destroy_dependent_resources();
            }
            BasicRenderSystemEvent::Resized { width, height } => {
                log::debug!("BasicTextureManager: resized to {width}x{height}, nothing to rebuild");
            }
        }
    }

    pub fn force_free_all_textures(&mut self) -> usize {
        truvis_crate_tools::profile_scope!("BasicTextureManager::force_free_all_textures");
        let freed = self.records.force_free_all(&mut TextureReclaimer {
            factory: &mut self.factory,
        });
        if freed > 0 {
            log::info!("BasicTextureManager: force freed {freed} textures");
        }
        freed
    }
}
// create
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    pub fn create_static_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<BasicStaticTexture> {
        if !self.dependent_resources.is_valid() {
            return Err(GfxError::usage("create_static_texture called while dependent resources are invalid"));
        }

        let native = self.factory.create_texture(desc, filter_hint, flags, false)?;
        let token = LivenessToken::new();
        let handle = self.records.insert(TextureRecord { native, link: None }, token.watch());
        log::debug!("static texture created: {handle:?} -> {native:?}, {:?}", desc.extent());

        Ok(BasicStaticTexture {
            handle,
            extent: desc.extent(),
            format: desc.format(),
            _token: token,
        })
    }

    pub fn create_dynamic_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<BasicDynamicTexture> {
        if !self.dependent_resources.is_valid() {
            return Err(GfxError::usage("create_dynamic_texture called while dependent resources are invalid"));
        }
        if !self.factory.texture_caps().contains(TextureCaps::DYNAMIC_TEXTURES) {
            return Err(GfxError::not_supported("dynamic textures"));
        }

        let native = self.factory.create_texture(desc, filter_hint, flags, true)?;
        let link = Rc::new(DynamicTextureLink::new(native, desc.extent(), desc.format()));
        let token = LivenessToken::new();
        let handle = self.records.insert(
            TextureRecord {
                native,
                link: Some(link.clone()),
            },
            token.watch(),
        );
        log::debug!("dynamic texture created: {handle:?} -> {native:?}, {:?}", desc.extent());

        Ok(BasicDynamicTexture {
            handle,
            link,
            _token: token,
        })
    }
}
// update
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    pub fn flush_dynamic_updates(&mut self) -> usize {
        let mut applied = 0;
        for (_, record) in self.records.iter() {
            if let Some(link) = &record.payload().link {
                if link.drain_into(&mut self.factory) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// # Phase: Before Render
    pub fn pre_update(&mut self) -> GcStats {
        truvis_crate_tools::profile_scope!("BasicTextureManager::pre_update");

        self.flush_dynamic_updates();
        let defer_count = if self.dependent_resources.is_valid() {
            self.max_frames_in_flight
        } else {
            0
        };
        self.collect_garbage(defer_count)
    }

    fn collect_garbage(&mut self, defer_count: u32) -> GcStats {
        truvis_crate_tools::profile_scope!("BasicTextureManager::collect_garbage");
        let stats = self.records.collect_garbage(
            defer_count,
            &mut TextureReclaimer {
                factory: &mut self.factory,
            },
        );
        if !stats.is_empty() {
            log::debug!(
                "texture gc: {} condemned, {} destroyed, {} remaining",
                stats.condemned,
                stats.destroyed,
                self.records.count()
            );
        }
        stats
    }
}
// getters
impl<F: NativeTextureFactory> BasicTextureManager<F> {
    #[inline]
    pub fn count(&self) -> usize {
        self.records.count()
    }

    #[inline]
    pub fn defer_count(&self, handle: BasicTextureHandle) -> Option<u32> {
        self.records.get(handle).map(|record| record.defer_count())
    }

    #[inline]
    pub fn try_get_native_handle(&self, handle: BasicTextureHandle) -> Option<NativeTextureHandle> {
        self.records.get(handle).map(|record| record.payload().native)
    }

    pub fn get_native_handle(&self, handle: BasicTextureHandle) -> GfxResult<NativeTextureHandle> {
        self.try_get_native_handle(handle).ok_or_else(|| GfxError::invalid_handle(handle))
    }

    pub fn try_get_texture(&self, handle: BasicTextureHandle) -> Option<&NativeTextureInfo> {
        self.try_get_native_handle(handle)
            .and_then(|native| self.factory.try_get_texture(native))
    }

    pub fn get_texture(&self, handle: BasicTextureHandle) -> GfxResult<&NativeTextureInfo> {
        self.factory.get_texture(self.get_native_handle(handle)?)
    }

    #[inline]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    #[inline]
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    #[inline]
    pub fn max_frames_in_flight(&self) -> u32 {
        self.max_frames_in_flight
    }

    #[inline]
    pub fn dependent_resources(&self) -> DependentResources {
        self.dependent_resources
    }
}
