use truvis_gfx::error::GfxResult;
use truvis_gfx::factory::{NativeBufferFactory, NativeTextureFactory};
use truvis_gfx::resources::buffer::{BasicBufferType, BasicBufferUsage, BufferData};
use truvis_gfx::resources::texture::{TextureDesc, TextureFilterHint, TextureFlags};

use crate::buffer_manager::{BasicBufferManager, BasicBufferTracker, BasicDynamicBuffer, BasicStaticBuffer};
use crate::config::RenderSystemConfig;
use crate::deferred_records::GcStats;
use crate::dependent_resources::BasicRenderSystemEvent;
use crate::frame_counter::FrameCounter;
use crate::texture_manager::{BasicDynamicTexture, BasicStaticTexture, BasicTextureManager};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreUpdateStats {
    pub buffers: GcStats,
    pub textures: GcStats,
}

/// 持有 buffer 和 texture 两个资源管理器，驱动每帧固定的调用顺序：
///
/// `pre_update` -> 创建资源 -> `begin_frame` -> 更新与绘制 -> `end_frame`
///
/// # 使用示例
/// ```ignore
/// let mut render_system = BasicRenderSystem::new(config, buffer_factory, texture_factory)?;
/// render_system.create_dependent_resources()?;
/// loop {
///     render_system.pre_update();
///     let vb = render_system.create_static_buffer(BasicBufferType::Vertex, BufferData::from_slice(&vertices))?;
///     render_system.begin_frame();
///     // draw
///     render_system.end_frame();
/// }
/// render_system.dispose();
/// ```
pub struct BasicRenderSystem<B: NativeBufferFactory, T: NativeTextureFactory> {
    config: RenderSystemConfig,
    buffers: BasicBufferManager<B>,
    textures: BasicTextureManager<T>,
    frame_counter: FrameCounter,

    in_frame: bool,
    /// 最近一次执行 pre_update 时的帧序号
    pre_updated_frame: Option<u64>,
}
// new & init
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    pub fn new(config: RenderSystemConfig, buffer_factory: B, texture_factory: T) -> GfxResult<Self> {
        let buffers = BasicBufferManager::new(config.max_frames_in_flight, buffer_factory)?;
        let textures = BasicTextureManager::new(config.max_frames_in_flight, texture_factory)?;
        let frame_counter = FrameCounter::new(0, config.max_frames_in_flight as usize);
        log::info!("BasicRenderSystem created, max frames in flight: {}", config.max_frames_in_flight);

        Ok(Self {
            config,
            buffers,
            textures,
            frame_counter,
            in_frame: false,
            pre_updated_frame: None,
        })
    }
}
// destroy
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    pub fn dispose(self) {
        if self.in_frame {
            log::warn!("BasicRenderSystem disposed inside frame {}", self.frame_counter.frame_name());
        }
        let Self { buffers, textures, .. } = self;
        textures.destroy();
        buffers.destroy();
        log::info!("BasicRenderSystem disposed");
    }
}
// dependent resources
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    pub fn create_dependent_resources(&mut self) -> GfxResult<()> {
        self.buffers.create_dependent_resources()?;
        if let Err(e) = self.textures.create_dependent_resources() {
            self.buffers.destroy_dependent_resources();
            return Err(e);
        }
        Ok(())
    }

    pub fn destroy_dependent_resources(&mut self) {
        self.textures.destroy_dependent_resources();
        self.buffers.destroy_dependent_resources();
    }

    pub fn on_render_system_event(&mut self, event: BasicRenderSystemEvent) {
        log::info!("render system event: {event:?}");
        self.textures.on_render_system_event(event);
        self.buffers.on_render_system_event(event);
    }
}
// frame
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    /// # Phase: Before Render
    ///
    /// 每帧调用一次，在 `begin_frame` 之前；重复调用或者在帧内调用会被忽略
    pub fn pre_update(&mut self) -> Option<PreUpdateStats> {
        if self.in_frame {
            log::error!("pre_update called inside frame {}, ignored", self.frame_counter.frame_name());
            return None;
        }
        if self.pre_updated_frame == Some(self.frame_counter.frame_id()) {
            log::error!("pre_update called twice in frame {}, ignored", self.frame_counter.frame_name());
            return None;
        }
        self.pre_updated_frame = Some(self.frame_counter.frame_id());

        Some(PreUpdateStats {
            buffers: self.buffers.pre_update(),
            textures: self.textures.pre_update(),
        })
    }

    pub fn begin_frame(&mut self) {
        if self.in_frame {
            log::warn!(
                "begin_frame called while frame {} is still open, ending it first",
                self.frame_counter.frame_name()
            );
            self.end_frame();
        }
        truvis_crate_tools::profile_scope!("BasicRenderSystem::begin_frame");

        self.buffers.flush_dynamic_updates();
        self.textures.flush_dynamic_updates();
        self.in_frame = true;
        log::trace!("begin frame {}", self.frame_counter.frame_name());
    }

    pub fn end_frame(&mut self) {
        if !self.in_frame {
            log::warn!("end_frame called without begin_frame, ignored");
            return;
        }
        log::trace!("end frame {}", self.frame_counter.frame_name());
        self.in_frame = false;
        self.frame_counter.next_frame();
        truvis_crate_tools::frame_mark!();
    }
}
// create
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    pub fn create_static_buffer(&mut self, kind: BasicBufferType, data: BufferData<'_>) -> GfxResult<BasicStaticBuffer> {
        self.buffers.create_static_buffer(kind, data)
    }

    pub fn create_dynamic_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        element_capacity: u32,
    ) -> GfxResult<BasicDynamicBuffer> {
        self.buffers.create_dynamic_buffer(kind, data, element_capacity)
    }

    pub fn create_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        usage: BasicBufferUsage,
    ) -> GfxResult<BasicBufferTracker> {
        self.buffers.create_buffer(kind, data, usage)
    }

    pub fn create_static_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<BasicStaticTexture> {
        self.textures.create_static_texture(desc, filter_hint, flags)
    }

    pub fn create_dynamic_texture(
        &mut self,
        desc: TextureDesc<'_>,
        filter_hint: TextureFilterHint,
        flags: TextureFlags,
    ) -> GfxResult<BasicDynamicTexture> {
        self.textures.create_dynamic_texture(desc, filter_hint, flags)
    }
}
// getters
impl<B: NativeBufferFactory, T: NativeTextureFactory> BasicRenderSystem<B, T> {
    #[inline]
    pub fn buffers(&self) -> &BasicBufferManager<B> {
        &self.buffers
    }

    #[inline]
    pub fn buffers_mut(&mut self) -> &mut BasicBufferManager<B> {
        &mut self.buffers
    }

    #[inline]
    pub fn textures(&self) -> &BasicTextureManager<T> {
        &self.textures
    }

    #[inline]
    pub fn textures_mut(&mut self) -> &mut BasicTextureManager<T> {
        &mut self.textures
    }

    #[inline]
    pub fn frame_counter(&self) -> &FrameCounter {
        &self.frame_counter
    }

    #[inline]
    pub fn config(&self) -> &RenderSystemConfig {
        &self.config
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }
}

#[cfg(test)]
mod tests {
    use truvis_gfx::headless::buffer_factory::HeadlessBufferFactory;
    use truvis_gfx::headless::texture_factory::HeadlessTextureFactory;

    use truvis_gfx::error::GfxError;

    use super::*;
    use crate::buffer_manager::BasicBuffer;

    fn render_system() -> BasicRenderSystem<HeadlessBufferFactory, HeadlessTextureFactory> {
        let config = RenderSystemConfig::default();
        let texture_factory = HeadlessTextureFactory::new(config.max_frames_in_flight as usize).unwrap();
        let mut render_system = BasicRenderSystem::new(config, HeadlessBufferFactory::new(), texture_factory).unwrap();
        render_system.create_dependent_resources().unwrap();
        render_system
    }

    #[test]
    fn test_pre_update_once_per_frame() {
        let mut render_system = render_system();
        assert!(render_system.pre_update().is_some());
        assert!(render_system.pre_update().is_none());

        render_system.begin_frame();
        assert!(render_system.pre_update().is_none());
        render_system.end_frame();

        assert!(render_system.pre_update().is_some());
        render_system.dispose();
    }

    #[test]
    fn test_frame_bracketing() {
        let mut render_system = render_system();
        render_system.end_frame();
        assert_eq!(render_system.frame_counter().frame_id(), 0);

        render_system.begin_frame();
        render_system.begin_frame();
        assert!(render_system.in_frame());
        assert_eq!(render_system.frame_counter().frame_id(), 1);

        render_system.end_frame();
        assert!(!render_system.in_frame());
        assert_eq!(render_system.frame_counter().frame_id(), 2);
        render_system.dispose();
    }

    #[test]
    fn test_begin_frame_flushes_dynamic_buffers() {
        let mut render_system = render_system();
        render_system.pre_update();
        let data = [0u32; 4];
        let mut buffer = render_system
            .create_dynamic_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4)
            .unwrap();
        buffer.set_data(0, BufferData::from_slice(&[9u32])).unwrap();

        render_system.begin_frame();
        let native = render_system.buffers().get_native_handle(buffer.handle()).unwrap();
        assert_eq!(render_system.buffers().factory().buffer(native).unwrap().write_count(), 1);
        render_system.end_frame();
        render_system.dispose();
    }

    #[test]
    fn test_device_lost_reaches_both_managers() {
        let mut render_system = render_system();
        let data = [0u16; 3];
        let _buffer = render_system
            .create_static_buffer(BasicBufferType::Index, BufferData::from_slice(&data))
            .unwrap();

        render_system.on_render_system_event(BasicRenderSystemEvent::DeviceLost);
        assert_eq!(render_system.buffers().count(), 0);
        assert!(!render_system.textures().dependent_resources().is_valid());

        render_system.create_dependent_resources().unwrap();
        assert!(render_system.buffers().dependent_resources().is_valid());
        render_system.dispose();
    }

    #[test]
    fn test_create_dependent_resources_rolls_back_buffers() {
        let mut render_system = render_system();
        // 只让 buffer 失效，texture 依然是 Valid，重新创建时 texture 一侧会失败
        render_system.buffers_mut().destroy_dependent_resources();

        let result = render_system.create_dependent_resources();
        assert!(matches!(result, Err(GfxError::Usage(_))));
        assert!(!render_system.buffers().dependent_resources().is_valid());
        assert!(render_system.textures().dependent_resources().is_valid());
        let data = [0u16; 3];
        assert!(matches!(
            render_system.create_static_buffer(BasicBufferType::Index, BufferData::from_slice(&data)),
            Err(GfxError::Usage(_))
        ));

        render_system.destroy_dependent_resources();
        render_system.create_dependent_resources().unwrap();
        assert!(
            render_system
                .create_static_buffer(BasicBufferType::Index, BufferData::from_slice(&data))
                .is_ok()
        );
        render_system.dispose();
    }
}
