use std::path::PathBuf;

use anyhow::Context;
use truvis_crate_tools::init_log::init_log_with;
use truvis_gfx::factory::{NativeBufferFactory, NativeTextureFactory};
use truvis_gfx::headless::buffer_factory::HeadlessBufferFactory;
use truvis_gfx::headless::texture_factory::HeadlessTextureFactory;
use truvis_render_interface::config::RenderSystemConfig;
use truvis_render_interface::dependent_resources::BasicRenderSystemEvent;

use crate::outer_app::{HeadlessRenderSystem, OuterApp};

pub fn panic_handler(info: &std::panic::PanicHookInfo) {
    log::error!("{}", info);
}

/// 命令行：`<app> [config.toml] [frame_count]`
pub struct AppSettings {
    pub config: RenderSystemConfig,
    pub frame_count: u64,
    /// 在这一帧开始前模拟一次 device 丢失
    pub device_lost_at: Option<u64>,
}
impl Default for AppSettings {
    fn default() -> Self {
        Self {
            config: RenderSystemConfig::default(),
            frame_count: 120,
            device_lost_at: Some(60),
        }
    }
}
impl AppSettings {
    pub fn from_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();
        if let Some(config_path) = args.next() {
            settings.config = RenderSystemConfig::from_file(PathBuf::from(config_path))?;
        }
        if let Some(frame_count) = args.next() {
            settings.frame_count = frame_count
                .parse()
                .with_context(|| format!("无效的帧数: {frame_count}"))?;
            settings.device_lost_at = Some(settings.frame_count / 2);
        }
        Ok(settings)
    }
}

/// 没有窗口的帧循环，资源都由 headless 后端创建
pub struct HeadlessApp {
    render_system: HeadlessRenderSystem,
    outer_app: Box<dyn OuterApp>,
    device_lost_at: Option<u64>,
}
// 总的 main 函数
impl HeadlessApp {
    /// 整个程序的入口
    pub fn run(outer_app: Box<dyn OuterApp>, settings: AppSettings) -> anyhow::Result<()> {
        std::panic::set_hook(Box::new(panic_handler));

        init_log_with(settings.config.log_level_filter()?);
        #[cfg(feature = "profiling")]
        truvis_crate_tools::profiling::Client::start();

        let mut app = Self::new(outer_app, &settings)?;
        for _ in 0..settings.frame_count {
            app.update()?;
        }
        log::info!("end run.");

        app.destroy();
        Ok(())
    }
}
// new & init
impl HeadlessApp {
    fn new(mut outer_app: Box<dyn OuterApp>, settings: &AppSettings) -> anyhow::Result<Self> {
        let max_frames_in_flight = settings.config.max_frames_in_flight;
        let texture_factory =
            HeadlessTextureFactory::new(max_frames_in_flight as usize).context("创建 texture 工厂失败")?;
        let mut render_system =
            HeadlessRenderSystem::new(settings.config.clone(), HeadlessBufferFactory::new(), texture_factory)
                .context("创建 render system 失败")?;

        render_system.create_dependent_resources()?;
        outer_app.init(&mut render_system).context("初始化 app 失败")?;

        Ok(Self {
            render_system,
            outer_app,
            device_lost_at: settings.device_lost_at,
        })
    }
}
// update
impl HeadlessApp {
    fn update(&mut self) -> anyhow::Result<()> {
        let frame_id = self.render_system.frame_counter().frame_id();
        if self.device_lost_at == Some(frame_id) {
            self.on_device_lost()?;
        }

        self.render_system.pre_update();
        self.outer_app
            .update(&mut self.render_system, frame_id)
            .with_context(|| format!("更新第 {frame_id} 帧失败"))?;

        self.render_system.begin_frame();
        self.outer_app.draw(&self.render_system);
        self.render_system.end_frame();
        Ok(())
    }

    fn on_device_lost(&mut self) -> anyhow::Result<()> {
        log::warn!("simulating device lost at {}", self.render_system.frame_counter().frame_name());
        self.render_system.on_render_system_event(BasicRenderSystemEvent::DeviceLost);
        self.outer_app.on_device_lost();

        self.render_system.create_dependent_resources()?;
        self.outer_app.init(&mut self.render_system).context("device 丢失后重建资源失败")?;
        Ok(())
    }
}
// destroy
impl HeadlessApp {
    fn destroy(self) {
        let Self {
            render_system,
            mut outer_app,
            ..
        } = self;
        outer_app.shutdown();

        let buffer_factory = render_system.buffers().factory();
        let texture_factory = render_system.textures().factory();
        log::info!(
            "buffers: {} created, {} destroyed, {} live; textures: {} live, {} descriptor sets",
            buffer_factory.created_count(),
            buffer_factory.destroyed_count(),
            buffer_factory.live_buffer_count(),
            texture_factory.live_texture_count(),
            texture_factory.descriptor_sets().map_or(0, |sets| sets.allocated_count()),
        );
        render_system.dispose();
    }
}
