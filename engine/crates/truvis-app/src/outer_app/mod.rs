use truvis_gfx::error::GfxResult;
use truvis_gfx::headless::buffer_factory::HeadlessBufferFactory;
use truvis_gfx::headless::texture_factory::HeadlessTextureFactory;
use truvis_render_interface::render_system::BasicRenderSystem;

pub type HeadlessRenderSystem = BasicRenderSystem<HeadlessBufferFactory, HeadlessTextureFactory>;

/// 外部应用接口 trait
///
/// 定义应用生命周期的关键钩子函数。所有自定义应用需实现此 trait。
///
/// # 开发模式
/// ```ignore
/// struct MyApp { mesh: Option<BasicStaticBuffer> }
///
/// impl OuterApp for MyApp {
///     fn init(&mut self, render_system: &mut HeadlessRenderSystem) -> GfxResult<()> {
///         self.mesh = Some(render_system.create_static_buffer(BasicBufferType::Vertex, BufferData::from_slice(&VERTICES))?);
///         Ok(())
///     }
/// }
///
/// fn main() {
///     HeadlessApp::run(Box::new(MyApp::default()));
/// }
/// ```
pub trait OuterApp {
    /// dependent resources 创建之后调用，device 丢失重建之后会再次调用
    fn init(&mut self, _render_system: &mut HeadlessRenderSystem) -> GfxResult<()> {
        Ok(())
    }

    /// 每帧更新逻辑，发生在 `pre_update` 之后、`begin_frame` 之前，可以创建资源
    fn update(&mut self, _render_system: &mut HeadlessRenderSystem, _frame_id: u64) -> GfxResult<()> {
        Ok(())
    }

    /// 渲染主逻辑，发生在 `begin_frame` 与 `end_frame` 之间
    fn draw(&self, _render_system: &HeadlessRenderSystem) {}

    /// device 丢失，所有 tracker 都已经失效，需要丢弃
    fn on_device_lost(&mut self) {}

    /// 退出前释放所有 tracker
    fn shutdown(&mut self) {}
}
