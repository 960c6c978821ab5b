use std::collections::VecDeque;

use truvis_app::app::{AppSettings, HeadlessApp};
use truvis_app::outer_app::{HeadlessRenderSystem, OuterApp};
use truvis_gfx::error::GfxResult;
use truvis_gfx::resources::buffer::{BasicBufferType, BufferData};
use truvis_gfx::resources::texture::{Extent2D, PixelFormat, TextureDesc, TextureFilterHint, TextureFlags};
use truvis_render_interface::buffer_manager::{BasicBuffer, BasicDynamicBuffer, BasicStaticBuffer};
use truvis_render_interface::texture_manager::{BasicDynamicTexture, BasicStaticTexture, BasicTexture};

#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Vertex {
    pos: [f32; 3],
    color: [f32; 4],
}

const QUAD_VERTICES: [Vertex; 4] = [
    Vertex { pos: [-0.5, -0.5, 0.0], color: [1.0, 0.0, 0.0, 1.0] },
    Vertex { pos: [0.5, -0.5, 0.0], color: [0.0, 1.0, 0.0, 1.0] },
    Vertex { pos: [0.5, 0.5, 0.0], color: [0.0, 0.0, 1.0, 1.0] },
    Vertex { pos: [-0.5, 0.5, 0.0], color: [1.0, 1.0, 1.0, 1.0] },
];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

const PARTICLE_CAPACITY: u32 = 256;
const ATLAS_EXTENT: Extent2D = Extent2D::new(16, 16);
/// 每帧创建的临时 buffer 保留多少帧
const TRANSIENT_LIFETIME: usize = 4;

/// 每帧都会创建、更新、丢弃资源，用来观察延迟销毁
#[derive(Default)]
struct ResourceChurn {
    quad_vertices: Option<BasicStaticBuffer>,
    quad_indices: Option<BasicStaticBuffer>,
    particles: Option<BasicDynamicBuffer>,
    atlas: Option<BasicStaticTexture>,
    noise: Option<BasicDynamicTexture>,

    transient: VecDeque<BasicStaticBuffer>,
}
impl ResourceChurn {
    fn noise_pixels(seed: u64) -> Vec<u8> {
        (0..ATLAS_EXTENT.texel_count() as u64)
            .map(|i| (i.wrapping_mul(2654435761).wrapping_add(seed.wrapping_mul(97)) >> 3) as u8)
            .collect()
    }

    fn release_all(&mut self) {
        self.quad_vertices = None;
        self.quad_indices = None;
        self.particles = None;
        self.atlas = None;
        self.noise = None;
        self.transient.clear();
    }
}
impl OuterApp for ResourceChurn {
    fn init(&mut self, render_system: &mut HeadlessRenderSystem) -> GfxResult<()> {
        log::info!("resource churn init.");

        self.quad_vertices =
            Some(render_system.create_static_buffer(BasicBufferType::Vertex, BufferData::from_slice(&QUAD_VERTICES))?);
        self.quad_indices =
            Some(render_system.create_static_buffer(BasicBufferType::Index, BufferData::from_slice(&QUAD_INDICES))?);
        self.particles = Some(render_system.create_dynamic_buffer(
            BasicBufferType::Vertex,
            BufferData::from_slice(&QUAD_VERTICES),
            PARTICLE_CAPACITY,
        )?);

        let atlas_pixels = vec![255u8; ATLAS_EXTENT.texel_count() * 4];
        self.atlas = Some(render_system.create_static_texture(
            TextureDesc::new(ATLAS_EXTENT, PixelFormat::R8G8B8A8Srgb, &atlas_pixels)?,
            TextureFilterHint::Smooth,
            TextureFlags::GENERATE_MIPMAPS,
        )?);
        let noise_pixels = Self::noise_pixels(0);
        self.noise = Some(render_system.create_dynamic_texture(
            TextureDesc::new(ATLAS_EXTENT, PixelFormat::R8Unorm, &noise_pixels)?,
            TextureFilterHint::Nearest,
            TextureFlags::empty(),
        )?);
        Ok(())
    }

    fn update(&mut self, render_system: &mut HeadlessRenderSystem, frame_id: u64) -> GfxResult<()> {
        // 每帧一个临时 buffer，超过保留帧数后丢弃 tracker
        let offset = frame_id as f32 * 0.01;
        let moved = QUAD_VERTICES.map(|v| Vertex {
            pos: [v.pos[0] + offset, v.pos[1], v.pos[2]],
            color: v.color,
        });
        self.transient
            .push_back(render_system.create_static_buffer(BasicBufferType::Vertex, BufferData::from_slice(&moved))?);
        while self.transient.len() > TRANSIENT_LIFETIME {
            self.transient.pop_front();
        }

        if let Some(particles) = self.particles.as_mut() {
            let count = (frame_id % (PARTICLE_CAPACITY as u64 / 4)) as u32 * 4;
            particles.set_data(count, BufferData::from_slice(&moved))?;
        }
        if let Some(noise) = self.noise.as_mut() {
            let pixels = Self::noise_pixels(frame_id);
            noise.set_data(
                TextureDesc::new(ATLAS_EXTENT, PixelFormat::R8Unorm, &pixels)?,
                TextureFilterHint::Nearest,
                TextureFlags::empty(),
            )?;
        }
        Ok(())
    }

    fn draw(&self, render_system: &HeadlessRenderSystem) {
        if let (Some(vertices), Some(indices), Some(atlas), Some(noise)) =
            (&self.quad_vertices, &self.quad_indices, &self.atlas, &self.noise)
        {
            log::trace!(
                "draw quad: vb {:?}, ib {:?}, atlas {:?}, noise {:?}",
                render_system.buffers().try_get_native_handle(vertices.handle()),
                render_system.buffers().try_get_native_handle(indices.handle()),
                render_system.textures().try_get_native_handle(atlas.handle()),
                render_system.textures().try_get_native_handle(noise.handle()),
            );
        }
        if render_system.frame_counter().frame_id() % 30 == 0 {
            log::info!(
                "{} buffers: {} records, textures: {} records",
                render_system.frame_counter().frame_name(),
                render_system.buffers().count(),
                render_system.textures().count()
            );
        }
    }

    fn on_device_lost(&mut self) {
        self.release_all();
    }

    fn shutdown(&mut self) {
        self.release_all();
    }
}

fn main() -> anyhow::Result<()> {
    let settings = AppSettings::from_args(std::env::args().skip(1))?;
    HeadlessApp::run(Box::new(ResourceChurn::default()), settings)
}
