#![allow(dead_code)]

use truvis_gfx::error::GfxResult;
use truvis_gfx::factory::NativeBufferFactory;
use truvis_gfx::headless::buffer_factory::HeadlessBufferFactory;
use truvis_gfx::resources::buffer::{BasicBufferType, BufferCaps, BufferData};
use truvis_gfx::resources::handles::NativeBufferHandle;
use truvis_render_interface::buffer_manager::BasicBufferManager;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactoryCall {
    Create(NativeBufferHandle),
    Destroy(NativeBufferHandle),
    SetData { handle: NativeBufferHandle, dst_index: u32 },
    Dispose,
}

/// 记录所有调用的 buffer 工厂，真正的工作交给 headless 工厂
pub struct RecordingBufferFactory {
    inner: HeadlessBufferFactory,
    calls: Vec<FactoryCall>,
}
impl RecordingBufferFactory {
    pub fn new() -> Self {
        Self {
            inner: HeadlessBufferFactory::new(),
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[FactoryCall] {
        &self.calls
    }

    pub fn destroyed(&self) -> Vec<NativeBufferHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                FactoryCall::Destroy(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn is_live(&self, handle: NativeBufferHandle) -> bool {
        self.inner.buffer(handle).is_some()
    }

    pub fn inner(&self) -> &HeadlessBufferFactory {
        &self.inner
    }
}
impl NativeBufferFactory for RecordingBufferFactory {
    fn buffer_caps(&self) -> BufferCaps {
        self.inner.buffer_caps()
    }

    fn create_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        element_capacity: u32,
        is_dynamic: bool,
    ) -> GfxResult<NativeBufferHandle> {
        let handle = self.inner.create_buffer(kind, data, element_capacity, is_dynamic)?;
        self.calls.push(FactoryCall::Create(handle));
        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: NativeBufferHandle) -> bool {
        self.calls.push(FactoryCall::Destroy(handle));
        self.inner.destroy_buffer(handle)
    }

    fn set_buffer_data(&mut self, handle: NativeBufferHandle, dst_index: u32, data: BufferData<'_>) -> GfxResult<()> {
        self.calls.push(FactoryCall::SetData { handle, dst_index });
        self.inner.set_buffer_data(handle, dst_index, data)
    }

    fn dispose(&mut self) {
        self.calls.push(FactoryCall::Dispose);
        self.inner.dispose()
    }

    fn live_buffer_count(&self) -> usize {
        self.inner.live_buffer_count()
    }
}

pub fn recording_manager(max_frames_in_flight: u32) -> BasicBufferManager<RecordingBufferFactory> {
    truvis_crate_tools::init_log::init_test_log();
    let mut manager = BasicBufferManager::new(max_frames_in_flight, RecordingBufferFactory::new()).unwrap();
    manager.create_dependent_resources().unwrap();
    manager
}

pub const TRIANGLE_INDICES: [u16; 3] = [0, 1, 2];
