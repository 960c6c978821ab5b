use crate::basic::handle_table::HandleTable;
use crate::error::{GfxError, GfxResult};
use crate::factory::NativeBufferFactory;
use crate::resources::buffer::{BasicBufferType, BufferCaps, BufferData};
use crate::resources::handles::NativeBufferHandle;

/// 位于主存中的 buffer
pub struct HostBuffer {
    kind: BasicBufferType,
    is_dynamic: bool,
    element_stride: u32,
    element_capacity: u32,
    bytes: Vec<u8>,
    write_count: u32,
}
// getters
impl HostBuffer {
    #[inline]
    pub fn kind(&self) -> BasicBufferType {
        self.kind
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    #[inline]
    pub fn element_stride(&self) -> u32 {
        self.element_stride
    }

    #[inline]
    pub fn element_capacity(&self) -> u32 {
        self.element_capacity
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 创建之后 `set_buffer_data` 成功写入的次数
    #[inline]
    pub fn write_count(&self) -> u32 {
        self.write_count
    }
}

/// 单个 buffer 默认允许的最大字节数
pub const DEFAULT_MAX_BUFFER_BYTES: u64 = 256 * 1024 * 1024;

/// 在主存中模拟 Native Buffer 的工厂
///
/// 不依赖任何图形 API，用于测试以及 headless 的 demo。
pub struct HeadlessBufferFactory {
    caps: BufferCaps,
    /// 超过这个大小的 buffer 返回 `NotSupported`，而不是在分配时 abort
    max_buffer_bytes: u64,
    buffers: HandleTable<NativeBufferHandle, HostBuffer>,
    created_count: usize,
    destroyed_count: usize,
    disposed: bool,
}
impl Default for HeadlessBufferFactory {
    fn default() -> Self {
        Self::new()
    }
}
// new & init
impl HeadlessBufferFactory {
    /// 支持所有能力
    pub fn new() -> Self {
        Self::with_caps(BufferCaps::all())
    }

    pub fn with_caps(caps: BufferCaps) -> Self {
        Self {
            caps,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            buffers: HandleTable::new(),
            created_count: 0,
            destroyed_count: 0,
            disposed: false,
        }
    }

    pub fn with_max_buffer_bytes(mut self, max_buffer_bytes: u64) -> Self {
        self.max_buffer_bytes = max_buffer_bytes;
        self
    }
}
// getters
impl HeadlessBufferFactory {
    #[inline]
    pub fn buffer(&self, handle: NativeBufferHandle) -> Option<&HostBuffer> {
        self.buffers.try_get(handle)
    }

    /// 累计创建的 buffer 数量
    #[inline]
    pub fn created_count(&self) -> usize {
        self.created_count
    }

    /// 累计销毁的 buffer 数量，包括 dispose 时强制释放的
    #[inline]
    pub fn destroyed_count(&self) -> usize {
        self.destroyed_count
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[inline]
    pub fn max_buffer_bytes(&self) -> u64 {
        self.max_buffer_bytes
    }
}
impl NativeBufferFactory for HeadlessBufferFactory {
    fn buffer_caps(&self) -> BufferCaps {
        self.caps
    }

    fn create_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        element_capacity: u32,
        is_dynamic: bool,
    ) -> GfxResult<NativeBufferHandle> {
        if self.disposed {
            return Err(GfxError::usage("create_buffer called after the factory was disposed"));
        }
        if is_dynamic && !self.caps.contains(BufferCaps::DYNAMIC_BUFFERS) {
            return Err(GfxError::not_supported("dynamic buffers"));
        }
        if data.element_count() > element_capacity {
            return Err(GfxError::not_supported(format!(
                "buffer data ({} elements) does not fit within capacity {}",
                data.element_count(),
                element_capacity
            )));
        }

        let stride = data.element_stride();
        let size = element_capacity as u64 * stride as u64;
        if size > self.max_buffer_bytes {
            return Err(GfxError::not_supported(format!(
                "buffer of {size} bytes exceeds the limit of {} bytes",
                self.max_buffer_bytes
            )));
        }
        let mut bytes = vec![0u8; size as usize];
        bytes[..data.bytes().len()].copy_from_slice(data.bytes());

        let handle = self.buffers.add(HostBuffer {
            kind,
            is_dynamic,
            element_stride: stride,
            element_capacity,
            bytes,
            write_count: 0,
        });
        self.created_count += 1;
        log::trace!("headless buffer created: {handle:?}, {kind:?}, capacity {element_capacity}");
        Ok(handle)
    }

    fn destroy_buffer(&mut self, handle: NativeBufferHandle) -> bool {
        if self.buffers.remove_entry(handle) {
            self.destroyed_count += 1;
            log::trace!("headless buffer destroyed: {handle:?}");
            true
        } else {
            log::warn!("destroy_buffer: unknown handle {handle:?}");
            false
        }
    }

    fn set_buffer_data(&mut self, handle: NativeBufferHandle, dst_index: u32, data: BufferData<'_>) -> GfxResult<()> {
        if self.disposed {
            return Err(GfxError::usage("set_buffer_data called after the factory was disposed"));
        }
        if dst_index > 0 && !self.caps.contains(BufferCaps::SUB_RANGE_UPDATE) {
            return Err(GfxError::not_supported("sub range buffer update"));
        }

        let buffer = self.buffers.get_mut(handle)?;
        if data.element_stride() != buffer.element_stride {
            return Err(GfxError::usage(format!(
                "element stride mismatch, buffer uses {} but data uses {}",
                buffer.element_stride,
                data.element_stride()
            )));
        }
        let end = dst_index as u64 + data.element_count() as u64;
        if end > buffer.element_capacity as u64 {
            return Err(GfxError::not_supported(format!(
                "write [{dst_index}, {end}) exceeds buffer capacity {}",
                buffer.element_capacity
            )));
        }

        let offset = dst_index as usize * buffer.element_stride as usize;
        buffer.bytes[offset..offset + data.bytes().len()].copy_from_slice(data.bytes());
        buffer.write_count += 1;
        Ok(())
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        truvis_crate_tools::profile_scope!("HeadlessBufferFactory::dispose");

        let leftover = self.buffers.count();
        if leftover > 0 {
            log::warn!("HeadlessBufferFactory disposed with {leftover} live buffers, force freeing them");
        }
        self.destroyed_count += leftover;
        self.buffers.clear();
        self.disposed = true;
    }

    fn live_buffer_count(&self) -> usize {
        self.buffers.count()
    }
}
impl Drop for HeadlessBufferFactory {
    fn drop(&mut self) {
        log::info!("Dropping HeadlessBufferFactory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_copies_data_and_pads_capacity() {
        let mut factory = HeadlessBufferFactory::new();
        let indices: [u16; 3] = [0, 1, 2];
        let handle = factory
            .create_buffer(BasicBufferType::Index, BufferData::from_slice(&indices), 5, true)
            .unwrap();

        let buffer = factory.buffer(handle).unwrap();
        assert_eq!(buffer.element_capacity(), 5);
        assert_eq!(buffer.bytes().len(), 10);
        assert_eq!(&buffer.bytes()[..6], bytemuck::cast_slice::<u16, u8>(&indices));
        assert_eq!(factory.live_buffer_count(), 1);
    }

    #[test]
    fn test_capacity_violation() {
        let mut factory = HeadlessBufferFactory::new();
        let data = [0u32; 10];
        let result = factory.create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 5, true);
        assert!(matches!(result, Err(GfxError::NotSupported(_))));
        assert_eq!(factory.live_buffer_count(), 0);
    }

    #[test]
    fn test_oversized_buffer_is_not_supported() {
        let mut factory = HeadlessBufferFactory::new();
        let data = [[0u32; 4]; 1];
        let result = factory.create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), u32::MAX, true);
        assert!(matches!(result, Err(GfxError::NotSupported(_))));
        assert_eq!(factory.live_buffer_count(), 0);
        assert_eq!(factory.created_count(), 0);

        let mut factory = HeadlessBufferFactory::new().with_max_buffer_bytes(64);
        assert!(
            factory
                .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4, true)
                .is_ok()
        );
        assert!(matches!(
            factory.create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 5, true),
            Err(GfxError::NotSupported(_))
        ));
    }

    #[test]
    fn test_create_after_dispose_is_usage_error() {
        let mut factory = HeadlessBufferFactory::new();
        factory.dispose();
        let data = [0u32; 1];
        let result = factory.create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 1, false);
        assert!(matches!(result, Err(GfxError::Usage(_))));
    }

    #[test]
    fn test_dispose_is_idempotent_and_frees_leftovers() {
        let mut factory = HeadlessBufferFactory::new();
        let data = [1u32; 4];
        factory
            .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4, false)
            .unwrap();
        factory
            .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4, false)
            .unwrap();

        factory.dispose();
        factory.dispose();
        assert_eq!(factory.live_buffer_count(), 0);
        assert_eq!(factory.destroyed_count(), 2);
    }

    #[test]
    fn test_sub_range_update() {
        let mut factory = HeadlessBufferFactory::new();
        let data = [0u32; 4];
        let handle = factory
            .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4, true)
            .unwrap();

        factory.set_buffer_data(handle, 2, BufferData::from_slice(&[7u32, 8])).unwrap();
        let bytes = factory.buffer(handle).unwrap().bytes();
        assert_eq!(bytes, bytemuck::cast_slice::<u32, u8>(&[0, 0, 7, 8]));

        let overflow = factory.set_buffer_data(handle, 3, BufferData::from_slice(&[1u32, 2]));
        assert!(matches!(overflow, Err(GfxError::NotSupported(_))));
        assert_eq!(factory.buffer(handle).unwrap().write_count(), 1);
    }

    #[test]
    fn test_sub_range_update_requires_cap() {
        let mut factory = HeadlessBufferFactory::with_caps(BufferCaps::DYNAMIC_BUFFERS);
        let data = [0u32; 4];
        let handle = factory
            .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 4, true)
            .unwrap();

        assert!(factory.set_buffer_data(handle, 0, BufferData::from_slice(&[1u32])).is_ok());
        assert!(matches!(
            factory.set_buffer_data(handle, 1, BufferData::from_slice(&[1u32])),
            Err(GfxError::NotSupported(_))
        ));
    }

    #[test]
    fn test_unknown_handle() {
        let mut factory = HeadlessBufferFactory::new();
        let data = [0u32; 1];
        let handle = factory
            .create_buffer(BasicBufferType::Vertex, BufferData::from_slice(&data), 1, true)
            .unwrap();
        assert!(factory.destroy_buffer(handle));
        assert!(!factory.destroy_buffer(handle));
        assert!(matches!(
            factory.set_buffer_data(handle, 0, BufferData::from_slice(&data)),
            Err(GfxError::InvalidHandle(_))
        ));
    }
}
