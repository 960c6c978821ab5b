use std::cell::{Cell, RefCell};
use std::rc::Rc;

use truvis_gfx::error::{GfxError, GfxResult};
use truvis_gfx::factory::NativeBufferFactory;
use truvis_gfx::resources::buffer::{BasicBufferType, BasicBufferUsage, BufferCaps, BufferData, OwnedBufferData};
use truvis_gfx::resources::handles::NativeBufferHandle;

use crate::deferred_records::{DeferredRecords, GcStats, RecordReclaimer};
use crate::dependent_resources::{BasicRenderSystemEvent, DependentResources};
use crate::handles::BasicBufferHandle;
use crate::liveness::LivenessToken;

struct PendingWrite {
    dst_index: u32,
    data: OwnedBufferData,
}

/// dynamic buffer 的 tracker 与管理器之间共享的通道
///
/// tracker 通过 `set_data` 写入，管理器在 `flush_dynamic_updates` 时提交给工厂。
/// Native 资源被强制释放后 `native` 为 None，之后的写入都会返回 `Usage` 错误。
pub struct DynamicBufferLink {
    native: Cell<Option<NativeBufferHandle>>,
    element_capacity: u32,
    element_stride: u32,
    sub_range_update: bool,
    pending: RefCell<Vec<PendingWrite>>,
}
impl DynamicBufferLink {
    fn new(native: NativeBufferHandle, element_capacity: u32, element_stride: u32, sub_range_update: bool) -> Self {
        Self {
            native: Cell::new(Some(native)),
            element_capacity,
            element_stride,
            sub_range_update,
            pending: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, dst_index: u32, data: BufferData<'_>) -> GfxResult<()> {
        if self.native.get().is_none() {
            return Err(GfxError::usage("set_data on a dynamic buffer whose native resource was force freed"));
        }
        if data.element_stride() != self.element_stride {
            return Err(GfxError::usage(format!(
                "element stride mismatch, buffer uses {} but data uses {}",
                self.element_stride,
                data.element_stride()
            )));
        }
        if dst_index > 0 && !self.sub_range_update {
            return Err(GfxError::not_supported("sub range buffer update"));
        }
        if dst_index as u64 + data.element_count() as u64 > self.element_capacity as u64 {
            return Err(GfxError::not_supported("bufferData does not fit within bufferElementCapacity"));
        }

        self.pending.borrow_mut().push(PendingWrite {
            dst_index,
            data: data.to_owned_data(),
        });
        Ok(())
    }

    /// 按写入顺序提交给工厂，返回成功提交的数量
    fn drain_into(&self, factory: &mut impl NativeBufferFactory) -> usize {
        let writes = std::mem::take(&mut *self.pending.borrow_mut());
        let Some(native) = self.native.get() else {
            return 0;
        };

        let mut applied = 0;
        for write in writes {
            match factory.set_buffer_data(native, write.dst_index, write.data.as_data()) {
                Ok(()) => applied += 1,
                Err(e) => log::error!("failed to update dynamic buffer {native:?}: {e}"),
            }
        }
        applied
    }

    fn invalidate(&self) {
        self.native.set(None);
        self.pending.borrow_mut().clear();
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.native.get().is_some()
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

/// buffer tracker 的公共接口
pub trait BasicBuffer {
    fn handle(&self) -> BasicBufferHandle;
    fn kind(&self) -> BasicBufferType;
    fn usage(&self) -> BasicBufferUsage;
    fn element_capacity(&self) -> u32;
}

/// static buffer 的 tracker，drop 之后资源进入延迟销毁
pub struct BasicStaticBuffer {
    handle: BasicBufferHandle,
    kind: BasicBufferType,
    element_count: u32,
    _token: LivenessToken,
}
impl BasicBuffer for BasicStaticBuffer {
    fn handle(&self) -> BasicBufferHandle {
        self.handle
    }

    fn kind(&self) -> BasicBufferType {
        self.kind
    }

    fn usage(&self) -> BasicBufferUsage {
        BasicBufferUsage::Static
    }

    fn element_capacity(&self) -> u32 {
        self.element_count
    }
}

/// dynamic buffer 的 tracker
pub struct BasicDynamicBuffer {
    handle: BasicBufferHandle,
    kind: BasicBufferType,
    link: Rc<DynamicBufferLink>,
    _token: LivenessToken,
}
impl BasicDynamicBuffer {
    /// 从第 `dst_index` 个元素开始写入 `data`，在下一次 flush 时生效
    pub fn set_data(&mut self, dst_index: u32, data: BufferData<'_>) -> GfxResult<()> {
        self.link.push(dst_index, data)
    }

    #[inline]
    pub fn link(&self) -> &DynamicBufferLink {
        &self.link
    }
}
impl BasicBuffer for BasicDynamicBuffer {
    fn handle(&self) -> BasicBufferHandle {
        self.handle
    }

    fn kind(&self) -> BasicBufferType {
        self.kind
    }

    fn usage(&self) -> BasicBufferUsage {
        BasicBufferUsage::Dynamic
    }

    fn element_capacity(&self) -> u32 {
        self.link.element_capacity
    }
}

/// 由 `create_buffer` 返回，按 usage 区分
pub enum BasicBufferTracker {
    Static(BasicStaticBuffer),
    Dynamic(BasicDynamicBuffer),
}
impl BasicBufferTracker {
    #[inline]
    pub fn as_buffer(&self) -> &dyn BasicBuffer {
        match self {
            BasicBufferTracker::Static(buffer) => buffer,
            BasicBufferTracker::Dynamic(buffer) => buffer,
        }
    }
}

pub struct BufferRecord {
    kind: BasicBufferType,
    native: NativeBufferHandle,
    /// 只有 dynamic buffer 有，Condemned 之后释放
    link: Option<Rc<DynamicBufferLink>>,
}
impl BufferRecord {
    #[inline]
    pub fn kind(&self) -> BasicBufferType {
        self.kind
    }

    #[inline]
    pub fn native(&self) -> NativeBufferHandle {
        self.native
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.link.is_some()
    }
}

struct BufferReclaimer<'a, F: NativeBufferFactory> {
    factory: &'a mut F,
}
impl<F: NativeBufferFactory> RecordReclaimer<BasicBufferHandle, BufferRecord> for BufferReclaimer<'_, F> {
    fn on_condemn(&mut self, _key: BasicBufferHandle, record: &mut BufferRecord) {
        // 最后一次提交 tracker 死亡前留下的写入，然后释放 link
        if let Some(link) = record.link.take() {
            link.drain_into(&mut *self.factory);
        }
    }

    fn destroy(&mut self, key: BasicBufferHandle, record: BufferRecord) -> bool {
        if let Some(link) = record.link {
            link.invalidate();
        }
        log::debug!("destroy buffer {key:?} -> {:?}", record.native);
        self.factory.destroy_buffer(record.native)
    }
}

/// Buffer 资源管理器
///
/// 为调用者创建 static/dynamic buffer，并在 tracker 被 drop 之后延迟 `max_frames_in_flight` 帧再销毁 Native 资源，
/// 保证 GPU 上仍在使用这些资源的帧执行完毕。
///
/// # 每帧的调用顺序
/// ```ignore
/// manager.pre_update();              // GC
/// let vb = manager.create_static_buffer(BasicBufferType::Vertex, BufferData::from_slice(&vertices))?;
/// manager.flush_dynamic_updates();   // begin frame
/// ```
pub struct BasicBufferManager<F: NativeBufferFactory> {
    max_frames_in_flight: u32,
    factory: F,
    records: DeferredRecords<BasicBufferHandle, BufferRecord>,
    dependent_resources: DependentResources,

    destroyed: bool,
}
// new & init
impl<F: NativeBufferFactory> BasicBufferManager<F> {
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
impl<F: NativeBufferFactory> BasicBufferManager<F> {
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }
        self.force_free_all_buffers();
        self.dependent_resources = DependentResources::Invalid;
        self.factory.dispose();
        self.destroyed = true;
        log::info!("BasicBufferManager destroyed");
    }
}
impl<F: NativeBufferFactory> Drop for BasicBufferManager<F> {
    fn drop(&mut self) {
        if !self.destroyed {
            if !self.records.is_empty() {
                log::warn!("BasicBufferManager dropped with {} records, force freeing them", self.records.count());
            }
            self.destroy_mut();
        }
    }
}
// dependent resources
impl<F: NativeBufferFactory> BasicBufferManager<F> {
    pub fn create_dependent_resources(&mut self) -> GfxResult<()> {
        if self.dependent_resources.is_valid() {
            return Err(GfxError::usage("dependent resources already created"));
        }
        // 此时没有正在渲染的帧，过期的 record 可以立即回收
        self.collect_garbage(0);
        self.dependent_resources = DependentResources::Valid;
        log::info!("BasicBufferManager: dependent resources created");
        Ok(())
    }

    pub fn destroy_dependent_resources(&mut self) {
        if !self.dependent_resources.is_valid() {
            return;
        }
        self.force_free_all_buffers();
        self.dependent_resources = DependentResources::Invalid;
        log::info!("BasicBufferManager: dependent resources destroyed");
    }

    pub fn on_render_system_event(&mut self, event: BasicRenderSystemEvent) {
        match event {
            BasicRenderSystemEvent::DeviceLost => {
                log::warn!("BasicBufferManager: device lost, all buffers are force freed");
                self.destroy_dependent_resources();
            }
            BasicRenderSystemEvent::Resized { width, height } => {
                log::debug!("BasicBufferManager: resized to {width}x{height}, nothing to rebuild");
            }
        }
    }

    /// 无视 defer count，立即销毁所有 Native buffer，并使所有 link 失效
    pub fn force_free_all_buffers(&mut self) -> usize {
        truvis_crate_tools::profile_scope!("BasicBufferManager::force_free_all_buffers");
        let freed = self.records.force_free_all(&mut BufferReclaimer {
            factory: &mut self.factory,
        });
        if freed > 0 {
            log::info!("BasicBufferManager: force freed {freed} buffers");
        }
        freed
    }

    fn ensure_valid(&self, op: &str) -> GfxResult<()> {
        if !self.dependent_resources.is_valid() {
            return Err(GfxError::usage(format!("{op} called while dependent resources are invalid")));
        }
        Ok(())
    }
}
// create
impl<F: NativeBufferFactory> BasicBufferManager<F> {
    /// 创建一个大小正好容纳 `data` 的 static buffer
    pub fn create_static_buffer(&mut self, kind: BasicBufferType, data: BufferData<'_>) -> GfxResult<BasicStaticBuffer> {
        self.ensure_valid("create_static_buffer")?;

        let element_count = data.element_count();
        let native = self.factory.create_buffer(kind, data, element_count, false)?;
        let token = LivenessToken::new();
        let handle = self.records.insert(
            BufferRecord {
                kind,
                native,
                link: None,
            },
            token.watch(),
        );
        log::debug!("static buffer created: {handle:?} -> {native:?}, {kind:?} x{element_count}");

        Ok(BasicStaticBuffer {
            handle,
            kind,
            element_count,
            _token: token,
        })
    }

    /// 创建一个容量为 `element_capacity` 的 dynamic buffer，并写入初始数据
    pub fn create_dynamic_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        element_capacity: u32,
    ) -> GfxResult<BasicDynamicBuffer> {
        self.ensure_valid("create_dynamic_buffer")?;

        let caps = self.factory.buffer_caps();
        if !caps.contains(BufferCaps::DYNAMIC_BUFFERS) {
            return Err(GfxError::not_supported("dynamic buffers"));
        }
        if data.element_count() > element_capacity {
            return Err(GfxError::not_supported("bufferData does not fit within bufferElementCapacity"));
        }

        let native = self.factory.create_buffer(kind, data, element_capacity, true)?;
        let link = Rc::new(DynamicBufferLink::new(
            native,
            element_capacity,
            data.element_stride(),
            caps.contains(BufferCaps::SUB_RANGE_UPDATE),
        ));
        let token = LivenessToken::new();
        let handle = self.records.insert(
            BufferRecord {
                kind,
                native,
                link: Some(link.clone()),
            },
            token.watch(),
        );
        log::debug!("dynamic buffer created: {handle:?} -> {native:?}, {kind:?} capacity {element_capacity}");

        Ok(BasicDynamicBuffer {
            handle,
            kind,
            link,
            _token: token,
        })
    }

    /// 容量等于 `data` 元素数量的 dynamic buffer
    pub fn create_dynamic_buffer_from(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
    ) -> GfxResult<BasicDynamicBuffer> {
        self.create_dynamic_buffer(kind, data, data.element_count())
    }

    pub fn create_buffer(
        &mut self,
        kind: BasicBufferType,
        data: BufferData<'_>,
        usage: BasicBufferUsage,
    ) -> GfxResult<BasicBufferTracker> {
        match usage {
            BasicBufferUsage::Static => self.create_static_buffer(kind, data).map(BasicBufferTracker::Static),
            BasicBufferUsage::Dynamic => self.create_dynamic_buffer_from(kind, data).map(BasicBufferTracker::Dynamic),
        }
    }
}
// update
impl<F: NativeBufferFactory> BasicBufferManager<F> {
    /// 把所有 dynamic buffer 的待写入数据提交给工厂
    ///
    /// 提交失败只记录日志
    pub fn flush_dynamic_updates(&mut self) -> usize {
        let mut applied = 0;
        for (_, record) in self.records.iter() {
            if let Some(link) = &record.payload().link {
                applied += link.drain_into(&mut self.factory);
            }
        }
        applied
    }

    /// # Phase: Before Render
    ///
    /// 每帧渲染之前调用一次，执行 GC
    pub fn pre_update(&mut self) -> GcStats {
        truvis_crate_tools::profile_scope!("BasicBufferManager::pre_update");

        self.flush_dynamic_updates();
        let defer_count = if self.dependent_resources.is_valid() {
            self.max_frames_in_flight
        } else {
            0
        };
        self.collect_garbage(defer_count)
    }

    fn collect_garbage(&mut self, defer_count: u32) -> GcStats {
        truvis_crate_tools::profile_scope!("BasicBufferManager::collect_garbage");
        let stats = self.records.collect_garbage(
            defer_count,
            &mut BufferReclaimer {
                factory: &mut self.factory,
            },
        );
        if !stats.is_empty() {
            log::debug!(
                "buffer gc: {} condemned, {} destroyed, {} remaining",
                stats.condemned,
                stats.destroyed,
                self.records.count()
            );
        }
        stats
    }
}
// getters
impl<F: NativeBufferFactory> BasicBufferManager<F> {
    /// 当前 record 的数量，包括 Condemned 但尚未销毁的
    #[inline]
    pub fn count(&self) -> usize {
        self.records.count()
    }

    /// record 不存在时返回 None，Active 的 record 返回 0
    #[inline]
    pub fn defer_count(&self, handle: BasicBufferHandle) -> Option<u32> {
        self.records.get(handle).map(|record| record.defer_count())
    }

    #[inline]
    pub fn try_get_native_handle(&self, handle: BasicBufferHandle) -> Option<NativeBufferHandle> {
        self.records.get(handle).map(|record| record.payload().native)
    }

    pub fn get_native_handle(&self, handle: BasicBufferHandle) -> GfxResult<NativeBufferHandle> {
        self.try_get_native_handle(handle).ok_or_else(|| GfxError::invalid_handle(handle))
    }

    #[inline]
    pub fn try_get_record(&self, handle: BasicBufferHandle) -> Option<&BufferRecord> {
        self.records.get(handle).map(|record| record.payload())
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
