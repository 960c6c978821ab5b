use bitflags::bitflags;

use crate::error::{GfxError, GfxResult};

/// Buffer 的用途，原样透传给 Native 工厂
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicBufferType {
    Vertex,
    Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicBufferUsage {
    /// 创建后内容不再变化
    Static,
    /// 可以通过 `set_data` 持续更新
    Dynamic,
}

bitflags! {
    /// Native Buffer 工厂的能力
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BufferCaps: u32 {
        /// 支持创建 dynamic buffer
        const DYNAMIC_BUFFERS = 1 << 0;
        /// 支持从非 0 的 dst_index 开始写入，无需额外的 staging 拷贝
        const SUB_RANGE_UPDATE = 1 << 1;
    }
}

/// 一段按元素组织的只读数据
///
/// 容量、dst_index 等参数都以元素为单位，元素的字节大小由 `element_stride` 给出。
#[derive(Clone, Copy, Debug)]
pub struct BufferData<'a> {
    bytes: &'a [u8],
    element_stride: u32,
}
impl<'a> BufferData<'a> {
    /// 从 POD 类型的切片创建，例如 `&[u16]` 的 index 或者 `&[Vertex]`
    pub fn from_slice<T: bytemuck::Pod>(elements: &'a [T]) -> Self {
        Self {
            bytes: bytemuck::cast_slice(elements),
            element_stride: size_of::<T>() as u32,
        }
    }

    /// 从原始字节创建，字节数必须是 `element_stride` 的整数倍
    pub fn from_bytes(bytes: &'a [u8], element_stride: u32) -> GfxResult<Self> {
        if element_stride == 0 {
            return Err(GfxError::usage("element_stride can not be zero"));
        }
        if bytes.len() % element_stride as usize != 0 {
            return Err(GfxError::usage(format!(
                "byte length {} is not a multiple of element_stride {}",
                bytes.len(),
                element_stride
            )));
        }
        Ok(Self { bytes, element_stride })
    }

    #[inline]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    #[inline]
    pub fn element_stride(&self) -> u32 {
        self.element_stride
    }

    #[inline]
    pub fn element_count(&self) -> u32 {
        if self.element_stride == 0 {
            0
        } else {
            (self.bytes.len() / self.element_stride as usize) as u32
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_owned_data(&self) -> OwnedBufferData {
        OwnedBufferData {
            bytes: self.bytes.to_vec(),
            element_stride: self.element_stride,
        }
    }
}

/// [`BufferData`] 的持有版本，用于延迟到 flush 时才提交的写入
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedBufferData {
    bytes: Vec<u8>,
    element_stride: u32,
}
impl OwnedBufferData {
    #[inline]
    pub fn as_data(&self) -> BufferData<'_> {
        BufferData {
            bytes: &self.bytes,
            element_stride: self.element_stride,
        }
    }
}
