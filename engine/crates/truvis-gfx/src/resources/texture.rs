use bitflags::bitflags;

use crate::error::{GfxError, GfxResult};
use crate::resources::handles::DescriptorSetHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}
impl Extent2D {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// 生成完整 mip 链时的层数
    #[inline]
    pub fn full_mip_levels(&self) -> u32 {
        let max = self.width.max(self.height).max(1);
        u32::BITS - max.leading_zeros()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    R8Unorm,
    R8G8Unorm,
    R8G8B8A8Unorm,
    R8G8B8A8Srgb,
    B8G8R8A8Unorm,
    R32G32B32A32Sfloat,
}
impl PixelFormat {
    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::R8Unorm => 1,
            PixelFormat::R8G8Unorm => 2,
            PixelFormat::R8G8B8A8Unorm | PixelFormat::R8G8B8A8Srgb | PixelFormat::B8G8R8A8Unorm => 4,
            PixelFormat::R32G32B32A32Sfloat => 16,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFilterHint {
    Nearest,
    #[default]
    Smooth,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct TextureFlags: u32 {
        const GENERATE_MIPMAPS = 1 << 0;
        /// 像素数据已经是预乘 alpha
        const PREMULTIPLIED_ALPHA = 1 << 1;
    }
}

bitflags! {
    /// Native Texture 工厂的能力
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TextureCaps: u32 {
        /// 支持创建 dynamic texture，并通过 `set_texture_data` 整体替换内容
        const DYNAMIC_TEXTURES = 1 << 0;
        const MIPMAP_GENERATION = 1 << 1;
    }
}

/// 一张紧密排列的原始纹理，像素数据只借用
#[derive(Clone, Copy, Debug)]
pub struct TextureDesc<'a> {
    extent: Extent2D,
    format: PixelFormat,
    pixels: &'a [u8],
}
impl<'a> TextureDesc<'a> {
    /// 像素字节数必须等于 `width * height * bytes_per_pixel`
    pub fn new(extent: Extent2D, format: PixelFormat, pixels: &'a [u8]) -> GfxResult<Self> {
        if extent.width == 0 || extent.height == 0 {
            return Err(GfxError::usage(format!("texture extent can not be empty: {extent:?}")));
        }
        let expected = extent.texel_count() * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(GfxError::usage(format!(
                "texture data size mismatch, expected {expected} bytes for {extent:?} {format:?}, got {}",
                pixels.len()
            )));
        }
        Ok(Self { extent, format, pixels })
    }

    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    pub fn to_owned_desc(&self) -> OwnedTextureDesc {
        OwnedTextureDesc {
            extent: self.extent,
            format: self.format,
            pixels: self.pixels.to_vec(),
        }
    }
}

/// [`TextureDesc`] 的持有版本，dynamic texture 的待提交内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedTextureDesc {
    extent: Extent2D,
    format: PixelFormat,
    pixels: Vec<u8>,
}
impl OwnedTextureDesc {
    #[inline]
    pub fn as_desc(&self) -> TextureDesc<'_> {
        TextureDesc {
            extent: self.extent,
            format: self.format,
            pixels: &self.pixels,
        }
    }
}

/// 工厂中一张 Native Texture 的元信息
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeTextureInfo {
    pub extent: Extent2D,
    pub format: PixelFormat,
    pub mip_levels: u32,
    pub filter_hint: TextureFilterHint,
    pub flags: TextureFlags,
    pub is_dynamic: bool,
    pub descriptor_set: DescriptorSetHandle,
    /// 内容被整体替换的次数
    pub update_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desc_size_check() {
        let pixels = vec![0u8; 4 * 4 * 4];
        assert!(TextureDesc::new(Extent2D::new(4, 4), PixelFormat::R8G8B8A8Unorm, &pixels).is_ok());
        assert!(TextureDesc::new(Extent2D::new(4, 3), PixelFormat::R8G8B8A8Unorm, &pixels).is_err());
        assert!(TextureDesc::new(Extent2D::new(0, 4), PixelFormat::R8Unorm, &[]).is_err());
    }

    #[test]
    fn test_full_mip_levels() {
        assert_eq!(Extent2D::new(1, 1).full_mip_levels(), 1);
        assert_eq!(Extent2D::new(256, 16).full_mip_levels(), 9);
        assert_eq!(Extent2D::new(300, 2).full_mip_levels(), 9);
    }
}
