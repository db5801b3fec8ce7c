//! Texture types and descriptors.

use super::Extent3d;

/// Shape of a texture, which also selects its bind target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// 2D texture.
    #[default]
    D2,
    /// 3D volume texture.
    D3,
    /// Cube map with six square faces.
    Cube,
    /// Array of 2D layers.
    D2Array,
}

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 32-bit red channel, float.
    R32Float,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth24Plus | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::Rg8Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::R32Float
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Texel filtering for minification and magnification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    Nearest,
    /// Linear interpolation.
    #[default]
    Linear,
}

/// Coordinate wrapping outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    /// Repeat the texture.
    #[default]
    Repeat,
    /// Clamp to the edge texel.
    ClampToEdge,
    /// Repeat with mirroring.
    MirroredRepeat,
}

/// Descriptor for creating a texture.
///
/// The descriptor is fixed once the texture is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Texture shape.
    pub dimension: TextureDimension,
    /// Size of the texture.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Sampling filter.
    pub filter: FilterMode,
    /// Coordinate wrapping.
    pub wrap: WrapMode,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            size: Extent3d::new_2d(width, height),
            format,
            ..Default::default()
        }
    }

    /// Create a new 3D texture descriptor.
    pub fn new_3d(width: u32, height: u32, depth: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::D3,
            size: Extent3d::new_3d(width, height, depth),
            format,
            ..Default::default()
        }
    }

    /// Create a new cube map descriptor with square faces.
    pub fn new_cube(size: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::Cube,
            size: Extent3d::new_2d(size, size),
            format,
            ..Default::default()
        }
    }

    /// Create a new 2D array descriptor.
    pub fn new_2d_array(width: u32, height: u32, layers: u32, format: TextureFormat) -> Self {
        Self {
            dimension: TextureDimension::D2Array,
            size: Extent3d::new_3d(width, height, layers),
            format,
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the sampling filter.
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Set the coordinate wrapping.
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    /// Number of faces (6 for cube maps, 1 otherwise).
    pub fn face_count(&self) -> u32 {
        match self.dimension {
            TextureDimension::Cube => 6,
            _ => 1,
        }
    }

    /// Byte size of the base mip level across all faces and layers.
    pub fn base_level_size(&self) -> usize {
        self.size.texel_count() * self.format.block_size() as usize * self.face_count() as usize
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureDimension::D2,
            size: Extent3d::new_2d(1, 1),
            mip_level_count: 1,
            format: TextureFormat::default(),
            filter: FilterMode::default(),
            wrap: WrapMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_level_size() {
        let desc = TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm);
        assert_eq!(desc.base_level_size(), 64);

        let cube = TextureDescriptor::new_cube(2, TextureFormat::R8Unorm);
        assert_eq!(cube.base_level_size(), 24);

        let array = TextureDescriptor::new_2d_array(2, 2, 3, TextureFormat::Rgba16Float);
        assert_eq!(array.base_level_size(), 96);
    }

    #[test]
    fn test_depth_formats() {
        assert!(TextureFormat::Depth24PlusStencil8.is_depth_stencil());
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth_stencil());
    }
}
