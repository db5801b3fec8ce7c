//! GPU texture resource.

use std::rc::Rc;

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, ResourceKind};
use crate::types::{Extent3d, TextureDescriptor, TextureDimension, TextureFormat};

/// A GPU texture.
///
/// The descriptor is fixed while the texture is allocated. Pixel data, if
/// any, covers the base mip level of every face and layer.
///
/// # Example
///
/// ```ignore
/// let mut texture = Texture::with_pixels(
///     &ctx,
///     TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8Unorm),
///     pixels,
/// );
/// texture.alloc()?;
/// println!("Texture size: {}x{}", texture.width(), texture.height());
/// ```
pub struct Texture {
    context: Rc<GraphicsContext>,
    lifecycle: Lifecycle,
    descriptor: TextureDescriptor,
    pixels: Option<Vec<u8>>,
}

impl Texture {
    /// Create a texture with uninitialized contents.
    pub fn new(context: &Rc<GraphicsContext>, descriptor: TextureDescriptor) -> Self {
        Self {
            context: Rc::clone(context),
            lifecycle: Lifecycle::new(),
            descriptor,
            pixels: None,
        }
    }

    /// Create a texture initialized from `pixels`.
    pub fn with_pixels(
        context: &Rc<GraphicsContext>,
        descriptor: TextureDescriptor,
        pixels: Vec<u8>,
    ) -> Self {
        let mut texture = Self::new(context, descriptor);
        texture.pixels = Some(pixels);
        texture
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Replace the descriptor. Only allowed while not allocated.
    pub fn set_descriptor(&mut self, descriptor: TextureDescriptor) -> Result<(), GraphicsError> {
        if self.is_allocated() {
            return Err(GraphicsError::configuration(format!(
                "descriptor of texture `{}` is fixed once allocated",
                self.label().unwrap_or("unlabeled")
            )));
        }
        self.descriptor = descriptor;
        Ok(())
    }

    /// Replace the staged pixels. Takes effect on the next upload or alloc.
    pub fn set_pixels(&mut self, pixels: Vec<u8>) -> Result<(), GraphicsError> {
        self.check_pixels(&pixels)?;
        self.pixels = Some(pixels);
        Ok(())
    }

    /// Upload the staged pixels. Returns the number of bytes uploaded.
    pub fn upload(&mut self) -> Result<usize, GraphicsError> {
        let handle = Rc::clone(self.handle()?);
        let Some(pixels) = &self.pixels else {
            return Ok(0);
        };
        self.context
            .bind_texture(0, self.descriptor.dimension, &handle)?;
        self.context.select_texture_unit(0);
        self.context
            .driver()
            .texture_sub_image(&self.descriptor, pixels);
        Ok(pixels.len())
    }

    pub fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the texture size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    fn check_pixels(&self, pixels: &[u8]) -> Result<(), GraphicsError> {
        let expected = self.descriptor.base_level_size();
        if pixels.len() != expected {
            return Err(GraphicsError::configuration(format!(
                "texture `{}` expects {expected} bytes of pixels, got {}",
                self.label().unwrap_or("unlabeled"),
                pixels.len()
            )));
        }
        Ok(())
    }
}

impl GpuResource for Texture {
    fn context(&self) -> &Rc<GraphicsContext> {
        &self.context
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        let size = self.descriptor.size;
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(GraphicsError::configuration(
                "texture dimensions cannot be zero",
            ));
        }
        if let Some(pixels) = &self.pixels {
            self.check_pixels(pixels)?;
        }
        self.context.driver().create_texture()
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        let handle = Rc::clone(self.handle()?);
        let dimension = self.descriptor.dimension;
        // Scratch binding on unit 0, through the cache like any other bind.
        self.context.bind_texture(0, dimension, &handle)?;
        self.context.select_texture_unit(0);

        let driver = self.context.driver();
        driver.texture_storage(&self.descriptor);
        driver.texture_parameters(dimension, self.descriptor.filter, self.descriptor.wrap);
        if let Some(pixels) = &self.pixels {
            driver.texture_sub_image(&self.descriptor, pixels);
        }
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.context.driver().delete_texture(raw);
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("dimension", &self.descriptor.dimension)
            .field("state", &self.lifecycle.state())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::config::ContextConfig;

    fn context() -> (Rc<DummyDriver>, Rc<GraphicsContext>) {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
        (driver, ctx)
    }

    #[test]
    fn test_texture_debug() {
        let (_, ctx) = context();
        let texture = Texture::new(
            &ctx,
            TextureDescriptor::new_2d(512, 512, TextureFormat::Rgba8Unorm),
        );
        let debug = format!("{:?}", texture);
        assert!(debug.contains("Texture"));
        assert!(debug.contains("512"));
    }

    #[test]
    fn test_alloc_uploads_pixels() {
        let (driver, ctx) = context();
        let pixels = vec![10, 20, 30, 40, 50, 60, 70, 80];
        let mut texture = Texture::with_pixels(
            &ctx,
            TextureDescriptor::new_2d(2, 1, TextureFormat::Rgba8Unorm),
            pixels.clone(),
        );
        texture.alloc().unwrap();
        let raw = texture.raw().unwrap();
        assert_eq!(driver.texture_pixels(raw), Some(pixels));
        assert_eq!(driver.texture_on_unit(0), Some(raw));
    }

    #[test]
    fn test_pixel_size_mismatch() {
        let (_, ctx) = context();
        let mut texture = Texture::with_pixels(
            &ctx,
            TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8Unorm),
            vec![0; 3],
        );
        assert!(matches!(
            texture.alloc(),
            Err(GraphicsError::Configuration(_))
        ));
        assert!(!texture.is_allocated());
    }

    #[test]
    fn test_descriptor_fixed_after_alloc() {
        let (_, ctx) = context();
        let mut texture = Texture::new(&ctx, TextureDescriptor::default());
        texture.alloc().unwrap();
        let err = texture
            .set_descriptor(TextureDescriptor::new_2d(4, 4, TextureFormat::R8Unorm))
            .unwrap_err();
        assert!(matches!(err, GraphicsError::Configuration(_)));
    }

    #[test]
    fn test_zero_size_rejected() {
        let (_, ctx) = context();
        let mut texture = Texture::new(
            &ctx,
            TextureDescriptor::new_2d(0, 4, TextureFormat::Rgba8Unorm),
        );
        assert!(texture.alloc().is_err());
    }
}
