//! Graphics context.
//!
//! The [`GraphicsContext`] is the explicit handle passed to every resource.
//! It owns the driver, the device limits (queried once), the configuration,
//! every binding cache, the vertex layout cache and the allocation registry.
//!
//! A context is bound to the thread that owns the native context; it is
//! neither `Send` nor `Sync`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tessera_core::mesh::{LayoutCache, VertexRecord, VertexRecordLayout};

use crate::backend::{DeviceCapabilities, Driver};
use crate::binding::BindingCache;
use crate::config::ContextConfig;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, NativeHandle};
use crate::registry::ResourceRegistry;
use crate::resources::Texture;
use crate::types::{TextureDescriptor, TextureDimension, TextureFormat};

/// Shared state of one native rendering context.
///
/// # Example
///
/// ```ignore
/// let driver = Rc::new(DummyDriver::new());
/// let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
///
/// let mut buffer = Buffer::with_data(&ctx, BufferTarget::Array, vec![0; 64]);
/// buffer.alloc()?;
/// buffer.upload(None)?;
/// ```
pub struct GraphicsContext {
    driver: Rc<dyn Driver>,
    capabilities: DeviceCapabilities,
    config: ContextConfig,

    vertex_arrays: BindingCache,
    texture_units: BindingCache,
    uniform_blocks: BindingCache,
    programs: BindingCache,
    framebuffers: BindingCache,
    active_unit: Cell<Option<u32>>,

    layouts: LayoutCache,
    registry: ResourceRegistry,
    solid_colors: RefCell<HashMap<[u8; 4], Weak<Texture>>>,
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("driver", &self.driver.name())
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GraphicsContext {
    /// Create a context, querying device limits from the driver.
    pub fn new(driver: Rc<dyn Driver>, config: ContextConfig) -> Rc<Self> {
        let capabilities = driver.query_capabilities();
        log::info!(
            "Creating GraphicsContext {:?} on {} driver",
            config.label.as_deref().unwrap_or("unlabeled"),
            driver.name()
        );
        log::info!("Device capabilities: {capabilities:?}");

        Rc::new(Self {
            vertex_arrays: BindingCache::new("vertex array", 1),
            texture_units: BindingCache::new(
                "texture unit",
                capabilities.max_texture_units as usize,
            ),
            uniform_blocks: BindingCache::new(
                "uniform block binding",
                capabilities.max_uniform_buffer_bindings as usize,
            ),
            programs: BindingCache::new("program", 1),
            framebuffers: BindingCache::new("framebuffer", 1),
            active_unit: Cell::new(None),
            layouts: LayoutCache::new(capabilities.max_vertex_attributes),
            registry: ResourceRegistry::new(config.leak_tracking),
            solid_colors: RefCell::new(HashMap::new()),
            driver,
            capabilities,
            config,
        })
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Device limits, queried once at creation.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Allocation registry used for leak diagnostics.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Number of texture units a single program may use.
    pub fn texture_unit_capacity(&self) -> u32 {
        self.config
            .texture_unit_limit
            .min(self.capabilities.max_texture_units)
    }

    /// Texture-unit binding cache.
    pub fn texture_unit_cache(&self) -> &BindingCache {
        &self.texture_units
    }

    /// Uniform-block binding cache.
    pub fn uniform_block_cache(&self) -> &BindingCache {
        &self.uniform_blocks
    }

    // --- Vertex layouts ---

    /// Packed layout of `V`, derived once per context.
    pub fn vertex_layout<V: VertexRecord>(&self) -> Result<Rc<VertexRecordLayout>, GraphicsError> {
        Ok(self.layouts.get_or_derive::<V>()?)
    }

    pub fn layout_cache(&self) -> &LayoutCache {
        &self.layouts
    }

    // --- Bindings ---

    /// Bind a vertex array. Returns whether a native call was issued.
    pub fn bind_vertex_array(&self, handle: &Rc<NativeHandle>) -> Result<bool, GraphicsError> {
        if self.vertex_arrays.is_attached(0, handle) {
            log::trace!("Vertex array {} already bound", handle.raw());
            return Ok(false);
        }
        self.driver.bind_vertex_array(Some(handle.raw()));
        self.vertex_arrays.attach(0, handle)?;
        Ok(true)
    }

    /// Unbind the current vertex array. Always issues the native call.
    pub fn unbind_vertex_array(&self) {
        self.driver.bind_vertex_array(None);
        self.vertex_arrays.detach(0);
    }

    /// Make `unit` the active texture unit, skipping redundant switches.
    pub fn select_texture_unit(&self, unit: u32) {
        if self.active_unit.get() != Some(unit) {
            self.driver.active_texture_unit(unit);
            self.active_unit.set(Some(unit));
        }
    }

    /// Bind a texture to a unit. Returns whether a native call was issued.
    pub fn bind_texture(
        &self,
        unit: u32,
        dimension: TextureDimension,
        handle: &Rc<NativeHandle>,
    ) -> Result<bool, GraphicsError> {
        let slot = unit as usize;
        self.texture_units.check_slot(slot)?;
        if self.texture_units.is_attached(slot, handle) {
            log::trace!("Texture {} already bound to unit {unit}", handle.raw());
            return Ok(false);
        }
        self.select_texture_unit(unit);
        self.driver.bind_texture(dimension, Some(handle.raw()));
        self.texture_units.attach(slot, handle)?;
        Ok(true)
    }

    /// Unbind whatever texture occupies `unit`. Always issues the native call.
    pub fn unbind_texture(&self, unit: u32, dimension: TextureDimension) {
        self.select_texture_unit(unit);
        self.driver.bind_texture(dimension, None);
        self.texture_units.detach(unit as usize);
    }

    /// Bind a uniform buffer to an indexed binding point.
    pub fn bind_uniform_buffer(
        &self,
        index: u32,
        handle: &Rc<NativeHandle>,
    ) -> Result<bool, GraphicsError> {
        let slot = index as usize;
        self.uniform_blocks.check_slot(slot)?;
        if self.uniform_blocks.is_attached(slot, handle) {
            log::trace!("Uniform buffer {} already bound to {index}", handle.raw());
            return Ok(false);
        }
        self.driver.bind_buffer_base(index, Some(handle.raw()));
        self.uniform_blocks.attach(slot, handle)?;
        Ok(true)
    }

    /// Make a program current.
    pub fn use_program(&self, handle: &Rc<NativeHandle>) -> Result<bool, GraphicsError> {
        if self.programs.is_attached(0, handle) {
            return Ok(false);
        }
        self.driver.use_program(Some(handle.raw()));
        self.programs.attach(0, handle)?;
        Ok(true)
    }

    /// Bind a framebuffer, or the default framebuffer for `None`.
    ///
    /// Binding the default framebuffer always issues the native call.
    pub fn bind_framebuffer(&self, handle: Option<&Rc<NativeHandle>>) -> Result<bool, GraphicsError> {
        match handle {
            Some(handle) => {
                if self.framebuffers.is_attached(0, handle) {
                    return Ok(false);
                }
                self.driver.bind_framebuffer(Some(handle.raw()));
                self.framebuffers.attach(0, handle)?;
            }
            None => {
                self.driver.bind_framebuffer(None);
                self.framebuffers.detach(0);
            }
        }
        Ok(true)
    }

    /// Forget every cached binding.
    ///
    /// Call this after native state was changed behind this layer's back.
    pub fn invalidate_bindings(&self) {
        log::debug!("Invalidating binding caches");
        self.vertex_arrays.detach_all();
        self.texture_units.detach_all();
        self.uniform_blocks.detach_all();
        self.programs.detach_all();
        self.framebuffers.detach_all();
        self.active_unit.set(None);
    }

    // --- Shared resources ---

    /// Shared 1x1 texture of a solid color.
    ///
    /// The texture is reused while any caller still holds it.
    pub fn solid_color_texture(self: &Rc<Self>, rgba: [u8; 4]) -> Result<Rc<Texture>, GraphicsError> {
        if let Some(texture) = self
            .solid_colors
            .borrow()
            .get(&rgba)
            .and_then(Weak::upgrade)
        {
            return Ok(texture);
        }

        let descriptor = TextureDescriptor::new_2d(1, 1, TextureFormat::Rgba8Unorm)
            .with_label(format!(
                "solid #{:02x}{:02x}{:02x}{:02x}",
                rgba[0], rgba[1], rgba[2], rgba[3]
            ));
        let mut texture = Texture::with_pixels(self, descriptor, rgba.to_vec());
        texture.alloc()?;
        let texture = Rc::new(texture);

        let mut cache = self.solid_colors.borrow_mut();
        cache.retain(|_, weak| weak.strong_count() > 0);
        cache.insert(rgba, Rc::downgrade(&texture));
        Ok(texture)
    }

    /// Log allocations that are still live. Returns how many there are.
    pub fn report_leaks(&self) -> usize {
        self.registry.report_leaks()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        // Resources keep the context alive, so anything still tracked here
        // was never dropped.
        if self.registry.is_enabled() {
            self.registry.report_leaks();
        }
    }
}

static_assertions::assert_not_impl_any!(GraphicsContext: Send, Sync);
