//! Driver abstraction layer.
//!
//! Every native call made by the resource layer goes through the [`Driver`]
//! trait, so binding deduplication and upload behavior can be observed
//! without a GPU.
//!
//! # Available Drivers
//!
//! - [`DummyDriver`]: software driver used by tests and headless tools
//! - `GlDriver` (feature `gl-backend`): OpenGL 4.x through `glow`
//!
//! All methods take `&self`; drivers are used from the single thread that
//! owns the context.

pub mod dummy;

#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub mod gl;

use std::fmt;
use std::num::NonZeroU32;

use tessera_core::mesh::{AttributePointer, IndexFormat, PrimitiveTopology};

use crate::error::GraphicsError;
use crate::types::{
    Attachment, BufferTarget, ClearFlags, FilterMode, ShaderStage, TextureDescriptor,
    TextureDimension, UniformType, UniformValue, UsageHint, WrapMode,
};

pub use dummy::{DrawCall, DriverStats, DummyDriver};

#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub use gl::GlDriver;

/// Numeric name of a native driver object.
///
/// Drivers may reuse a name once the object it named has been deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(NonZeroU32);

impl RawHandle {
    /// Wrap a raw name, returning `None` for the reserved name 0.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// Get the raw name.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    /// Get the name as a non-zero integer.
    pub fn non_zero(&self) -> NonZeroU32 {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Device limits queried once when a context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Vertex attribute registers.
    pub max_vertex_attributes: u32,
    /// Color attachments per framebuffer.
    pub max_color_attachments: u32,
    /// Control points per tessellation patch.
    pub max_patch_vertices: u32,
    /// Combined texture image units.
    pub max_texture_units: u32,
    /// Indexed uniform buffer binding points.
    pub max_uniform_buffer_bindings: u32,
}

impl Default for DeviceCapabilities {
    /// The minimums an OpenGL 4.x implementation must provide.
    fn default() -> Self {
        Self {
            max_vertex_attributes: 16,
            max_color_attachments: 8,
            max_patch_vertices: 32,
            max_texture_units: 80,
            max_uniform_buffer_bindings: 84,
        }
    }
}

/// Placement of an active uniform inside a uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockMemberInfo {
    /// Index of the owning block.
    pub block_index: u32,
    /// Byte offset of element 0.
    pub offset: u32,
    /// Bytes between array elements (0 for non-arrays).
    pub array_stride: u32,
}

/// An active uniform reported by program reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveUniform {
    /// Reported name. Arrays may carry a `[0]` suffix.
    pub name: String,
    /// Declared type.
    pub ty: UniformType,
    /// Number of array elements (1 for non-arrays).
    pub array_length: u32,
    /// Block placement for block members, `None` for ordinary uniforms.
    pub block: Option<BlockMemberInfo>,
}

/// An active uniform block reported by program reflection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveUniformBlock {
    /// Block name.
    pub name: String,
    /// Driver-assigned block index.
    pub index: u32,
    /// Minimum buffer size in bytes.
    pub size: u32,
}

/// Native graphics API calls used by the resource layer.
///
/// Bind-style calls operate on the driver's current state exactly like the
/// underlying API would; deduplication happens above this trait.
pub trait Driver {
    /// Human-readable driver name.
    fn name(&self) -> &str;

    /// Query device limits.
    fn query_capabilities(&self) -> DeviceCapabilities;

    // --- Buffers ---

    fn create_buffer(&self) -> Result<RawHandle, GraphicsError>;
    fn delete_buffer(&self, buffer: RawHandle);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<RawHandle>);
    /// Reserve zero-filled storage for the buffer bound to `target`.
    fn buffer_storage(&self, target: BufferTarget, size: usize, usage: UsageHint);
    /// Write `data` at `offset` into the buffer bound to `target`.
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);
    /// Bind a uniform buffer to an indexed binding point.
    fn bind_buffer_base(&self, index: u32, buffer: Option<RawHandle>);

    // --- Vertex arrays ---

    fn create_vertex_array(&self) -> Result<RawHandle, GraphicsError>;
    fn delete_vertex_array(&self, vertex_array: RawHandle);
    fn bind_vertex_array(&self, vertex_array: Option<RawHandle>);
    fn enable_vertex_attribute(&self, slot: u32);
    /// Describe one attribute register of the bound vertex array, sourced from
    /// the bound array buffer.
    fn vertex_attribute_pointer(&self, pointer: &AttributePointer, stride: u32);

    // --- Textures ---

    fn create_texture(&self) -> Result<RawHandle, GraphicsError>;
    fn delete_texture(&self, texture: RawHandle);
    fn active_texture_unit(&self, unit: u32);
    fn bind_texture(&self, dimension: TextureDimension, texture: Option<RawHandle>);
    /// Allocate immutable storage for the texture bound on the active unit.
    fn texture_storage(&self, descriptor: &TextureDescriptor);
    /// Upload the base level of the texture bound on the active unit.
    fn texture_sub_image(&self, descriptor: &TextureDescriptor, data: &[u8]);
    fn texture_parameters(&self, dimension: TextureDimension, filter: FilterMode, wrap: WrapMode);

    // --- Framebuffers ---

    fn create_framebuffer(&self) -> Result<RawHandle, GraphicsError>;
    fn delete_framebuffer(&self, framebuffer: RawHandle);
    fn bind_framebuffer(&self, framebuffer: Option<RawHandle>);
    fn framebuffer_texture(&self, attachment: Attachment, texture: Option<RawHandle>);
    /// Route fragment output `i` to `outputs[i]`; `None` discards it.
    fn draw_buffers(&self, outputs: &[Option<u32>]);
    fn framebuffer_complete(&self) -> bool;
    fn clear(&self, flags: ClearFlags, color: [f32; 4], depth: f32);

    // --- Shaders ---

    /// Compile one stage. On failure returns the driver's info log.
    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<RawHandle, String>;
    fn delete_shader(&self, shader: RawHandle);
    /// Link compiled stages. On failure returns the driver's info log.
    fn link_program(&self, shaders: &[RawHandle]) -> Result<RawHandle, String>;
    fn delete_program(&self, program: RawHandle);
    fn use_program(&self, program: Option<RawHandle>);
    fn active_uniforms(&self, program: RawHandle) -> Vec<ActiveUniform>;
    fn active_uniform_blocks(&self, program: RawHandle) -> Vec<ActiveUniformBlock>;
    fn uniform_location(&self, program: RawHandle, name: &str) -> Option<i32>;
    fn uniform_block_binding(&self, program: RawHandle, block_index: u32, binding: u32);
    /// Write an ordinary uniform of the program in use.
    fn set_uniform(&self, location: i32, value: &UniformValue);

    // --- Drawing ---

    fn set_patch_vertices(&self, count: u32);
    /// Draw `count` indices of the bound vertex array's index buffer.
    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
    );
    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32);
}
