//! # Tessera Graphics
//!
//! GPU resource lifecycle and binding state for an OpenGL-style driver.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GpuResource`] - explicit `alloc`/`free` lifecycle, released on drop
//! - [`GraphicsContext`] - per-context binding caches that skip redundant binds
//! - [`shader::ShaderProgram`] - reflected uniforms, texture unit pooling and
//!   uniform blocks with dirty-range uploads
//! - [`mesh::Geometry`] - typed vertex records with minimal-width indices and
//!   chunked patch draws
//! - [`backend::Driver`] - native call surface, with a recording
//!   [`DummyDriver`] for tests and a `glow` backend behind `gl-backend`
//!
//! Everything here is single-threaded: resources hold an `Rc` to their
//! context and must stay on the thread that owns the driver.
//!
//! ## Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use tessera_graphics::{ContextConfig, DummyDriver, GraphicsContext};
//! use tessera_graphics::mesh::{Geometry, PrimitiveTopology};
//! use tessera_graphics::shader::{ProgramSource, ShaderProgram};
//!
//! let ctx = GraphicsContext::new(Rc::new(DummyDriver::new()), ContextConfig::new());
//! let mut program = ShaderProgram::build(&ctx, ProgramSource::new().with_vertex(VS).with_fragment(FS))?;
//! let mut quad = Geometry::indexed(&ctx, PrimitiveTopology::Triangles, &vertices, &[0, 1, 2, 2, 3, 0])?;
//! quad.alloc()?;
//! program.set_uniform("tint", [1.0, 1.0, 1.0, 1.0])?;
//! quad.draw(&mut program)?;
//! ```

pub mod backend;
pub mod binding;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod mesh;
pub mod registry;
pub mod resources;
pub mod shader;
pub mod types;

pub use backend::{DeviceCapabilities, Driver, DummyDriver, RawHandle};
pub use binding::BindingCache;
pub use config::ContextConfig;
pub use context::GraphicsContext;
pub use error::GraphicsError;
pub use lifecycle::{GpuResource, NativeHandle, ResourceKind, ResourceState};
pub use registry::{LiveAllocation, ResourceRegistry};
pub use resources::{Buffer, Framebuffer, Texture, VertexArray};
pub use types::{
    Attachment, BufferTarget, ClearFlags, Extent3d, ShaderStage, TextureDescriptor,
    TextureDimension, TextureFormat, UniformType, UniformValue, UsageHint,
};

#[cfg(all(feature = "gl-backend", not(target_arch = "wasm32")))]
pub use backend::GlDriver;

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
