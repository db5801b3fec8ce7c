//! GPU resources.
//!
//! Every type here implements [`GpuResource`](crate::GpuResource):
//! - [`Buffer`] - vertex, index or uniform storage with a CPU staging copy
//! - [`Texture`] - sampled image, also usable as a render target
//! - [`Framebuffer`] - off-screen render target built from textures
//! - [`VertexArray`] - attribute and index source bindings for a layout
//!
//! Resources hold an `Rc` to their [`GraphicsContext`](crate::GraphicsContext)
//! and free their native object when dropped.

mod buffer;
mod framebuffer;
mod texture;
mod vertex_array;

pub use buffer::Buffer;
pub use framebuffer::Framebuffer;
pub use texture::Texture;
pub use vertex_array::VertexArray;
