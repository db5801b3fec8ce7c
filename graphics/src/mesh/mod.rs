//! Renderable geometry.
//!
//! - [`IndexBuffer`] - element array packed at the narrowest index width
//! - [`Geometry`] - typed vertex records plus optional indices, drawn with a
//!   [`ShaderProgram`](crate::shader::ShaderProgram)
//!
//! CPU-side topology, index packing and layout derivation live in
//! [`tessera_core::mesh`] and are re-exported here.

mod geometry;
mod index_buffer;

pub use geometry::Geometry;
pub use index_buffer::IndexBuffer;

pub use tessera_core::mesh::{
    AttributeKind, AttributePointer, AttributeSlot, ComponentType, DrawChunks, DrawRange,
    IndexData, IndexFormat, LayoutError, PrimitiveTopology, TopologyFamily, VertexAttribute,
    VertexRecord, VertexRecordLayout, VertexSchema,
};
