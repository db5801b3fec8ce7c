//! CPU-side geometry description.
//!
//! This module provides:
//! - [`PrimitiveTopology`] - how indices are assembled into primitives, including
//!   tessellation patches
//! - [`IndexFormat`] / [`IndexData`] - minimal-width index packing
//! - [`DrawChunks`] - splitting one logical draw into bounded native draws
//! - [`VertexSchema`] / [`VertexRecord`] - declarative per-vertex attribute lists
//! - [`VertexRecordLayout`] - the packed layout derived from a schema
//! - [`LayoutCache`] - per-record-type memoization of derived layouts

mod cache;
mod index;
mod layout;
mod schema;
mod topology;

pub use cache::LayoutCache;
pub use index::{IndexData, IndexFormat};
pub use layout::{AttributePointer, AttributeSlot, LayoutError, VertexRecordLayout};
pub use schema::{AttributeKind, ComponentType, VertexAttribute, VertexRecord, VertexSchema};
pub use topology::{DrawChunks, DrawRange, PrimitiveTopology, TopologyFamily};
