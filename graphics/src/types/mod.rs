//! Common types and descriptors for graphics resources.
//!
//! This module contains the enums, flags and descriptor structs shared by the
//! driver abstraction and the resource layer.

mod buffer;
mod common;
mod shader;
mod texture;

pub use buffer::{BufferTarget, UsageHint};
pub use common::{Attachment, ClearFlags, Extent3d};
pub use shader::{ShaderStage, UniformType, UniformValue};
pub use texture::{FilterMode, TextureDescriptor, TextureDimension, TextureFormat, WrapMode};
