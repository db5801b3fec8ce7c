//! Declarative vertex attribute schemas.
//!
//! A vertex record type describes its attributes once, as an explicit list of
//! [`VertexAttribute`]s, instead of being introspected at runtime. The schema
//! is the only input of the layout deriver.
//!
//! # Example
//!
//! ```ignore
//! #[repr(C)]
//! #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
//! struct SpriteVertex {
//!     position: [f32; 3],
//!     uv: [f32; 2],
//!     tint: [u8; 4],
//! }
//!
//! impl VertexRecord for SpriteVertex {
//!     fn schema() -> VertexSchema {
//!         VertexSchema::new()
//!             .with(VertexAttribute::vec3("position", 0))
//!             .with(VertexAttribute::vec2("uv", 1))
//!             .with(VertexAttribute::packed_color("tint", 2, 4))
//!             .with_label("sprite")
//!     }
//! }
//! ```

use std::borrow::Cow;

/// Scalar type of one attribute component as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// 32-bit float.
    F32,
    /// 8-bit unsigned integer.
    U8,
}

impl ComponentType {
    /// Size of one component in bytes.
    pub fn size(&self) -> u32 {
        match self {
            Self::F32 => 4,
            Self::U8 => 1,
        }
    }
}

/// Semantic kind of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Single float.
    Scalar,
    /// Two floats.
    Vec2,
    /// Three floats.
    Vec3,
    /// Four floats.
    Vec4,
    /// 4x4 float matrix, one attribute register per row.
    Mat4,
    /// Color packed into four bytes, read as normalized 0-1 values.
    ///
    /// Declares 3 or 4 components; storage is always 4 bytes.
    PackedColor {
        /// Declared component count (3 or 4).
        components: u8,
    },
}

impl AttributeKind {
    /// Number of consecutive attribute slots one element consumes.
    pub fn slot_span(&self) -> u32 {
        match self {
            Self::Mat4 => 4,
            _ => 1,
        }
    }

    /// Size of one element in bytes.
    pub fn byte_size(&self) -> u32 {
        match self {
            Self::Scalar => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
            Self::PackedColor { .. } => 4,
        }
    }

    /// Components the driver reads from each slot.
    pub fn components_per_slot(&self) -> u8 {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat4 => 4,
            Self::PackedColor { components } => *components,
        }
    }

    /// Component type of each slot.
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::PackedColor { .. } => ComponentType::U8,
            _ => ComponentType::F32,
        }
    }

    /// Whether the driver should normalize integer components to 0-1.
    pub fn normalized(&self) -> bool {
        matches!(self, Self::PackedColor { .. })
    }
}

/// One entry of a vertex schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute name, used in diagnostics.
    pub name: Cow<'static, str>,
    /// First attribute slot this attribute occupies.
    pub slot: u32,
    /// Semantic kind.
    pub kind: AttributeKind,
    /// Number of array elements (1 for non-arrays).
    pub array_length: u32,
}

impl VertexAttribute {
    /// Create a new non-array attribute.
    pub const fn new(name: &'static str, slot: u32, kind: AttributeKind) -> Self {
        Self {
            name: Cow::Borrowed(name),
            slot,
            kind,
            array_length: 1,
        }
    }

    /// Create a scalar float attribute.
    pub const fn scalar(name: &'static str, slot: u32) -> Self {
        Self::new(name, slot, AttributeKind::Scalar)
    }

    /// Create a two-float attribute.
    pub const fn vec2(name: &'static str, slot: u32) -> Self {
        Self::new(name, slot, AttributeKind::Vec2)
    }

    /// Create a three-float attribute.
    pub const fn vec3(name: &'static str, slot: u32) -> Self {
        Self::new(name, slot, AttributeKind::Vec3)
    }

    /// Create a four-float attribute.
    pub const fn vec4(name: &'static str, slot: u32) -> Self {
        Self::new(name, slot, AttributeKind::Vec4)
    }

    /// Create a 4x4 matrix attribute (occupies four slots).
    pub const fn mat4(name: &'static str, slot: u32) -> Self {
        Self::new(name, slot, AttributeKind::Mat4)
    }

    /// Create a packed byte color attribute with 3 or 4 declared components.
    pub const fn packed_color(name: &'static str, slot: u32, components: u8) -> Self {
        Self::new(name, slot, AttributeKind::PackedColor { components })
    }

    /// Turn this attribute into an array of `length` elements.
    pub const fn with_array_length(mut self, length: u32) -> Self {
        self.array_length = length;
        self
    }

    /// Replace the name with an owned string.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Cow::Owned(name.into());
        self
    }

    /// Total number of slots this attribute reserves, or `None` on overflow.
    pub fn slot_span(&self) -> Option<u32> {
        self.kind.slot_span().checked_mul(self.array_length)
    }

    /// Total size of this attribute in bytes, or `None` on overflow.
    pub fn byte_size(&self) -> Option<u32> {
        self.kind.byte_size().checked_mul(self.array_length)
    }
}

/// Ordered, declarative list of vertex attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexSchema {
    /// The attributes, in declaration order.
    pub attributes: Vec<VertexAttribute>,
    /// Optional label for debugging.
    pub label: Option<String>,
}

impl VertexSchema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from a constant attribute table.
    pub fn from_table(attributes: &[VertexAttribute]) -> Self {
        Self {
            attributes: attributes.to_vec(),
            label: None,
        }
    }

    /// Add an attribute.
    pub fn with(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set a debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the number of declared attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the schema declares no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// A plain-old-data vertex type with a statically declared schema.
///
/// The layout derived from [`schema`](Self::schema) must match the Rust
/// struct byte-for-byte; this is checked once when the layout is cached.
pub trait VertexRecord: bytemuck::Pod + 'static {
    /// Declare this record's attributes.
    fn schema() -> VertexSchema;
}
