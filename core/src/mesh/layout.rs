//! Packed vertex layout derivation.
//!
//! [`VertexRecordLayout::derive`] turns a [`VertexSchema`] into the byte layout
//! of one interleaved vertex record. Attributes are packed tightly in ascending
//! slot order; the result is what the driver's vertex-attribute-pointer call
//! consumes, one [`AttributePointer`] per attribute register.

use std::borrow::Cow;

use super::schema::{AttributeKind, ComponentType, VertexSchema};

/// Errors produced while deriving a vertex layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// The schema declares no attributes.
    #[error("vertex schema declares no attributes")]
    EmptySchema,
    /// Two attributes start at the same slot.
    #[error("attributes `{first}` and `{second}` both start at slot {slot}")]
    DuplicateSlot {
        slot: u32,
        first: Cow<'static, str>,
        second: Cow<'static, str>,
    },
    /// An attribute's reserved slot range runs into the next attribute.
    #[error("attribute `{first}` (slots {first_start}..{first_end}) overlaps `{second}` at slot {second_start}")]
    SlotOverlap {
        first: Cow<'static, str>,
        first_start: u32,
        first_end: u32,
        second: Cow<'static, str>,
        second_start: u32,
    },
    /// The schema needs more attribute slots than the device provides.
    #[error("attribute `{attribute}` needs slot {highest_slot}, device supports {max} vertex attributes")]
    TooManySlots {
        attribute: Cow<'static, str>,
        highest_slot: u32,
        max: u32,
    },
    /// An array attribute declares zero elements.
    #[error("attribute `{0}` has array length 0")]
    ZeroArrayLength(Cow<'static, str>),
    /// A packed color declares a component count other than 3 or 4.
    #[error("packed color `{name}` declares {components} components, expected 3 or 4")]
    InvalidColorComponents {
        name: Cow<'static, str>,
        components: u8,
    },
    /// The derived stride differs from the size of the Rust record type.
    #[error("record `{record}` is {actual} bytes but its schema describes {expected}")]
    RecordSizeMismatch {
        record: &'static str,
        expected: u32,
        actual: u32,
    },
}

impl LayoutError {
    /// Check if this error is a resource limit rather than a malformed schema.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Self::SlotOverlap { .. } | Self::TooManySlots { .. })
    }
}

/// Placement of one attribute element inside a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeSlot {
    /// First slot of this element.
    pub slot: u32,
    /// Semantic kind.
    pub kind: AttributeKind,
    /// Byte offset from the start of the record.
    pub byte_offset: u32,
    /// Element index for array attributes, 0 otherwise.
    pub array_index: u32,
    /// Index of the declaring attribute in the schema.
    pub attribute: usize,
}

impl AttributeSlot {
    /// Size of this element in bytes.
    pub fn byte_size(&self) -> u32 {
        self.kind.byte_size()
    }
}

/// Arguments of one native vertex-attribute-pointer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributePointer {
    /// Attribute register.
    pub slot: u32,
    /// Components read from the register (1-4).
    pub components: u8,
    /// Scalar component type.
    pub component_type: ComponentType,
    /// Normalize integer components to 0-1.
    pub normalize: bool,
    /// Byte offset inside the record.
    pub offset: u32,
}

/// Packed layout of one vertex record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexRecordLayout {
    stride: u32,
    slots: Vec<AttributeSlot>,
    pointers: Vec<AttributePointer>,
    label: Option<String>,
}

impl VertexRecordLayout {
    /// Derive the layout of `schema` for a device with `max_vertex_attributes` registers.
    pub fn derive(schema: &VertexSchema, max_vertex_attributes: u32) -> Result<Self, LayoutError> {
        crate::profile_scope!("derive_vertex_layout");

        if schema.is_empty() {
            return Err(LayoutError::EmptySchema);
        }

        for attribute in &schema.attributes {
            if attribute.array_length == 0 {
                return Err(LayoutError::ZeroArrayLength(attribute.name.clone()));
            }
            if let AttributeKind::PackedColor { components } = attribute.kind {
                if !(3..=4).contains(&components) {
                    return Err(LayoutError::InvalidColorComponents {
                        name: attribute.name.clone(),
                        components,
                    });
                }
            }
        }

        // Stable sort keeps declaration order for equal slots, so ties name
        // the attributes in the order the schema lists them.
        let mut order: Vec<usize> = (0..schema.attributes.len()).collect();
        order.sort_by_key(|&i| schema.attributes[i].slot);

        for pair in order.windows(2) {
            let (a, b) = (&schema.attributes[pair[0]], &schema.attributes[pair[1]]);
            if a.slot == b.slot {
                return Err(LayoutError::DuplicateSlot {
                    slot: a.slot,
                    first: a.name.clone(),
                    second: b.name.clone(),
                });
            }
        }

        // Track the furthest reserved slot so far; any later start below it collides.
        let mut reach: Option<(usize, u32)> = None;
        for &index in &order {
            let attribute = &schema.attributes[index];
            if let Some((owner, end)) = reach {
                if attribute.slot < end {
                    let first = &schema.attributes[owner];
                    return Err(LayoutError::SlotOverlap {
                        first: first.name.clone(),
                        first_start: first.slot,
                        first_end: end,
                        second: attribute.name.clone(),
                        second_start: attribute.slot,
                    });
                }
            }
            let end = attribute
                .slot_span()
                .and_then(|span| attribute.slot.checked_add(span))
                .ok_or_else(|| LayoutError::TooManySlots {
                    attribute: attribute.name.clone(),
                    highest_slot: u32::MAX,
                    max: max_vertex_attributes,
                })?;
            if reach.map_or(true, |(_, current)| end > current) {
                reach = Some((index, end));
            }
        }

        if let Some((owner, end)) = reach {
            if end > max_vertex_attributes {
                return Err(LayoutError::TooManySlots {
                    attribute: schema.attributes[owner].name.clone(),
                    highest_slot: end - 1,
                    max: max_vertex_attributes,
                });
            }
        }

        let mut stride = 0u32;
        let mut slots = Vec::new();
        let mut pointers = Vec::new();

        for &index in &order {
            let attribute = &schema.attributes[index];
            let kind = attribute.kind;
            for element in 0..attribute.array_length {
                let slot = attribute.slot + element * kind.slot_span();
                slots.push(AttributeSlot {
                    slot,
                    kind,
                    byte_offset: stride,
                    array_index: element,
                    attribute: index,
                });

                // A mat4 is fed as four vec4 rows in consecutive registers.
                let row_size = kind.byte_size() / kind.slot_span();
                for row in 0..kind.slot_span() {
                    pointers.push(AttributePointer {
                        slot: slot + row,
                        components: kind.components_per_slot(),
                        component_type: kind.component_type(),
                        normalize: kind.normalized(),
                        offset: stride + row * row_size,
                    });
                }

                stride += kind.byte_size();
            }
        }

        log::trace!(
            "Derived vertex layout {:?}: stride {}, {} registers",
            schema.label,
            stride,
            pointers.len()
        );

        Ok(Self {
            stride,
            slots,
            pointers,
            label: schema.label.clone(),
        })
    }

    /// Size of one record in bytes.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Attribute elements in ascending slot order.
    pub fn slots(&self) -> &[AttributeSlot] {
        &self.slots
    }

    /// One pointer per consumed attribute register.
    pub fn pointers(&self) -> &[AttributePointer] {
        &self.pointers
    }

    /// Label copied from the schema.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Number of attribute registers consumed.
    pub fn register_count(&self) -> usize {
        self.pointers.len()
    }
}
