//! Reflected uniform table.

use std::collections::HashMap;

use crate::backend::{Driver, RawHandle};
use crate::error::GraphicsError;
use crate::types::UniformType;

/// Where a uniform's values live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniformBinding {
    /// Ordinary uniform: one native location per array element.
    ///
    /// Elements the driver optimized away have no location.
    Locations(Vec<Option<i32>>),
    /// Member of a uniform block.
    Block {
        /// Position of the block in [`UniformTable::blocks`].
        block: usize,
        /// Byte offset of element 0.
        offset: u32,
        /// Bytes between elements.
        array_stride: u32,
    },
}

/// A reflected uniform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDescriptor {
    /// Base name, without any `[0]` suffix.
    pub name: String,
    pub ty: UniformType,
    pub array_length: u32,
    pub binding: UniformBinding,
}

/// A reflected uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockDescriptor {
    pub name: String,
    /// Driver block index, also used as the block's binding point.
    pub index: u32,
    /// Minimum buffer size in bytes.
    pub size: u32,
}

/// Resolved write target for one element of a uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformTarget {
    Location(Option<i32>),
    Block { block: usize, offset: u32 },
}

/// One element of a uniform, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUniform {
    pub name: String,
    pub element: u32,
    pub ty: UniformType,
    pub target: UniformTarget,
}

/// Name-indexed uniforms and uniform blocks of a linked program.
///
/// Lookups accept both `name` and `name[i]`.
#[derive(Debug, Clone, Default)]
pub struct UniformTable {
    uniforms: HashMap<String, UniformDescriptor>,
    blocks: Vec<UniformBlockDescriptor>,
}

impl UniformTable {
    /// Reflect the active uniforms of a linked program.
    pub fn reflect(driver: &dyn Driver, program: RawHandle) -> Result<Self, GraphicsError> {
        let blocks: Vec<UniformBlockDescriptor> = driver
            .active_uniform_blocks(program)
            .into_iter()
            .map(|block| UniformBlockDescriptor {
                name: block.name,
                index: block.index,
                size: block.size,
            })
            .collect();

        let mut uniforms = HashMap::new();
        for active in driver.active_uniforms(program) {
            let name = active
                .name
                .strip_suffix("[0]")
                .unwrap_or(&active.name)
                .to_string();
            let array_length = active.array_length.max(1);

            let binding = match active.block {
                Some(member) => {
                    let block = blocks
                        .iter()
                        .position(|b| b.index == member.block_index)
                        .ok_or_else(|| {
                            GraphicsError::Driver(format!(
                                "uniform `{name}` refers to unknown block {}",
                                member.block_index
                            ))
                        })?;
                    UniformBinding::Block {
                        block,
                        offset: member.offset,
                        array_stride: member.array_stride,
                    }
                }
                None => {
                    let locations = (0..array_length)
                        .map(|i| {
                            let element = if array_length > 1 {
                                format!("{name}[{i}]")
                            } else {
                                name.clone()
                            };
                            driver.uniform_location(program, &element)
                        })
                        .collect();
                    UniformBinding::Locations(locations)
                }
            };

            uniforms.insert(
                name.clone(),
                UniformDescriptor {
                    name,
                    ty: active.ty,
                    array_length,
                    binding,
                },
            );
        }

        Ok(Self { uniforms, blocks })
    }

    /// Look up a uniform by base name.
    pub fn get(&self, name: &str) -> Option<&UniformDescriptor> {
        self.uniforms.get(name)
    }

    /// All uniforms, in no particular order.
    pub fn uniforms(&self) -> impl Iterator<Item = &UniformDescriptor> {
        self.uniforms.values()
    }

    pub fn blocks(&self) -> &[UniformBlockDescriptor] {
        &self.blocks
    }

    /// Look up a block by name.
    pub fn block(&self, name: &str) -> Option<&UniformBlockDescriptor> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn len(&self) -> usize {
        self.uniforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uniforms.is_empty()
    }

    /// Resolve `name` (optionally `name[i]`) to a single element.
    pub fn resolve(&self, name: &str) -> Result<ResolvedUniform, GraphicsError> {
        let (base, element) = split_element(name);
        self.resolve_at(base, element)
    }

    /// Resolve element `element` of the uniform `name`.
    pub fn resolve_at(&self, name: &str, element: u32) -> Result<ResolvedUniform, GraphicsError> {
        let descriptor = self
            .uniforms
            .get(name)
            .ok_or_else(|| GraphicsError::configuration(format!("unknown uniform `{name}`")))?;
        if element >= descriptor.array_length {
            return Err(GraphicsError::configuration(format!(
                "index {element} out of range for uniform `{name}` of length {}",
                descriptor.array_length
            )));
        }

        let target = match &descriptor.binding {
            UniformBinding::Locations(locations) => {
                UniformTarget::Location(locations.get(element as usize).copied().flatten())
            }
            UniformBinding::Block {
                block,
                offset,
                array_stride,
            } => UniformTarget::Block {
                block: *block,
                offset: offset + element * array_stride,
            },
        };

        Ok(ResolvedUniform {
            name: descriptor.name.clone(),
            element,
            ty: descriptor.ty,
            target,
        })
    }
}

/// Split `name[i]` into `("name", i)`. Names without a valid index are
/// returned whole with element 0.
fn split_element(name: &str) -> (&str, u32) {
    name.strip_suffix(']')
        .and_then(|inner| inner.split_once('['))
        .and_then(|(base, index)| Some((base, index.parse().ok()?)))
        .unwrap_or((name, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::types::ShaderStage;

    fn reflect(vertex: &str) -> UniformTable {
        let driver = DummyDriver::new();
        let shader = driver.compile_shader(ShaderStage::Vertex, vertex).unwrap();
        let program = driver.link_program(&[shader]).unwrap();
        UniformTable::reflect(&driver, program).unwrap()
    }

    #[test]
    fn test_split_element() {
        assert_eq!(split_element("lights[2]"), ("lights", 2));
        assert_eq!(split_element("tint"), ("tint", 0));
        assert_eq!(split_element("odd[x]"), ("odd[x]", 0));
    }

    #[test]
    fn test_array_names_are_normalized() {
        let table = reflect("uniform vec3 lights[4];\nuniform float gain;\n");
        let lights = table.get("lights").unwrap();
        assert_eq!(lights.array_length, 4);
        assert_eq!(
            lights.binding,
            UniformBinding::Locations(vec![Some(0), Some(1), Some(2), Some(3)])
        );

        let resolved = table.resolve("lights[3]").unwrap();
        assert_eq!(resolved.target, UniformTarget::Location(Some(3)));
        assert!(table.resolve("lights[4]").is_err());
        assert!(table.resolve_at("gain", 1).is_err());
    }

    #[test]
    fn test_block_members_resolve_to_offsets() {
        let table = reflect(
            "layout(std140) uniform Frame {\n    mat4 view;\n    float weights[3];\n};\n",
        );
        assert_eq!(table.blocks().len(), 1);
        assert_eq!(table.block("Frame").map(|b| b.size), Some(112));

        let resolved = table.resolve_at("weights", 2).unwrap();
        assert_eq!(
            resolved.target,
            UniformTarget::Block {
                block: 0,
                offset: 64 + 2 * 16
            }
        );
    }

    #[test]
    fn test_unknown_uniform() {
        let table = reflect("uniform float gain;");
        assert!(matches!(
            table.resolve("missing"),
            Err(GraphicsError::Configuration(_))
        ));
    }
}
