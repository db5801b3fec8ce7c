//! Linked shader program resource.

use std::rc::Rc;

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, ResourceKind};
use crate::resources::Texture;
use crate::types::{UniformType, UniformValue};

use super::blocks::UniformBlock;
use super::texture_units::{TextureUnitPool, UnitAssignment};
use super::uniforms::{ResolvedUniform, UniformTable, UniformTarget};
use super::{compose, log as compile_log, ProgramSource};

/// A compiled and linked shader program.
///
/// Allocation composes, compiles and links every stage, then reflects the
/// uniform table. Uniform blocks get a staging buffer each, bound at their
/// block index. Sampler uniforms draw texture units from a program-local
/// [`TextureUnitPool`].
///
/// Values set on the program take effect on [`commit`](Self::commit), which
/// [`Geometry::draw`](crate::mesh::Geometry::draw) calls before every draw.
pub struct ShaderProgram {
    context: Rc<GraphicsContext>,
    lifecycle: Lifecycle,
    source: ProgramSource,
    uniforms: UniformTable,
    blocks: Vec<UniformBlock>,
    units: TextureUnitPool,
}

impl ShaderProgram {
    /// Create an unallocated program.
    pub fn new(context: &Rc<GraphicsContext>, source: ProgramSource) -> Self {
        Self {
            context: Rc::clone(context),
            lifecycle: Lifecycle::new(),
            source,
            uniforms: UniformTable::default(),
            blocks: Vec::new(),
            units: TextureUnitPool::new(0),
        }
    }

    /// Create and allocate a program.
    pub fn build(context: &Rc<GraphicsContext>, source: ProgramSource) -> Result<Self, GraphicsError> {
        let mut program = Self::new(context, source);
        program.alloc()?;
        Ok(program)
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// Reflected uniforms. Empty while not allocated.
    pub fn uniforms(&self) -> &UniformTable {
        &self.uniforms
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    /// Look up a uniform block by name.
    pub fn block(&self, name: &str) -> Option<&UniformBlock> {
        self.blocks.iter().find(|block| block.name() == name)
    }

    pub fn texture_units(&self) -> &TextureUnitPool {
        &self.units
    }

    /// Write a non-sampler uniform. `name` may address an element as `name[i]`.
    pub fn set_uniform(
        &mut self,
        name: &str,
        value: impl Into<UniformValue>,
    ) -> Result<(), GraphicsError> {
        self.handle()?;
        let resolved = self.uniforms.resolve(name)?;
        self.write_value(&resolved, value.into())
    }

    /// Write element `index` of a non-sampler uniform.
    pub fn set_uniform_at(
        &mut self,
        name: &str,
        index: u32,
        value: impl Into<UniformValue>,
    ) -> Result<(), GraphicsError> {
        self.handle()?;
        let resolved = self.uniforms.resolve_at(name, index)?;
        self.write_value(&resolved, value.into())
    }

    /// Point a sampler uniform at `texture`, or clear it with `None`.
    ///
    /// Returns the texture unit the sampler now reads from.
    pub fn set_texture(
        &mut self,
        name: &str,
        texture: Option<&Texture>,
    ) -> Result<Option<u32>, GraphicsError> {
        self.handle()?;
        let resolved = self.uniforms.resolve(name)?;
        self.assign_texture(&resolved, texture)
    }

    /// Point element `index` of a sampler array at `texture`.
    pub fn set_texture_at(
        &mut self,
        name: &str,
        index: u32,
        texture: Option<&Texture>,
    ) -> Result<Option<u32>, GraphicsError> {
        self.handle()?;
        let resolved = self.uniforms.resolve_at(name, index)?;
        self.assign_texture(&resolved, texture)
    }

    /// Unit assigned to element `index` of sampler `name`.
    pub fn texture_unit(&self, name: &str, index: u32) -> Option<u32> {
        self.units.unit_of(name, index)
    }

    /// Number of sampler elements sharing `unit`.
    pub fn unit_refcount(&self, unit: u32) -> u32 {
        self.units.unit_refcount(unit)
    }

    /// Make the program current and flush its state for a draw.
    ///
    /// Binds the texture of every occupied unit, uploads uniform blocks and
    /// binds their buffers. Returns the number of uniform bytes uploaded.
    pub fn commit(&mut self) -> Result<usize, GraphicsError> {
        tessera_core::profile_scope!("program_commit");
        let handle = Rc::clone(self.handle()?);
        let context = Rc::clone(&self.context);
        context.use_program(&handle)?;

        for (unit, texture, dimension) in self.units.occupied() {
            match texture.upgrade().filter(|texture| !texture.is_released()) {
                Some(texture) => {
                    context.bind_texture(unit, dimension, &texture)?;
                }
                None => log::warn!(
                    "Texture on unit {unit} of program {} was freed; skipping bind",
                    handle.raw()
                ),
            }
        }

        let persistent = context.config().persistent_uniform_buffers;
        let mut uploaded = 0;
        for block in &mut self.blocks {
            uploaded += block.commit(persistent)?;
            block.bind(&context)?;
        }
        tessera_core::profile_plot!("uniform_bytes_uploaded", uploaded);
        Ok(uploaded)
    }

    fn type_checks(&self) -> bool {
        self.context.config().uniform_type_checks
    }

    fn write_value(
        &mut self,
        resolved: &ResolvedUniform,
        value: UniformValue,
    ) -> Result<(), GraphicsError> {
        let actual = value.uniform_type();
        if resolved.ty.is_sampler() || (self.type_checks() && actual != resolved.ty) {
            return Err(GraphicsError::TypeMismatch {
                uniform: resolved.name.clone(),
                expected: resolved.ty,
                actual,
            });
        }
        match resolved.target {
            UniformTarget::Location(location) => self.write_location(resolved, location, &value),
            UniformTarget::Block { block, offset } => {
                self.blocks[block].write(offset as usize, &value.std140_bytes())
            }
        }
    }

    fn write_location(
        &self,
        resolved: &ResolvedUniform,
        location: Option<i32>,
        value: &UniformValue,
    ) -> Result<(), GraphicsError> {
        let Some(location) = location else {
            log::trace!(
                "Uniform `{}[{}]` has no location; write dropped",
                resolved.name,
                resolved.element
            );
            return Ok(());
        };
        self.context.use_program(self.handle()?)?;
        self.context.driver().set_uniform(location, value);
        Ok(())
    }

    fn assign_texture(
        &mut self,
        resolved: &ResolvedUniform,
        texture: Option<&Texture>,
    ) -> Result<Option<u32>, GraphicsError> {
        let Some(expected) = resolved.ty.texture_dimension() else {
            return Err(GraphicsError::TypeMismatch {
                uniform: resolved.name.clone(),
                expected: resolved.ty,
                actual: texture.map_or(UniformType::Sampler2D, |t| {
                    UniformType::sampler_for(t.dimension())
                }),
            });
        };

        let native = match texture {
            Some(texture) => {
                if self.type_checks() && texture.dimension() != expected {
                    return Err(GraphicsError::TypeMismatch {
                        uniform: resolved.name.clone(),
                        expected: resolved.ty,
                        actual: UniformType::sampler_for(texture.dimension()),
                    });
                }
                Some((Rc::clone(texture.handle()?), texture.dimension()))
            }
            None => None,
        };

        let assignment = self.units.assign(
            &resolved.name,
            resolved.element,
            native.as_ref().map(|(handle, dimension)| (handle, *dimension)),
        )?;

        match assignment {
            UnitAssignment::Unchanged(unit) => Ok(Some(unit)),
            UnitAssignment::Cleared => Ok(None),
            UnitAssignment::Assigned(unit) => {
                let value = UniformValue::Int(unit as i32);
                match resolved.target {
                    UniformTarget::Location(location) => {
                        self.write_location(resolved, location, &value)?
                    }
                    UniformTarget::Block { block, offset } => {
                        self.blocks[block].write(offset as usize, &value.std140_bytes())?
                    }
                }
                log::trace!(
                    "Sampler `{}[{}]` reads texture unit {unit}",
                    resolved.name,
                    resolved.element
                );
                Ok(Some(unit))
            }
        }
    }

    fn compile_stages(&self) -> Result<Vec<RawHandle>, GraphicsError> {
        let driver = self.context.driver();
        let mut shaders = Vec::new();
        for (stage, source) in self.source.stages() {
            let compiled = compose(source, stage).and_then(|composed| {
                driver
                    .compile_shader(stage, &composed)
                    .map_err(|log| GraphicsError::Compile {
                        stage,
                        log: compile_log::annotate(&log, &composed),
                    })
            });
            match compiled {
                Ok(shader) => shaders.push(shader),
                Err(err) => {
                    for shader in shaders {
                        driver.delete_shader(shader);
                    }
                    return Err(err);
                }
            }
        }
        Ok(shaders)
    }
}

impl GpuResource for ShaderProgram {
    fn context(&self) -> &Rc<GraphicsContext> {
        &self.context
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Program
    }

    fn label(&self) -> Option<&str> {
        self.source.label()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        tessera_core::profile_scope!("program_link");
        self.source.validate()?;
        let shaders = self.compile_stages()?;

        let driver = self.context.driver();
        let linked = driver.link_program(&shaders);
        for shader in shaders {
            driver.delete_shader(shader);
        }
        linked.map_err(|log| GraphicsError::Link { log })
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        let raw = self.raw()?;
        let uniforms = UniformTable::reflect(self.context.driver(), raw)?;

        let bindings = self.context.uniform_block_cache().len();
        let mut blocks = Vec::with_capacity(uniforms.blocks().len());
        for descriptor in uniforms.blocks() {
            if descriptor.index as usize >= bindings {
                return Err(GraphicsError::capacity(format!(
                    "uniform block `{}` needs binding {}, device has {bindings}",
                    descriptor.name, descriptor.index
                )));
            }
            self.context
                .driver()
                .uniform_block_binding(raw, descriptor.index, descriptor.index);
            let mut block = UniformBlock::new(&self.context, descriptor.clone());
            block.alloc()?;
            blocks.push(block);
        }

        log::debug!(
            "Program {raw} reflects {} uniforms in {} blocks",
            uniforms.len(),
            blocks.len()
        );
        self.uniforms = uniforms;
        self.blocks = blocks;
        self.units = TextureUnitPool::new(self.context.texture_unit_capacity());
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.blocks.clear();
        self.uniforms = UniformTable::default();
        self.units.clear();
        self.context.driver().delete_program(raw);
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("label", &self.source.label())
            .field("uniforms", &self.uniforms.len())
            .field("blocks", &self.blocks.len())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

static_assertions::assert_not_impl_any!(ShaderProgram: Send, Sync);
