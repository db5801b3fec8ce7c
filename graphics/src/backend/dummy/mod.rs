//! Dummy driver for testing and development.
//!
//! This driver doesn't talk to a GPU but simulates the state an OpenGL
//! context would hold: object names (reused after deletion), buffer contents,
//! texture units, vertex array state, program reflection and uniform values.
//! Every call is counted in [`DriverStats`] so tests can verify that redundant
//! binds and uploads are skipped.

mod glsl;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use tessera_core::mesh::{AttributePointer, IndexFormat, PrimitiveTopology};

use crate::error::GraphicsError;
use crate::types::{
    Attachment, BufferTarget, ClearFlags, FilterMode, ShaderStage, TextureDescriptor,
    TextureDimension, UniformValue, UsageHint, WrapMode,
};

use super::{
    ActiveUniform, ActiveUniformBlock, BlockMemberInfo, DeviceCapabilities, Driver, RawHandle,
};

/// Native call counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Objects of any kind created.
    pub objects_created: usize,
    /// Objects of any kind deleted.
    pub objects_deleted: usize,
    /// Non-indexed buffer binds.
    pub buffer_binds: usize,
    /// Indexed uniform buffer binds.
    pub uniform_buffer_binds: usize,
    /// Vertex array binds, including unbinds.
    pub vertex_array_binds: usize,
    /// Texture binds, including unbinds.
    pub texture_binds: usize,
    /// Active texture unit switches.
    pub active_texture_calls: usize,
    /// Program switches, including unbinds.
    pub program_binds: usize,
    /// Framebuffer binds, including unbinds.
    pub framebuffer_binds: usize,
    /// Ordinary uniform writes.
    pub uniform_writes: usize,
    /// Buffer and texture data uploads.
    pub upload_calls: usize,
    /// Bytes written by uploads.
    pub bytes_uploaded: usize,
    /// Draw calls of either kind.
    pub draw_calls: usize,
    /// Patch size changes.
    pub patch_size_calls: usize,
}

impl DriverStats {
    /// Sum of every bind counter.
    pub fn total_binds(&self) -> usize {
        self.buffer_binds
            + self.uniform_buffer_binds
            + self.vertex_array_binds
            + self.texture_binds
            + self.program_binds
            + self.framebuffer_binds
    }
}

/// A recorded draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// First index (indexed draws) or first vertex.
    pub first: u32,
    /// Number of indices or vertices.
    pub count: u32,
    /// Index format for indexed draws.
    pub index_format: Option<IndexFormat>,
    /// Program in use.
    pub program: Option<RawHandle>,
    /// Vertex array bound.
    pub vertex_array: Option<RawHandle>,
    /// Patch size in effect.
    pub patch_vertices: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ObjectKind {
    Buffer,
    VertexArray,
    Texture,
    Framebuffer,
    Shader,
    Program,
}

/// Hands out the lowest free name, like most GL implementations.
#[derive(Debug, Default)]
struct NameAllocator {
    next: u32,
    free: BTreeSet<u32>,
}

impl NameAllocator {
    fn allocate(&mut self) -> u32 {
        if let Some(name) = self.free.pop_first() {
            return name;
        }
        self.next += 1;
        self.next
    }

    fn release(&mut self, name: u32) {
        self.free.insert(name);
    }
}

#[derive(Debug, Default)]
struct VertexArrayState {
    element_buffer: Option<u32>,
    attributes: BTreeMap<u32, (AttributePointer, u32)>,
    enabled: BTreeSet<u32>,
}

#[derive(Debug, Default)]
struct TextureState {
    descriptor: Option<TextureDescriptor>,
    pixels: Vec<u8>,
    filter: FilterMode,
    wrap: WrapMode,
}

#[derive(Debug, Default)]
struct FramebufferState {
    attachments: HashMap<Attachment, u32>,
    draw_buffers: Vec<Option<u32>>,
}

#[derive(Debug)]
struct ShaderState {
    declarations: glsl::Declarations,
}

#[derive(Debug, Default)]
struct ProgramState {
    uniforms: Vec<ActiveUniform>,
    blocks: Vec<ActiveUniformBlock>,
    locations: HashMap<String, (i32, u32)>,
    block_bindings: HashMap<u32, u32>,
}

#[derive(Debug, Default)]
struct State {
    names: HashMap<ObjectKind, NameAllocator>,
    fail_next_creation: bool,

    buffers: HashMap<u32, Vec<u8>>,
    buffer_bindings: HashMap<BufferTarget, u32>,
    uniform_bindings: BTreeMap<u32, u32>,

    vertex_arrays: HashMap<u32, VertexArrayState>,
    current_vertex_array: Option<u32>,

    textures: HashMap<u32, TextureState>,
    active_unit: u32,
    texture_units: BTreeMap<u32, u32>,

    framebuffers: HashMap<u32, FramebufferState>,
    current_framebuffer: Option<u32>,
    clears: usize,

    shaders: HashMap<u32, ShaderState>,
    programs: HashMap<u32, ProgramState>,
    current_program: Option<u32>,
    uniform_values: HashMap<(u32, i32), UniformValue>,

    patch_vertices: u32,
    draws: Vec<DrawCall>,
    stats: DriverStats,
}

impl State {
    fn create(&mut self, kind: ObjectKind) -> Result<RawHandle, GraphicsError> {
        if std::mem::take(&mut self.fail_next_creation) {
            return Err(GraphicsError::Driver(format!(
                "DummyDriver: out of {kind:?} names"
            )));
        }
        let name = self.names.entry(kind).or_default().allocate();
        self.stats.objects_created += 1;
        log::trace!("DummyDriver: created {kind:?} #{name}");
        RawHandle::new(name)
            .ok_or_else(|| GraphicsError::Driver("DummyDriver: name 0 allocated".into()))
    }

    fn delete(&mut self, kind: ObjectKind, name: u32) {
        self.names.entry(kind).or_default().release(name);
        self.stats.objects_deleted += 1;
        log::trace!("DummyDriver: deleted {kind:?} #{name}");
    }

    fn bound_buffer(&self, target: BufferTarget) -> Option<u32> {
        match (target, self.current_vertex_array) {
            (BufferTarget::ElementArray, Some(vao)) => self
                .vertex_arrays
                .get(&vao)
                .and_then(|state| state.element_buffer),
            _ => self.buffer_bindings.get(&target).copied(),
        }
    }

    fn bound_texture(&self) -> Option<u32> {
        self.texture_units.get(&self.active_unit).copied()
    }
}

/// Software driver simulating an OpenGL 4.x context.
///
/// # Example
///
/// ```ignore
/// let driver = Rc::new(DummyDriver::new());
/// let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
/// // ... use ctx ...
/// assert_eq!(driver.stats().vertex_array_binds, 1);
/// ```
#[derive(Debug)]
pub struct DummyDriver {
    capabilities: DeviceCapabilities,
    state: RefCell<State>,
}

impl Default for DummyDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyDriver {
    /// Create a dummy driver reporting the OpenGL 4.x minimum limits.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Create a dummy driver reporting custom limits.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            state: RefCell::new(State::default()),
        }
    }

    /// Get a snapshot of the call counters.
    pub fn stats(&self) -> DriverStats {
        self.state.borrow().stats.clone()
    }

    /// Reset the call counters and the recorded draw calls.
    pub fn reset_stats(&self) {
        let mut state = self.state.borrow_mut();
        state.stats = DriverStats::default();
        state.draws.clear();
    }

    /// Make the next object creation fail with a driver error.
    pub fn fail_next_creation(&self) {
        self.state.borrow_mut().fail_next_creation = true;
    }

    /// Number of objects currently alive, across all kinds.
    pub fn live_objects(&self) -> usize {
        let state = self.state.borrow();
        state.stats.objects_created - state.stats.objects_deleted
    }

    /// Contents of a buffer, if it exists.
    pub fn buffer_contents(&self, buffer: RawHandle) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer.get()).cloned()
    }

    /// Base-level pixels of a texture, if it exists.
    pub fn texture_pixels(&self, texture: RawHandle) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .textures
            .get(&texture.get())
            .map(|t| t.pixels.clone())
    }

    /// Filter and wrap parameters of a texture, if it exists.
    pub fn texture_sampling(&self, texture: RawHandle) -> Option<(FilterMode, WrapMode)> {
        self.state
            .borrow()
            .textures
            .get(&texture.get())
            .map(|t| (t.filter, t.wrap))
    }

    /// Texture bound on a unit.
    pub fn texture_on_unit(&self, unit: u32) -> Option<RawHandle> {
        self.state
            .borrow()
            .texture_units
            .get(&unit)
            .copied()
            .and_then(RawHandle::new)
    }

    /// Buffer bound to an indexed uniform binding point.
    pub fn uniform_buffer_binding(&self, index: u32) -> Option<RawHandle> {
        self.state
            .borrow()
            .uniform_bindings
            .get(&index)
            .copied()
            .and_then(RawHandle::new)
    }

    /// Binding point assigned to a program's uniform block.
    pub fn block_binding(&self, program: RawHandle, block_index: u32) -> Option<u32> {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .and_then(|p| p.block_bindings.get(&block_index).copied())
    }

    /// Last value written to an ordinary uniform.
    pub fn uniform_value(&self, program: RawHandle, location: i32) -> Option<UniformValue> {
        self.state
            .borrow()
            .uniform_values
            .get(&(program.get(), location))
            .copied()
    }

    /// Enabled attribute pointers recorded in a vertex array, with their
    /// strides, by slot.
    pub fn vertex_array_attributes(&self, vertex_array: RawHandle) -> Vec<(AttributePointer, u32)> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array.get())
            .map(|vao| {
                vao.attributes
                    .iter()
                    .filter(|(slot, _)| vao.enabled.contains(slot))
                    .map(|(_, attribute)| *attribute)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Index buffer recorded in a vertex array.
    pub fn vertex_array_index_buffer(&self, vertex_array: RawHandle) -> Option<RawHandle> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array.get())
            .and_then(|vao| vao.element_buffer)
            .and_then(RawHandle::new)
    }

    /// Texture attached to a framebuffer attachment point.
    pub fn framebuffer_attachment(
        &self,
        framebuffer: RawHandle,
        attachment: Attachment,
    ) -> Option<RawHandle> {
        self.state
            .borrow()
            .framebuffers
            .get(&framebuffer.get())
            .and_then(|fb| fb.attachments.get(&attachment).copied())
            .and_then(RawHandle::new)
    }

    /// Draw buffers selected on a framebuffer, indexed by fragment output.
    pub fn framebuffer_draw_buffers(&self, framebuffer: RawHandle) -> Vec<Option<u32>> {
        self.state
            .borrow()
            .framebuffers
            .get(&framebuffer.get())
            .map(|fb| fb.draw_buffers.clone())
            .unwrap_or_default()
    }

    /// Number of clear calls issued.
    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    /// Program currently in use.
    pub fn current_program(&self) -> Option<RawHandle> {
        self.state.borrow().current_program.and_then(RawHandle::new)
    }

    /// Vertex array currently bound.
    pub fn current_vertex_array(&self) -> Option<RawHandle> {
        self.state
            .borrow()
            .current_vertex_array
            .and_then(RawHandle::new)
    }

    /// Framebuffer currently bound.
    pub fn current_framebuffer(&self) -> Option<RawHandle> {
        self.state
            .borrow()
            .current_framebuffer
            .and_then(RawHandle::new)
    }

    /// Draw calls recorded since the last reset.
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }
}

fn name_of(handle: Option<RawHandle>) -> Option<u32> {
    handle.map(|h| h.get())
}

impl Driver for DummyDriver {
    fn name(&self) -> &str {
        "Dummy"
    }

    fn query_capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    // --- Buffers ---

    fn create_buffer(&self) -> Result<RawHandle, GraphicsError> {
        let mut state = self.state.borrow_mut();
        let handle = state.create(ObjectKind::Buffer)?;
        state.buffers.insert(handle.get(), Vec::new());
        Ok(handle)
    }

    fn delete_buffer(&self, buffer: RawHandle) {
        let mut state = self.state.borrow_mut();
        let name = buffer.get();
        if state.buffers.remove(&name).is_none() {
            log::error!("DummyDriver: delete of unknown buffer {buffer}");
            return;
        }
        state.buffer_bindings.retain(|_, bound| *bound != name);
        state.uniform_bindings.retain(|_, bound| *bound != name);
        for vao in state.vertex_arrays.values_mut() {
            if vao.element_buffer == Some(name) {
                vao.element_buffer = None;
            }
        }
        state.delete(ObjectKind::Buffer, name);
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.buffer_binds += 1;
        let name = name_of(buffer);
        if let Some(name) = name {
            if !state.buffers.contains_key(&name) {
                log::error!("DummyDriver: bind of deleted buffer #{name}");
                return;
            }
        }
        log::trace!("DummyDriver: bind {target:?} buffer {name:?}");

        match (target, state.current_vertex_array) {
            (BufferTarget::ElementArray, Some(vao)) => {
                if let Some(vao) = state.vertex_arrays.get_mut(&vao) {
                    vao.element_buffer = name;
                }
            }
            _ => match name {
                Some(name) => {
                    state.buffer_bindings.insert(target, name);
                }
                None => {
                    state.buffer_bindings.remove(&target);
                }
            },
        }
    }

    fn buffer_storage(&self, target: BufferTarget, size: usize, usage: UsageHint) {
        let mut state = self.state.borrow_mut();
        let Some(name) = state.bound_buffer(target) else {
            log::error!("DummyDriver: buffer storage with no {target:?} buffer bound");
            return;
        };
        log::trace!("DummyDriver: reserve {size} bytes ({usage:?}) for buffer #{name}");
        if let Some(data) = state.buffers.get_mut(&name) {
            *data = vec![0; size];
        }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let Some(name) = state.bound_buffer(target) else {
            log::error!("DummyDriver: buffer upload with no {target:?} buffer bound");
            return;
        };
        let Some(contents) = state.buffers.get_mut(&name) else {
            log::error!("DummyDriver: upload into deleted buffer #{name}");
            return;
        };
        let end = offset + data.len();
        if end > contents.len() {
            log::error!(
                "DummyDriver: upload of {}..{} exceeds buffer #{name} storage of {} bytes",
                offset,
                end,
                contents.len()
            );
            return;
        }
        contents[offset..end].copy_from_slice(data);
        state.stats.upload_calls += 1;
        state.stats.bytes_uploaded += data.len();
    }

    fn bind_buffer_base(&self, index: u32, buffer: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.uniform_buffer_binds += 1;
        match name_of(buffer) {
            Some(name) => {
                state.uniform_bindings.insert(index, name);
                state.buffer_bindings.insert(BufferTarget::Uniform, name);
            }
            None => {
                state.uniform_bindings.remove(&index);
            }
        }
    }

    // --- Vertex arrays ---

    fn create_vertex_array(&self) -> Result<RawHandle, GraphicsError> {
        let mut state = self.state.borrow_mut();
        let handle = state.create(ObjectKind::VertexArray)?;
        state
            .vertex_arrays
            .insert(handle.get(), VertexArrayState::default());
        Ok(handle)
    }

    fn delete_vertex_array(&self, vertex_array: RawHandle) {
        let mut state = self.state.borrow_mut();
        let name = vertex_array.get();
        if state.vertex_arrays.remove(&name).is_none() {
            log::error!("DummyDriver: delete of unknown vertex array {vertex_array}");
            return;
        }
        if state.current_vertex_array == Some(name) {
            state.current_vertex_array = None;
        }
        state.delete(ObjectKind::VertexArray, name);
    }

    fn bind_vertex_array(&self, vertex_array: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.vertex_array_binds += 1;
        let name = name_of(vertex_array);
        if let Some(name) = name {
            if !state.vertex_arrays.contains_key(&name) {
                log::error!("DummyDriver: bind of deleted vertex array #{name}");
                return;
            }
        }
        state.current_vertex_array = name;
    }

    fn enable_vertex_attribute(&self, slot: u32) {
        let mut state = self.state.borrow_mut();
        let Some(current) = state.current_vertex_array else {
            log::error!("DummyDriver: enable attribute {slot} with no vertex array bound");
            return;
        };
        if let Some(vao) = state.vertex_arrays.get_mut(&current) {
            vao.enabled.insert(slot);
        }
    }

    fn vertex_attribute_pointer(&self, pointer: &AttributePointer, stride: u32) {
        let mut state = self.state.borrow_mut();
        if state.bound_buffer(BufferTarget::Array).is_none() {
            log::error!("DummyDriver: attribute pointer with no array buffer bound");
        }
        let Some(current) = state.current_vertex_array else {
            log::error!(
                "DummyDriver: attribute pointer for slot {} with no vertex array bound",
                pointer.slot
            );
            return;
        };
        if let Some(vao) = state.vertex_arrays.get_mut(&current) {
            vao.attributes.insert(pointer.slot, (*pointer, stride));
        }
    }

    // --- Textures ---

    fn create_texture(&self) -> Result<RawHandle, GraphicsError> {
        let mut state = self.state.borrow_mut();
        let handle = state.create(ObjectKind::Texture)?;
        state.textures.insert(handle.get(), TextureState::default());
        Ok(handle)
    }

    fn delete_texture(&self, texture: RawHandle) {
        let mut state = self.state.borrow_mut();
        let name = texture.get();
        if state.textures.remove(&name).is_none() {
            log::error!("DummyDriver: delete of unknown texture {texture}");
            return;
        }
        state.texture_units.retain(|_, bound| *bound != name);
        for fb in state.framebuffers.values_mut() {
            fb.attachments.retain(|_, attached| *attached != name);
        }
        state.delete(ObjectKind::Texture, name);
    }

    fn active_texture_unit(&self, unit: u32) {
        let mut state = self.state.borrow_mut();
        state.stats.active_texture_calls += 1;
        if unit >= self.capabilities.max_texture_units {
            log::error!("DummyDriver: texture unit {unit} out of range");
            return;
        }
        state.active_unit = unit;
    }

    fn bind_texture(&self, dimension: TextureDimension, texture: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.texture_binds += 1;
        let unit = state.active_unit;
        match name_of(texture) {
            Some(name) => {
                if !state.textures.contains_key(&name) {
                    log::error!("DummyDriver: bind of deleted texture #{name}");
                    return;
                }
                log::trace!("DummyDriver: bind {dimension:?} texture #{name} to unit {unit}");
                state.texture_units.insert(unit, name);
            }
            None => {
                state.texture_units.remove(&unit);
            }
        }
    }

    fn texture_storage(&self, descriptor: &TextureDescriptor) {
        let mut state = self.state.borrow_mut();
        let Some(name) = state.bound_texture() else {
            log::error!("DummyDriver: texture storage with no texture bound");
            return;
        };
        if let Some(texture) = state.textures.get_mut(&name) {
            texture.pixels = vec![0; descriptor.base_level_size()];
            texture.descriptor = Some(descriptor.clone());
        }
    }

    fn texture_sub_image(&self, descriptor: &TextureDescriptor, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let Some(name) = state.bound_texture() else {
            log::error!("DummyDriver: texture upload with no texture bound");
            return;
        };
        let Some(texture) = state.textures.get_mut(&name) else {
            return;
        };
        if texture.descriptor.as_ref() != Some(descriptor) {
            log::error!("DummyDriver: texture #{name} upload without matching storage");
            return;
        }
        let len = data.len().min(texture.pixels.len());
        texture.pixels[..len].copy_from_slice(&data[..len]);
        state.stats.upload_calls += 1;
        state.stats.bytes_uploaded += len;
    }

    fn texture_parameters(&self, _dimension: TextureDimension, filter: FilterMode, wrap: WrapMode) {
        let mut state = self.state.borrow_mut();
        let Some(name) = state.bound_texture() else {
            log::error!("DummyDriver: texture parameters with no texture bound");
            return;
        };
        if let Some(texture) = state.textures.get_mut(&name) {
            texture.filter = filter;
            texture.wrap = wrap;
        }
    }

    // --- Framebuffers ---

    fn create_framebuffer(&self) -> Result<RawHandle, GraphicsError> {
        let mut state = self.state.borrow_mut();
        let handle = state.create(ObjectKind::Framebuffer)?;
        state
            .framebuffers
            .insert(handle.get(), FramebufferState::default());
        Ok(handle)
    }

    fn delete_framebuffer(&self, framebuffer: RawHandle) {
        let mut state = self.state.borrow_mut();
        let name = framebuffer.get();
        if state.framebuffers.remove(&name).is_none() {
            log::error!("DummyDriver: delete of unknown framebuffer {framebuffer}");
            return;
        }
        if state.current_framebuffer == Some(name) {
            state.current_framebuffer = None;
        }
        state.delete(ObjectKind::Framebuffer, name);
    }

    fn bind_framebuffer(&self, framebuffer: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.framebuffer_binds += 1;
        let name = name_of(framebuffer);
        if let Some(name) = name {
            if !state.framebuffers.contains_key(&name) {
                log::error!("DummyDriver: bind of deleted framebuffer #{name}");
                return;
            }
        }
        state.current_framebuffer = name;
    }

    fn framebuffer_texture(&self, attachment: Attachment, texture: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        let Some(current) = state.current_framebuffer else {
            log::error!("DummyDriver: attachment {attachment:?} with the default framebuffer bound");
            return;
        };
        let Some(fb) = state.framebuffers.get_mut(&current) else {
            return;
        };
        match name_of(texture) {
            Some(name) => {
                fb.attachments.insert(attachment, name);
            }
            None => {
                fb.attachments.remove(&attachment);
            }
        }
    }

    fn draw_buffers(&self, outputs: &[Option<u32>]) {
        let mut state = self.state.borrow_mut();
        if let Some(current) = state.current_framebuffer {
            if let Some(fb) = state.framebuffers.get_mut(&current) {
                fb.draw_buffers = outputs.to_vec();
            }
        }
    }

    fn framebuffer_complete(&self) -> bool {
        let state = self.state.borrow();
        let Some(fb) = state
            .current_framebuffer
            .and_then(|current| state.framebuffers.get(&current))
        else {
            return true;
        };
        !fb.attachments.is_empty()
            && fb.attachments.values().all(|texture| {
                state
                    .textures
                    .get(texture)
                    .is_some_and(|t| t.descriptor.is_some())
            })
    }

    fn clear(&self, flags: ClearFlags, color: [f32; 4], depth: f32) {
        let mut state = self.state.borrow_mut();
        log::trace!("DummyDriver: clear {flags:?} color {color:?} depth {depth}");
        state.clears += 1;
    }

    // --- Shaders ---

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<RawHandle, String> {
        if let Some(log) = glsl::error_directives(source) {
            return Err(log);
        }
        let mut state = self.state.borrow_mut();
        let handle = state
            .create(ObjectKind::Shader)
            .map_err(|err| err.to_string())?;
        log::trace!("DummyDriver: compiled {stage} shader {handle}");
        state.shaders.insert(
            handle.get(),
            ShaderState {
                declarations: glsl::scan(source),
            },
        );
        Ok(handle)
    }

    fn delete_shader(&self, shader: RawHandle) {
        let mut state = self.state.borrow_mut();
        if state.shaders.remove(&shader.get()).is_none() {
            log::error!("DummyDriver: delete of unknown shader {shader}");
            return;
        }
        state.delete(ObjectKind::Shader, shader.get());
    }

    fn link_program(&self, shaders: &[RawHandle]) -> Result<RawHandle, String> {
        if shaders.is_empty() {
            return Err("error: no shaders attached to program".into());
        }

        let mut state = self.state.borrow_mut();
        let mut uniforms: Vec<glsl::Declared> = Vec::new();
        let mut blocks: Vec<glsl::DeclaredBlock> = Vec::new();

        for shader in shaders {
            let Some(compiled) = state.shaders.get(&shader.get()) else {
                return Err(format!("error: shader {shader} is not a compiled shader"));
            };
            for uniform in &compiled.declarations.uniforms {
                match uniforms.iter().find(|u| u.name == uniform.name) {
                    Some(existing) if existing != uniform => {
                        return Err(format!(
                            "error: uniform `{}` declared as {} and {}",
                            uniform.name, existing.ty, uniform.ty
                        ));
                    }
                    Some(_) => {}
                    None => uniforms.push(uniform.clone()),
                }
            }
            for block in &compiled.declarations.blocks {
                match blocks.iter().find(|b| b.name == block.name) {
                    Some(existing) if existing != block => {
                        return Err(format!(
                            "error: uniform block `{}` declared with different members",
                            block.name
                        ));
                    }
                    Some(_) => {}
                    None => blocks.push(block.clone()),
                }
            }
        }

        let mut program = ProgramState::default();
        let mut next_location = 0i32;
        for uniform in &uniforms {
            let reported = if uniform.array_length > 1 {
                format!("{}[0]", uniform.name)
            } else {
                uniform.name.clone()
            };
            program.locations.insert(
                uniform.name.clone(),
                (next_location, uniform.array_length),
            );
            next_location += uniform.array_length as i32;
            program.uniforms.push(ActiveUniform {
                name: reported,
                ty: uniform.ty,
                array_length: uniform.array_length,
                block: None,
            });
        }

        for (index, block) in blocks.iter().enumerate() {
            let layout = glsl::std140_layout(&block.members);
            for (member, (offset, array_stride)) in block.members.iter().zip(&layout.members) {
                let reported = if member.array_length > 1 {
                    format!("{}[0]", member.name)
                } else {
                    member.name.clone()
                };
                program.uniforms.push(ActiveUniform {
                    name: reported,
                    ty: member.ty,
                    array_length: member.array_length,
                    block: Some(BlockMemberInfo {
                        block_index: index as u32,
                        offset: *offset,
                        array_stride: *array_stride,
                    }),
                });
            }
            program.blocks.push(ActiveUniformBlock {
                name: block.name.clone(),
                index: index as u32,
                size: layout.size,
            });
        }

        let handle = state
            .create(ObjectKind::Program)
            .map_err(|err| err.to_string())?;
        log::trace!(
            "DummyDriver: linked program {handle} ({} uniforms, {} blocks)",
            program.uniforms.len(),
            program.blocks.len()
        );
        state.programs.insert(handle.get(), program);
        Ok(handle)
    }

    fn delete_program(&self, program: RawHandle) {
        let mut state = self.state.borrow_mut();
        let name = program.get();
        if state.programs.remove(&name).is_none() {
            log::error!("DummyDriver: delete of unknown program {program}");
            return;
        }
        if state.current_program == Some(name) {
            state.current_program = None;
        }
        state.uniform_values.retain(|(owner, _), _| *owner != name);
        state.delete(ObjectKind::Program, name);
    }

    fn use_program(&self, program: Option<RawHandle>) {
        let mut state = self.state.borrow_mut();
        state.stats.program_binds += 1;
        let name = name_of(program);
        if let Some(name) = name {
            if !state.programs.contains_key(&name) {
                log::error!("DummyDriver: use of deleted program #{name}");
                return;
            }
        }
        state.current_program = name;
    }

    fn active_uniforms(&self, program: RawHandle) -> Vec<ActiveUniform> {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .map(|p| p.uniforms.clone())
            .unwrap_or_default()
    }

    fn active_uniform_blocks(&self, program: RawHandle) -> Vec<ActiveUniformBlock> {
        self.state
            .borrow()
            .programs
            .get(&program.get())
            .map(|p| p.blocks.clone())
            .unwrap_or_default()
    }

    fn uniform_location(&self, program: RawHandle, name: &str) -> Option<i32> {
        let state = self.state.borrow();
        let program = state.programs.get(&program.get())?;
        let (base, element) = match name.strip_suffix(']').and_then(|n| n.split_once('[')) {
            Some((base, index)) => (base, index.parse::<u32>().ok()?),
            None => (name, 0),
        };
        let (location, length) = program.locations.get(base)?;
        (element < *length).then_some(location + element as i32)
    }

    fn uniform_block_binding(&self, program: RawHandle, block_index: u32, binding: u32) {
        let mut state = self.state.borrow_mut();
        if binding >= self.capabilities.max_uniform_buffer_bindings {
            log::error!("DummyDriver: uniform buffer binding {binding} out of range");
            return;
        }
        if let Some(program) = state.programs.get_mut(&program.get()) {
            program.block_bindings.insert(block_index, binding);
        }
    }

    fn set_uniform(&self, location: i32, value: &UniformValue) {
        let mut state = self.state.borrow_mut();
        let Some(program) = state.current_program else {
            log::error!("DummyDriver: uniform write at location {location} with no program in use");
            return;
        };
        state.stats.uniform_writes += 1;
        state.uniform_values.insert((program, location), *value);
    }

    // --- Drawing ---

    fn set_patch_vertices(&self, count: u32) {
        let mut state = self.state.borrow_mut();
        state.stats.patch_size_calls += 1;
        if count == 0 || count > self.capabilities.max_patch_vertices {
            log::error!("DummyDriver: invalid patch size {count}");
            return;
        }
        state.patch_vertices = count;
    }

    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
    ) {
        let mut state = self.state.borrow_mut();
        if state.bound_buffer(BufferTarget::ElementArray).is_none() {
            log::error!("DummyDriver: indexed draw with no index buffer bound");
        }
        let call = DrawCall {
            topology,
            first: (byte_offset / format.size()) as u32,
            count,
            index_format: Some(format),
            program: state.current_program.and_then(RawHandle::new),
            vertex_array: state.current_vertex_array.and_then(RawHandle::new),
            patch_vertices: state.patch_vertices,
        };
        state.stats.draw_calls += 1;
        state.draws.push(call);
    }

    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32) {
        let mut state = self.state.borrow_mut();
        let call = DrawCall {
            topology,
            first,
            count,
            index_format: None,
            program: state.current_program.and_then(RawHandle::new),
            vertex_array: state.current_vertex_array.and_then(RawHandle::new),
            patch_vertices: state.patch_vertices,
        };
        state.stats.draw_calls += 1;
        state.draws.push(call);
    }
}
