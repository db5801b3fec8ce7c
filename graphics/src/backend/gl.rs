//! OpenGL 4.x driver built on `glow`.
//!
//! The caller owns the GL context and must keep it current on the thread that
//! uses the [`GraphicsContext`](crate::GraphicsContext) for as long as the
//! driver lives.

use glow::HasContext;

use tessera_core::mesh::{AttributePointer, ComponentType, IndexFormat, PrimitiveTopology};

use crate::error::GraphicsError;
use crate::types::{
    Attachment, BufferTarget, ClearFlags, FilterMode, ShaderStage, TextureDescriptor,
    TextureDimension, TextureFormat, UniformType, UniformValue, UsageHint, WrapMode,
};

use super::{
    ActiveUniform, ActiveUniformBlock, BlockMemberInfo, DeviceCapabilities, Driver, RawHandle,
};

/// Driver issuing real OpenGL calls.
pub struct GlDriver {
    gl: glow::Context,
}

impl std::fmt::Debug for GlDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDriver").finish_non_exhaustive()
    }
}

impl GlDriver {
    /// Wrap a loaded GL context.
    pub fn new(gl: glow::Context) -> Self {
        log::info!("OpenGL driver: {}", unsafe {
            gl.get_parameter_string(glow::RENDERER)
        });
        Self { gl }
    }

    /// Access the underlying context.
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

fn raw_of(name: std::num::NonZeroU32) -> RawHandle {
    RawHandle(name)
}

fn buffer(handle: RawHandle) -> glow::NativeBuffer {
    glow::NativeBuffer(handle.non_zero())
}

fn texture(handle: RawHandle) -> glow::NativeTexture {
    glow::NativeTexture(handle.non_zero())
}

fn program(handle: RawHandle) -> glow::NativeProgram {
    glow::NativeProgram(handle.non_zero())
}

fn shader(handle: RawHandle) -> glow::NativeShader {
    glow::NativeShader(handle.non_zero())
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
        BufferTarget::Uniform => glow::UNIFORM_BUFFER,
    }
}

fn usage(hint: UsageHint) -> u32 {
    match hint {
        UsageHint::Static => glow::STATIC_DRAW,
        UsageHint::Dynamic => glow::DYNAMIC_DRAW,
        UsageHint::Stream => glow::STREAM_DRAW,
    }
}

fn texture_target(dimension: TextureDimension) -> u32 {
    match dimension {
        TextureDimension::D2 => glow::TEXTURE_2D,
        TextureDimension::D3 => glow::TEXTURE_3D,
        TextureDimension::Cube => glow::TEXTURE_CUBE_MAP,
        TextureDimension::D2Array => glow::TEXTURE_2D_ARRAY,
    }
}

/// Wrap parameters that apply to a texture target.
fn wrap_axes(dimension: TextureDimension) -> &'static [u32] {
    match dimension {
        TextureDimension::D3 | TextureDimension::Cube => {
            &[glow::TEXTURE_WRAP_S, glow::TEXTURE_WRAP_T, glow::TEXTURE_WRAP_R]
        }
        TextureDimension::D2 | TextureDimension::D2Array => {
            &[glow::TEXTURE_WRAP_S, glow::TEXTURE_WRAP_T]
        }
    }
}

/// `(internal format, pixel format, pixel type)`.
fn texture_format(format: TextureFormat) -> (u32, u32, u32) {
    match format {
        TextureFormat::R8Unorm => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
        TextureFormat::Rg8Unorm => (glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8Unorm => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::Rgba8UnormSrgb => (glow::SRGB8_ALPHA8, glow::RGBA, glow::UNSIGNED_BYTE),
        TextureFormat::R32Float => (glow::R32F, glow::RED, glow::FLOAT),
        TextureFormat::Rgba16Float => (glow::RGBA16F, glow::RGBA, glow::HALF_FLOAT),
        TextureFormat::Rgba32Float => (glow::RGBA32F, glow::RGBA, glow::FLOAT),
        TextureFormat::Depth24Plus => (
            glow::DEPTH_COMPONENT24,
            glow::DEPTH_COMPONENT,
            glow::UNSIGNED_INT,
        ),
        TextureFormat::Depth24PlusStencil8 => (
            glow::DEPTH24_STENCIL8,
            glow::DEPTH_STENCIL,
            glow::UNSIGNED_INT_24_8,
        ),
        TextureFormat::Depth32Float => {
            (glow::DEPTH_COMPONENT32F, glow::DEPTH_COMPONENT, glow::FLOAT)
        }
    }
}

fn topology_mode(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::Points => glow::POINTS,
        PrimitiveTopology::Lines => glow::LINES,
        PrimitiveTopology::LineStrip => glow::LINE_STRIP,
        PrimitiveTopology::LineLoop => glow::LINE_LOOP,
        PrimitiveTopology::Triangles => glow::TRIANGLES,
        PrimitiveTopology::TriangleStrip => glow::TRIANGLE_STRIP,
        PrimitiveTopology::TriangleFan => glow::TRIANGLE_FAN,
        PrimitiveTopology::Patches { .. } => glow::PATCHES,
    }
}

fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::U8 => glow::UNSIGNED_BYTE,
        IndexFormat::U16 => glow::UNSIGNED_SHORT,
        IndexFormat::U32 => glow::UNSIGNED_INT,
    }
}

fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::TessControl => glow::TESS_CONTROL_SHADER,
        ShaderStage::TessEvaluation => glow::TESS_EVALUATION_SHADER,
        ShaderStage::Geometry => glow::GEOMETRY_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        ShaderStage::Compute => glow::COMPUTE_SHADER,
    }
}

fn uniform_type(gl_type: u32) -> Option<UniformType> {
    Some(match gl_type {
        glow::FLOAT => UniformType::Float,
        glow::FLOAT_VEC2 => UniformType::Vec2,
        glow::FLOAT_VEC3 => UniformType::Vec3,
        glow::FLOAT_VEC4 => UniformType::Vec4,
        glow::INT => UniformType::Int,
        glow::INT_VEC2 => UniformType::IVec2,
        glow::INT_VEC3 => UniformType::IVec3,
        glow::INT_VEC4 => UniformType::IVec4,
        glow::UNSIGNED_INT => UniformType::UInt,
        glow::BOOL => UniformType::Bool,
        glow::FLOAT_MAT2 => UniformType::Mat2,
        glow::FLOAT_MAT3 => UniformType::Mat3,
        glow::FLOAT_MAT4 => UniformType::Mat4,
        glow::SAMPLER_2D => UniformType::Sampler2D,
        glow::SAMPLER_3D => UniformType::Sampler3D,
        glow::SAMPLER_CUBE => UniformType::SamplerCube,
        glow::SAMPLER_2D_ARRAY => UniformType::Sampler2DArray,
        glow::SAMPLER_2D_SHADOW => UniformType::Sampler2DShadow,
        _ => return None,
    })
}

fn attachment_point(attachment: Attachment) -> u32 {
    match attachment {
        Attachment::Color(index) => glow::COLOR_ATTACHMENT0 + index,
        Attachment::Depth => glow::DEPTH_ATTACHMENT,
        Attachment::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

fn created<T>(result: Result<T, String>, what: &str) -> Result<T, GraphicsError> {
    result.map_err(|err| GraphicsError::Driver(format!("failed to create {what}: {err}")))
}

impl Driver for GlDriver {
    fn name(&self) -> &str {
        "OpenGL"
    }

    fn query_capabilities(&self) -> DeviceCapabilities {
        let get = |pname| unsafe { self.gl.get_parameter_i32(pname).max(0) as u32 };
        DeviceCapabilities {
            max_vertex_attributes: get(glow::MAX_VERTEX_ATTRIBS),
            max_color_attachments: get(glow::MAX_COLOR_ATTACHMENTS),
            max_patch_vertices: get(glow::MAX_PATCH_VERTICES),
            max_texture_units: get(glow::MAX_COMBINED_TEXTURE_IMAGE_UNITS),
            max_uniform_buffer_bindings: get(glow::MAX_UNIFORM_BUFFER_BINDINGS),
        }
    }

    // --- Buffers ---

    fn create_buffer(&self) -> Result<RawHandle, GraphicsError> {
        let native = created(unsafe { self.gl.create_buffer() }, "buffer")?;
        Ok(raw_of(native.0))
    }

    fn delete_buffer(&self, handle: RawHandle) {
        unsafe { self.gl.delete_buffer(buffer(handle)) }
    }

    fn bind_buffer(&self, target: BufferTarget, handle: Option<RawHandle>) {
        unsafe {
            self.gl
                .bind_buffer(buffer_target(target), handle.map(buffer))
        }
    }

    fn buffer_storage(&self, target: BufferTarget, size: usize, hint: UsageHint) {
        unsafe {
            self.gl
                .buffer_data_size(buffer_target(target), size as i32, usage(hint))
        }
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(buffer_target(target), offset as i32, data)
        }
    }

    fn bind_buffer_base(&self, index: u32, handle: Option<RawHandle>) {
        unsafe {
            self.gl
                .bind_buffer_base(glow::UNIFORM_BUFFER, index, handle.map(buffer))
        }
    }

    // --- Vertex arrays ---

    fn create_vertex_array(&self) -> Result<RawHandle, GraphicsError> {
        let native = created(unsafe { self.gl.create_vertex_array() }, "vertex array")?;
        Ok(raw_of(native.0))
    }

    fn delete_vertex_array(&self, handle: RawHandle) {
        unsafe {
            self.gl
                .delete_vertex_array(glow::NativeVertexArray(handle.non_zero()))
        }
    }

    fn bind_vertex_array(&self, handle: Option<RawHandle>) {
        unsafe {
            self.gl
                .bind_vertex_array(handle.map(|h| glow::NativeVertexArray(h.non_zero())))
        }
    }

    fn enable_vertex_attribute(&self, slot: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(slot) }
    }

    fn vertex_attribute_pointer(&self, pointer: &AttributePointer, stride: u32) {
        let data_type = match pointer.component_type {
            ComponentType::F32 => glow::FLOAT,
            ComponentType::U8 => glow::UNSIGNED_BYTE,
        };
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                pointer.slot,
                i32::from(pointer.components),
                data_type,
                pointer.normalize,
                stride as i32,
                pointer.offset as i32,
            )
        }
    }

    // --- Textures ---

    fn create_texture(&self) -> Result<RawHandle, GraphicsError> {
        let native = created(unsafe { self.gl.create_texture() }, "texture")?;
        Ok(raw_of(native.0))
    }

    fn delete_texture(&self, handle: RawHandle) {
        unsafe { self.gl.delete_texture(texture(handle)) }
    }

    fn active_texture_unit(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, dimension: TextureDimension, handle: Option<RawHandle>) {
        unsafe {
            self.gl
                .bind_texture(texture_target(dimension), handle.map(texture))
        }
    }

    fn texture_storage(&self, descriptor: &TextureDescriptor) {
        let (internal, _, _) = texture_format(descriptor.format);
        let levels = descriptor.mip_level_count.max(1) as i32;
        let size = descriptor.size;
        let target = texture_target(descriptor.dimension);
        unsafe {
            match descriptor.dimension {
                TextureDimension::D2 | TextureDimension::Cube => self.gl.tex_storage_2d(
                    target,
                    levels,
                    internal,
                    size.width as i32,
                    size.height as i32,
                ),
                TextureDimension::D3 | TextureDimension::D2Array => self.gl.tex_storage_3d(
                    target,
                    levels,
                    internal,
                    size.width as i32,
                    size.height as i32,
                    size.depth as i32,
                ),
            }
        }
    }

    fn texture_sub_image(&self, descriptor: &TextureDescriptor, data: &[u8]) {
        let (_, format, ty) = texture_format(descriptor.format);
        let size = descriptor.size;
        let target = texture_target(descriptor.dimension);
        unsafe {
            match descriptor.dimension {
                TextureDimension::D2 => self.gl.tex_sub_image_2d(
                    target,
                    0,
                    0,
                    0,
                    size.width as i32,
                    size.height as i32,
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(data),
                ),
                TextureDimension::Cube => {
                    let face_size = data.len() / 6;
                    for (face, pixels) in data.chunks_exact(face_size.max(1)).take(6).enumerate() {
                        self.gl.tex_sub_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                            0,
                            0,
                            0,
                            size.width as i32,
                            size.height as i32,
                            format,
                            ty,
                            glow::PixelUnpackData::Slice(pixels),
                        );
                    }
                }
                TextureDimension::D3 | TextureDimension::D2Array => self.gl.tex_sub_image_3d(
                    target,
                    0,
                    0,
                    0,
                    0,
                    size.width as i32,
                    size.height as i32,
                    size.depth as i32,
                    format,
                    ty,
                    glow::PixelUnpackData::Slice(data),
                ),
            }
        }
    }

    fn texture_parameters(&self, dimension: TextureDimension, filter: FilterMode, wrap: WrapMode) {
        let target = texture_target(dimension);
        let filter = match filter {
            FilterMode::Nearest => glow::NEAREST,
            FilterMode::Linear => glow::LINEAR,
        } as i32;
        let wrap = match wrap {
            WrapMode::Repeat => glow::REPEAT,
            WrapMode::ClampToEdge => glow::CLAMP_TO_EDGE,
            WrapMode::MirroredRepeat => glow::MIRRORED_REPEAT,
        } as i32;
        unsafe {
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter);
            self.gl
                .tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter);
            for &axis in wrap_axes(dimension) {
                self.gl.tex_parameter_i32(target, axis, wrap);
            }
        }
    }

    // --- Framebuffers ---

    fn create_framebuffer(&self) -> Result<RawHandle, GraphicsError> {
        let native = created(unsafe { self.gl.create_framebuffer() }, "framebuffer")?;
        Ok(raw_of(native.0))
    }

    fn delete_framebuffer(&self, handle: RawHandle) {
        unsafe {
            self.gl
                .delete_framebuffer(glow::NativeFramebuffer(handle.non_zero()))
        }
    }

    fn bind_framebuffer(&self, handle: Option<RawHandle>) {
        unsafe {
            self.gl.bind_framebuffer(
                glow::FRAMEBUFFER,
                handle.map(|h| glow::NativeFramebuffer(h.non_zero())),
            )
        }
    }

    fn framebuffer_texture(&self, attachment: Attachment, handle: Option<RawHandle>) {
        unsafe {
            self.gl.framebuffer_texture(
                glow::FRAMEBUFFER,
                attachment_point(attachment),
                handle.map(texture),
                0,
            )
        }
    }

    fn draw_buffers(&self, outputs: &[Option<u32>]) {
        let buffers: Vec<u32> = outputs
            .iter()
            .map(|output| output.map_or(glow::NONE, |index| glow::COLOR_ATTACHMENT0 + index))
            .collect();
        unsafe { self.gl.draw_buffers(&buffers) }
    }

    fn framebuffer_complete(&self) -> bool {
        unsafe { self.gl.check_framebuffer_status(glow::FRAMEBUFFER) == glow::FRAMEBUFFER_COMPLETE }
    }

    fn clear(&self, flags: ClearFlags, color: [f32; 4], depth: f32) {
        let mut mask = 0;
        if flags.contains(ClearFlags::COLOR) {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::DEPTH) {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if flags.contains(ClearFlags::STENCIL) {
            mask |= glow::STENCIL_BUFFER_BIT;
        }
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear_depth_f32(depth);
            self.gl.clear(mask);
        }
    }

    // --- Shaders ---

    fn compile_shader(&self, stage: ShaderStage, source: &str) -> Result<RawHandle, String> {
        unsafe {
            let native = self.gl.create_shader(shader_type(stage))?;
            self.gl.shader_source(native, source);
            self.gl.compile_shader(native);
            if !self.gl.get_shader_compile_status(native) {
                let log = self.gl.get_shader_info_log(native);
                self.gl.delete_shader(native);
                return Err(log);
            }
            Ok(raw_of(native.0))
        }
    }

    fn delete_shader(&self, handle: RawHandle) {
        unsafe { self.gl.delete_shader(shader(handle)) }
    }

    fn link_program(&self, shaders: &[RawHandle]) -> Result<RawHandle, String> {
        unsafe {
            let native = self.gl.create_program()?;
            for handle in shaders {
                self.gl.attach_shader(native, shader(*handle));
            }
            self.gl.link_program(native);
            for handle in shaders {
                self.gl.detach_shader(native, shader(*handle));
            }
            if !self.gl.get_program_link_status(native) {
                let log = self.gl.get_program_info_log(native);
                self.gl.delete_program(native);
                return Err(log);
            }
            Ok(raw_of(native.0))
        }
    }

    fn delete_program(&self, handle: RawHandle) {
        unsafe { self.gl.delete_program(program(handle)) }
    }

    fn use_program(&self, handle: Option<RawHandle>) {
        unsafe { self.gl.use_program(handle.map(program)) }
    }

    fn active_uniforms(&self, handle: RawHandle) -> Vec<ActiveUniform> {
        let native = program(handle);
        unsafe {
            let count = self.gl.get_active_uniforms(native);
            let indices: Vec<u32> = (0..count).collect();
            let block_indices =
                self.gl
                    .get_active_uniforms_parameter(native, &indices, glow::UNIFORM_BLOCK_INDEX);
            let offsets =
                self.gl
                    .get_active_uniforms_parameter(native, &indices, glow::UNIFORM_OFFSET);
            let strides = self.gl.get_active_uniforms_parameter(
                native,
                &indices,
                glow::UNIFORM_ARRAY_STRIDE,
            );

            indices
                .iter()
                .filter_map(|&index| {
                    let info = self.gl.get_active_uniform(native, index)?;
                    let Some(ty) = uniform_type(info.utype) else {
                        log::warn!(
                            "OpenGL: skipping uniform `{}` of unsupported type 0x{:x}",
                            info.name,
                            info.utype
                        );
                        return None;
                    };
                    let i = index as usize;
                    let block_index = block_indices.get(i).copied().unwrap_or(-1);
                    let block = (block_index >= 0).then(|| BlockMemberInfo {
                        block_index: block_index as u32,
                        offset: offsets.get(i).copied().unwrap_or(0).max(0) as u32,
                        array_stride: strides.get(i).copied().unwrap_or(0).max(0) as u32,
                    });
                    Some(ActiveUniform {
                        name: info.name,
                        ty,
                        array_length: info.size.max(1) as u32,
                        block,
                    })
                })
                .collect()
        }
    }

    fn active_uniform_blocks(&self, handle: RawHandle) -> Vec<ActiveUniformBlock> {
        let native = program(handle);
        unsafe {
            let count = self
                .gl
                .get_program_parameter_i32(native, glow::ACTIVE_UNIFORM_BLOCKS)
                .max(0) as u32;
            (0..count)
                .map(|index| ActiveUniformBlock {
                    name: self.gl.get_active_uniform_block_name(native, index),
                    index,
                    size: self
                        .gl
                        .get_active_uniform_block_parameter_i32(
                            native,
                            index,
                            glow::UNIFORM_BLOCK_DATA_SIZE,
                        )
                        .max(0) as u32,
                })
                .collect()
        }
    }

    fn uniform_location(&self, handle: RawHandle, name: &str) -> Option<i32> {
        unsafe {
            self.gl
                .get_uniform_location(program(handle), name)
                .map(|location| location.0 as i32)
        }
    }

    fn uniform_block_binding(&self, handle: RawHandle, block_index: u32, binding: u32) {
        unsafe {
            self.gl
                .uniform_block_binding(program(handle), block_index, binding)
        }
    }

    fn set_uniform(&self, location: i32, value: &UniformValue) {
        let location = glow::NativeUniformLocation(location as u32);
        let loc = Some(&location);
        unsafe {
            match *value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(loc, v),
                UniformValue::Vec2(v) => self.gl.uniform_2_f32(loc, v[0], v[1]),
                UniformValue::Vec3(v) => self.gl.uniform_3_f32(loc, v[0], v[1], v[2]),
                UniformValue::Vec4(v) => self.gl.uniform_4_f32(loc, v[0], v[1], v[2], v[3]),
                UniformValue::Int(v) => self.gl.uniform_1_i32(loc, v),
                UniformValue::IVec2(v) => self.gl.uniform_2_i32(loc, v[0], v[1]),
                UniformValue::IVec3(v) => self.gl.uniform_3_i32(loc, v[0], v[1], v[2]),
                UniformValue::IVec4(v) => self.gl.uniform_4_i32(loc, v[0], v[1], v[2], v[3]),
                UniformValue::UInt(v) => self.gl.uniform_1_u32(loc, v),
                UniformValue::Bool(v) => self.gl.uniform_1_i32(loc, i32::from(v)),
                UniformValue::Mat2(m) => {
                    self.gl
                        .uniform_matrix_2_f32_slice(loc, false, bytemuck::cast_slice(&m))
                }
                UniformValue::Mat3(m) => {
                    self.gl
                        .uniform_matrix_3_f32_slice(loc, false, bytemuck::cast_slice(&m))
                }
                UniformValue::Mat4(m) => {
                    self.gl
                        .uniform_matrix_4_f32_slice(loc, false, bytemuck::cast_slice(&m))
                }
            }
        }
    }

    // --- Drawing ---

    fn set_patch_vertices(&self, count: u32) {
        unsafe {
            self.gl
                .patch_parameter_i32(glow::PATCH_VERTICES, count as i32)
        }
    }

    fn draw_elements(
        &self,
        topology: PrimitiveTopology,
        count: u32,
        format: IndexFormat,
        byte_offset: usize,
    ) {
        unsafe {
            self.gl.draw_elements(
                topology_mode(topology),
                count as i32,
                index_type(format),
                byte_offset as i32,
            )
        }
    }

    fn draw_arrays(&self, topology: PrimitiveTopology, first: u32, count: u32) {
        unsafe {
            self.gl
                .draw_arrays(topology_mode(topology), first as i32, count as i32)
        }
    }
}
