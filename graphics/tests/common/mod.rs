//! Common utilities for resource integration tests.
//!
//! Every test runs against the recording [`DummyDriver`], so native calls can
//! be counted and inspected without a GPU.

#![allow(dead_code)]

use std::rc::Rc;

use tessera_graphics::backend::DeviceCapabilities;
use tessera_graphics::mesh::{VertexAttribute, VertexRecord, VertexSchema};
use tessera_graphics::shader::{ProgramSource, ShaderProgram};
use tessera_graphics::{
    ContextConfig, Driver, DummyDriver, GpuResource, GraphicsContext, RawHandle, Texture,
    TextureDescriptor, TextureDimension, TextureFormat,
};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Context
// ============================================================================

/// A context paired with the driver recording its calls.
pub struct TestContext {
    pub driver: Rc<DummyDriver>,
    pub ctx: Rc<GraphicsContext>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ContextConfig::new().with_leak_tracking(true))
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self::with_capabilities(DeviceCapabilities::default(), config)
    }

    pub fn with_capabilities(capabilities: DeviceCapabilities, config: ContextConfig) -> Self {
        init_logging();
        let driver = Rc::new(DummyDriver::with_capabilities(capabilities));
        let ctx = GraphicsContext::new(driver.clone(), config);
        Self { driver, ctx }
    }

    /// Allocated texture of `dimension` without pixel data.
    pub fn texture(&self, dimension: TextureDimension, label: &str) -> Texture {
        let descriptor = match dimension {
            TextureDimension::D2 => TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm),
            TextureDimension::Cube => TextureDescriptor::new_cube(4, TextureFormat::Rgba8Unorm),
            other => panic!("no test texture for {other:?}"),
        }
        .with_label(label);
        let mut texture = Texture::new(&self.ctx, descriptor);
        texture.alloc().expect("texture alloc");
        texture
    }

    /// Native location of `name` in a linked program.
    pub fn driver_location(&self, program: RawHandle, name: &str) -> i32 {
        self.driver
            .uniform_location(program, name)
            .expect("uniform location")
    }

    pub fn program(&self, vertex: &str, fragment: &str) -> ShaderProgram {
        let source = ProgramSource::new()
            .with_vertex(vertex)
            .with_fragment(fragment);
        ShaderProgram::build(&self.ctx, source).expect("program build")
    }
}

// ============================================================================
// Shaders
// ============================================================================

pub const PASSTHROUGH_VERTEX: &str = "#version 410
layout(location = 0) in vec3 position;
uniform mat4 model;
void main() {
    gl_Position = model * vec4(position, 1.0);
}
";

/// Fragment shader with a sampler array and a std140 block.
pub const MATERIAL_FRAGMENT: &str = "#version 410
uniform sampler2D layers[3];
uniform sampler2D detail;
uniform samplerCube environment;
layout(std140) uniform Material {
    vec4 base_color;
    float roughness;
    float metallic;
    vec4 emissive;
};
out vec4 color;
void main() {
    color = base_color;
}
";

/// Fragment shader with `count` independent 2D samplers named `s0`, `s1`, ...
pub fn sampler_fragment(count: usize) -> String {
    let mut source = String::from("#version 410\n");
    for i in 0..count {
        source.push_str(&format!("uniform sampler2D s{i};\n"));
    }
    source.push_str("out vec4 color;\nvoid main() {}\n");
    source
}

// ============================================================================
// Vertex Records
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ColoredVertex {
    pub position: [f32; 3],
    pub color: [u8; 4],
}

impl VertexRecord for ColoredVertex {
    fn schema() -> VertexSchema {
        VertexSchema::new()
            .with(VertexAttribute::vec3("position", 0))
            .with(VertexAttribute::packed_color("color", 1, 3))
            .with_label("colored")
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceVertex {
    pub model: [[f32; 4]; 4],
    pub uv: [f32; 2],
}

impl VertexRecord for InstanceVertex {
    fn schema() -> VertexSchema {
        VertexSchema::new()
            .with(VertexAttribute::vec2("uv", 4))
            .with(VertexAttribute::mat4("model", 0))
    }
}

/// `count` vertices along the x axis.
pub fn colored_vertices(count: usize) -> Vec<ColoredVertex> {
    (0..count)
        .map(|i| ColoredVertex {
            position: [i as f32, 0.0, 0.0],
            color: [255, 255, 255, 255],
        })
        .collect()
}
