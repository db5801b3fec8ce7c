//! Drawable geometry built from typed vertex records.

use std::marker::PhantomData;
use std::rc::Rc;

use tessera_core::mesh::{
    DrawChunks, IndexFormat, PrimitiveTopology, VertexRecord, VertexRecordLayout,
};

use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::GpuResource;
use crate::resources::{Buffer, VertexArray};
use crate::shader::ShaderProgram;
use crate::types::BufferTarget;

use super::index_buffer::{check_count, patch_stride, IndexBuffer};

/// A vertex buffer, an optional index buffer and the vertex array tying
/// them to the layout of `V`.
///
/// Patch topologies whose index count exceeds the device patch limit are
/// drawn in several native calls, each covering whole patches.
///
/// # Example
///
/// ```ignore
/// let mut quad = Geometry::indexed(&ctx, PrimitiveTopology::Triangles, &vertices, &[0, 1, 2, 2, 3, 0])?;
/// quad.alloc()?;
/// quad.draw(&mut program)?;
/// ```
pub struct Geometry<V: VertexRecord> {
    context: Rc<GraphicsContext>,
    topology: PrimitiveTopology,
    vertex_count: u32,
    patch_stride: Option<u32>,
    vertex_buffer: Buffer,
    index_buffer: Option<IndexBuffer>,
    vertex_array: VertexArray,
    _vertex: PhantomData<V>,
}

impl<V: VertexRecord> Geometry<V> {
    /// Geometry drawn straight from the vertex buffer.
    pub fn new(
        context: &Rc<GraphicsContext>,
        topology: PrimitiveTopology,
        vertices: &[V],
    ) -> Result<Self, GraphicsError> {
        check_count(topology, vertices.len(), "vertices")?;
        let patch_stride = patch_stride(context, topology)?;
        let layout = record_layout::<V>(context)?;

        let label = layout.label().map(|label| format!("{label} vertices"));
        let mut vertex_buffer = Buffer::with_data(
            context,
            BufferTarget::Array,
            bytemuck::cast_slice(vertices).to_vec(),
        );
        if let Some(label) = label {
            vertex_buffer = vertex_buffer.with_label(label);
        }

        Ok(Self {
            context: Rc::clone(context),
            topology,
            vertex_count: vertices.len() as u32,
            patch_stride,
            vertex_buffer,
            index_buffer: None,
            vertex_array: VertexArray::new(context, layout),
            _vertex: PhantomData,
        })
    }

    /// Geometry drawn through an index buffer.
    pub fn indexed(
        context: &Rc<GraphicsContext>,
        topology: PrimitiveTopology,
        vertices: &[V],
        indices: &[u32],
    ) -> Result<Self, GraphicsError> {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(GraphicsError::configuration(format!(
                "index {index} out of range for {} vertices",
                vertices.len()
            )));
        }
        let index_buffer = IndexBuffer::new(context, topology, indices)?;

        let mut geometry = Self::new(context, PrimitiveTopology::Points, vertices)?;
        geometry.topology = topology;
        geometry.patch_stride = index_buffer.patch_stride();
        geometry.index_buffer = Some(index_buffer);
        Ok(geometry)
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices, or vertices for non-indexed geometry.
    pub fn element_count(&self) -> u32 {
        self.index_buffer
            .as_ref()
            .map_or(self.vertex_count, IndexBuffer::count)
    }

    pub fn index_format(&self) -> Option<IndexFormat> {
        self.index_buffer.as_ref().map(IndexBuffer::format)
    }

    pub fn patch_stride(&self) -> Option<u32> {
        self.patch_stride
    }

    pub fn layout(&self) -> &Rc<VertexRecordLayout> {
        self.vertex_array.layout()
    }

    pub fn vertex_buffer(&self) -> &Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> Option<&IndexBuffer> {
        self.index_buffer.as_ref()
    }

    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertex_array
    }

    pub fn is_allocated(&self) -> bool {
        self.vertex_array.is_allocated()
    }

    /// Allocate and upload the buffers, then record the vertex array.
    ///
    /// Calling this again reallocates everything.
    pub fn alloc(&mut self) -> Result<(), GraphicsError> {
        tessera_core::profile_scope!("geometry_alloc");
        self.vertex_array.free();

        self.vertex_buffer.alloc()?;
        self.vertex_buffer.upload(None)?;
        self.vertex_array.set_vertex_buffer(&self.vertex_buffer)?;

        if let Some(index_buffer) = &mut self.index_buffer {
            index_buffer.alloc()?;
            self.vertex_array.set_index_buffer(index_buffer.buffer())?;
        }

        self.vertex_array.alloc()
    }

    /// Release the vertex array and both buffers.
    pub fn free(&mut self) {
        self.vertex_array.free();
        if let Some(index_buffer) = &mut self.index_buffer {
            index_buffer.free();
        }
        self.vertex_buffer.free();
    }

    /// Overwrite vertices starting at `first`.
    ///
    /// Only the affected byte range is uploaded. Returns the bytes uploaded,
    /// which is zero while not allocated.
    pub fn update_vertices(&mut self, first: u32, vertices: &[V]) -> Result<usize, GraphicsError> {
        let end = first as usize + vertices.len();
        if end > self.vertex_count as usize {
            return Err(GraphicsError::configuration(format!(
                "vertices {first}..{end} out of range for {} vertices",
                self.vertex_count
            )));
        }

        let stride = std::mem::size_of::<V>();
        let offset = first as usize * stride;
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        self.vertex_buffer.write(offset, bytes)?;

        if !self.vertex_buffer.is_allocated() {
            return Ok(0);
        }
        self.vertex_buffer.upload(Some(offset..offset + bytes.len()))
    }

    /// Commit `program` and draw the whole geometry.
    ///
    /// Returns the number of native draw calls issued.
    pub fn draw(&mut self, program: &mut ShaderProgram) -> Result<usize, GraphicsError> {
        tessera_core::profile_scope!("geometry_draw");
        program.commit()?;
        self.vertex_array.bind()?;

        let driver = self.context.driver();
        if let Some(per_patch) = self.topology.vertices_per_patch() {
            driver.set_patch_vertices(per_patch);
        }

        let chunks = DrawChunks::new(0, self.element_count(), self.patch_stride);
        let calls = chunks.len();
        match &self.index_buffer {
            Some(index_buffer) => {
                let data = index_buffer.data();
                for range in chunks {
                    driver.draw_elements(
                        self.topology,
                        range.count,
                        data.format(),
                        data.byte_offset(range.first),
                    );
                }
            }
            None => {
                for range in chunks {
                    driver.draw_arrays(self.topology, range.first, range.count);
                }
            }
        }

        if calls > 1 {
            log::trace!("Split draw of {} elements into {calls} calls", self.element_count());
        }
        Ok(calls)
    }
}

/// Derived layout of `V`, checked against the Rust struct size.
fn record_layout<V: VertexRecord>(
    context: &GraphicsContext,
) -> Result<Rc<VertexRecordLayout>, GraphicsError> {
    let layout = context.vertex_layout::<V>()?;
    let size = std::mem::size_of::<V>();
    if layout.stride() as usize != size {
        return Err(GraphicsError::configuration(format!(
            "vertex record `{}` is {size} bytes but its schema packs to {}",
            std::any::type_name::<V>(),
            layout.stride()
        )));
    }
    Ok(layout)
}

impl<V: VertexRecord> std::fmt::Debug for Geometry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geometry")
            .field("topology", &self.topology)
            .field("vertices", &self.vertex_count)
            .field("indices", &self.index_buffer.as_ref().map(IndexBuffer::count))
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::config::ContextConfig;
    use crate::shader::ProgramSource;
    use tessera_core::mesh::{VertexAttribute, VertexSchema};

    #[repr(C)]
    #[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Vertex {
        position: [f32; 3],
        color: [u8; 4],
    }

    impl VertexRecord for Vertex {
        fn schema() -> VertexSchema {
            VertexSchema::new()
                .with(VertexAttribute::vec3("position", 0))
                .with(VertexAttribute::packed_color("color", 1, 4))
                .with_label("colored")
        }
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Mislabeled {
        position: [f32; 4],
    }

    impl VertexRecord for Mislabeled {
        fn schema() -> VertexSchema {
            VertexSchema::new().with(VertexAttribute::vec3("position", 0))
        }
    }

    fn context() -> (Rc<DummyDriver>, Rc<GraphicsContext>) {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
        (driver, ctx)
    }

    fn vertices(count: usize) -> Vec<Vertex> {
        (0..count)
            .map(|i| Vertex {
                position: [i as f32, 0.0, 0.0],
                color: [255, 0, 0, 255],
            })
            .collect()
    }

    fn program(ctx: &Rc<GraphicsContext>) -> ShaderProgram {
        let source = ProgramSource::new()
            .with_vertex("#version 410\nvoid main() {}\n")
            .with_fragment("#version 410\nvoid main() {}\n");
        ShaderProgram::build(ctx, source).unwrap()
    }

    #[test]
    fn test_indexed_draw() {
        let (driver, ctx) = context();
        let mut program = program(&ctx);
        let mut quad =
            Geometry::indexed(&ctx, PrimitiveTopology::Triangles, &vertices(4), &[0, 1, 2, 2, 3, 0])
                .unwrap();
        assert_eq!(quad.index_format(), Some(IndexFormat::U8));
        quad.alloc().unwrap();

        assert_eq!(quad.draw(&mut program).unwrap(), 1);
        let draws = driver.draw_calls();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].count, 6);
        assert_eq!(draws[0].index_format, Some(IndexFormat::U8));
        assert_eq!(draws[0].vertex_array, quad.vertex_array().raw().ok());
    }

    #[test]
    fn test_patch_draws_are_chunked() {
        let (driver, ctx) = context();
        let mut program = program(&ctx);
        let topology = PrimitiveTopology::Patches {
            vertices_per_patch: 3,
        };
        let indices: Vec<u32> = (0..100).map(|i| i % 4).collect();
        let mut patches = Geometry::indexed(&ctx, topology, &vertices(4), &indices).unwrap();
        patches.alloc().unwrap();

        // 32 / 3 * 3 = 30 indices per call.
        assert_eq!(patches.patch_stride(), Some(30));
        assert_eq!(patches.draw(&mut program).unwrap(), 4);
        let counts: Vec<u32> = driver.draw_calls().iter().map(|d| d.count).collect();
        assert_eq!(counts, vec![30, 30, 30, 10]);
        assert_eq!(driver.draw_calls()[1].first, 30);
        assert_eq!(driver.stats().patch_size_calls, 1);
    }

    #[test]
    fn test_non_indexed_draw() {
        let (driver, ctx) = context();
        let mut program = program(&ctx);
        let mut strip = Geometry::new(&ctx, PrimitiveTopology::LineStrip, &vertices(5)).unwrap();
        strip.alloc().unwrap();
        assert_eq!(strip.draw(&mut program).unwrap(), 1);
        let draw = driver.draw_calls()[0];
        assert_eq!((draw.first, draw.count, draw.index_format), (0, 5, None));
    }

    #[test]
    fn test_validation() {
        let (_, ctx) = context();
        assert!(matches!(
            Geometry::new(&ctx, PrimitiveTopology::Triangles, &vertices(2)),
            Err(GraphicsError::Configuration(_))
        ));
        assert!(matches!(
            Geometry::indexed(&ctx, PrimitiveTopology::Triangles, &vertices(3), &[0, 1, 3]),
            Err(GraphicsError::Configuration(_))
        ));
        let records = [Mislabeled {
            position: [0.0; 4],
        }];
        assert!(matches!(
            Geometry::new(&ctx, PrimitiveTopology::Points, &records),
            Err(GraphicsError::Configuration(_))
        ));
    }

    #[test]
    fn test_update_vertices_uploads_range() {
        let (driver, ctx) = context();
        let mut geometry = Geometry::new(&ctx, PrimitiveTopology::Points, &vertices(4)).unwrap();
        assert_eq!(geometry.update_vertices(0, &vertices(1)).unwrap(), 0);
        geometry.alloc().unwrap();

        let before = driver.stats().bytes_uploaded;
        assert_eq!(geometry.update_vertices(2, &vertices(2)).unwrap(), 32);
        assert_eq!(driver.stats().bytes_uploaded - before, 32);
        assert!(geometry.update_vertices(3, &vertices(2)).is_err());
    }

    #[test]
    fn test_free_releases_everything() {
        let (driver, ctx) = context();
        let mut geometry =
            Geometry::indexed(&ctx, PrimitiveTopology::Triangles, &vertices(3), &[0, 1, 2]).unwrap();
        geometry.alloc().unwrap();
        geometry.alloc().unwrap();
        assert_eq!(driver.live_objects(), 3);
        geometry.free();
        assert_eq!(driver.live_objects(), 0);
        assert!(!geometry.is_allocated());
    }
}
