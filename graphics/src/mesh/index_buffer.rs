//! Element array resource with minimal index width.

use std::rc::Rc;

use tessera_core::mesh::{IndexData, IndexFormat, PrimitiveTopology};

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, ResourceKind};
use crate::resources::Buffer;
use crate::types::BufferTarget;

/// Indices packed at the narrowest width that holds the largest one.
///
/// The topology is validated at construction: triangle topologies need at
/// least three indices, line topologies two, and patch topologies a patch
/// size the device supports. Allocation uploads the packed bytes.
pub struct IndexBuffer {
    buffer: Buffer,
    data: IndexData,
    topology: PrimitiveTopology,
    patch_stride: Option<u32>,
}

impl IndexBuffer {
    pub fn new(
        context: &Rc<GraphicsContext>,
        topology: PrimitiveTopology,
        indices: &[u32],
    ) -> Result<Self, GraphicsError> {
        check_count(topology, indices.len(), "indices")?;
        let patch_stride = patch_stride(context, topology)?;
        let data = IndexData::pack(indices);
        let buffer = Buffer::with_data(context, BufferTarget::ElementArray, data.bytes().to_vec());
        Ok(Self {
            buffer,
            data,
            topology,
            patch_stride,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.buffer.set_label(label);
        self
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    pub fn format(&self) -> IndexFormat {
        self.data.format()
    }

    pub fn count(&self) -> u32 {
        self.data.count()
    }

    pub fn data(&self) -> &IndexData {
        &self.data
    }

    /// Largest index count one patch draw may cover.
    pub fn patch_stride(&self) -> Option<u32> {
        self.patch_stride
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

/// Reject index or vertex counts below the topology minimum.
pub(crate) fn check_count(
    topology: PrimitiveTopology,
    count: usize,
    what: &str,
) -> Result<(), GraphicsError> {
    let min = topology.min_index_count() as usize;
    if count < min {
        return Err(GraphicsError::configuration(format!(
            "{topology:?} needs at least {min} {what}, got {count}"
        )));
    }
    Ok(())
}

/// Validate a patch topology against the device and compute its draw stride.
pub(crate) fn patch_stride(
    context: &GraphicsContext,
    topology: PrimitiveTopology,
) -> Result<Option<u32>, GraphicsError> {
    let Some(per_patch) = topology.vertices_per_patch() else {
        return Ok(None);
    };
    let max = context.capabilities().max_patch_vertices;
    if per_patch == 0 {
        return Err(GraphicsError::configuration(
            "patches need at least one vertex per patch",
        ));
    }
    if per_patch > max {
        return Err(GraphicsError::capacity(format!(
            "{per_patch} vertices per patch exceeds the device limit of {max}"
        )));
    }
    Ok(topology.patch_stride(max))
}

impl GpuResource for IndexBuffer {
    fn context(&self) -> &Rc<GraphicsContext> {
        self.buffer.context()
    }

    fn lifecycle(&self) -> &Lifecycle {
        self.buffer.lifecycle()
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        self.buffer.lifecycle_mut()
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Buffer
    }

    fn label(&self) -> Option<&str> {
        self.buffer.label()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        self.buffer.create_native()
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        self.buffer.setup()?;
        self.buffer.upload(None)?;
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.buffer.destroy_native(raw);
    }
}

impl Drop for IndexBuffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for IndexBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuffer")
            .field("topology", &self.topology)
            .field("format", &self.data.format())
            .field("count", &self.data.count())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::config::ContextConfig;

    fn context() -> (Rc<DummyDriver>, Rc<GraphicsContext>) {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
        (driver, ctx)
    }

    #[test]
    fn test_minimal_width() {
        let (_, ctx) = context();
        let cases = [
            (255, IndexFormat::U8),
            (256, IndexFormat::U16),
            (65535, IndexFormat::U16),
            (65536, IndexFormat::U32),
        ];
        for (max, format) in cases {
            let buffer = IndexBuffer::new(&ctx, PrimitiveTopology::Points, &[0, max]).unwrap();
            assert_eq!(buffer.format(), format);
            assert_eq!(buffer.buffer().len(), 2 * format.size());
        }
    }

    #[test]
    fn test_topology_minimums() {
        let (_, ctx) = context();
        assert!(matches!(
            IndexBuffer::new(&ctx, PrimitiveTopology::Triangles, &[0, 1]),
            Err(GraphicsError::Configuration(_))
        ));
        assert!(matches!(
            IndexBuffer::new(&ctx, PrimitiveTopology::LineStrip, &[0]),
            Err(GraphicsError::Configuration(_))
        ));
        assert!(IndexBuffer::new(&ctx, PrimitiveTopology::Lines, &[0, 1]).is_ok());
    }

    #[test]
    fn test_patch_validation() {
        let (_, ctx) = context();
        let zero = PrimitiveTopology::Patches {
            vertices_per_patch: 0,
        };
        assert!(matches!(
            IndexBuffer::new(&ctx, zero, &[0]),
            Err(GraphicsError::Configuration(_))
        ));

        let too_many = PrimitiveTopology::Patches {
            vertices_per_patch: 33,
        };
        assert!(matches!(
            IndexBuffer::new(&ctx, too_many, &[0]),
            Err(GraphicsError::Capacity(_))
        ));

        let quads = PrimitiveTopology::Patches {
            vertices_per_patch: 4,
        };
        let buffer = IndexBuffer::new(&ctx, quads, &[0, 1, 2, 3]).unwrap();
        assert_eq!(buffer.patch_stride(), Some(32));
    }

    #[test]
    fn test_alloc_uploads_packed_bytes() {
        let (driver, ctx) = context();
        let mut buffer = IndexBuffer::new(&ctx, PrimitiveTopology::Triangles, &[0, 1, 300])
            .unwrap()
            .with_label("triangle");
        buffer.alloc().unwrap();

        let contents = driver.buffer_contents(buffer.raw().unwrap()).unwrap();
        assert_eq!(contents, buffer.data().bytes());

        buffer.free();
        assert_eq!(driver.live_objects(), 0);
    }

    #[test]
    fn test_label_reaches_registry() {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver, ContextConfig::new().with_leak_tracking(true));
        let mut buffer = IndexBuffer::new(&ctx, PrimitiveTopology::Lines, &[0, 1])
            .unwrap()
            .with_label("outline");
        assert_eq!(buffer.label(), Some("outline"));

        buffer.alloc().unwrap();
        let live = ctx.registry().live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].label.as_deref(), Some("outline"));
    }
}
