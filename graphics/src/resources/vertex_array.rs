//! Vertex array resource.

use std::rc::{Rc, Weak};

use tessera_core::mesh::VertexRecordLayout;

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, NativeHandle, ResourceKind};
use crate::types::BufferTarget;

use super::Buffer;

/// Records where each vertex attribute is sourced from.
///
/// Sources are declared before `alloc`; setup then replays the layout's
/// attribute pointers against the vertex buffer and records the index buffer
/// in the vertex array's own state.
pub struct VertexArray {
    context: Rc<GraphicsContext>,
    lifecycle: Lifecycle,
    layout: Rc<VertexRecordLayout>,
    vertex_buffer: Option<Weak<NativeHandle>>,
    index_buffer: Option<Weak<NativeHandle>>,
}

impl VertexArray {
    pub fn new(context: &Rc<GraphicsContext>, layout: Rc<VertexRecordLayout>) -> Self {
        Self {
            context: Rc::clone(context),
            lifecycle: Lifecycle::new(),
            layout,
            vertex_buffer: None,
            index_buffer: None,
        }
    }

    /// Packed layout this vertex array describes.
    pub fn layout(&self) -> &Rc<VertexRecordLayout> {
        &self.layout
    }

    /// Source vertex attributes from `buffer`.
    pub fn set_vertex_buffer(&mut self, buffer: &Buffer) -> Result<(), GraphicsError> {
        self.vertex_buffer = Some(self.source(buffer, BufferTarget::Array)?);
        Ok(())
    }

    /// Source indices from `buffer`.
    pub fn set_index_buffer(&mut self, buffer: &Buffer) -> Result<(), GraphicsError> {
        self.index_buffer = Some(self.source(buffer, BufferTarget::ElementArray)?);
        Ok(())
    }

    pub fn has_index_buffer(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Bind through the context cache. Returns whether a native call was issued.
    pub fn bind(&self) -> Result<bool, GraphicsError> {
        self.context.bind_vertex_array(self.handle()?)
    }

    fn source(
        &self,
        buffer: &Buffer,
        target: BufferTarget,
    ) -> Result<Weak<NativeHandle>, GraphicsError> {
        if self.is_allocated() {
            return Err(GraphicsError::configuration(
                "vertex array sources are fixed once allocated",
            ));
        }
        if buffer.target() != target {
            return Err(GraphicsError::configuration(format!(
                "expected a {target:?} buffer, got {:?}",
                buffer.target()
            )));
        }
        Ok(Rc::downgrade(buffer.handle()?))
    }
}

fn live(source: &Option<Weak<NativeHandle>>, what: &str) -> Result<Option<RawHandle>, GraphicsError> {
    match source {
        None => Ok(None),
        Some(weak) => weak
            .upgrade()
            .filter(|handle| !handle.is_released())
            .map(|handle| Some(handle.raw()))
            .ok_or_else(|| GraphicsError::configuration(format!("{what} buffer was freed"))),
    }
}

impl GpuResource for VertexArray {
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
        ResourceKind::VertexArray
    }

    fn label(&self) -> Option<&str> {
        self.layout.label()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        if self.vertex_buffer.is_none() {
            return Err(GraphicsError::configuration(
                "vertex array has no vertex buffer",
            ));
        }
        self.context.driver().create_vertex_array()
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        let vertices = live(&self.vertex_buffer, "vertex")?;
        let indices = live(&self.index_buffer, "index")?;
        let handle = Rc::clone(self.handle()?);
        self.context.bind_vertex_array(&handle)?;

        let driver = self.context.driver();
        driver.bind_buffer(BufferTarget::Array, vertices);
        let stride = self.layout.stride();
        for pointer in self.layout.pointers() {
            driver.enable_vertex_attribute(pointer.slot);
            driver.vertex_attribute_pointer(pointer, stride);
        }
        if indices.is_some() {
            driver.bind_buffer(BufferTarget::ElementArray, indices);
        }
        log::trace!(
            "Vertex array {} records {} attribute registers, stride {stride}",
            handle.raw(),
            self.layout.pointers().len()
        );
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.context.driver().delete_vertex_array(raw);
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for VertexArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VertexArray")
            .field("stride", &self.layout.stride())
            .field("indexed", &self.index_buffer.is_some())
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

static_assertions::assert_not_impl_any!(VertexArray: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::config::ContextConfig;
    use tessera_core::mesh::{ComponentType, VertexAttribute, VertexSchema};

    fn context() -> (Rc<DummyDriver>, Rc<GraphicsContext>) {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver.clone(), ContextConfig::new());
        (driver, ctx)
    }

    fn layout() -> Rc<VertexRecordLayout> {
        let schema = VertexSchema::new()
            .with(VertexAttribute::vec3("position", 0))
            .with(VertexAttribute::packed_color("color", 1, 4));
        Rc::new(VertexRecordLayout::derive(&schema, 16).unwrap())
    }

    #[test]
    fn test_setup_records_pointers() {
        let (driver, ctx) = context();
        let mut vertices = Buffer::with_data(&ctx, BufferTarget::Array, vec![0; 32]);
        vertices.alloc().unwrap();
        let mut indices = Buffer::with_data(&ctx, BufferTarget::ElementArray, vec![0, 1, 0]);
        indices.alloc().unwrap();

        let mut vao = VertexArray::new(&ctx, layout());
        vao.set_vertex_buffer(&vertices).unwrap();
        vao.set_index_buffer(&indices).unwrap();
        vao.alloc().unwrap();

        let raw = vao.raw().unwrap();
        let attributes = driver.vertex_array_attributes(raw);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1].0.component_type, ComponentType::U8);
        assert!(attributes[1].0.normalize);
        assert_eq!(attributes[1].0.offset, 12);
        assert_eq!(attributes[1].1, 16);
        assert_eq!(
            driver.vertex_array_index_buffer(raw),
            Some(indices.raw().unwrap())
        );
    }

    #[test]
    fn test_missing_vertex_buffer() {
        let (_, ctx) = context();
        let mut vao = VertexArray::new(&ctx, layout());
        assert!(matches!(vao.alloc(), Err(GraphicsError::Configuration(_))));
    }

    #[test]
    fn test_wrong_buffer_target() {
        let (_, ctx) = context();
        let mut buffer = Buffer::with_data(&ctx, BufferTarget::Uniform, vec![0; 16]);
        buffer.alloc().unwrap();
        let mut vao = VertexArray::new(&ctx, layout());
        assert!(vao.set_vertex_buffer(&buffer).is_err());
    }

    #[test]
    fn test_bind_is_cached() {
        let (driver, ctx) = context();
        let mut vertices = Buffer::with_data(&ctx, BufferTarget::Array, vec![0; 32]);
        vertices.alloc().unwrap();
        let mut vao = VertexArray::new(&ctx, layout());
        vao.set_vertex_buffer(&vertices).unwrap();
        vao.alloc().unwrap();

        let before = driver.stats().vertex_array_binds;
        assert!(!vao.bind().unwrap());
        assert_eq!(driver.stats().vertex_array_binds, before);
    }
}
