//! GPU buffer resource.

use std::ops::Range;
use std::rc::Rc;

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, ResourceKind};
use crate::types::{BufferTarget, UsageHint};

/// A GPU buffer with a CPU staging copy.
///
/// The staging bytes are the source of every upload; `alloc` reserves
/// zero-filled storage of the same size.
///
/// # Example
///
/// ```ignore
/// let mut buffer = Buffer::with_data(&ctx, BufferTarget::Array, bytes)
///     .with_label("terrain vertices");
/// buffer.set_usage(UsageHint::Dynamic)?;
/// buffer.alloc()?;
/// buffer.upload(None)?;
/// ```
pub struct Buffer {
    context: Rc<GraphicsContext>,
    lifecycle: Lifecycle,
    target: BufferTarget,
    usage: UsageHint,
    data: Vec<u8>,
    label: Option<String>,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new(context: &Rc<GraphicsContext>, target: BufferTarget) -> Self {
        Self::with_data(context, target, Vec::new())
    }

    /// Create a buffer holding `data`.
    pub fn with_data(context: &Rc<GraphicsContext>, target: BufferTarget, data: Vec<u8>) -> Self {
        Self {
            context: Rc::clone(context),
            lifecycle: Lifecycle::new(),
            target,
            usage: UsageHint::default(),
            data,
            label: None,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    pub fn usage(&self) -> UsageHint {
        self.usage
    }

    /// Change the usage hint. Only allowed while not allocated.
    pub fn set_usage(&mut self, usage: UsageHint) -> Result<(), GraphicsError> {
        if self.is_allocated() {
            return Err(GraphicsError::configuration(format!(
                "usage hint of buffer `{}` is fixed once allocated",
                self.label().unwrap_or("unlabeled")
            )));
        }
        self.usage = usage;
        Ok(())
    }

    /// Size of the staging copy in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Staged bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the staged bytes.
    ///
    /// While allocated the storage size is fixed, so the length must match.
    pub fn set_data(&mut self, data: Vec<u8>) -> Result<(), GraphicsError> {
        if self.is_allocated() && data.len() != self.data.len() {
            return Err(GraphicsError::configuration(format!(
                "buffer `{}` holds {} bytes, cannot restage {} bytes while allocated",
                self.label().unwrap_or("unlabeled"),
                self.data.len(),
                data.len()
            )));
        }
        self.data = data;
        Ok(())
    }

    /// Overwrite staged bytes at `offset`.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), GraphicsError> {
        let range = offset..offset + bytes.len();
        self.check_range(&range)?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Push staged bytes to the GPU, optionally only `range`.
    ///
    /// Returns the number of bytes uploaded.
    pub fn upload(&mut self, range: Option<Range<usize>>) -> Result<usize, GraphicsError> {
        let raw = self.raw()?;
        let range = range.unwrap_or(0..self.data.len());
        self.check_range(&range)?;
        if range.is_empty() {
            return Ok(0);
        }

        self.bind_raw(raw);
        self.context
            .driver()
            .buffer_sub_data(self.target, range.start, &self.data[range.clone()]);
        log::trace!(
            "Uploaded {} bytes to buffer {raw} at offset {}",
            range.len(),
            range.start
        );
        Ok(range.len())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), GraphicsError> {
        if range.start > range.end || range.end > self.data.len() {
            return Err(GraphicsError::configuration(format!(
                "range {}..{} outside buffer `{}` of {} bytes",
                range.start,
                range.end,
                self.label().unwrap_or("unlabeled"),
                self.data.len()
            )));
        }
        Ok(())
    }

    fn bind_raw(&self, raw: RawHandle) {
        // The element binding is vertex array state; unbind first so the
        // cached vertex array stays untouched.
        if self.target == BufferTarget::ElementArray {
            self.context.unbind_vertex_array();
        }
        self.context.driver().bind_buffer(self.target, Some(raw));
    }
}

impl GpuResource for Buffer {
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
        ResourceKind::Buffer
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        self.context.driver().create_buffer()
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        let raw = self.raw()?;
        self.bind_raw(raw);
        self.context
            .driver()
            .buffer_storage(self.target, self.data.len(), self.usage);
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.context.driver().delete_buffer(raw);
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("target", &self.target)
            .field("usage", &self.usage)
            .field("size", &self.data.len())
            .field("state", &self.lifecycle.state())
            .field("label", &self.label)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Buffer: Send, Sync);
