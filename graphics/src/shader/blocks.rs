//! Uniform block staging with dirty-range tracking.

use std::ops::Range;
use std::rc::Rc;

use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::GpuResource;
use crate::resources::Buffer;
use crate::types::{BufferTarget, UsageHint};

use super::uniforms::UniformBlockDescriptor;

/// Byte range written since the last upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRange {
    min: usize,
    max: usize,
}

impl Default for DirtyRange {
    fn default() -> Self {
        Self {
            min: usize::MAX,
            max: 0,
        }
    }
}

impl DirtyRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the range to cover `range`.
    pub fn fold(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        self.min = self.min.min(range.start);
        self.max = self.max.max(range.end);
    }

    pub fn is_empty(&self) -> bool {
        self.min >= self.max
    }

    /// The covered bytes, or `None` when clean.
    pub fn range(&self) -> Option<Range<usize>> {
        (!self.is_empty()).then_some(self.min..self.max)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// CPU copy and GPU buffer of one uniform block.
///
/// The block's binding point is its driver block index.
#[derive(Debug)]
pub struct UniformBlock {
    descriptor: UniformBlockDescriptor,
    buffer: Buffer,
    dirty: DirtyRange,
}

impl UniformBlock {
    pub(crate) fn new(context: &Rc<GraphicsContext>, descriptor: UniformBlockDescriptor) -> Self {
        let buffer = Buffer::with_data(
            context,
            BufferTarget::Uniform,
            vec![0; descriptor.size as usize],
        )
        .with_label(format!("uniform block `{}`", descriptor.name));
        Self {
            descriptor,
            buffer,
            dirty: DirtyRange::new(),
        }
    }

    pub fn descriptor(&self) -> &UniformBlockDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn binding(&self) -> u32 {
        self.descriptor.index
    }

    pub fn dirty(&self) -> DirtyRange {
        self.dirty
    }

    /// Staged bytes.
    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub(crate) fn alloc(&mut self) -> Result<(), GraphicsError> {
        self.buffer.set_usage(UsageHint::Dynamic)?;
        self.buffer.alloc()?;
        // Fresh storage is undefined until the first upload.
        self.dirty.fold(0..self.buffer.len());
        Ok(())
    }

    /// Stage `bytes` at `offset` and mark them dirty.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), GraphicsError> {
        if offset + bytes.len() > self.buffer.len() {
            return Err(GraphicsError::configuration(format!(
                "write of {} bytes at offset {offset} exceeds uniform block `{}` of {} bytes",
                bytes.len(),
                self.descriptor.name,
                self.buffer.len()
            )));
        }
        self.buffer.write(offset, bytes)?;
        self.dirty.fold(offset..offset + bytes.len());
        Ok(())
    }

    /// Upload pending bytes. Returns the number of bytes uploaded.
    ///
    /// With `persistent` set only the dirty range is uploaded, and a clean
    /// block uploads nothing. Otherwise the whole block is uploaded.
    pub fn commit(&mut self, persistent: bool) -> Result<usize, GraphicsError> {
        let uploaded = if persistent {
            match self.dirty.range() {
                Some(range) => self.buffer.upload(Some(range))?,
                None => 0,
            }
        } else {
            self.buffer.upload(None)?
        };
        self.dirty.reset();
        Ok(uploaded)
    }

    /// Bind the buffer to the block's binding point through the context cache.
    pub fn bind(&self, context: &GraphicsContext) -> Result<bool, GraphicsError> {
        context.bind_uniform_buffer(self.binding(), self.buffer.handle()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyDriver;
    use crate::config::ContextConfig;

    fn block(config: ContextConfig) -> (Rc<DummyDriver>, UniformBlock) {
        let driver = Rc::new(DummyDriver::new());
        let ctx = GraphicsContext::new(driver.clone(), config);
        let mut block = UniformBlock::new(
            &ctx,
            UniformBlockDescriptor {
                name: "Frame".into(),
                index: 0,
                size: 64,
            },
        );
        block.alloc().unwrap();
        (driver, block)
    }

    #[test]
    fn test_dirty_range_folds() {
        let mut dirty = DirtyRange::new();
        assert!(dirty.is_empty());
        dirty.fold(16..20);
        dirty.fold(4..8);
        dirty.fold(10..10);
        assert_eq!(dirty.range(), Some(4..20));
        dirty.reset();
        assert_eq!(dirty.range(), None);
    }

    #[test]
    fn test_persistent_commit_uploads_dirty_range() {
        let (driver, mut block) = block(ContextConfig::new());
        assert_eq!(block.commit(true).unwrap(), 64);

        block.write(8, &[1; 4]).unwrap();
        block.write(32, &[2; 16]).unwrap();
        assert_eq!(block.dirty().range(), Some(8..48));

        let before = driver.stats().bytes_uploaded;
        assert_eq!(block.commit(true).unwrap(), 40);
        assert_eq!(driver.stats().bytes_uploaded - before, 40);
        assert!(block.dirty().is_empty());
        assert_eq!(block.commit(true).unwrap(), 0);
    }

    #[test]
    fn test_full_commit() {
        let (_, mut block) = block(ContextConfig::new());
        block.write(0, &[1; 4]).unwrap();
        assert_eq!(block.commit(false).unwrap(), 64);
        assert_eq!(block.commit(false).unwrap(), 64);
    }

    #[test]
    fn test_write_out_of_range() {
        let (_, mut block) = block(ContextConfig::new());
        assert!(matches!(
            block.write(60, &[0; 8]),
            Err(GraphicsError::Configuration(_))
        ));
        assert_eq!(block.commit(true).unwrap(), 64);
    }
}
