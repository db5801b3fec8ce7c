//! Off-screen framebuffer resource.

use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;
use crate::lifecycle::{GpuResource, Lifecycle, NativeHandle, ResourceKind};
use crate::types::{Attachment, ClearFlags};

use super::Texture;

/// A framebuffer rendering into attached textures.
///
/// Attachments are declared before `alloc` and are fixed while allocated.
/// The framebuffer does not keep its textures alive; they must outlive it.
pub struct Framebuffer {
    context: Rc<GraphicsContext>,
    lifecycle: Lifecycle,
    attachments: BTreeMap<Attachment, Weak<NativeHandle>>,
    label: Option<String>,
}

impl Framebuffer {
    pub fn new(context: &Rc<GraphicsContext>) -> Self {
        Self {
            context: Rc::clone(context),
            lifecycle: Lifecycle::new(),
            attachments: BTreeMap::new(),
            label: None,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a color texture at `index`.
    pub fn attach_color(&mut self, index: u32, texture: &Texture) -> Result<(), GraphicsError> {
        self.check_mutable()?;
        let max = self.context.capabilities().max_color_attachments;
        if index >= max {
            return Err(GraphicsError::capacity(format!(
                "color attachment {index} exceeds device limit of {max}"
            )));
        }
        if texture.format().is_depth_stencil() {
            return Err(GraphicsError::configuration(format!(
                "depth format {:?} cannot be a color attachment",
                texture.format()
            )));
        }
        self.attach(Attachment::Color(index), texture)
    }

    /// Attach a depth (or depth-stencil) texture.
    pub fn attach_depth(&mut self, texture: &Texture) -> Result<(), GraphicsError> {
        let format = texture.format();
        if !format.is_depth_stencil() {
            return Err(GraphicsError::configuration(format!(
                "color format {format:?} cannot be a depth attachment"
            )));
        }
        let attachment = if format.has_stencil() {
            Attachment::DepthStencil
        } else {
            Attachment::Depth
        };
        self.attach(attachment, texture)
    }

    /// Remove an attachment. Only allowed while not allocated.
    pub fn detach(&mut self, attachment: Attachment) -> Result<(), GraphicsError> {
        self.check_mutable()?;
        self.attachments.remove(&attachment);
        Ok(())
    }

    /// Declared attachment points.
    pub fn attachments(&self) -> impl Iterator<Item = Attachment> + '_ {
        self.attachments.keys().copied()
    }

    /// Bind this framebuffer for drawing.
    pub fn bind(&self) -> Result<bool, GraphicsError> {
        self.context.bind_framebuffer(Some(self.handle()?))
    }

    /// Bind the default framebuffer.
    pub fn unbind(&self) -> Result<bool, GraphicsError> {
        self.context.bind_framebuffer(None)
    }

    /// Clear the attachments selected by `flags`.
    pub fn clear(&self, flags: ClearFlags, color: [f32; 4], depth: f32) -> Result<(), GraphicsError> {
        self.bind()?;
        self.context.driver().clear(flags, color, depth);
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), GraphicsError> {
        if self.is_allocated() {
            return Err(GraphicsError::configuration(format!(
                "attachments of framebuffer `{}` are fixed once allocated",
                self.label().unwrap_or("unlabeled")
            )));
        }
        Ok(())
    }

    fn attach(&mut self, attachment: Attachment, texture: &Texture) -> Result<(), GraphicsError> {
        self.check_mutable()?;
        if self.attachments.contains_key(&attachment) {
            return Err(GraphicsError::configuration(format!(
                "{attachment:?} of framebuffer `{}` is already attached",
                self.label().unwrap_or("unlabeled")
            )));
        }
        let handle = texture.handle()?;
        self.attachments.insert(attachment, Rc::downgrade(handle));
        Ok(())
    }
}

impl GpuResource for Framebuffer {
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
        ResourceKind::Framebuffer
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn create_native(&mut self) -> Result<RawHandle, GraphicsError> {
        self.context.driver().create_framebuffer()
    }

    fn setup(&mut self) -> Result<(), GraphicsError> {
        let handle = Rc::clone(self.handle()?);
        self.context.bind_framebuffer(Some(&handle))?;

        let driver = self.context.driver();
        let mut outputs: Vec<Option<u32>> = Vec::new();
        for (attachment, texture) in &self.attachments {
            let texture = texture
                .upgrade()
                .filter(|texture| !texture.is_released())
                .ok_or_else(|| {
                    GraphicsError::configuration(format!(
                        "texture attached at {attachment:?} was freed"
                    ))
                })?;
            driver.framebuffer_texture(*attachment, Some(texture.raw()));
            if let Attachment::Color(index) = *attachment {
                let slot = index as usize;
                if outputs.len() <= slot {
                    outputs.resize(slot + 1, None);
                }
                outputs[slot] = Some(index);
            }
        }
        // Output i writes attachment i; unattached indices below the highest are NONE.
        driver.draw_buffers(&outputs);

        if !driver.framebuffer_complete() {
            return Err(GraphicsError::configuration(format!(
                "framebuffer `{}` is incomplete",
                self.label().unwrap_or("unlabeled")
            )));
        }
        Ok(())
    }

    fn destroy_native(&mut self, raw: RawHandle) {
        self.context.driver().delete_framebuffer(raw);
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("attachments", &self.attachments.keys().collect::<Vec<_>>())
            .field("state", &self.lifecycle.state())
            .field("label", &self.label)
            .finish()
    }
}

static_assertions::assert_not_impl_any!(Framebuffer: Send, Sync);
