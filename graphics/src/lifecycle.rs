//! Resource lifecycle state machine.
//!
//! Every GPU-backed object (buffer, texture, framebuffer, shader program,
//! vertex array) goes through `Unallocated -> Allocated -> Freed`, with
//! `Freed -> Allocated` allowed for re-allocation. The [`GpuResource`] trait
//! supplies `alloc`/`free` once; implementors only create, set up and destroy
//! their native object.
//!
//! While allocated, a resource owns its [`NativeHandle`] through an `Rc`.
//! Binding caches and the registry only hold `Weak` references, so freeing a
//! resource is visible to every observer immediately, even if the driver
//! hands the same numeric name to a later object.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::backend::RawHandle;
use crate::context::GraphicsContext;
use crate::error::GraphicsError;

/// Category of a native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Framebuffer,
    Program,
    VertexArray,
}

impl ResourceKind {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Framebuffer => "framebuffer",
            Self::Program => "shader program",
            Self::VertexArray => "vertex array",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// Never allocated.
    #[default]
    Unallocated,
    /// Holds a live native object.
    Allocated,
    /// Was allocated, then freed.
    ///
    /// Equivalent to `Unallocated` for every operation: the handle is gone,
    /// `free` is a no-op and `alloc` starts over. It is kept distinct only so
    /// diagnostics can tell a released resource from one never allocated.
    Freed,
}

/// A live native object, owned by exactly one resource.
#[derive(Debug)]
pub struct NativeHandle {
    raw: RawHandle,
    kind: ResourceKind,
    released: Cell<bool>,
}

impl NativeHandle {
    pub(crate) fn new(raw: RawHandle, kind: ResourceKind) -> Self {
        Self {
            raw,
            kind,
            released: Cell::new(false),
        }
    }

    /// Driver name of the object.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// Object category.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Check if the owning resource has freed this object.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }
}

/// Per-resource lifecycle bookkeeping.
#[derive(Debug, Default)]
pub struct Lifecycle {
    state: ResourceState,
    handle: Option<Rc<NativeHandle>>,
}

impl Lifecycle {
    /// Create an unallocated lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Native handle, if allocated.
    pub fn handle(&self) -> Option<&Rc<NativeHandle>> {
        self.handle.as_ref()
    }

    fn attach(&mut self, handle: Rc<NativeHandle>) {
        self.handle = Some(handle);
        self.state = ResourceState::Allocated;
    }

    fn release(&mut self) -> Option<Rc<NativeHandle>> {
        let handle = self.handle.take()?;
        handle.released.set(true);
        self.state = ResourceState::Freed;
        Some(handle)
    }
}

/// A GPU-backed object with an explicit allocation lifecycle.
///
/// Implementors must call [`free`](Self::free) from their `Drop`.
pub trait GpuResource {
    /// Context the resource lives in.
    fn context(&self) -> &Rc<GraphicsContext>;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    fn kind(&self) -> ResourceKind;

    /// Debug label.
    fn label(&self) -> Option<&str> {
        None
    }

    /// Create the native object.
    fn create_native(&mut self) -> Result<RawHandle, GraphicsError>;

    /// One-time setup after the handle is recorded (reserve storage, attach
    /// targets, reflect uniforms).
    fn setup(&mut self) -> Result<(), GraphicsError> {
        Ok(())
    }

    /// Delete the native object.
    fn destroy_native(&mut self, raw: RawHandle);

    /// Allocate the native object, freeing the previous one first.
    ///
    /// Calling `alloc` twice in a row is equivalent to `free` then `alloc`.
    /// If setup fails the new object is freed again before the error is
    /// returned.
    fn alloc(&mut self) -> Result<(), GraphicsError> {
        if self.is_allocated() {
            self.free();
        }

        let raw = self.create_native()?;
        let handle = Rc::new(NativeHandle::new(raw, self.kind()));
        self.context().registry().track(&handle, self.label());
        self.lifecycle_mut().attach(handle);

        if let Err(err) = self.setup() {
            log::debug!("Setup of {} {raw} failed: {err}", self.kind());
            self.free();
            return Err(err);
        }

        log::debug!(
            "Allocated {} {raw} ({})",
            self.kind(),
            self.label().unwrap_or("unlabeled")
        );
        Ok(())
    }

    /// Release the native object. No-op unless allocated.
    fn free(&mut self) {
        let Some(handle) = self.lifecycle_mut().release() else {
            return;
        };
        self.context().registry().untrack(&handle);
        self.destroy_native(handle.raw());
        log::debug!("Freed {} {}", handle.kind(), handle.raw());
    }

    fn state(&self) -> ResourceState {
        self.lifecycle().state()
    }

    fn is_allocated(&self) -> bool {
        self.lifecycle().state() == ResourceState::Allocated
    }

    /// Native handle, or a configuration error if not allocated.
    fn handle(&self) -> Result<&Rc<NativeHandle>, GraphicsError> {
        self.lifecycle().handle().ok_or_else(|| {
            GraphicsError::configuration(format!(
                "{} `{}` is not allocated",
                self.kind(),
                self.label().unwrap_or("unlabeled")
            ))
        })
    }

    /// Driver name of the native object, if allocated.
    fn raw(&self) -> Result<RawHandle, GraphicsError> {
        self.handle().map(|handle| handle.raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_release() {
        let mut lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ResourceState::Unallocated);
        assert!(lifecycle.release().is_none());

        let handle = Rc::new(NativeHandle::new(
            RawHandle::new(3).unwrap(),
            ResourceKind::Buffer,
        ));
        let weak = Rc::downgrade(&handle);
        lifecycle.attach(handle);
        assert_eq!(lifecycle.state(), ResourceState::Allocated);

        let released = lifecycle.release().unwrap();
        assert!(released.is_released());
        assert_eq!(lifecycle.state(), ResourceState::Freed);
        drop(released);
        assert!(weak.upgrade().is_none());

        // Freed acts like Unallocated.
        assert!(lifecycle.handle().is_none());
        assert!(lifecycle.release().is_none());
        assert_eq!(lifecycle.state(), ResourceState::Freed);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ResourceKind::VertexArray.to_string(), "vertex array");
    }
}
