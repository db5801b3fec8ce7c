//! Binding-state caches.
//!
//! A [`BindingCache`] remembers which native object occupies each logical
//! bind slot so redundant native binds can be skipped. Entries are weak: a
//! freed object is never reported as bound, even if its numeric name has
//! since been reused.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::error::GraphicsError;
use crate::lifecycle::NativeHandle;

/// Fixed-size table of weakly held bindings.
#[derive(Debug)]
pub struct BindingCache {
    name: &'static str,
    slots: RefCell<Vec<Option<Weak<NativeHandle>>>>,
}

impl BindingCache {
    /// Create a cache with `len` slots.
    pub fn new(name: &'static str, len: usize) -> Self {
        Self {
            name,
            slots: RefCell::new(vec![None; len]),
        }
    }

    /// Cache name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if `slot` currently holds exactly `handle`.
    pub fn is_attached(&self, slot: usize, handle: &Rc<NativeHandle>) -> bool {
        self.current(slot)
            .is_some_and(|bound| Rc::ptr_eq(&bound, handle))
    }

    /// Record `handle` as bound to `slot`.
    pub fn attach(&self, slot: usize, handle: &Rc<NativeHandle>) -> Result<(), GraphicsError> {
        let mut slots = self.slots.borrow_mut();
        let len = slots.len();
        let entry = slots.get_mut(slot).ok_or_else(|| {
            GraphicsError::capacity(format!(
                "{} slot {slot} out of range (0..{len})",
                self.name
            ))
        })?;
        *entry = Some(Rc::downgrade(handle));
        Ok(())
    }

    /// Clear `slot`. Out-of-range slots are ignored.
    pub fn detach(&self, slot: usize) {
        if let Some(entry) = self.slots.borrow_mut().get_mut(slot) {
            *entry = None;
        }
    }

    /// Clear every slot.
    pub fn detach_all(&self) {
        self.slots.borrow_mut().iter_mut().for_each(|entry| *entry = None);
    }

    /// Live object bound to `slot`, if any.
    pub fn current(&self, slot: usize) -> Option<Rc<NativeHandle>> {
        self.slots
            .borrow()
            .get(slot)?
            .as_ref()?
            .upgrade()
            .filter(|handle| !handle.is_released())
    }

    /// Check that `slot` exists.
    pub fn check_slot(&self, slot: usize) -> Result<(), GraphicsError> {
        let len = self.len();
        if slot < len {
            Ok(())
        } else {
            Err(GraphicsError::capacity(format!(
                "{} slot {slot} out of range (0..{len})",
                self.name
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawHandle;
    use crate::lifecycle::ResourceKind;

    fn handle(raw: u32) -> Rc<NativeHandle> {
        Rc::new(NativeHandle::new(
            RawHandle::new(raw).unwrap(),
            ResourceKind::Texture,
        ))
    }

    #[test]
    fn test_attach_and_query() {
        let cache = BindingCache::new("texture unit", 4);
        let a = handle(1);
        let b = handle(2);
        cache.attach(2, &a).unwrap();
        assert!(cache.is_attached(2, &a));
        assert!(!cache.is_attached(2, &b));
        assert!(!cache.is_attached(1, &a));
    }

    #[test]
    fn test_dropped_handle_is_not_attached() {
        let cache = BindingCache::new("vertex array", 1);
        let first = handle(5);
        cache.attach(0, &first).unwrap();
        drop(first);

        // Same numeric name, different object.
        let reused = handle(5);
        assert!(!cache.is_attached(0, &reused));
        assert!(cache.current(0).is_none());
    }

    #[test]
    fn test_out_of_range_is_capacity_error() {
        let cache = BindingCache::new("uniform block", 2);
        let err = cache.attach(2, &handle(1)).unwrap_err();
        assert!(matches!(err, GraphicsError::Capacity(_)));
    }

    #[test]
    fn test_detach_all() {
        let cache = BindingCache::new("texture unit", 3);
        let a = handle(1);
        cache.attach(0, &a).unwrap();
        cache.attach(1, &a).unwrap();
        cache.detach_all();
        assert!(cache.current(0).is_none());
        assert!(cache.current(1).is_none());
    }
}
