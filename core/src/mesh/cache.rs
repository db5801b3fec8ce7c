//! Per-record-type layout memoization.

use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::layout::{LayoutError, VertexRecordLayout};
use super::schema::VertexRecord;

/// Caches one derived [`VertexRecordLayout`] per [`VertexRecord`] type.
///
/// A layout depends only on the record's schema and the device's vertex
/// attribute limit, so each type is derived once and shared by every buffer
/// of that type.
#[derive(Debug)]
pub struct LayoutCache {
    max_vertex_attributes: u32,
    layouts: RefCell<HashMap<TypeId, Rc<VertexRecordLayout>>>,
}

impl LayoutCache {
    /// Create an empty cache for a device with `max_vertex_attributes` registers.
    pub fn new(max_vertex_attributes: u32) -> Self {
        Self {
            max_vertex_attributes,
            layouts: RefCell::new(HashMap::new()),
        }
    }

    /// Get the cached layout of `V`, deriving it on first use.
    ///
    /// Fails if the schema is invalid or if its stride disagrees with
    /// `size_of::<V>()`. Failures are not cached.
    pub fn get_or_derive<V: VertexRecord>(&self) -> Result<Rc<VertexRecordLayout>, LayoutError> {
        let key = TypeId::of::<V>();
        if let Some(layout) = self.layouts.borrow().get(&key) {
            log::trace!("Layout cache hit for {}", type_name::<V>());
            return Ok(Rc::clone(layout));
        }

        let layout = VertexRecordLayout::derive(&V::schema(), self.max_vertex_attributes)?;
        let actual = std::mem::size_of::<V>() as u32;
        if layout.stride() != actual {
            return Err(LayoutError::RecordSizeMismatch {
                record: type_name::<V>(),
                expected: layout.stride(),
                actual,
            });
        }

        log::debug!(
            "Derived layout for {}: stride {} bytes",
            type_name::<V>(),
            layout.stride()
        );
        let layout = Rc::new(layout);
        self.layouts.borrow_mut().insert(key, Rc::clone(&layout));
        Ok(layout)
    }

    /// Get the layout of `V` if it has already been derived.
    pub fn get<V: VertexRecord>(&self) -> Option<Rc<VertexRecordLayout>> {
        self.layouts.borrow().get(&TypeId::of::<V>()).cloned()
    }

    /// Device attribute limit layouts are validated against.
    pub fn max_vertex_attributes(&self) -> u32 {
        self.max_vertex_attributes
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.layouts.borrow().len()
    }

    /// Check if nothing has been derived yet.
    pub fn is_empty(&self) -> bool {
        self.layouts.borrow().is_empty()
    }

    /// Drop all cached layouts.
    pub fn clear(&self) {
        self.layouts.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{VertexAttribute, VertexSchema};

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct ColoredVertex {
        position: [f32; 3],
        color: [u8; 4],
    }

    impl VertexRecord for ColoredVertex {
        fn schema() -> VertexSchema {
            VertexSchema::new()
                .with(VertexAttribute::vec3("position", 0))
                .with(VertexAttribute::packed_color("color", 1, 4))
        }
    }

    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Misdeclared {
        position: [f32; 4],
    }

    impl VertexRecord for Misdeclared {
        fn schema() -> VertexSchema {
            VertexSchema::new().with(VertexAttribute::vec3("position", 0))
        }
    }

    #[test]
    fn test_derives_once() {
        let cache = LayoutCache::new(16);
        assert!(cache.get::<ColoredVertex>().is_none());

        let first = cache.get_or_derive::<ColoredVertex>().unwrap();
        let second = cache.get_or_derive::<ColoredVertex>().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.stride(), 16);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_size_mismatch_not_cached() {
        let cache = LayoutCache::new(16);
        let err = cache.get_or_derive::<Misdeclared>().unwrap_err();
        assert!(matches!(
            err,
            LayoutError::RecordSizeMismatch {
                expected: 12,
                actual: 16,
                ..
            }
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let cache = LayoutCache::new(16);
        cache.get_or_derive::<ColoredVertex>().unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
