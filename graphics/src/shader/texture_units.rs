//! Program-local texture unit pool.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::GraphicsError;
use crate::lifecycle::NativeHandle;
use crate::types::TextureDimension;

#[derive(Debug, Default)]
struct Unit {
    occupant: Option<(Weak<NativeHandle>, TextureDimension)>,
    refcount: u32,
}

impl Unit {
    fn holds(&self, texture: &Rc<NativeHandle>) -> bool {
        self.occupant
            .as_ref()
            .is_some_and(|(weak, _)| weak.as_ptr() == Rc::as_ptr(texture))
    }
}

/// Result of assigning a texture to a sampler element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitAssignment {
    /// The element already sampled this texture.
    Unchanged(u32),
    /// The element now samples from this unit.
    Assigned(u32),
    /// The element no longer samples anything.
    Cleared,
}

/// Texture units shared by the sampler uniforms of one program.
///
/// Sampler elements that reference the same texture share a unit; the unit's
/// refcount is the number of elements pointing at it. A unit with refcount 0
/// is free.
#[derive(Debug)]
pub struct TextureUnitPool {
    units: Vec<Unit>,
    assignments: HashMap<(String, u32), u32>,
}

impl TextureUnitPool {
    pub fn new(capacity: u32) -> Self {
        Self {
            units: (0..capacity).map(|_| Unit::default()).collect(),
            assignments: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.units.len() as u32
    }

    /// Point element `element` of sampler `name` at `texture`.
    ///
    /// When every unit is taken by another texture this returns a capacity
    /// error and the element keeps its previous unit.
    pub fn assign(
        &mut self,
        name: &str,
        element: u32,
        texture: Option<(&Rc<NativeHandle>, TextureDimension)>,
    ) -> Result<UnitAssignment, GraphicsError> {
        let key = (name.to_string(), element);
        let previous = self.assignments.get(&key).copied();

        if let (Some(unit), Some((handle, _))) = (previous, texture) {
            if self.units[unit as usize].holds(handle) {
                return Ok(UnitAssignment::Unchanged(unit));
            }
        }

        // Release first so a unit held only by this element can be reused.
        let released = previous.map(|unit| self.release(unit));
        self.assignments.remove(&key);

        let Some((handle, dimension)) = texture else {
            return Ok(UnitAssignment::Cleared);
        };

        let shared = self.units.iter().position(|unit| unit.holds(handle));
        let chosen = shared.or_else(|| self.units.iter().position(|unit| unit.refcount == 0));
        let Some(index) = chosen else {
            if let (Some(unit), Some(occupant)) = (previous, released) {
                self.restore(unit, occupant);
                self.assignments.insert(key, unit);
            }
            log::warn!(
                "No free texture unit for `{name}[{element}]` ({} units in use)",
                self.units.len()
            );
            return Err(GraphicsError::capacity(format!(
                "all {} texture units are in use, cannot assign `{name}[{element}]`",
                self.units.len()
            )));
        };

        let unit = &mut self.units[index];
        if unit.refcount == 0 {
            unit.occupant = Some((Rc::downgrade(handle), dimension));
        }
        unit.refcount += 1;
        self.assignments.insert(key, index as u32);
        Ok(UnitAssignment::Assigned(index as u32))
    }

    /// Unit sampled by element `element` of `name`, if assigned.
    pub fn unit_of(&self, name: &str, element: u32) -> Option<u32> {
        self.assignments.get(&(name.to_string(), element)).copied()
    }

    /// Number of sampler elements sharing `unit`.
    pub fn unit_refcount(&self, unit: u32) -> u32 {
        self.units.get(unit as usize).map_or(0, |u| u.refcount)
    }

    /// Number of units with at least one sampler element.
    pub fn units_in_use(&self) -> usize {
        self.units.iter().filter(|unit| unit.refcount > 0).count()
    }

    /// Occupied units with their texture and dimension.
    pub fn occupied(&self) -> impl Iterator<Item = (u32, &Weak<NativeHandle>, TextureDimension)> {
        self.units.iter().enumerate().filter_map(|(index, unit)| {
            let (texture, dimension) = unit.occupant.as_ref()?;
            (unit.refcount > 0).then_some((index as u32, texture, *dimension))
        })
    }

    /// Drop every assignment.
    pub fn clear(&mut self) {
        self.assignments.clear();
        for unit in &mut self.units {
            *unit = Unit::default();
        }
    }

    /// Decrement `unit`, returning its occupant so it can be restored.
    fn release(&mut self, unit: u32) -> Option<(Weak<NativeHandle>, TextureDimension)> {
        let unit = &mut self.units[unit as usize];
        unit.refcount = unit.refcount.saturating_sub(1);
        if unit.refcount == 0 {
            unit.occupant.take()
        } else {
            unit.occupant.clone()
        }
    }

    fn restore(&mut self, unit: u32, occupant: Option<(Weak<NativeHandle>, TextureDimension)>) {
        let unit = &mut self.units[unit as usize];
        if unit.refcount == 0 {
            unit.occupant = occupant;
        }
        unit.refcount += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawHandle;
    use crate::lifecycle::ResourceKind;

    fn texture(raw: u32) -> Rc<NativeHandle> {
        Rc::new(NativeHandle::new(
            RawHandle::new(raw).unwrap(),
            ResourceKind::Texture,
        ))
    }

    #[test]
    fn test_same_texture_shares_unit() {
        let mut pool = TextureUnitPool::new(4);
        let a = texture(1);
        let b = texture(2);
        let d2 = TextureDimension::D2;

        assert_eq!(pool.assign("maps", 0, Some((&a, d2))).unwrap(), UnitAssignment::Assigned(0));
        assert_eq!(pool.assign("maps", 1, Some((&b, d2))).unwrap(), UnitAssignment::Assigned(1));
        assert_eq!(pool.assign("maps", 2, Some((&a, d2))).unwrap(), UnitAssignment::Assigned(0));
        assert_eq!(pool.units_in_use(), 2);
        assert_eq!(pool.unit_refcount(0), 2);

        assert_eq!(pool.assign("maps", 2, None).unwrap(), UnitAssignment::Cleared);
        assert_eq!(pool.unit_refcount(0), 1);
        assert_eq!(pool.unit_of("maps", 2), None);
        assert_eq!(pool.unit_of("maps", 0), Some(0));
    }

    #[test]
    fn test_reassigning_same_texture_is_unchanged() {
        let mut pool = TextureUnitPool::new(2);
        let a = texture(1);
        pool.assign("albedo", 0, Some((&a, TextureDimension::D2))).unwrap();
        assert_eq!(
            pool.assign("albedo", 0, Some((&a, TextureDimension::D2))).unwrap(),
            UnitAssignment::Unchanged(0)
        );
        assert_eq!(pool.unit_refcount(0), 1);
    }

    #[test]
    fn test_sole_holder_reuses_its_unit() {
        let mut pool = TextureUnitPool::new(1);
        let a = texture(1);
        let b = texture(2);
        pool.assign("albedo", 0, Some((&a, TextureDimension::D2))).unwrap();
        assert_eq!(
            pool.assign("albedo", 0, Some((&b, TextureDimension::D2))).unwrap(),
            UnitAssignment::Assigned(0)
        );
        let (_, occupant, _) = pool.occupied().next().unwrap();
        assert!(Rc::ptr_eq(&occupant.upgrade().unwrap(), &b));
    }

    #[test]
    fn test_exhaustion_keeps_previous_assignment() {
        let mut pool = TextureUnitPool::new(2);
        let (a, b, c) = (texture(1), texture(2), texture(3));
        let d2 = TextureDimension::D2;
        pool.assign("first", 0, Some((&a, d2))).unwrap();
        pool.assign("shared", 0, Some((&a, d2))).unwrap();
        pool.assign("second", 0, Some((&b, d2))).unwrap();

        let err = pool.assign("shared", 0, Some((&c, d2))).unwrap_err();
        assert!(matches!(err, GraphicsError::Capacity(_)));
        assert_eq!(pool.unit_of("shared", 0), Some(0));
        assert_eq!(pool.unit_refcount(0), 2);
        assert_eq!(pool.unit_refcount(1), 1);
    }

    #[test]
    fn test_clear() {
        let mut pool = TextureUnitPool::new(2);
        let a = texture(1);
        pool.assign("albedo", 0, Some((&a, TextureDimension::Cube))).unwrap();
        pool.clear();
        assert_eq!(pool.units_in_use(), 0);
        assert_eq!(pool.occupied().count(), 0);
    }
}
