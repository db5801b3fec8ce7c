//! Debug allocation registry.
//!
//! When leak tracking is enabled, every allocated native object is recorded
//! here with its label. Resources free themselves on drop, so anything still
//! listed when [`ResourceRegistry::report_leaks`] runs is owned by something
//! that was never dropped (a reference cycle or a `mem::forget`). The
//! registry only observes; it never frees or mutates resources.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::backend::RawHandle;
use crate::lifecycle::{NativeHandle, ResourceKind};

#[derive(Debug)]
struct Entry {
    handle: Weak<NativeHandle>,
    label: Option<String>,
}

/// An allocation still tracked by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveAllocation {
    pub kind: ResourceKind,
    pub raw: RawHandle,
    pub label: Option<String>,
}

/// Tracks live allocations of one context.
#[derive(Debug)]
pub struct ResourceRegistry {
    enabled: bool,
    entries: RefCell<Vec<Entry>>,
}

impl ResourceRegistry {
    /// Create a registry. A disabled registry ignores every call.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RefCell::new(Vec::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record a new allocation.
    pub fn track(&self, handle: &Rc<NativeHandle>, label: Option<&str>) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| entry.handle.strong_count() > 0);
        entries.push(Entry {
            handle: Rc::downgrade(handle),
            label: label.map(str::to_owned),
        });
        log::trace!(
            "ResourceRegistry: tracking {} {} ({} live)",
            handle.kind(),
            handle.raw(),
            entries.len()
        );
    }

    /// Forget a freed allocation.
    pub fn untrack(&self, handle: &Rc<NativeHandle>) {
        if !self.enabled {
            return;
        }
        let target = Rc::downgrade(handle);
        self.entries
            .borrow_mut()
            .retain(|entry| !entry.handle.ptr_eq(&target) && entry.handle.strong_count() > 0);
    }

    /// Allocations that are still live.
    pub fn live(&self) -> Vec<LiveAllocation> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| {
                let handle = entry.handle.upgrade()?;
                (!handle.is_released()).then(|| LiveAllocation {
                    kind: handle.kind(),
                    raw: handle.raw(),
                    label: entry.label.clone(),
                })
            })
            .collect()
    }

    /// Number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live().len()
    }

    /// Log every live allocation as a warning and return how many there are.
    pub fn report_leaks(&self) -> usize {
        let live = self.live();
        for allocation in &live {
            log::warn!(
                "Leaked {} {} ({})",
                allocation.kind,
                allocation.raw,
                allocation.label.as_deref().unwrap_or("unlabeled")
            );
        }
        if !live.is_empty() {
            log::warn!("{} GPU allocations still live", live.len());
        }
        live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: u32) -> Rc<NativeHandle> {
        Rc::new(NativeHandle::new(
            RawHandle::new(raw).unwrap(),
            ResourceKind::Buffer,
        ))
    }

    #[test]
    fn test_track_untrack() {
        let registry = ResourceRegistry::new(true);
        let a = handle(1);
        let b = handle(2);
        registry.track(&a, Some("vertices"));
        registry.track(&b, None);
        assert_eq!(registry.live_count(), 2);

        registry.untrack(&a);
        let live = registry.live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].raw, b.raw());
        assert_eq!(registry.report_leaks(), 1);
    }

    #[test]
    fn test_disabled_registry_ignores_tracking() {
        let registry = ResourceRegistry::new(false);
        let a = handle(1);
        registry.track(&a, None);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_dropped_handles_are_not_live() {
        let registry = ResourceRegistry::new(true);
        let a = handle(1);
        registry.track(&a, None);
        drop(a);
        assert_eq!(registry.report_leaks(), 0);
    }
}
