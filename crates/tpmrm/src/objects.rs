//! Virtual object handle table.
//!
//! Two maps kept in lockstep: virtual handle to [`HandleInfo`], and actual
//! handle to virtual handle for every object that is currently loaded.

use std::collections::HashMap;

use tpmrm_protocol::codes::Handle;

use crate::error::HandleError;
use crate::handle::{HandleInfo, Residency};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTable {
    first: Handle,
    last: Handle,
    next: Handle,
    virtual_objects: HashMap<Handle, HandleInfo>,
    actual_index: HashMap<Handle, Handle>,
}

impl ObjectTable {
    pub fn new(first: Handle, last: Handle) -> Self {
        Self {
            first,
            last,
            next: first,
            virtual_objects: HashMap::new(),
            actual_index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.virtual_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.virtual_objects.is_empty()
    }

    pub fn contains(&self, virtual_handle: Handle) -> bool {
        self.virtual_objects.contains_key(&virtual_handle)
    }

    pub fn lookup(&self, virtual_handle: Handle) -> Result<&HandleInfo, HandleError> {
        self.virtual_objects
            .get(&virtual_handle)
            .ok_or(HandleError::Unknown(virtual_handle))
    }

    pub fn virtual_for_actual(&self, actual: Handle) -> Option<Handle> {
        self.actual_index.get(&actual).copied()
    }

    /// Next free virtual handle in the cyclic range. Does not reserve it.
    pub fn allocate_virtual(&mut self) -> Result<Handle, HandleError> {
        let span = u64::from(self.last - self.first) + 1;
        if self.virtual_objects.len() as u64 >= span {
            return Err(HandleError::ObjectCapacity);
        }
        loop {
            let candidate = self.next;
            self.next = if candidate == self.last {
                self.first
            } else {
                candidate + 1
            };
            if !self.virtual_objects.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Maps an actual handle the device just returned. Returns the existing
    /// virtual handle if `actual` is already mapped.
    pub fn register_output(&mut self, actual: Handle, now: u64) -> Result<Handle, HandleError> {
        if let Some(virtual_handle) = self.virtual_for_actual(actual) {
            return Ok(virtual_handle);
        }
        let virtual_handle = self.allocate_virtual()?;
        self.virtual_objects
            .insert(virtual_handle, HandleInfo::loaded(actual, now));
        self.actual_index.insert(actual, virtual_handle);
        Ok(virtual_handle)
    }

    /// Records that an evicted object was reloaded under `actual`.
    pub fn mark_loaded(&mut self, virtual_handle: Handle, actual: Handle, now: u64) {
        if let Some(info) = self.virtual_objects.get_mut(&virtual_handle) {
            if let Residency::Loaded(previous) = info.residency {
                self.actual_index.remove(&previous);
            }
            info.residency = Residency::Loaded(actual);
            info.time_of_last_use = now;
            self.actual_index.insert(actual, virtual_handle);
        }
    }

    /// Records that an object was saved and flushed from the device.
    pub fn mark_saved(&mut self, virtual_handle: Handle, context: Vec<u8>) {
        if let Some(info) = self.virtual_objects.get_mut(&virtual_handle) {
            if let Residency::Loaded(actual) = info.residency {
                self.actual_index.remove(&actual);
            }
            info.residency = Residency::Saved(context);
        }
    }

    pub fn touch(&mut self, virtual_handle: Handle, now: u64) {
        if let Some(info) = self.virtual_objects.get_mut(&virtual_handle) {
            info.time_of_last_use = now;
        }
    }

    /// Forgets a virtual handle in both directions. Unknown handles are ignored.
    pub fn cleanup(&mut self, virtual_handle: Handle) -> Option<HandleInfo> {
        let info = self.virtual_objects.remove(&virtual_handle)?;
        if let Residency::Loaded(actual) = info.residency {
            self.actual_index.remove(&actual);
        }
        Some(info)
    }

    /// Loaded objects as `(virtual, actual)` pairs, oldest first.
    pub fn loaded(&self) -> Vec<(Handle, Handle)> {
        let mut loaded: Vec<_> = self
            .virtual_objects
            .iter()
            .filter_map(|(&v, info)| info.actual_handle().map(|a| (info.time_of_create, v, a)))
            .collect();
        loaded.sort_unstable();
        loaded.into_iter().map(|(_, v, a)| (v, a)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: Handle = 0x8080_0000;

    #[test]
    fn register_output_is_idempotent() {
        let mut table = ObjectTable::new(FIRST, FIRST + 10);
        let v1 = table.register_output(0x8000_0001, 1).unwrap();
        let v2 = table.register_output(0x8000_0002, 2).unwrap();
        assert_eq!(v1, FIRST);
        assert_eq!(v2, FIRST + 1);
        assert_eq!(table.register_output(0x8000_0001, 3).unwrap(), v1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.virtual_for_actual(0x8000_0002), Some(v2));
    }

    #[test]
    fn allocation_wraps_and_skips_live_handles() {
        let mut table = ObjectTable::new(FIRST, FIRST + 2);
        let a = table.register_output(0x8000_0001, 1).unwrap();
        let b = table.register_output(0x8000_0002, 2).unwrap();
        let c = table.register_output(0x8000_0003, 3).unwrap();
        assert_eq!(table.allocate_virtual(), Err(HandleError::ObjectCapacity));

        table.cleanup(b);
        assert_eq!(table.register_output(0x8000_0004, 4).unwrap(), b);

        table.cleanup(a);
        table.cleanup(c);
        // The cursor sits after `b`; it wraps past the end to reuse `c` then `a`.
        assert_eq!(table.register_output(0x8000_0005, 5).unwrap(), c);
        assert_eq!(table.register_output(0x8000_0006, 6).unwrap(), a);
    }

    #[test]
    fn reverse_index_follows_residency() {
        let mut table = ObjectTable::new(FIRST, FIRST + 10);
        let v = table.register_output(0x8000_0001, 1).unwrap();

        table.mark_saved(v, vec![1, 2, 3]);
        assert_eq!(table.virtual_for_actual(0x8000_0001), None);
        assert_eq!(table.lookup(v).unwrap().saved_context(), Some(&[1u8, 2, 3][..]));
        assert!(table.loaded().is_empty());

        table.mark_loaded(v, 0x8000_0009, 5);
        assert_eq!(table.virtual_for_actual(0x8000_0009), Some(v));
        assert_eq!(table.lookup(v).unwrap().time_of_last_use, 5);
        assert_eq!(table.loaded(), vec![(v, 0x8000_0009)]);

        assert!(table.cleanup(v).is_some());
        assert!(table.cleanup(v).is_none());
        assert_eq!(table.virtual_for_actual(0x8000_0009), None);
        assert_eq!(table.lookup(v), Err(HandleError::Unknown(v)));
    }

    #[test]
    fn loaded_lists_oldest_first() {
        let mut table = ObjectTable::new(FIRST, FIRST + 10);
        let a = table.register_output(0x8000_0003, 7).unwrap();
        let b = table.register_output(0x8000_0001, 9).unwrap();
        let c = table.register_output(0x8000_0002, 8).unwrap();
        assert_eq!(
            table.loaded(),
            vec![(a, 0x8000_0003), (c, 0x8000_0002), (b, 0x8000_0001)]
        );
    }
}
