//! Keeps contexts that callers saved themselves loadable after the manager
//! has re-saved the same session behind their back.

use std::collections::HashMap;

use tpmrm_protocol::codes::Handle;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContextMapping {
    external: Vec<u8>,
    actual: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBridge {
    mappings: HashMap<Handle, ContextMapping>,
}

impl ContextBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// A caller saved `session` and received `context`. Replaces any earlier
    /// mapping for the same session.
    pub fn on_external_save(&mut self, session: Handle, context: Vec<u8>) {
        self.mappings.insert(
            session,
            ContextMapping {
                external: context.clone(),
                actual: context,
            },
        );
    }

    /// The context that currently stands in for `external`.
    pub fn translate_for_load<'a>(&'a self, external: &'a [u8]) -> &'a [u8] {
        self.mappings
            .values()
            .find(|mapping| mapping.external == external)
            .map_or(external, |mapping| mapping.actual.as_slice())
    }

    /// The manager replaced context `old` with `new`.
    pub fn remap(&mut self, old: &[u8], new: &[u8]) {
        for mapping in self.mappings.values_mut() {
            if mapping.actual == old {
                mapping.actual = new.to_vec();
            }
        }
    }

    pub fn remove(&mut self, session: Handle) {
        self.mappings.remove(&session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_contexts_pass_through() {
        let bridge = ContextBridge::new();
        assert_eq!(bridge.translate_for_load(b"abc"), b"abc");
    }

    #[test]
    fn remap_redirects_external_context() {
        let mut bridge = ContextBridge::new();
        bridge.on_external_save(0x0200_0000, b"ctx1".to_vec());
        assert_eq!(bridge.translate_for_load(b"ctx1"), b"ctx1");

        bridge.remap(b"ctx1", b"ctx2");
        assert_eq!(bridge.translate_for_load(b"ctx1"), b"ctx2");
        bridge.remap(b"ctx2", b"ctx3");
        assert_eq!(bridge.translate_for_load(b"ctx1"), b"ctx3");
        // Unrelated remaps leave the mapping alone.
        bridge.remap(b"other", b"ctx9");
        assert_eq!(bridge.translate_for_load(b"ctx1"), b"ctx3");

        bridge.remove(0x0200_0000);
        assert!(bridge.is_empty());
        assert_eq!(bridge.translate_for_load(b"ctx1"), b"ctx1");
    }
}
