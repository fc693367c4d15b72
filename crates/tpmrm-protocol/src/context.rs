use crate::codes::Handle;
use crate::error::ParseError;
use crate::reader::{Reader, put_sized};

/// A saved object or session context (`TPMS_CONTEXT`).
///
/// The resource manager never looks inside one; it stores and forwards the
/// encoded bytes. The device side uses `sequence` to detect context gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedContext {
    pub sequence: u64,
    pub saved_handle: Handle,
    pub hierarchy: Handle,
    pub blob: Vec<u8>,
}

impl SavedContext {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(18 + self.blob.len());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out.extend_from_slice(&self.saved_handle.to_be_bytes());
        out.extend_from_slice(&self.hierarchy.to_be_bytes());
        put_sized(&mut out, &self.blob);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(data);
        let context = Self {
            sequence: r.u64()?,
            saved_handle: r.u32()?,
            hierarchy: r.u32()?,
            blob: r.sized()?.to_vec(),
        };
        if !r.is_empty() {
            return Err(ParseError::MalformedParameters("trailing bytes after context"));
        }
        Ok(context)
    }
}
