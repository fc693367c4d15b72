//! `TPM2_GetCapability(TPM_CAP_HANDLES)` payloads.

use crate::codes::{Handle, TPM_CAP_HANDLES};
use crate::error::ParseError;
use crate::reader::Reader;

/// Parameters of a handle capability query: list up to `count` handles
/// starting at `property`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleQuery {
    pub property: Handle,
    pub count: u32,
}

impl HandleQuery {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12);
        out.extend_from_slice(&TPM_CAP_HANDLES.to_be_bytes());
        out.extend_from_slice(&self.property.to_be_bytes());
        out.extend_from_slice(&self.count.to_be_bytes());
        out
    }

    pub fn decode(parameters: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(parameters);
        if r.u32()? != TPM_CAP_HANDLES {
            return Err(ParseError::MalformedParameters("unsupported capability"));
        }
        Ok(Self {
            property: r.u32()?,
            count: r.u32()?,
        })
    }
}

/// Response parameters of a handle capability query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleList {
    pub more_data: bool,
    pub handles: Vec<Handle>,
}

impl HandleList {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + 4 * self.handles.len());
        out.push(u8::from(self.more_data));
        out.extend_from_slice(&TPM_CAP_HANDLES.to_be_bytes());
        out.extend_from_slice(&(self.handles.len() as u32).to_be_bytes());
        for handle in &self.handles {
            out.extend_from_slice(&handle.to_be_bytes());
        }
        out
    }

    pub fn decode(parameters: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(parameters);
        let more_data = r.u8()? != 0;
        if r.u32()? != TPM_CAP_HANDLES {
            return Err(ParseError::MalformedParameters("unexpected capability in response"));
        }
        let count = r.u32()? as usize;
        if count > r.remaining() / 4 {
            return Err(ParseError::MalformedParameters("handle list shorter than its count"));
        }
        let handles = (0..count).map(|_| r.u32()).collect::<Result<_, _>>()?;
        Ok(Self { more_data, handles })
    }
}
