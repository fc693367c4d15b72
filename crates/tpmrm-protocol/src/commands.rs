//! Builders for the commands the resource manager issues on its own behalf.

use crate::capability::HandleQuery;
use crate::codes::{
    Handle, TPM_CC_CONTEXT_LOAD, TPM_CC_CONTEXT_SAVE, TPM_CC_FLUSH_CONTEXT,
    TPM_CC_GET_CAPABILITY, TPM_CC_SELF_TEST, TPM_CC_STARTUP,
};
use crate::message::encode_command;

pub fn startup(startup_type: u16) -> Vec<u8> {
    encode_command(TPM_CC_STARTUP, &[], &[], &startup_type.to_be_bytes())
}

pub fn self_test(full_test: bool) -> Vec<u8> {
    encode_command(TPM_CC_SELF_TEST, &[], &[], &[u8::from(full_test)])
}

pub fn context_save(handle: Handle) -> Vec<u8> {
    encode_command(TPM_CC_CONTEXT_SAVE, &[handle], &[], &[])
}

/// `context` is an encoded `TPMS_CONTEXT`, as returned by ContextSave.
pub fn context_load(context: &[u8]) -> Vec<u8> {
    encode_command(TPM_CC_CONTEXT_LOAD, &[], &[], context)
}

pub fn flush_context(handle: Handle) -> Vec<u8> {
    encode_command(TPM_CC_FLUSH_CONTEXT, &[], &[], &handle.to_be_bytes())
}

pub fn get_handles(property: Handle, count: u32) -> Vec<u8> {
    encode_command(
        TPM_CC_GET_CAPABILITY,
        &[],
        &[],
        &HandleQuery { property, count }.encode(),
    )
}
