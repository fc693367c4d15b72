//! Command and response builders for tests.

use tpmrm_protocol::codes::*;
use tpmrm_protocol::{AuthBlock, encode_command, encode_response, error_response, response_code};

/// A well-formed command authorization block for `session`.
pub fn command_auth(session: Handle, continue_session: bool) -> AuthBlock {
    AuthBlock::new(session, continue_session)
        .with_nonce(vec![b'A'; 32])
        .with_hmac(vec![b'B'; 32])
}

/// A well-formed response authorization block.
pub fn response_auth(continue_session: bool) -> AuthBlock {
    command_auth(0, continue_session)
}

pub fn success() -> Vec<u8> {
    encode_response(TPM_RC_SUCCESS, &[], &[], &[])
}

/// What the resource manager answers for an unknown handle.
pub fn bad_handle() -> Vec<u8> {
    error_response(RM_TPM_ERROR_BASE | TPM_RC_HANDLE)
}

/// Loads a key under the storage root; answered with one transient handle.
pub fn load() -> Vec<u8> {
    encode_command(TPM_CC_LOAD, &[PERSISTENT_FIRST], &[], &[])
}

pub fn start_session() -> Vec<u8> {
    encode_command(TPM_CC_START_AUTH_SESSION, &[TPM_RH_NULL, TPM_RH_NULL], &[], &[])
}

pub fn sign(key: Handle) -> Vec<u8> {
    encode_command(TPM_CC_SIGN, &[key], &[], &[])
}

/// A command with no handles, standing in for any unrelated traffic.
pub fn get_random() -> Vec<u8> {
    encode_command(TPM_CC_GET_RANDOM, &[], &[], &[0, 16])
}

/// An unrelated command authorized by `session`.
pub fn use_session(session: Handle, continue_session: bool) -> Vec<u8> {
    encode_command(
        TPM_CC_GET_RANDOM,
        &[],
        &[command_auth(session, continue_session)],
        &[0, 16],
    )
}

pub fn flush(handle: Handle) -> Vec<u8> {
    encode_command(TPM_CC_FLUSH_CONTEXT, &[], &[], &handle.to_be_bytes())
}

pub fn context_save(handle: Handle) -> Vec<u8> {
    encode_command(TPM_CC_CONTEXT_SAVE, &[handle], &[], &[])
}

pub fn context_load(context: &[u8]) -> Vec<u8> {
    encode_command(TPM_CC_CONTEXT_LOAD, &[], &[], context)
}

pub fn code(response: &[u8]) -> ResponseCode {
    response_code(response).unwrap()
}

/// The first handle of a successful response.
pub fn handle_of(response: &[u8]) -> Handle {
    assert_eq!(code(response), TPM_RC_SUCCESS, "expected success response");
    u32::from_be_bytes([response[10], response[11], response[12], response[13]])
}

/// Parameters of a response without sessions.
pub fn parameters_of(response: &[u8], handles: usize) -> &[u8] {
    &response[10 + 4 * handles..]
}
